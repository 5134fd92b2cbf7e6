//! User CRUD handlers for the REST API.
//!
//! Every handler works on the request session through [`Repo`] and commits
//! explicitly once its writes succeed; an early return leaves the session
//! to roll back when the request ends.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use serde::Deserialize;
use sqlward_axum::{ApiError, ApiResponse, Repo, request_id};
use sqlward_infra::{Guid, NumberedPage, TokenPage, col};

use crate::user::{CreateUser, UpdateUser, User};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// Query parameters for `GET /api/v1/users`.
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    /// Exact name match.
    pub name: Option<String>,
    /// Only users at least this old.
    pub min_age: Option<i64>,
    /// 1-based page number.
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Query parameters for `GET /api/v1/users/feed`.
#[derive(Debug, Default, Deserialize)]
pub struct UserFeedQuery {
    /// `next_page` token of the previous page.
    pub after: Option<String>,
    pub page_size: Option<u32>,
}

fn page_size(requested: Option<u32>) -> u32 {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// GET /api/v1/users - Numbered page of users in name order.
pub async fn list_users(
    Repo(users): Repo<User>,
    Query(query): Query<UserListQuery>,
) -> Result<ApiResponse<NumberedPage<User>>, ApiError> {
    let start = Instant::now();

    let mut select = users.select();
    if let Some(name) = query.name {
        select = select.filter_by("name", name);
    }
    if let Some(min_age) = query.min_age {
        select = select.filter(col("age").gte(min_age));
    }
    let page = select
        .paginate(query.page.unwrap_or(1), page_size(query.page_size), true)
        .await?;

    Ok(ApiResponse::success(page, request_id(), elapsed_ms(start)).with_link("self", "/api/v1/users"))
}

/// GET /api/v1/users/feed - Keyset page of users in name order.
pub async fn user_feed(
    Repo(users): Repo<User>,
    Query(query): Query<UserFeedQuery>,
) -> Result<ApiResponse<TokenPage<User>>, ApiError> {
    let start = Instant::now();
    let page = users
        .paginate_after(query.after.as_deref(), page_size(query.page_size))
        .await?;

    let mut resp = ApiResponse::success(page, request_id(), elapsed_ms(start));
    if let Some(next) = resp.data.as_ref().and_then(|p| p.next_page.clone()) {
        resp = resp.with_link("next", &format!("/api/v1/users/feed?after={next}"));
    }
    if let Some(prev) = resp.data.as_ref().and_then(|p| p.previous_page.clone()) {
        resp = resp.with_link("prev", &format!("/api/v1/users/feed?after={prev}"));
    }
    Ok(resp)
}

/// GET /api/v1/users/{id}
pub async fn get_user(
    Repo(users): Repo<User>,
    Path(id): Path<Guid>,
) -> Result<ApiResponse<User>, ApiError> {
    let start = Instant::now();
    let user = users.filter_by("id", id).one().await?;
    Ok(ApiResponse::success(user, request_id(), elapsed_ms(start))
        .with_link("self", &format!("/api/v1/users/{id}")))
}

/// POST /api/v1/users
pub async fn create_user(
    Repo(users): Repo<User>,
    Json(body): Json<CreateUser>,
) -> Result<(StatusCode, ApiResponse<User>), ApiError> {
    let start = Instant::now();
    body.validate().map_err(ApiError::Validation)?;

    let email = body.email.clone();
    let Some(user) = users.create(body.into_values()).await? else {
        return Err(ApiError::Conflict(format!(
            "a user with email {} already exists",
            email.as_deref().unwrap_or("<none>")
        )));
    };
    users.session().commit().await?;
    let id = user.id;
    tracing::info!(user_id = %id, "user created");

    let resp = ApiResponse::success(user, request_id(), elapsed_ms(start))
        .with_link("self", &format!("/api/v1/users/{id}"));
    Ok((StatusCode::CREATED, resp))
}

/// PUT /api/v1/users/{id} - Change the fields present in the body.
pub async fn update_user(
    Repo(users): Repo<User>,
    Path(id): Path<Guid>,
    Json(body): Json<UpdateUser>,
) -> Result<ApiResponse<User>, ApiError> {
    let start = Instant::now();
    body.validate().map_err(ApiError::Validation)?;
    let values = body.into_values();
    if values.is_empty() {
        return Err(ApiError::Validation("no fields to update".to_string()));
    }

    let user = users
        .update(values)
        .filter_by("id", id)
        .returning()
        .one()
        .await?;
    users.session().commit().await?;

    Ok(ApiResponse::success(user, request_id(), elapsed_ms(start))
        .with_link("self", &format!("/api/v1/users/{id}")))
}

/// DELETE /api/v1/users/{id} - Returns the deleted user.
pub async fn delete_user(
    Repo(users): Repo<User>,
    Path(id): Path<Guid>,
) -> Result<ApiResponse<User>, ApiError> {
    let start = Instant::now();
    let user = users
        .delete_one(col("id").eq(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))?;
    users.session().commit().await?;
    tracing::info!(user_id = %id, "user deleted");

    Ok(ApiResponse::success(user, request_id(), elapsed_ms(start)))
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::http::router::build_router;
    use crate::state::test_state;

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn app() -> Router {
        build_router(test_state().await)
    }

    async fn create(app: &Router, name: &str, email: Option<&str>, age: Option<i64>) -> Value {
        let (status, json) = call(
            app,
            "POST",
            "/api/v1/users",
            Some(json!({ "name": name, "email": email, "age": age })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["data"].clone()
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let app = app().await;
        let user = create(&app, "test", None, None).await;
        let id = user["id"].as_str().unwrap();
        assert_eq!(id.len(), 36);
        assert!(user["created_at"].is_string());

        let (status, json) = call(&app, "GET", &format!("/api/v1/users/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["name"], "test");
        assert_eq!(json["_links"]["self"], format!("/api/v1/users/{id}"));
    }

    #[tokio::test]
    async fn test_blank_name_is_400() {
        let app = app().await;
        let (status, json) = call(&app, "POST", "/api/v1/users", Some(json!({ "name": " " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errors"][0]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_409() {
        let app = app().await;
        create(&app, "ada", Some("ada@example.com"), None).await;
        let (status, json) = call(
            &app,
            "POST",
            "/api/v1/users",
            Some(json!({ "name": "other", "email": "ada@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["errors"][0]["code"], "CONFLICT");

        let (_, list) = call(&app, "GET", "/api/v1/users", None).await;
        assert_eq!(list["data"]["total_items"], 1);
    }

    #[tokio::test]
    async fn test_missing_user_is_404() {
        let app = app().await;
        let uri = format!("/api/v1/users/{}", sqlward_infra::Guid::new());
        let (status, json) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["data"].is_null());

        let (status, _) = call(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, "PUT", &uri, Some(json!({ "age": 3 }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let app = app().await;
        for (name, age) in [("cy", 30), ("ab", 20), ("bo", 40), ("ab", 50)] {
            create(&app, name, None, Some(age)).await;
        }

        let (status, json) = call(&app, "GET", "/api/v1/users?page=1&page_size=3", None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = json["data"]["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["ab", "ab", "bo"]);
        assert_eq!(json["data"]["total_items"], 4);
        assert_eq!(json["data"]["total_pages"], 2);

        let (_, json) = call(&app, "GET", "/api/v1/users?name=ab&min_age=30", None).await;
        let items = json["data"]["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["age"], 50);

        let (status, _) = call(&app, "GET", "/api/v1/users?page=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_feed_walks_every_user() {
        let app = app().await;
        for i in 0..5 {
            create(&app, &format!("user-{i}"), None, None).await;
        }

        let page_names = |json: &serde_json::Value| -> Vec<String> {
            json["data"]["items"]
                .as_array()
                .unwrap()
                .iter()
                .map(|u| u["name"].as_str().unwrap().to_string())
                .collect()
        };

        let mut seen = Vec::new();
        let mut uri = "/api/v1/users/feed?page_size=2".to_string();
        let last = loop {
            let (status, json) = call(&app, "GET", &uri, None).await;
            assert_eq!(status, StatusCode::OK);
            seen.extend(page_names(&json));
            let next = json["data"]["next_page"].as_str().map(str::to_string);
            match next {
                Some(next) => uri = format!("/api/v1/users/feed?page_size=2&after={next}"),
                None => break json,
            }
        };
        assert_eq!(seen, vec!["user-0", "user-1", "user-2", "user-3", "user-4"]);

        let prev = last["data"]["previous_page"].as_str().unwrap();
        assert!(last["_links"]["prev"].as_str().unwrap().ends_with(prev));
        let uri = format!("/api/v1/users/feed?page_size=2&after={prev}");
        let (_, json) = call(&app, "GET", &uri, None).await;
        assert_eq!(page_names(&json), vec!["user-2", "user-3"]);

        let (status, json) = call(&app, "GET", "/api/v1/users/feed?after=%25%25", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errors"][0]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let app = app().await;
        let user = create(&app, "grace", None, Some(30)).await;
        let uri = format!("/api/v1/users/{}", user["id"].as_str().unwrap());
        let stamp = |v: &serde_json::Value| {
            chrono::DateTime::parse_from_rfc3339(v.as_str().unwrap()).unwrap()
        };
        assert_eq!(stamp(&user["created_at"]), stamp(&user["updated_at"]));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let (status, json) = call(&app, "PUT", &uri, Some(json!({ "age": 31 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["age"], 31);
        assert_eq!(json["data"]["name"], "grace");
        assert!(stamp(&json["data"]["updated_at"]) > stamp(&user["updated_at"]));
        assert_eq!(stamp(&json["data"]["created_at"]), stamp(&user["created_at"]));

        let (status, _) = call(&app, "PUT", &uri, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = call(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["name"], "grace");

        let (status, _) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
