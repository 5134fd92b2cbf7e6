//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`. Middleware: CORS, tracing.

use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use sqlward_axum::{ApiResponse, request_id};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::users;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/feed", get(users::user_feed))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// GET /api/v1/health - Pool status.
async fn health(State(state): State<AppState>) -> ApiResponse<serde_json::Value> {
    let start = Instant::now();
    let pool = state.db.pool_status();
    let body = serde_json::json!({
        "dialect": state.db.dialect().to_string(),
        "pool": {
            "size": pool.size,
            "idle": pool.idle,
            "checked_out": pool.checked_out,
        },
    });
    ApiResponse::success(body, request_id(), start.elapsed().as_millis() as u64)
}
