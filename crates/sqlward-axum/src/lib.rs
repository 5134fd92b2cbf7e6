//! axum integration for sqlward.
//!
//! Handlers ask for [`Repo<E>`], [`DbSession`] or a [`RepositoryProvider`]
//! and get repositories bound to a session scoped to the current request.
//! Every extractor in one request shares that session; it is rolled back
//! when the request ends unless the handler committed it.
//!
//! ```ignore
//! async fn create_user(
//!     Repo(users): Repo<User>,
//!     Json(body): Json<NewUser>,
//! ) -> Result<Json<ApiResponse<User>>, ApiError> {
//!     let user = users.insert(body.into_values()).one().await?;
//!     users.session().commit().await?;
//!     Ok(Json(ApiResponse::success(user, request_id(), 0)))
//! }
//! ```

pub mod error;
pub mod extract;
pub mod response;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::ApiError;
pub use extract::{DbSession, Repo, RepositoryProvider};
pub use response::{ApiErrorDetail, ApiMeta, ApiResponse, request_id};
