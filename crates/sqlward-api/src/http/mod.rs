//! REST API at `/api/v1/` with envelope responses.

pub mod router;
pub mod users;
