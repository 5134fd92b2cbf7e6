use sqlward_core::QueryError;
use sqlward_types::ConfigError;
use thiserror::Error;

/// Errors surfaced by sessions and repositories.
///
/// Driver and connectivity failures pass through unchanged in
/// [`Error::Database`]; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("no {entity} row found")]
    NotFound { entity: &'static str },

    #[error("expected one {entity} row, found {count}")]
    MultipleResults { entity: &'static str, count: usize },

    #[error("invalid query: {0}")]
    Query(#[from] QueryError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("unsupported database url scheme: '{0}'")]
    UnsupportedDialect(String),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("invalid page token: {0}")]
    InvalidPageToken(String),

    #[error("invalid page: {0}")]
    InvalidPage(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_multiple_results(&self) -> bool {
        matches!(self, Error::MultipleResults { .. })
    }
}
