//! Shared application state and schema setup.

use axum::extract::FromRef;
use sqlx::migrate::Migrator;
use sqlward_infra::{Database, DatabaseSettings, Dialect, Entity};

use crate::user::User;

/// Migrations bundled from `migrations/`. They are written for SQLite.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// State handed to every handler. Extractors pull the [`Database`] out of
/// it to open request sessions.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl AppState {
    /// Connect and bring the schema up to date.
    pub async fn init(settings: DatabaseSettings) -> anyhow::Result<Self> {
        let db = Database::connect_with(settings).await?;
        prepare_schema(&db).await?;
        Ok(Self { db })
    }
}

/// Apply migrations on SQLite; other dialects get tables created from the
/// entity metadata.
pub async fn prepare_schema(db: &Database) -> Result<(), sqlward_infra::Error> {
    match db.dialect() {
        Dialect::Sqlite => db.run_migrations(&MIGRATOR).await,
        other => {
            tracing::warn!(dialect = %other, "bundled migrations target SQLite, creating tables from metadata");
            db.create_all(&[User::TABLE]).await
        }
    }
}

#[cfg(test)]
pub(crate) async fn test_state() -> AppState {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("api.db").display());
    // Keep the directory alive for the test
    std::mem::forget(dir);
    AppState::init(DatabaseSettings::new(url)).await.unwrap()
}
