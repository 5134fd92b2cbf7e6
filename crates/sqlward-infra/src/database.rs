//! Connection pool ownership and session creation.
//!
//! One `Database` per process (or per test). It is cheap to clone; every
//! clone shares the same pool, settings and connection tracker.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use sqlx::migrate::Migrator;
use sqlward_core::ddl::{create_table_sql, drop_table_sql};
use sqlward_core::TableMeta;
use sqlward_types::{DatabaseSettings, Dialect};

use crate::entity::Entity;
use crate::error::Error;
use crate::lock::{LocalLocks, key_to_int};
use crate::repository::Repository;
use crate::session::Session;
use crate::tracker::ConnectionTracker;

/// Per-connection setup for SQLite: foreign keys, WAL and a 5-second busy
/// timeout.
const SQLITE_PRAGMAS: &[&str] = &[
    "PRAGMA foreign_keys = ON",
    "PRAGMA journal_mode = WAL",
    "PRAGMA busy_timeout = 5000",
];

/// Snapshot of the connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Open connections, idle or checked out.
    pub size: u32,
    pub idle: usize,
    pub checked_out: usize,
}

/// Shared handle to a connection pool.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    pool: AnyPool,
    dialect: Dialect,
    settings: DatabaseSettings,
    tracker: Arc<ConnectionTracker>,
    locks: LocalLocks,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.inner.dialect)
            .field("pool", &self.pool_status())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Connect with default pool settings.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        Self::connect_with(DatabaseSettings::new(url)).await
    }

    /// Connect using settings read from `DATABASE_*` environment variables.
    pub async fn from_env() -> Result<Self, Error> {
        Self::connect_with(DatabaseSettings::from_env()?).await
    }

    pub async fn connect_with(settings: DatabaseSettings) -> Result<Self, Error> {
        let dialect = Dialect::from_url(&settings.url).ok_or_else(|| {
            let scheme = settings.url.split(':').next().unwrap_or_default();
            Error::UnsupportedDialect(scheme.to_string())
        })?;
        sqlx::any::install_default_drivers();

        let tracker = Arc::new(ConnectionTracker::default());
        let connect_tracker = Arc::clone(&tracker);
        let release_tracker = Arc::clone(&tracker);
        let pool_settings = &settings.pool;

        let pool = AnyPoolOptions::new()
            .max_connections(pool_settings.max_connections())
            .acquire_timeout(pool_settings.acquire_timeout())
            .max_lifetime(pool_settings.max_lifetime())
            .test_before_acquire(pool_settings.pool_pre_ping)
            .after_connect(move |conn, _meta| {
                let tracker = Arc::clone(&connect_tracker);
                Box::pin(async move {
                    if dialect == Dialect::Sqlite {
                        for pragma in SQLITE_PRAGMAS {
                            sqlx::query(*pragma).execute(&mut *conn).await?;
                        }
                    }
                    tracker.record_connect();
                    Ok(())
                })
            })
            .after_release(move |_conn, _meta| {
                let tracker = Arc::clone(&release_tracker);
                Box::pin(async move {
                    tracker.record_release();
                    Ok(true)
                })
            })
            .connect(&settings.url)
            .await?;

        tracing::info!(
            dialect = %dialect,
            max_connections = pool_settings.max_connections(),
            echo = settings.echo,
            "database pool ready"
        );

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                pool,
                dialect,
                settings,
                tracker,
                locks: LocalLocks::default(),
            }),
        })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.inner.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.inner.settings
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.inner.tracker
    }

    pub fn pool_status(&self) -> PoolStatus {
        let size = self.inner.pool.size();
        let idle = self.inner.pool.num_idle();
        PoolStatus {
            size,
            idle,
            checked_out: (size as usize).saturating_sub(idle),
        }
    }

    /// A new session. No connection is taken until its first statement.
    pub fn session(&self) -> Session {
        Session::new(self.clone())
    }

    /// A repository for `E` over a new session.
    pub fn repository<E: Entity>(&self) -> Repository<E> {
        Repository::new(self.session())
    }

    /// Run `f` with a new session, then release it. Whatever `f` did not
    /// commit is rolled back, on success and on error alike.
    pub async fn with_session<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<Error>,
    {
        let session = self.session();
        let result = f(session.clone()).await;
        let closed = session.close().await;
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Run one raw statement in its own session and commit it.
    pub async fn execute(&self, sql: &str) -> Result<u64, Error> {
        let session = self.session();
        let affected = session.execute_sql(sql).await?;
        session.commit().await?;
        Ok(affected)
    }

    /// Create the given tables if they do not exist yet.
    pub async fn create_all(&self, tables: &[&TableMeta]) -> Result<(), Error> {
        let session = self.session();
        for table in tables {
            session.execute_sql(&create_table_sql(table, self.dialect())).await?;
        }
        session.commit().await
    }

    /// Drop the given tables, last first.
    pub async fn drop_all(&self, tables: &[&TableMeta]) -> Result<(), Error> {
        let session = self.session();
        for table in tables.iter().rev() {
            session.execute_sql(&drop_table_sql(table)).await?;
        }
        session.commit().await
    }

    /// Apply the SQL migrations found in `dir`.
    pub async fn migrate(&self, dir: impl AsRef<Path>) -> Result<(), Error> {
        let migrator = Migrator::new(dir.as_ref()).await?;
        self.run_migrations(&migrator).await
    }

    /// Apply an already loaded (for example embedded) migrator.
    pub async fn run_migrations(&self, migrator: &Migrator) -> Result<(), Error> {
        migrator.run(&self.inner.pool).await?;
        tracing::info!(count = migrator.iter().count(), "migrations applied");
        Ok(())
    }

    /// Run `fut` while holding the lock named `key`.
    ///
    /// On PostgreSQL this is a transaction-level advisory lock on a
    /// dedicated connection, so it excludes other processes too. Elsewhere
    /// the lock only covers this process. Either way the lock is released
    /// when `fut` finishes, panics or is cancelled.
    pub async fn with_lock<F, T>(&self, key: &str, fut: F) -> Result<T, Error>
    where
        F: Future<Output = T>,
    {
        let id = key_to_int(key);
        match self.dialect() {
            Dialect::Postgres => {
                // Dropping the transaction rolls back, which frees the lock.
                let mut tx = self.inner.pool.begin().await?;
                sqlx::query("SELECT 1 FROM pg_advisory_xact_lock($1)")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                tracing::debug!(key, id, "advisory lock acquired");
                let value = fut.await;
                tx.commit().await?;
                Ok(value)
            }
            Dialect::Sqlite => {
                let _guard = self.inner.locks.lock(id).await;
                tracing::debug!(key, "local lock acquired");
                Ok(fut.await)
            }
        }
    }

    /// Close every pooled connection. Outstanding sessions fail afterwards.
    pub async fn close(&self) {
        self.inner.pool.close().await;
    }
}
