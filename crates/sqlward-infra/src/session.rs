//! Sessions: one lazily started transaction on one pooled connection.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, TryStreamExt};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query as SqlxQuery;
use sqlx::{Any, Transaction};
use sqlward_core::CompiledStatement;
use sqlward_types::{Dialect, Value};
use tokio::sync::Mutex;

use crate::database::Database;
use crate::entity::Entity;
use crate::error::Error;
use crate::repository::Repository;

/// A unit of work against the database.
///
/// The first statement checks a connection out of the pool and opens a
/// transaction; it stays open until [`Session::commit`] or
/// [`Session::rollback`]. Nothing is committed implicitly. Dropping the last
/// handle with a transaction still open rolls it back and returns the
/// connection to the pool.
///
/// Clones share the same transaction.
#[derive(Clone)]
pub struct Session {
    db: Database,
    state: Arc<Mutex<SessionState>>,
}

#[derive(Default)]
struct SessionState {
    tx: Option<Transaction<'static, Any>>,
}

impl SessionState {
    async fn transaction(&mut self, db: &Database) -> Result<&mut Transaction<'static, Any>, Error> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => {
                let tx = db.pool().begin().await?;
                tracing::debug!(dialect = %db.dialect(), "session transaction started");
                tx
            }
        };
        Ok(self.tx.insert(tx))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("dialect", &self.db.dialect())
            .finish_non_exhaustive()
    }
}

fn bind_params<'q>(
    mut query: SqlxQuery<'q, Any, AnyArguments<'q>>,
    params: &[Value],
) -> SqlxQuery<'q, Any, AnyArguments<'q>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            other => query.bind(other.to_text().unwrap_or_default()),
        };
    }
    query
}

impl Session {
    pub(crate) fn new(db: Database) -> Self {
        Self {
            db,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn dialect(&self) -> Dialect {
        self.db.dialect()
    }

    /// A repository for `E` bound to this session.
    pub fn repository<E: Entity>(&self) -> Repository<E> {
        Repository::new(self.clone())
    }

    pub async fn in_transaction(&self) -> bool {
        self.state.lock().await.tx.is_some()
    }

    /// Start the transaction now instead of at the first statement.
    pub async fn begin(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        state.transaction(&self.db).await?;
        Ok(())
    }

    /// Commit the open transaction, if any, and release its connection.
    pub async fn commit(&self) -> Result<(), Error> {
        let tx = self.state.lock().await.tx.take();
        if let Some(tx) = tx {
            tx.commit().await?;
            tracing::debug!("session committed");
        }
        Ok(())
    }

    /// Roll back the open transaction, if any, and release its connection.
    pub async fn rollback(&self) -> Result<(), Error> {
        let tx = self.state.lock().await.tx.take();
        if let Some(tx) = tx {
            tx.rollback().await?;
            tracing::debug!("session rolled back");
        }
        Ok(())
    }

    /// Discard uncommitted work and release the connection. The session can
    /// still be used afterwards; the next statement starts a new transaction.
    pub async fn close(&self) -> Result<(), Error> {
        self.rollback().await
    }

    fn log_statement(&self, stmt: &CompiledStatement) {
        if self.db.settings().echo {
            tracing::info!(target: "sqlward::sql", sql = %stmt.sql, params = ?stmt.params, "execute");
        } else {
            tracing::trace!(target: "sqlward::sql", sql = %stmt.sql, "execute");
        }
    }

    /// Run a statement, returning the number of affected rows.
    pub async fn execute(&self, stmt: &CompiledStatement) -> Result<u64, Error> {
        self.log_statement(stmt);
        let mut state = self.state.lock().await;
        let tx = state.transaction(&self.db).await?;
        let result = bind_params(sqlx::query(&stmt.sql), &stmt.params)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn fetch_all(&self, stmt: &CompiledStatement) -> Result<Vec<AnyRow>, Error> {
        self.log_statement(stmt);
        let mut state = self.state.lock().await;
        let tx = state.transaction(&self.db).await?;
        let rows = bind_params(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_all(&mut **tx)
            .await?;
        Ok(rows)
    }

    pub async fn fetch_optional(&self, stmt: &CompiledStatement) -> Result<Option<AnyRow>, Error> {
        self.log_statement(stmt);
        let mut state = self.state.lock().await;
        let tx = state.transaction(&self.db).await?;
        let row = bind_params(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row)
    }

    /// Rows delivered one at a time as the database produces them. The
    /// session is held for the life of the stream; other statements on it
    /// wait until the stream is exhausted or dropped.
    pub fn fetch_stream(
        &self,
        stmt: CompiledStatement,
    ) -> Pin<Box<dyn Stream<Item = Result<AnyRow, Error>> + Send + 'static>> {
        self.log_statement(&stmt);
        let session = self.clone();
        Box::pin(async_stream::try_stream! {
            let mut state = session.state.lock().await;
            let tx = state.transaction(&session.db).await?;
            let mut rows = bind_params(sqlx::query(&stmt.sql), &stmt.params).fetch(&mut **tx);
            while let Some(row) = rows.try_next().await? {
                yield row;
            }
        })
    }

    /// Run raw SQL without parameters.
    pub async fn execute_sql(&self, sql: &str) -> Result<u64, Error> {
        self.execute(&CompiledStatement {
            sql: sql.to_string(),
            params: Vec::new(),
        })
        .await
    }
}
