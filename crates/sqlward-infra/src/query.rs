//! Chainable queries bound to a session, and their terminal operations.

use std::marker::PhantomData;
use std::pin::Pin;

use futures_util::{Stream, StreamExt, stream};

use sqlx::any::AnyRow;
use sqlx::{Any, Decode, Row, Type};
use sqlward_core::{
    ColumnRef, CompiledStatement, Condition, JoinKind, OrderBy, QueryError, Statement,
    statement::equalities,
};
use sqlward_types::{Value, Values};

use crate::entity::Entity;
use crate::error::Error;
use crate::session::Session;

/// A statement against `E`'s table, bound to the session that will run it.
///
/// Refinements consume the query and return a new one. A refinement that
/// cannot apply (unknown column, `limit` on an insert, ...) does not panic:
/// the error is carried along and returned by the terminal operation.
pub struct Query<E> {
    session: Session,
    statement: Result<Statement, QueryError>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            statement: self.statement.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("statement", &self.statement)
            .finish_non_exhaustive()
    }
}

impl<E: Entity> Query<E> {
    pub(crate) fn new(session: Session, statement: Result<Statement, QueryError>) -> Self {
        Self {
            session,
            statement,
            _entity: PhantomData,
        }
    }

    pub(crate) fn map_statement(
        self,
        f: impl FnOnce(Statement) -> Result<Statement, QueryError>,
    ) -> Self {
        Self {
            session: self.session,
            statement: self.statement.and_then(f),
            _entity: PhantomData,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The statement built so far, or the first error met while building it.
    pub fn statement(&self) -> Result<&Statement, &QueryError> {
        self.statement.as_ref()
    }

    pub fn filter(self, condition: Condition) -> Self {
        self.map_statement(|s| s.filter(condition))
    }

    /// Alias of [`Query::filter`].
    pub fn where_(self, condition: Condition) -> Self {
        self.filter(condition)
    }

    /// `column = value`.
    pub fn filter_by(self, column: &str, value: impl Into<Value>) -> Self {
        let condition = sqlward_core::col(column).eq(value);
        self.filter(condition)
    }

    /// Equality on every column of `values`.
    pub fn filter_by_values(self, values: &Values) -> Self {
        if values.is_empty() {
            return self;
        }
        self.filter(equalities(values))
    }

    /// Keep rows whose `tombstone` flag is unset.
    pub fn not_deleted(self) -> Self {
        self.filter(sqlward_core::mixins::not_deleted())
    }

    /// Keep soft-deleted rows only.
    pub fn deleted(self) -> Self {
        self.filter(sqlward_core::mixins::is_deleted())
    }

    pub fn join(self, table: &str, on: Condition) -> Self {
        self.map_statement(|s| s.join(JoinKind::Inner, table, on))
    }

    pub fn left_join(self, table: &str, on: Condition) -> Self {
        self.map_statement(|s| s.join(JoinKind::Left, table, on))
    }

    pub fn order_by(self, order: OrderBy) -> Self {
        self.map_statement(|s| s.order_by(order))
    }

    pub fn limit(self, limit: u64) -> Self {
        self.map_statement(|s| s.limit(limit))
    }

    pub fn offset(self, offset: u64) -> Self {
        self.map_statement(|s| s.offset(offset))
    }

    pub fn distinct(self) -> Self {
        self.map_statement(Statement::distinct)
    }

    /// Select only `columns`, for use with [`Query::scalar`] / [`Query::scalars`].
    pub fn only(self, columns: impl IntoIterator<Item = ColumnRef>) -> Self {
        let columns = columns.into_iter().collect();
        self.map_statement(|s| s.only(columns))
    }

    /// Return the affected rows of an update or delete.
    pub fn returning(self) -> Self {
        self.map_statement(|s| s.returning(true))
    }

    /// Skip the `RETURNING` clause of an insert.
    pub fn without_returning(self) -> Self {
        self.map_statement(|s| s.returning(false))
    }

    /// Turn an insert into `INSERT .. ON CONFLICT DO NOTHING`.
    pub fn ignore_conflicts(self) -> Self {
        self.map_statement(Statement::ignore_conflicts)
    }

    pub fn compile(&self) -> Result<CompiledStatement, Error> {
        let statement = self.statement.as_ref().map_err(Clone::clone)?;
        Ok(statement.compile(self.session.dialect()))
    }

    /// Rendered SQL text, placeholders included.
    pub fn to_sql(&self) -> Result<String, Error> {
        Ok(self.compile()?.sql)
    }

    fn row_statement(&self, operation: &'static str) -> Result<CompiledStatement, Error> {
        let statement = self.statement.as_ref().map_err(Clone::clone)?;
        if !statement.returns_rows() {
            return Err(QueryError::Unsupported {
                operation,
                statement: statement.kind(),
            }
            .into());
        }
        Ok(statement.compile(self.session.dialect()))
    }

    async fn fetch_rows(&self, operation: &'static str) -> Result<Vec<AnyRow>, Error> {
        let compiled = self.row_statement(operation)?;
        self.session.fetch_all(&compiled).await
    }

    fn decode(rows: &[AnyRow]) -> Result<Vec<E>, Error> {
        let entities = rows.iter().map(E::from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(entities)
    }

    /// Every resulting entity, in the statement's order.
    pub async fn all(self) -> Result<Vec<E>, Error> {
        let rows = self.fetch_rows("all").await?;
        Self::decode(&rows)
    }

    /// Exactly one entity: no row is [`Error::NotFound`], more than one is
    /// [`Error::MultipleResults`].
    pub async fn one(self) -> Result<E, Error> {
        self.one_or_none().await?.ok_or(Error::NotFound {
            entity: E::entity_name(),
        })
    }

    /// At most one entity; more than one is [`Error::MultipleResults`].
    pub async fn one_or_none(self) -> Result<Option<E>, Error> {
        let rows = self.fetch_rows("one").await?;
        match rows.as_slice() {
            [] => Ok(None),
            [row] => Ok(Some(E::from_row(row)?)),
            _ => Err(Error::MultipleResults {
                entity: E::entity_name(),
                count: rows.len(),
            }),
        }
    }

    /// The single entity, or `default` when there is none. More than one is
    /// still [`Error::MultipleResults`].
    pub async fn one_or(self, default: E) -> Result<E, Error> {
        Ok(self.one_or_none().await?.unwrap_or(default))
    }

    /// Entities decoded one row at a time instead of collected up front.
    /// Building errors are yielded as the only item.
    pub fn stream(self) -> Pin<Box<dyn Stream<Item = Result<E, Error>> + Send + 'static>> {
        let compiled = match self.row_statement("stream") {
            Ok(compiled) => compiled,
            Err(e) => return Box::pin(stream::once(async move { Err(e) })),
        };
        let rows = self.session.fetch_stream(compiled);
        Box::pin(rows.map(|row| row.and_then(|row| E::from_row(&row).map_err(Error::from))))
    }

    /// The first entity, if any. Selects are limited to one row.
    pub async fn first(self) -> Result<Option<E>, Error> {
        let is_select = matches!(self.statement, Ok(Statement::Select(_)));
        let query = if is_select { self.limit(1) } else { self };
        let compiled = query.row_statement("first")?;
        let row = query.session.fetch_optional(&compiled).await?;
        row.as_ref().map(E::from_row).transpose().map_err(Error::from)
    }

    /// Run the statement and return the number of affected rows.
    pub async fn execute(self) -> Result<u64, Error> {
        let compiled = self.compile()?;
        self.session.execute(&compiled).await
    }

    /// Number of rows the select would return.
    pub async fn count(self) -> Result<i64, Error> {
        let statement = self.statement.as_ref().map_err(Clone::clone)?;
        let compiled = statement.compile_count(self.session.dialect())?;
        let row = self.session.fetch_optional(&compiled).await?;
        match row {
            Some(row) => Ok(row.try_get::<i64, _>(0)?),
            None => Ok(0),
        }
    }

    /// First column of the first row, if there is a row.
    pub async fn scalar<T>(self) -> Result<Option<T>, Error>
    where
        T: for<'r> Decode<'r, Any> + Type<Any>,
    {
        let compiled = self.row_statement("scalar")?;
        let row = self.session.fetch_optional(&compiled).await?;
        match row {
            Some(row) => Ok(Some(row.try_get::<T, _>(0)?)),
            None => Ok(None),
        }
    }

    /// First column of every row.
    pub async fn scalars<T>(self) -> Result<Vec<T>, Error>
    where
        T: for<'r> Decode<'r, Any> + Type<Any>,
    {
        let rows = self.fetch_rows("scalars").await?;
        let values = rows
            .iter()
            .map(|row| row.try_get::<T, _>(0))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }
}
