//! Generic repository over one entity type.

use std::marker::PhantomData;
use std::pin::Pin;

use futures_util::Stream;
use sqlward_core::mixins::TOMBSTONE;
use sqlward_core::{
    Condition, DeleteStatement, InsertStatement, QueryError, SelectStatement, Statement,
    TableMeta, UpdateStatement, col,
};
use sqlward_types::{Value, Values, values};

use crate::entity::Entity;
use crate::error::Error;
use crate::query::Query;
use crate::session::Session;

/// Statement builders and helpers for `E`, running on one session.
///
/// Every builder returns a fresh [`Query`]; nothing runs until a terminal
/// operation is awaited, and nothing persists until the session commits.
pub struct Repository<E> {
    session: Session,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("session", &self.session)
            .finish()
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            _entity: PhantomData,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Point the repository at another session.
    pub fn replace_session(&mut self, session: Session) {
        self.session = session;
    }

    pub fn table(&self) -> &'static TableMeta {
        E::TABLE
    }

    fn query(&self, statement: Result<Statement, QueryError>) -> Query<E> {
        Query::new(self.session.clone(), statement)
    }

    /// Every column of the table, in the table's default order.
    pub fn select(&self) -> Query<E> {
        self.query(Ok(SelectStatement::new(E::TABLE).into()))
    }

    /// Insert one row, returning it.
    pub fn insert(&self, values: Values) -> Query<E> {
        self.insert_many(vec![values])
    }

    pub fn insert_many(&self, rows: Vec<Values>) -> Query<E> {
        self.query(InsertStatement::new(E::TABLE, rows).map(Statement::from))
    }

    pub fn insert_entity(&self, entity: &E) -> Query<E> {
        self.insert(entity.values())
    }

    /// Insert or, on a primary-key conflict, overwrite every given non-key
    /// column.
    pub fn upsert(&self, values: Values) -> Query<E> {
        self.query(InsertStatement::upsert(E::TABLE, vec![values], None).map(Statement::from))
    }

    /// Insert or, on a primary-key conflict, overwrite only `set`.
    pub fn upsert_with(&self, values: Values, set: &[&str]) -> Query<E> {
        let set = set.iter().map(|c| c.to_string()).collect();
        self.query(InsertStatement::upsert(E::TABLE, vec![values], Some(set)).map(Statement::from))
    }

    pub fn upsert_many(&self, rows: Vec<Values>) -> Query<E> {
        self.query(InsertStatement::upsert(E::TABLE, rows, None).map(Statement::from))
    }

    /// Update every row (narrow it with `filter`).
    pub fn update(&self, values: Values) -> Query<E> {
        self.query(UpdateStatement::new(E::TABLE, values).map(Statement::from))
    }

    /// Delete every row (narrow it with `filter`).
    pub fn delete(&self) -> Query<E> {
        self.query(Ok(DeleteStatement::new(E::TABLE).into()))
    }

    pub fn filter(&self, condition: Condition) -> Query<E> {
        self.select().filter(condition)
    }

    pub fn where_(&self, condition: Condition) -> Query<E> {
        self.filter(condition)
    }

    pub fn filter_by(&self, column: &str, value: impl Into<Value>) -> Query<E> {
        self.select().filter_by(column, value)
    }

    fn key_condition(&self, key: Value) -> Result<Condition, QueryError> {
        let pk = E::TABLE.single_primary_key()?;
        Ok(col(pk.name).eq(key))
    }

    /// The entity with primary key `key`, if any.
    pub async fn get(&self, key: impl Into<Value>) -> Result<Option<E>, Error> {
        let condition = self.key_condition(key.into())?;
        self.filter(condition).one_or_none().await
    }

    /// The single entity matching every pair of `filters`, if any.
    pub async fn get_by(&self, filters: &Values) -> Result<Option<E>, Error> {
        self.select().filter_by_values(filters).one_or_none().await
    }

    /// Every entity matching every pair of `filters`.
    pub async fn list(&self, filters: &Values) -> Result<Vec<E>, Error> {
        self.select().filter_by_values(filters).all().await
    }

    /// Insert a row, skipping it on any unique conflict. `None` when skipped.
    pub async fn create(&self, values: Values) -> Result<Option<E>, Error> {
        self.insert(values).ignore_conflicts().one_or_none().await
    }

    /// Upsert a row and return it as stored.
    pub async fn create_or_update(&self, values: Values) -> Result<E, Error> {
        self.upsert(values).one().await
    }

    /// Upsert the entity's values and return it as stored.
    pub async fn save(&self, entity: &E) -> Result<E, Error> {
        self.create_or_update(entity.values()).await
    }

    /// The row matching `lookup`, inserting `lookup` plus `defaults` when
    /// there is none.
    pub async fn get_or_create(&self, lookup: Values, defaults: Values) -> Result<E, Error> {
        let mut values = defaults;
        for (column, value) in lookup.iter() {
            values.insert(column, value.clone());
        }
        if let Some(created) = self.create(values).await? {
            return Ok(created);
        }
        self.select().filter_by_values(&lookup).one().await
    }

    /// Delete matching rows, returning how many went.
    pub async fn remove(&self, condition: Condition) -> Result<u64, Error> {
        self.delete().filter(condition).execute().await
    }

    /// Delete the single matching row and return it.
    pub async fn delete_one(&self, condition: Condition) -> Result<Option<E>, Error> {
        self.delete().filter(condition).returning().one_or_none().await
    }

    /// Delete matching rows and return them.
    pub async fn delete_many(&self, condition: Condition) -> Result<Vec<E>, Error> {
        self.delete().filter(condition).returning().all().await
    }

    /// Insert many rows in one statement, skipping conflicting ones.
    /// Returns the number of rows inserted.
    pub async fn bulk_create(&self, rows: Vec<Values>) -> Result<u64, Error> {
        self.insert_many(rows)
            .without_returning()
            .ignore_conflicts()
            .execute()
            .await
    }

    /// Upsert many rows in one statement.
    pub async fn bulk_create_or_update(&self, rows: Vec<Values>) -> Result<u64, Error> {
        self.upsert_many(rows).without_returning().execute().await
    }

    /// Update each row in place, matching on the `on` columns; the remaining
    /// columns of the row are written. Returns the total affected count.
    pub async fn bulk_update(&self, rows: Vec<Values>, on: &[&str]) -> Result<u64, Error> {
        let mut affected = 0;
        for mut row in rows {
            let mut key = Values::new();
            for column in on {
                let value = row.remove(column).ok_or(QueryError::MismatchedRows)?;
                key.insert(*column, value);
            }
            affected += self.update(row).filter_by_values(&key).execute().await?;
        }
        Ok(affected)
    }

    /// Number of rows matching `condition`.
    pub async fn count_where(&self, condition: Condition) -> Result<i64, Error> {
        self.filter(condition).count().await
    }

    /// Every entity, decoded as the rows arrive.
    pub fn stream(&self) -> Pin<Box<dyn Stream<Item = Result<E, Error>> + Send + 'static>> {
        self.select().stream()
    }

    /// Rows not soft-deleted. The table needs a `tombstone` column, see
    /// [`sqlward_core::mixins::tombstone`].
    pub fn not_deleted(&self) -> Query<E> {
        self.select().not_deleted()
    }

    /// Soft-deleted rows only.
    pub fn deleted(&self) -> Query<E> {
        self.select().deleted()
    }

    /// Flag matching rows as deleted, keeping them in the table.
    pub async fn soft_delete(&self, condition: Condition) -> Result<u64, Error> {
        self.set_tombstone(condition, true).await
    }

    /// Clear the deleted flag on matching rows.
    pub async fn restore(&self, condition: Condition) -> Result<u64, Error> {
        self.set_tombstone(condition, false).await
    }

    async fn set_tombstone(&self, condition: Condition, deleted: bool) -> Result<u64, Error> {
        self.update(values! { TOMBSTONE => deleted })
            .filter(condition)
            .execute()
            .await
    }
}
