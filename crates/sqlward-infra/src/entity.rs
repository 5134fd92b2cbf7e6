//! Entity types and row decoding helpers.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::Row;
use sqlx::any::AnyRow;
use sqlward_core::TableMeta;
use sqlward_types::{Guid, Value, Values};

/// A Rust type mapped onto one table.
///
/// ```ignore
/// struct User { id: Guid, name: String }
///
/// impl Entity for User {
///     const TABLE: &'static TableMeta = &USERS;
///
///     fn from_row(row: &AnyRow) -> Result<Self, sqlx::Error> {
///         Ok(Self { id: get_guid(row, "id")?, name: row.try_get("name")? })
///     }
///
///     fn values(&self) -> Values {
///         values! { "id" => self.id, "name" => &self.name }
///     }
/// }
/// ```
pub trait Entity: Sized + Send + Sync + Unpin + 'static {
    const TABLE: &'static TableMeta;

    fn from_row(row: &AnyRow) -> Result<Self, sqlx::Error>;

    /// Column values written by `insert_entity` and friends.
    fn values(&self) -> Values;

    /// Name used in error messages.
    fn entity_name() -> &'static str {
        Self::TABLE.name
    }

    /// Values of the primary-key columns, taken from [`Entity::values`].
    fn key(&self) -> Values {
        let values = self.values();
        Self::TABLE
            .primary_key()
            .map(|pk| {
                let value = values.get(pk.name).cloned().unwrap_or(Value::Null);
                (pk.name, value)
            })
            .collect()
    }
}

fn decode_error(column: &str, source: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

pub fn get_guid(row: &AnyRow, column: &str) -> Result<Guid, sqlx::Error> {
    let text: String = row.try_get(column)?;
    text.trim().parse().map_err(|e| decode_error(column, e))
}

pub fn get_opt_guid(row: &AnyRow, column: &str) -> Result<Option<Guid>, sqlx::Error> {
    let text: Option<String> = row.try_get(column)?;
    text.map(|t| t.trim().parse().map_err(|e| decode_error(column, e)))
        .transpose()
}

/// Read a boolean column. SQLite hands booleans back as integers.
pub fn get_bool(row: &AnyRow, column: &str) -> Result<bool, sqlx::Error> {
    match row.try_get::<bool, _>(column) {
        Ok(value) => Ok(value),
        Err(sqlx::Error::ColumnDecode { .. }) => Ok(row.try_get::<i64, _>(column)? != 0),
        Err(e) => Err(e),
    }
}

pub fn get_datetime(row: &AnyRow, column: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let text: String = row.try_get(column)?;
    parse_datetime(column, &text)
}

pub fn get_opt_datetime(row: &AnyRow, column: &str) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let text: Option<String> = row.try_get(column)?;
    text.map(|t| parse_datetime(column, &t)).transpose()
}

fn parse_datetime(column: &str, text: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_error(column, e))
}

/// Deserialize a JSON text column.
pub fn get_json<T: DeserializeOwned>(row: &AnyRow, column: &str) -> Result<T, sqlx::Error> {
    let text: String = row.try_get(column)?;
    serde_json::from_str(&text).map_err(|e| decode_error(column, e))
}
