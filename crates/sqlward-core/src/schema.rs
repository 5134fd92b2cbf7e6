//! Static table metadata declared by entity types.
//!
//! Everything here is `const`-constructible so an entity can describe its
//! table in a `const`:
//!
//! ```
//! use sqlward_core::{ColumnDef, ColumnDefault, ColumnType, TableMeta};
//!
//! const USERS: TableMeta = TableMeta::new(
//!     "users",
//!     &[
//!         ColumnDef::new("id", ColumnType::Uuid)
//!             .primary_key()
//!             .server_default(ColumnDefault::GenerateUuid),
//!         ColumnDef::new("name", ColumnType::Text).not_null(),
//!     ],
//! );
//!
//! assert_eq!(USERS.primary_key().count(), 1);
//! ```

use crate::error::QueryError;
use crate::expr::SortOrder;

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Boolean,
    /// Hyphenated UUID text (`CHAR(36)`).
    Uuid,
    /// RFC 3339 text.
    Timestamp,
    /// Serialized JSON text.
    Json,
}

/// Server-side default of a column, rendered into DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    /// Random v4 UUID generated by the database.
    GenerateUuid,
    /// Current UTC time as RFC 3339 text.
    Now,
    Int(i64),
    Bool(bool),
    Text(&'static str),
    /// Raw SQL expression, emitted verbatim.
    Sql(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub nullable: bool,
    pub unique: bool,
    pub default: Option<ColumnDefault>,
    /// Value written by every `UPDATE` that does not set the column itself.
    pub on_update: Option<ColumnDefault>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            primary_key: false,
            nullable: true,
            unique: false,
            default: None,
            on_update: None,
        }
    }

    /// Mark as (part of) the primary key. Implies `NOT NULL`.
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn server_default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn on_update(mut self, value: ColumnDefault) -> Self {
        self.on_update = Some(value);
        self
    }
}

/// Table name, columns and default ordering of one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableMeta {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    /// Ordering applied by `select()` when the caller gives none.
    pub default_order: Option<(&'static str, SortOrder)>,
}

impl TableMeta {
    pub const fn new(name: &'static str, columns: &'static [ColumnDef]) -> Self {
        Self {
            name,
            columns,
            default_order: None,
        }
    }

    pub const fn order_by(mut self, column: &'static str, order: SortOrder) -> Self {
        self.default_order = Some((column, order));
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    pub fn primary_key(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    /// Columns outside the primary key, used as the default upsert set.
    pub fn non_key_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().filter(|c| !c.primary_key).map(|c| c.name)
    }

    /// The single primary-key column, or an error for keyless or composite keys.
    pub fn single_primary_key(&self) -> Result<&ColumnDef, QueryError> {
        let mut keys = self.primary_key();
        match (keys.next(), keys.next()) {
            (Some(pk), None) => Ok(pk),
            _ => Err(QueryError::MissingPrimaryKey(self.name.to_string())),
        }
    }

    pub(crate) fn check_column(&self, name: &str) -> Result<(), QueryError> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(QueryError::UnknownColumn {
                table: self.name.to_string(),
                column: name.to_string(),
            })
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{TAGS, USERS};
    use super::*;

    #[test]
    fn test_lookup() {
        assert!(USERS.has_column("name"));
        assert!(!USERS.has_column("email"));
        assert_eq!(USERS.column("age").unwrap().column_type, ColumnType::Integer);
    }

    #[test]
    fn test_primary_key_implies_not_null() {
        let id = USERS.column("id").unwrap();
        assert!(id.primary_key);
        assert!(!id.nullable);
    }

    #[test]
    fn test_non_key_columns() {
        let cols: Vec<&str> = USERS.non_key_columns().collect();
        assert_eq!(cols, vec!["name", "last_name", "age"]);
    }

    #[test]
    fn test_single_primary_key() {
        assert_eq!(USERS.single_primary_key().unwrap().name, "id");
        assert_eq!(
            TAGS.single_primary_key().unwrap_err(),
            QueryError::MissingPrimaryKey("tags".to_string())
        );
    }

    #[test]
    fn test_check_column() {
        assert!(USERS.check_column("name").is_ok());
        assert!(matches!(
            USERS.check_column("nope"),
            Err(QueryError::UnknownColumn { .. })
        ));
    }
}
