//! Ready-made columns for common table conventions.
//!
//! ```
//! use sqlward_core::{ColumnDef, ColumnType, TableMeta, mixins};
//!
//! const NOTES: TableMeta = TableMeta::new(
//!     "notes",
//!     &[
//!         mixins::uuid_primary_key("id"),
//!         ColumnDef::new("body", ColumnType::Text).not_null(),
//!         mixins::tombstone(),
//!         mixins::created_at(),
//!         mixins::updated_at(),
//!     ],
//! );
//!
//! assert!(NOTES.column("updated_at").unwrap().on_update.is_some());
//! ```

use crate::expr::{Condition, col};
use crate::schema::{ColumnDef, ColumnDefault, ColumnType};

/// Soft-delete flag column.
pub const TOMBSTONE: &str = "tombstone";

/// UUID primary key generated by the database.
pub const fn uuid_primary_key(name: &'static str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::Uuid)
        .primary_key()
        .server_default(ColumnDefault::GenerateUuid)
}

/// Creation time, set by the database on insert.
pub const fn created_at() -> ColumnDef {
    ColumnDef::new("created_at", ColumnType::Timestamp)
        .not_null()
        .server_default(ColumnDefault::Now)
}

/// Modification time, set on insert and refreshed by every update.
pub const fn updated_at() -> ColumnDef {
    ColumnDef::new("updated_at", ColumnType::Timestamp)
        .not_null()
        .server_default(ColumnDefault::Now)
        .on_update(ColumnDefault::Now)
}

/// `tombstone` flag, false until the row is soft-deleted.
pub const fn tombstone() -> ColumnDef {
    ColumnDef::new(TOMBSTONE, ColumnType::Boolean)
        .not_null()
        .server_default(ColumnDefault::Bool(false))
}

/// Rows that have not been soft-deleted.
pub fn not_deleted() -> Condition {
    col(TOMBSTONE).eq(false)
}

/// Rows that have been soft-deleted.
pub fn is_deleted() -> Condition {
    col(TOMBSTONE).eq(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::NOTES;
    use crate::statement::SelectStatement;
    use sqlward_types::{Dialect, Value};

    #[test]
    fn test_timestamp_columns() {
        let created = NOTES.column("created_at").unwrap();
        assert_eq!(created.default, Some(ColumnDefault::Now));
        assert_eq!(created.on_update, None);
        let updated = NOTES.column("updated_at").unwrap();
        assert_eq!(updated.on_update, Some(ColumnDefault::Now));
        assert!(!updated.nullable);
    }

    #[test]
    fn test_soft_delete_conditions() {
        let mut select = SelectStatement::new(&NOTES);
        select.conditions.push(not_deleted());
        let compiled = select.compile(Dialect::Sqlite);
        assert!(compiled.sql.contains("WHERE \"notes\".\"tombstone\" = ?"));
        assert_eq!(compiled.params, vec![Value::Bool(false)]);

        let mut select = SelectStatement::new(&NOTES);
        select.conditions.push(is_deleted());
        assert_eq!(select.compile(Dialect::Postgres).params, vec![Value::Bool(true)]);
    }
}
