//! Statement building for sqlward.
//!
//! Entity tables are described by static [`TableMeta`]; conditions, orderings
//! and value maps are validated against that metadata and rendered into
//! dialect-specific SQL plus an ordered parameter list. Nothing in this crate
//! performs I/O -- execution lives in `sqlward-infra`.

pub mod ddl;
pub mod error;
pub mod expr;
pub mod mixins;
pub mod render;
pub mod schema;
pub mod statement;

pub use error::QueryError;
pub use expr::{col, ColumnRef, Condition, OrderBy, SortOrder};
pub use render::CompiledStatement;
pub use schema::{ColumnDef, ColumnDefault, ColumnType, TableMeta};
pub use statement::{
    DeleteStatement, InsertStatement, Join, JoinKind, OnConflict, SelectStatement, Statement,
    UpdateStatement,
};
