//! sqlx-backed session management and repositories.
//!
//! [`Database`] owns the connection pool and hands out [`Session`]s.
//! A [`Repository`] wraps one session and builds statements against one
//! [`Entity`] type; [`Query`] values are chained and finally executed with a
//! terminal operation (`all`, `one`, `execute`, ...).

pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod lock;
pub mod pagination;
pub mod query;
pub mod repository;
pub mod session;
pub mod tracker;
pub mod uow;

#[cfg(test)]
pub(crate) mod test_support;

pub use database::{Database, PoolStatus};
pub use entity::Entity;
pub use error::Error;
pub use query::Query;
pub use repository::Repository;
pub use session::Session;
pub use uow::UnitOfWork;

pub use sqlward_core::mixins;
pub use sqlward_core::{
    col, ColumnDef, ColumnDefault, ColumnRef, ColumnType, Condition, OrderBy, QueryError,
    SortOrder, TableMeta,
};
pub use sqlward_types::{
    values, DatabaseSettings, Dialect, Guid, NumberedPage, TokenPage, Value, Values,
};
