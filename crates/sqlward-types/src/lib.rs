//! Shared types for sqlward.
//!
//! Bindable values, the UUID column type, dialect detection, database
//! settings and page containers. No database dependencies -- only serde,
//! uuid, chrono, thiserror and toml.

pub mod dialect;
pub mod error;
pub mod guid;
pub mod page;
pub mod settings;
pub mod value;

pub use dialect::Dialect;
pub use error::ConfigError;
pub use guid::Guid;
pub use page::{NumberedPage, TokenPage};
pub use settings::{DatabaseSettings, PoolSettings};
pub use value::{Value, Values};
