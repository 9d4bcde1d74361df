//! Storage layer
//!
//! SQLite persistence for links, categories and settings.
//!
//! ## Architecture
//!
//! - `connection`: the lazily opened, shared database handle
//! - `schema`: table creation and default rows
//! - `queries`: blocking SQL for each store operation
//!
//! The async [`Store`](crate::store::Store) runs `queries` on the handle
//! from `connection`.

pub mod connection;
pub mod error;
pub mod queries;
pub mod schema;

pub use connection::{ConnectionManager, Database, StoreLocation};
pub use error::{StorageError, StorageResult};
pub use schema::{init_schema, needs_init, seed_defaults, SCHEMA_VERSION};
