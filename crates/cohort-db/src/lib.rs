//! Cohort Database: storage backends for the authorization engine.
//!
//! This crate provides:
//! - Opening the SurrealDB store ([`open_store`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - The SurrealDB store ([`SurrealStore`])
//! - An in-process store with identical semantics ([`MemoryStore`])
//! - Error types ([`DbError`])

mod connection;
mod error;
mod memory;
mod repository;
mod schema;

pub use connection::{DbConfig, open_store};
pub use error::DbError;
pub use memory::MemoryStore;
pub use repository::SurrealStore;
pub use schema::{run_migrations, schema_v1};
