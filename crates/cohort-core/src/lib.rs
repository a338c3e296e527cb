//! Cohort Core: domain models, error types and the storage contract
//! shared by every crate in the workspace.

pub mod error;
pub mod models;
pub mod repository;
pub mod transaction;

pub use error::{CohortError, CohortResult, ErrorKind};
pub use repository::{AuthzStore, GrantQuery, StoreRead};
pub use transaction::{Mutation, MutationKind, Transaction, WriteBatch};
