//! Database-specific error types and conversions.

use cohort_core::error::CohortError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Malformed row in {table}: {reason}")]
    Decode { table: &'static str, reason: String },

    #[error("Transaction aborted: {0}")]
    Aborted(String),
}

impl DbError {
    pub(crate) fn decode(table: &'static str, reason: impl ToString) -> Self {
        DbError::Decode {
            table,
            reason: reason.to_string(),
        }
    }
}

impl From<DbError> for CohortError {
    fn from(err: DbError) -> Self {
        CohortError::Database(err.to_string())
    }
}
