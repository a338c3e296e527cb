//! Errors raised by external collaborators.

use cohort_core::error::CohortError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("key generation failed for {name}: {reason}")]
    KeyGeneration { name: String, reason: String },

    #[error("variable {name} rejected: {reason}")]
    Variable { name: String, reason: String },

    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<CollaboratorError> for CohortError {
    fn from(err: CollaboratorError) -> Self {
        CohortError::Collaborator(err.to_string())
    }
}
