//! Error types for the cohort engine.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CohortError {
    #[error("Invalid name '{name}': must match {pattern}")]
    InvalidName { name: String, pattern: String },

    #[error("Invalid project key '{key}': must match {pattern}")]
    InvalidKey { key: String, pattern: String },

    #[error("Invalid permission level: {0}")]
    InvalidLevel(i64),

    #[error("Group name already in use: {name}")]
    NameConflict { name: String },

    #[error("Project already exists: {key}")]
    ProjectExists { key: String },

    #[error("Duplicate {entity} name in project {project}: {name}")]
    DuplicateName {
        entity: String,
        project: String,
        name: String,
    },

    #[error("User {user_id} is already a member of group {group_id}")]
    AlreadyMember { group_id: Uuid, user_id: Uuid },

    #[error("User {user_id} is not a member of group {group_id}")]
    NotAMember { group_id: Uuid, user_id: Uuid },

    #[error("Group {group_id} must keep at least one admin")]
    InsufficientAdmins { group_id: Uuid },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("User not found: {username}")]
    UserNotFound { username: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of [`CohortError`] for callers that map errors
/// onto a transport (HTTP status, gRPC code, exit code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Conflict,
    NotFound,
    InvariantViolation,
    Forbidden,
    StorageFailure,
}

impl ErrorKind {
    /// `true` for errors caused by the request rather than the system.
    pub fn is_client_error(self) -> bool {
        !matches!(self, ErrorKind::StorageFailure)
    }
}

impl CohortError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        CohortError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CohortError::InvalidName { .. }
            | CohortError::InvalidKey { .. }
            | CohortError::InvalidLevel(_) => ErrorKind::InvalidInput,
            CohortError::NameConflict { .. }
            | CohortError::ProjectExists { .. }
            | CohortError::DuplicateName { .. }
            | CohortError::AlreadyMember { .. } => ErrorKind::Conflict,
            CohortError::NotFound { .. }
            | CohortError::UserNotFound { .. }
            | CohortError::NotAMember { .. } => ErrorKind::NotFound,
            CohortError::InsufficientAdmins { .. } => ErrorKind::InvariantViolation,
            CohortError::Forbidden { .. } => ErrorKind::Forbidden,
            CohortError::Collaborator(_)
            | CohortError::Database(_)
            | CohortError::Config(_)
            | CohortError::Internal(_) => ErrorKind::StorageFailure,
        }
    }
}

pub type CohortResult<T> = Result<T, CohortError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_admin_is_an_invariant_violation() {
        let err = CohortError::InsufficientAdmins {
            group_id: Uuid::new_v4(),
        };
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert!(err.kind().is_client_error());
    }

    #[test]
    fn storage_failures_are_not_client_errors() {
        let err = CohortError::Database("connection reset".into());
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert!(!err.kind().is_client_error());
    }

    #[test]
    fn duplicate_names_are_conflicts() {
        let err = CohortError::DuplicateName {
            entity: "variable".into(),
            project: "PRJ".into(),
            name: "region".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            err.to_string(),
            "Duplicate variable name in project PRJ: region"
        );
    }

    #[test]
    fn not_found_formats_entity_and_id() {
        let id = Uuid::new_v4();
        let err = CohortError::not_found("group", id);
        assert_eq!(err.to_string(), format!("Entity not found: group with id {id}"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
