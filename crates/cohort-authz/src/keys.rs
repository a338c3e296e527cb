//! Key and variable collaborators used during project provisioning.

use std::sync::Arc;

use cohort_core::models::project::{
    KeyKind, KeyMaterial, NewKey, NewVariable, Project, ProjectVariable,
};
use uuid::Uuid;

use crate::error::CollaboratorError;

/// Produces key material. Key cryptography is not implemented here.
pub trait KeyGenerator: Send + Sync {
    fn generate(
        &self,
        kind: KeyKind,
        name: &str,
    ) -> impl Future<Output = Result<KeyMaterial, CollaboratorError>> + Send;
}

impl<K: KeyGenerator> KeyGenerator for Arc<K> {
    fn generate(
        &self,
        kind: KeyKind,
        name: &str,
    ) -> impl Future<Output = Result<KeyMaterial, CollaboratorError>> + Send {
        (**self).generate(kind, name)
    }
}

/// Prepares a variable for storage, e.g. by encrypting secrets.
pub trait VariableProvisioner: Send + Sync {
    fn provision(
        &self,
        project: &Project,
        variable: NewVariable,
    ) -> impl Future<Output = Result<ProjectVariable, CollaboratorError>> + Send;
}

/// Stores variables as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainVariables;

impl VariableProvisioner for PlainVariables {
    async fn provision(
        &self,
        project: &Project,
        variable: NewVariable,
    ) -> Result<ProjectVariable, CollaboratorError> {
        Ok(ProjectVariable {
            id: Uuid::new_v4(),
            project_id: project.id,
            name: variable.name,
            kind: variable.kind,
            value: variable.value,
        })
    }
}

/// Name of the key every project gets for `kind`.
pub fn default_key_name(kind: KeyKind, project_key: &str) -> String {
    format!("proj-{}-{}", kind.tag(), project_key.to_lowercase())
}

/// Requested keys plus a default key for each of SSH and PGP that no
/// requested key covers. Requested keys are matched by kind, not by name.
pub fn with_default_keys(project_key: &str, mut keys: Vec<NewKey>) -> Vec<NewKey> {
    for kind in [KeyKind::Ssh, KeyKind::Pgp] {
        if !keys.iter().any(|k| k.kind == kind) {
            keys.push(NewKey {
                name: default_key_name(kind, project_key),
                kind,
            });
        }
    }
    keys
}
