//! Shared fixtures for engine tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use cohort_authz::error::CollaboratorError;
use cohort_authz::events::{CohortEvent, EventPublisher};
use cohort_authz::keys::{KeyGenerator, VariableProvisioner};
use cohort_authz::{AuthzConfig, GroupLifecycle};
use cohort_core::models::group::Group;
use cohort_core::models::project::{KeyKind, KeyMaterial, NewVariable, Project, ProjectVariable};
use cohort_db::MemoryStore;

/// Store plus a config whose default group exists.
pub async fn setup() -> (MemoryStore, AuthzConfig, Group) {
    let store = MemoryStore::new();
    let lifecycle = GroupLifecycle::new(store.clone(), &AuthzConfig::default()).unwrap();
    let default = lifecycle
        .bootstrap_default_group("shared.infra")
        .await
        .unwrap();
    let config = AuthzConfig::default().with_default_group(default.id);
    (store, config, default)
}

/// Deterministic key material derived from the key name.
#[derive(Debug, Default)]
pub struct FakeKeys {
    pub generated: AtomicUsize,
}

impl KeyGenerator for FakeKeys {
    async fn generate(&self, kind: KeyKind, name: &str) -> Result<KeyMaterial, CollaboratorError> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        Ok(KeyMaterial {
            public: format!("{}-public-{name}", kind.tag()),
            private: format!("{}-private-{name}", kind.tag()),
            key_id: format!("id-{name}"),
        })
    }
}

/// Fails for one key kind.
#[derive(Debug)]
pub struct FailingKeys(pub KeyKind);

impl KeyGenerator for FailingKeys {
    async fn generate(&self, kind: KeyKind, name: &str) -> Result<KeyMaterial, CollaboratorError> {
        if kind == self.0 {
            return Err(CollaboratorError::KeyGeneration {
                name: name.into(),
                reason: "entropy source unavailable".into(),
            });
        }
        FakeKeys::default().generate(kind, name).await
    }
}

#[derive(Debug, Default)]
pub struct FailingVariables;

impl VariableProvisioner for FailingVariables {
    async fn provision(
        &self,
        _project: &Project,
        variable: NewVariable,
    ) -> Result<ProjectVariable, CollaboratorError> {
        Err(CollaboratorError::Variable {
            name: variable.name,
            reason: "vault sealed".into(),
        })
    }
}

#[derive(Debug, Default)]
pub struct BrokenPublisher;

impl EventPublisher for BrokenPublisher {
    fn publish(&self, _event: CohortEvent) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Publish("broker offline".into()))
    }
}
