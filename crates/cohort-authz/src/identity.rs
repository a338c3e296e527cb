//! User lookup by name.

use std::collections::HashMap;

use cohort_core::error::{CohortError, CohortResult};
use uuid::Uuid;

/// Resolves usernames to user IDs. Users themselves live outside this
/// engine.
pub trait IdentityRegistry: Send + Sync {
    fn user_id(&self, username: &str) -> impl Future<Output = CohortResult<Uuid>> + Send;
}

/// Fixed username table, for bootstrapping and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    users: HashMap<String, Uuid>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: impl Into<String>, user_id: Uuid) -> Self {
        self.users.insert(username.into(), user_id);
        self
    }
}

impl IdentityRegistry for StaticRegistry {
    async fn user_id(&self, username: &str) -> CohortResult<Uuid> {
        self.users
            .get(username)
            .copied()
            .ok_or_else(|| CohortError::UserNotFound {
                username: username.into(),
            })
    }
}
