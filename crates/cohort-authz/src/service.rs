//! Authorization service: name-based group administration.
//!
//! Callers address groups by name and users by username, as an HTTP or
//! CLI layer would. Usernames are resolved through the
//! [`IdentityRegistry`] before any transaction starts.

use cohort_core::error::{CohortError, CohortResult};
use cohort_core::models::group::Group;
use cohort_core::models::membership::UserGroup;
use cohort_core::repository::{AuthzStore, StoreRead};
use uuid::Uuid;

use crate::aggregator::PermissionAggregator;
use crate::config::AuthzConfig;
use crate::events::{CohortEvent, EventPublisher, publish_or_warn};
use crate::grants::PermissionGrants;
use crate::identity::IdentityRegistry;
use crate::lifecycle::{DeletedGroup, GroupLifecycle};
use crate::membership::MembershipLedger;

/// Authorization service.
///
/// Generic over the store, the identity registry and the event publisher
/// so that the engine has no dependency on any backend.
pub struct AuthzService<S: AuthzStore, R: IdentityRegistry, P: EventPublisher> {
    store: S,
    lifecycle: GroupLifecycle<S>,
    ledger: MembershipLedger<S>,
    grants: PermissionGrants<S>,
    aggregator: PermissionAggregator<S>,
    registry: R,
    publisher: P,
}

impl<S: AuthzStore, R: IdentityRegistry, P: EventPublisher> AuthzService<S, R, P> {
    pub fn new(store: S, config: &AuthzConfig, registry: R, publisher: P) -> CohortResult<Self> {
        Ok(Self {
            lifecycle: GroupLifecycle::new(store.clone(), config)?,
            ledger: MembershipLedger::new(store.clone(), config),
            grants: PermissionGrants::new(store.clone(), config),
            aggregator: PermissionAggregator::new(store.clone()),
            store,
            registry,
            publisher,
        })
    }

    pub fn groups(&self) -> &GroupLifecycle<S> {
        &self.lifecycle
    }

    pub fn members(&self) -> &MembershipLedger<S> {
        &self.ledger
    }

    pub fn grants(&self) -> &PermissionGrants<S> {
        &self.grants
    }

    pub fn permissions(&self) -> &PermissionAggregator<S> {
        &self.aggregator
    }

    async fn group_id(&self, name: &str) -> CohortResult<Uuid> {
        self.store
            .get_group_by_name(name)
            .await?
            .map(|g| g.id)
            .ok_or_else(|| CohortError::not_found("group", name))
    }

    pub async fn create_group(&self, name: &str, creator: Uuid) -> CohortResult<Group> {
        self.lifecycle.create_group(name, creator).await
    }

    pub async fn rename_group(&self, name: &str, new_name: &str) -> CohortResult<Group> {
        let group_id = self.group_id(name).await?;
        self.lifecycle.rename_group(group_id, new_name).await
    }

    /// Deletes the group, then publishes one `GroupPermissionDeleted` per
    /// project the group had access to.
    pub async fn delete_group(&self, name: &str) -> CohortResult<DeletedGroup> {
        let group_id = self.group_id(name).await?;
        let deleted = self.lifecycle.delete_group(group_id).await?;

        for grant in &deleted.grants {
            publish_or_warn(
                &self.publisher,
                CohortEvent::GroupPermissionDeleted {
                    project: grant.project.clone(),
                    group: deleted.group.clone(),
                    level: grant.level,
                },
            );
        }
        Ok(deleted)
    }

    /// Adds the named users as plain members, skipping existing members.
    /// An unknown username aborts the whole request.
    pub async fn add_users_to_group(
        &self,
        name: &str,
        usernames: &[String],
    ) -> CohortResult<usize> {
        // 1. Resolve every user before touching the group.
        let mut user_ids = Vec::with_capacity(usernames.len());
        for username in usernames {
            user_ids.push(self.registry.user_id(username).await?);
        }

        // 2. Add them in one transaction.
        let group_id = self.group_id(name).await?;
        self.ledger.add_members(group_id, &user_ids).await
    }

    pub async fn remove_user_from_group(&self, name: &str, username: &str) -> CohortResult<()> {
        let user_id = self.registry.user_id(username).await?;
        let group_id = self.group_id(name).await?;
        self.ledger.remove_member(group_id, user_id).await
    }

    /// Only members can be made admin.
    pub async fn set_group_admin(&self, name: &str, username: &str) -> CohortResult<()> {
        let user_id = self.registry.user_id(username).await?;
        let group_id = self.group_id(name).await?;

        if !self.ledger.is_member(group_id, user_id).await? {
            return Err(CohortError::Forbidden {
                reason: format!("{username} is not a member of {name}"),
            });
        }
        self.ledger.promote_to_admin(group_id, user_id).await
    }

    pub async fn remove_group_admin(&self, name: &str, username: &str) -> CohortResult<()> {
        let user_id = self.registry.user_id(username).await?;
        let group_id = self.group_id(name).await?;
        self.ledger.demote_from_admin(group_id, user_id).await
    }

    pub async fn user_groups(&self, username: &str) -> CohortResult<Vec<UserGroup>> {
        let user_id = self.registry.user_id(username).await?;
        self.ledger.list_user_groups(user_id).await
    }
}
