//! Group lifecycle: creation, renaming and cascading deletion.
//!
//! A group is `Absent`, then `Active` once created, then `Deleted`. After
//! deletion its name may be reused.

use cohort_core::error::{CohortError, CohortResult};
use cohort_core::models::group::{Group, GroupDetails, GroupListOptions, GroupSummary};
use cohort_core::models::project::GroupGrant;
use cohort_core::repository::{AuthzStore, StoreRead};
use cohort_core::transaction::{Mutation, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::config::{AuthzConfig, NamePolicy};
use crate::grants::revoke_all_for_group_in;
use crate::membership::{add_member_in, remove_all_members_in};

/// A group removed by [`GroupLifecycle::delete_group`], with the grants it
/// held right before deletion.
#[derive(Debug, Clone)]
pub struct DeletedGroup {
    pub group: Group,
    pub grants: Vec<GroupGrant>,
}

/// Stages a new group with `creator` as its first admin.
pub async fn create_group_in<S: AuthzStore>(
    tx: &mut Transaction<S>,
    policy: &NamePolicy,
    name: &str,
    creator: Uuid,
) -> CohortResult<Group> {
    policy.check_name(name)?;
    if tx.read().get_group_by_name(name).await?.is_some() {
        return Err(CohortError::NameConflict { name: name.into() });
    }

    let group = Group::new(name);
    tx.stage(Mutation::InsertGroup(group.clone()));
    add_member_in(tx, group.id, creator, true).await?;
    Ok(group)
}

async fn require_group<S: StoreRead>(store: &S, group_id: Uuid) -> CohortResult<Group> {
    store
        .get_group(group_id)
        .await?
        .ok_or_else(|| CohortError::not_found("group", group_id))
}

#[derive(Clone)]
pub struct GroupLifecycle<S> {
    store: S,
    policy: NamePolicy,
    default_group: Option<Uuid>,
}

impl<S: AuthzStore> GroupLifecycle<S> {
    pub fn new(store: S, config: &AuthzConfig) -> CohortResult<Self> {
        Ok(Self {
            store,
            policy: config.name_policy()?,
            default_group: config.default_group_id,
        })
    }

    pub fn is_default(&self, group_id: Uuid) -> bool {
        Some(group_id) == self.default_group
    }

    pub async fn create_group(&self, name: &str, creator: Uuid) -> CohortResult<Group> {
        let mut tx = self.store.begin().await?;
        let group = create_group_in(&mut tx, &self.policy, name, creator).await?;
        tx.commit().await?;

        info!(group_id = %group.id, name = %group.name, creator = %creator, "Group created");
        Ok(group)
    }

    /// Memberships and grants are untouched.
    pub async fn rename_group(&self, group_id: Uuid, new_name: &str) -> CohortResult<Group> {
        let mut tx = self.store.begin().await?;
        let mut group = require_group(tx.read(), group_id).await?;
        self.policy.check_name(new_name)?;

        if group.name == new_name {
            tx.rollback();
            return Ok(group);
        }
        if tx.read().get_group_by_name(new_name).await?.is_some() {
            return Err(CohortError::NameConflict {
                name: new_name.into(),
            });
        }

        tx.stage(Mutation::RenameGroup {
            group_id,
            name: new_name.into(),
        });
        tx.commit().await?;

        info!(group_id = %group_id, from = %group.name, to = %new_name, "Group renamed");
        group.name = new_name.into();
        Ok(group)
    }

    /// Deletes the group with its memberships and grants in one
    /// transaction, in that order. The default group cannot be deleted.
    pub async fn delete_group(&self, group_id: Uuid) -> CohortResult<DeletedGroup> {
        let mut tx = self.store.begin().await?;
        let group = require_group(tx.read(), group_id).await?;
        if self.is_default(group_id) {
            return Err(CohortError::Forbidden {
                reason: "the default group cannot be deleted".into(),
            });
        }
        let grants = tx.read().list_group_grants(group_id).await?;

        remove_all_members_in(&mut tx, group_id);
        revoke_all_for_group_in(&mut tx, group_id);
        tx.stage(Mutation::DeleteGroup { group_id });
        tx.commit().await?;

        info!(
            group_id = %group_id,
            name = %group.name,
            grants = grants.len(),
            "Group deleted"
        );
        Ok(DeletedGroup { group, grants })
    }

    pub async fn get_group(&self, group_id: Uuid) -> CohortResult<GroupDetails> {
        let group = require_group(&self.store, group_id).await?;
        self.details(group).await
    }

    pub async fn get_group_by_name(&self, name: &str) -> CohortResult<GroupDetails> {
        let group = self
            .store
            .get_group_by_name(name)
            .await?
            .ok_or_else(|| CohortError::not_found("group", name))?;
        self.details(group).await
    }

    async fn details(&self, group: Group) -> CohortResult<GroupDetails> {
        let members = self.store.list_members(group.id).await?;
        Ok(GroupDetails {
            is_default: self.is_default(group.id),
            group,
            members,
        })
    }

    /// All groups ordered by name.
    pub async fn list_groups(&self, options: GroupListOptions) -> CohortResult<Vec<GroupSummary>> {
        let groups = self.store.list_groups().await?;
        Ok(groups
            .into_iter()
            .map(|group| GroupSummary {
                is_default: self.is_default(group.id),
                group,
            })
            .filter(|summary| !(options.exclude_default && summary.is_default))
            .collect())
    }

    /// Loads the group named `name`, creating it without members if it is
    /// missing. Used once at startup to obtain the default group ID.
    pub async fn bootstrap_default_group(&self, name: &str) -> CohortResult<Group> {
        let mut tx = self.store.begin().await?;
        if let Some(group) = tx.read().get_group_by_name(name).await? {
            tx.rollback();
            return Ok(group);
        }

        self.policy.check_name(name)?;
        let group = Group::new(name);
        tx.stage(Mutation::InsertGroup(group.clone()));
        tx.commit().await?;

        info!(group_id = %group.id, name = %group.name, "Default group created");
        Ok(group)
    }
}
