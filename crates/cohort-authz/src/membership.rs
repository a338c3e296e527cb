//! Membership ledger: who belongs to which group, and who administers it.
//!
//! Removing a member is guarded so that a group never loses its last
//! admin through removal. Demotion is not guarded: demoting the sole
//! admin succeeds and leaves the group without admins.

use cohort_core::error::{CohortError, CohortResult};
use cohort_core::models::membership::{Membership, UserGroup};
use cohort_core::repository::{AuthzStore, StoreRead};
use cohort_core::transaction::{Mutation, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AuthzConfig;

async fn require_group<S: StoreRead>(store: &S, group_id: Uuid) -> CohortResult<()> {
    match store.get_group(group_id).await? {
        Some(_) => Ok(()),
        None => Err(CohortError::not_found("group", group_id)),
    }
}

/// Stages a new membership.
pub async fn add_member_in<S: AuthzStore>(
    tx: &mut Transaction<S>,
    group_id: Uuid,
    user_id: Uuid,
    as_admin: bool,
) -> CohortResult<()> {
    if tx.read().get_membership(group_id, user_id).await?.is_some() {
        return Err(CohortError::AlreadyMember { group_id, user_id });
    }
    tx.stage(Mutation::InsertMembership(Membership::new(
        group_id, user_id, as_admin,
    )));
    Ok(())
}

/// Stages the removal of a membership, refusing to remove the last admin.
pub async fn remove_member_in<S: AuthzStore>(
    tx: &mut Transaction<S>,
    group_id: Uuid,
    user_id: Uuid,
) -> CohortResult<()> {
    let membership = tx
        .read()
        .get_membership(group_id, user_id)
        .await?
        .ok_or(CohortError::NotAMember { group_id, user_id })?;

    if membership.is_admin && tx.read().count_admins(group_id).await? <= 1 {
        return Err(CohortError::InsufficientAdmins { group_id });
    }

    tx.stage(Mutation::DeleteMembership { group_id, user_id });
    Ok(())
}

/// Stages the removal of every membership of a group. Only meaningful as
/// a step of group deletion.
pub fn remove_all_members_in<S: AuthzStore>(tx: &mut Transaction<S>, group_id: Uuid) {
    tx.stage(Mutation::DeleteGroupMemberships { group_id });
}

#[derive(Clone)]
pub struct MembershipLedger<S> {
    store: S,
    default_group: Option<Uuid>,
}

impl<S: AuthzStore> MembershipLedger<S> {
    pub fn new(store: S, config: &AuthzConfig) -> Self {
        Self {
            store,
            default_group: config.default_group_id,
        }
    }

    pub async fn add_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        as_admin: bool,
    ) -> CohortResult<()> {
        let mut tx = self.store.begin().await?;
        require_group(tx.read(), group_id).await?;
        add_member_in(&mut tx, group_id, user_id, as_admin).await?;
        tx.commit().await?;

        info!(group_id = %group_id, user_id = %user_id, as_admin, "Member added");
        Ok(())
    }

    /// Adds every user that is not yet a member as a plain member, in one
    /// transaction. Returns how many memberships were created.
    pub async fn add_members(&self, group_id: Uuid, user_ids: &[Uuid]) -> CohortResult<usize> {
        let mut tx = self.store.begin().await?;
        require_group(tx.read(), group_id).await?;

        let mut added = Vec::new();
        for &user_id in user_ids {
            let exists = tx.read().get_membership(group_id, user_id).await?.is_some();
            if exists || added.contains(&user_id) {
                debug!(group_id = %group_id, user_id = %user_id, "Already a member, skipping");
                continue;
            }
            add_member_in(&mut tx, group_id, user_id, false).await?;
            added.push(user_id);
        }
        tx.commit().await?;

        info!(group_id = %group_id, added = added.len(), "Members added");
        Ok(added.len())
    }

    pub async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> CohortResult<()> {
        let mut tx = self.store.begin().await?;
        remove_member_in(&mut tx, group_id, user_id).await?;
        tx.commit().await?;

        info!(group_id = %group_id, user_id = %user_id, "Member removed");
        Ok(())
    }

    /// No-op when the user already is an admin.
    pub async fn promote_to_admin(&self, group_id: Uuid, user_id: Uuid) -> CohortResult<()> {
        let mut tx = self.store.begin().await?;
        let membership = tx
            .read()
            .get_membership(group_id, user_id)
            .await?
            .ok_or(CohortError::NotAMember { group_id, user_id })?;

        if membership.is_admin {
            tx.rollback();
            return Ok(());
        }

        tx.stage(Mutation::SetAdmin {
            group_id,
            user_id,
            is_admin: true,
        });
        tx.commit().await?;

        info!(group_id = %group_id, user_id = %user_id, "Admin granted");
        Ok(())
    }

    /// Clears the admin flag unconditionally, even for the last admin.
    pub async fn demote_from_admin(&self, group_id: Uuid, user_id: Uuid) -> CohortResult<()> {
        let mut tx = self.store.begin().await?;
        tx.stage(Mutation::SetAdmin {
            group_id,
            user_id,
            is_admin: false,
        });
        tx.commit().await?;

        info!(group_id = %group_id, user_id = %user_id, "Admin revoked");
        Ok(())
    }

    pub async fn is_member(&self, group_id: Uuid, user_id: Uuid) -> CohortResult<bool> {
        Ok(self
            .store
            .get_membership(group_id, user_id)
            .await?
            .is_some())
    }

    pub async fn is_admin(&self, group_id: Uuid, user_id: Uuid) -> CohortResult<bool> {
        Ok(self
            .store
            .get_membership(group_id, user_id)
            .await?
            .is_some_and(|m| m.is_admin))
    }

    /// Members of a group, admins first.
    pub async fn list_members(&self, group_id: Uuid) -> CohortResult<Vec<Membership>> {
        require_group(&self.store, group_id).await?;
        self.store.list_members(group_id).await
    }

    /// Groups of a user ordered by name, each flagged with the admin bit
    /// and the default-group marker.
    pub async fn list_user_groups(&self, user_id: Uuid) -> CohortResult<Vec<UserGroup>> {
        let groups = self.store.list_user_groups(user_id).await?;
        Ok(groups
            .into_iter()
            .map(|m| UserGroup {
                is_default: Some(m.group.id) == self.default_group,
                group: m.group,
                is_admin: m.is_admin,
            })
            .collect())
    }

    /// Makes the user a plain member of the default group. Returns `true`
    /// when a membership was created.
    pub async fn join_default_group(&self, user_id: Uuid) -> CohortResult<bool> {
        let Some(group_id) = self.default_group else {
            return Ok(false);
        };

        let mut tx = self.store.begin().await?;
        require_group(tx.read(), group_id).await?;
        if tx.read().get_membership(group_id, user_id).await?.is_some() {
            tx.rollback();
            return Ok(false);
        }
        add_member_in(&mut tx, group_id, user_id, false).await?;
        tx.commit().await?;

        debug!(user_id = %user_id, "Joined default group");
        Ok(true)
    }
}
