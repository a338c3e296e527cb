//! Permission grants: which group may access which project, and how.

use cohort_core::error::{CohortError, CohortResult};
use cohort_core::models::permission::{PermissionGrant, PermissionLevel};
use cohort_core::models::project::ProjectGroup;
use cohort_core::repository::{AuthzStore, StoreRead};
use cohort_core::transaction::{Mutation, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::config::AuthzConfig;

/// The level actually stored for `group_id`: the default group is
/// capped at Read.
pub fn effective_grant_level(
    group_id: Uuid,
    requested: PermissionLevel,
    default_group: Option<Uuid>,
) -> PermissionLevel {
    if Some(group_id) == default_group {
        PermissionLevel::Read
    } else {
        requested
    }
}

/// Stages an upsert of the grant. The caller checks that both ends exist.
pub fn grant_in<S: AuthzStore>(
    tx: &mut Transaction<S>,
    project_id: Uuid,
    group_id: Uuid,
    level: PermissionLevel,
    default_group: Option<Uuid>,
) -> PermissionLevel {
    let level = effective_grant_level(group_id, level, default_group);
    tx.stage(Mutation::UpsertGrant(PermissionGrant {
        group_id,
        project_id,
        level,
    }));
    level
}

pub fn revoke_in<S: AuthzStore>(tx: &mut Transaction<S>, project_id: Uuid, group_id: Uuid) {
    tx.stage(Mutation::DeleteGrant {
        group_id,
        project_id,
    });
}

/// Stages the removal of every grant held by a group.
pub fn revoke_all_for_group_in<S: AuthzStore>(tx: &mut Transaction<S>, group_id: Uuid) {
    tx.stage(Mutation::DeleteGroupGrants { group_id });
}

pub(crate) async fn require_grant_ends<S: StoreRead>(
    store: &S,
    project_id: Uuid,
    group_id: Uuid,
) -> CohortResult<()> {
    if store.get_group(group_id).await?.is_none() {
        return Err(CohortError::not_found("group", group_id));
    }
    if store.get_project(project_id).await?.is_none() {
        return Err(CohortError::not_found("project", project_id));
    }
    Ok(())
}

#[derive(Clone)]
pub struct PermissionGrants<S> {
    store: S,
    default_group: Option<Uuid>,
}

impl<S: AuthzStore> PermissionGrants<S> {
    pub fn new(store: S, config: &AuthzConfig) -> Self {
        Self {
            store,
            default_group: config.default_group_id,
        }
    }

    /// Creates or overwrites the grant from a raw level value. Returns the
    /// level stored, which is Read for the default group.
    pub async fn grant(
        &self,
        project_id: Uuid,
        group_id: Uuid,
        raw_level: i64,
    ) -> CohortResult<PermissionLevel> {
        let level = PermissionLevel::try_from(raw_level)?;
        self.grant_level(project_id, group_id, level).await
    }

    pub async fn grant_level(
        &self,
        project_id: Uuid,
        group_id: Uuid,
        level: PermissionLevel,
    ) -> CohortResult<PermissionLevel> {
        let mut tx = self.store.begin().await?;
        require_grant_ends(tx.read(), project_id, group_id).await?;
        let stored = grant_in(&mut tx, project_id, group_id, level, self.default_group);
        tx.commit().await?;

        info!(project_id = %project_id, group_id = %group_id, level = %stored, "Grant stored");
        Ok(stored)
    }

    /// Idempotent.
    pub async fn revoke(&self, project_id: Uuid, group_id: Uuid) -> CohortResult<()> {
        let mut tx = self.store.begin().await?;
        revoke_in(&mut tx, project_id, group_id);
        tx.commit().await?;

        info!(project_id = %project_id, group_id = %group_id, "Grant revoked");
        Ok(())
    }

    /// Groups attached to a project, ordered by group name.
    pub async fn project_groups(&self, project_id: Uuid) -> CohortResult<Vec<ProjectGroup>> {
        if self.store.get_project(project_id).await?.is_none() {
            return Err(CohortError::not_found("project", project_id));
        }
        self.store.list_project_groups(project_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_group_is_capped_at_read() {
        let default = Uuid::new_v4();
        assert_eq!(
            effective_grant_level(default, PermissionLevel::ReadWriteExecute, Some(default)),
            PermissionLevel::Read
        );
        assert_eq!(
            effective_grant_level(Uuid::new_v4(), PermissionLevel::ReadWrite, Some(default)),
            PermissionLevel::ReadWrite
        );
    }
}
