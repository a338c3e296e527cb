//! Storage trait definitions.
//!
//! Reads go through [`StoreRead`] and always observe committed state.
//! Writes are never issued one by one: they are staged on a
//! [`Transaction`] and handed to [`AuthzStore::apply`] as a single
//! [`WriteBatch`], which the backend applies atomically.

use uuid::Uuid;

use crate::error::CohortResult;
use crate::models::{
    group::Group,
    membership::{GroupMembership, Membership},
    permission::PermissionGrant,
    project::{GroupGrant, Project, ProjectGroup, ProjectKey, ProjectVariable},
};
use crate::transaction::{Transaction, WriteBatch};

/// Selects grants by group and, optionally, by project.
#[derive(Debug, Clone, Default)]
pub struct GrantQuery {
    pub group_ids: Vec<Uuid>,
    /// `None` matches every project.
    pub project_ids: Option<Vec<Uuid>>,
}

pub trait StoreRead: Send + Sync {
    fn get_group(&self, id: Uuid) -> impl Future<Output = CohortResult<Option<Group>>> + Send;
    fn get_group_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = CohortResult<Option<Group>>> + Send;
    /// All groups ordered by name.
    fn list_groups(&self) -> impl Future<Output = CohortResult<Vec<Group>>> + Send;

    fn get_membership(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = CohortResult<Option<Membership>>> + Send;
    /// Members of a group, admins first, then by user ID.
    fn list_members(
        &self,
        group_id: Uuid,
    ) -> impl Future<Output = CohortResult<Vec<Membership>>> + Send;
    fn count_admins(&self, group_id: Uuid) -> impl Future<Output = CohortResult<u64>> + Send;
    /// Groups of a user ordered by group name, admins first on ties.
    fn list_user_groups(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = CohortResult<Vec<GroupMembership>>> + Send;

    fn get_project(&self, id: Uuid) -> impl Future<Output = CohortResult<Option<Project>>> + Send;
    fn get_project_by_key(
        &self,
        key: &str,
    ) -> impl Future<Output = CohortResult<Option<Project>>> + Send;
    /// Projects with the given IDs, ordered by key. Unknown IDs are skipped.
    fn list_projects_by_ids(
        &self,
        ids: &[Uuid],
    ) -> impl Future<Output = CohortResult<Vec<Project>>> + Send;

    /// Groups attached to a project, ordered by group name.
    fn list_project_groups(
        &self,
        project_id: Uuid,
    ) -> impl Future<Output = CohortResult<Vec<ProjectGroup>>> + Send;
    /// Projects a group has access to, ordered by project key.
    fn list_group_grants(
        &self,
        group_id: Uuid,
    ) -> impl Future<Output = CohortResult<Vec<GroupGrant>>> + Send;
    fn list_grants(
        &self,
        query: &GrantQuery,
    ) -> impl Future<Output = CohortResult<Vec<PermissionGrant>>> + Send;

    fn list_project_keys(
        &self,
        project_id: Uuid,
    ) -> impl Future<Output = CohortResult<Vec<ProjectKey>>> + Send;
    fn list_project_variables(
        &self,
        project_id: Uuid,
    ) -> impl Future<Output = CohortResult<Vec<ProjectVariable>>> + Send;
}

/// A transactional store.
///
/// `acquire` serializes writers: the permit is held by a [`Transaction`]
/// from `begin` until it is committed or dropped. `apply` must either
/// persist every mutation of the batch or none of them, re-checking
/// uniqueness constraints and staged guards.
pub trait AuthzStore: StoreRead + Clone {
    type Permit: Send + Sync;

    fn acquire(&self) -> impl Future<Output = CohortResult<Self::Permit>> + Send;
    fn apply(&self, batch: WriteBatch) -> impl Future<Output = CohortResult<()>> + Send;

    fn begin(&self) -> impl Future<Output = CohortResult<Transaction<Self>>> + Send {
        async move {
            let permit = self.acquire().await?;
            Ok(Transaction::new(self.clone(), permit))
        }
    }
}
