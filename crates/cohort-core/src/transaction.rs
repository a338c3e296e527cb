//! Staged writes and the transaction handle.

use tracing::debug;
use uuid::Uuid;

use crate::error::CohortResult;
use crate::models::{
    group::Group,
    membership::Membership,
    permission::PermissionGrant,
    project::{Project, ProjectKey, ProjectVariable},
};
use crate::repository::AuthzStore;

/// A single staged write.
#[derive(Debug, Clone)]
pub enum Mutation {
    InsertGroup(Group),
    RenameGroup { group_id: Uuid, name: String },
    DeleteGroup { group_id: Uuid },

    InsertMembership(Membership),
    /// Promotion requires an existing membership; demotion of a
    /// non-member changes nothing.
    SetAdmin {
        group_id: Uuid,
        user_id: Uuid,
        is_admin: bool,
    },
    /// Fails if the membership is absent, or if it is an admin membership
    /// and no other admin would remain.
    DeleteMembership { group_id: Uuid, user_id: Uuid },
    DeleteGroupMemberships { group_id: Uuid },

    /// Insert or overwrite the grant for (`group_id`, `project_id`).
    UpsertGrant(PermissionGrant),
    DeleteGrant { group_id: Uuid, project_id: Uuid },
    DeleteGroupGrants { group_id: Uuid },
    DeleteProjectGrants { project_id: Uuid },

    InsertProject(Project),
    DeleteProject { project_id: Uuid },
    InsertProjectKey(ProjectKey),
    DeleteProjectKeys { project_id: Uuid },
    InsertProjectVariable(ProjectVariable),
    DeleteProjectVariables { project_id: Uuid },
}

/// Discriminant of a [`Mutation`], used in logs and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    InsertGroup,
    RenameGroup,
    DeleteGroup,
    InsertMembership,
    SetAdmin,
    DeleteMembership,
    DeleteGroupMemberships,
    UpsertGrant,
    DeleteGrant,
    DeleteGroupGrants,
    DeleteProjectGrants,
    InsertProject,
    DeleteProject,
    InsertProjectKey,
    DeleteProjectKeys,
    InsertProjectVariable,
    DeleteProjectVariables,
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::InsertGroup(_) => MutationKind::InsertGroup,
            Mutation::RenameGroup { .. } => MutationKind::RenameGroup,
            Mutation::DeleteGroup { .. } => MutationKind::DeleteGroup,
            Mutation::InsertMembership(_) => MutationKind::InsertMembership,
            Mutation::SetAdmin { .. } => MutationKind::SetAdmin,
            Mutation::DeleteMembership { .. } => MutationKind::DeleteMembership,
            Mutation::DeleteGroupMemberships { .. } => MutationKind::DeleteGroupMemberships,
            Mutation::UpsertGrant(_) => MutationKind::UpsertGrant,
            Mutation::DeleteGrant { .. } => MutationKind::DeleteGrant,
            Mutation::DeleteGroupGrants { .. } => MutationKind::DeleteGroupGrants,
            Mutation::DeleteProjectGrants { .. } => MutationKind::DeleteProjectGrants,
            Mutation::InsertProject(_) => MutationKind::InsertProject,
            Mutation::DeleteProject { .. } => MutationKind::DeleteProject,
            Mutation::InsertProjectKey(_) => MutationKind::InsertProjectKey,
            Mutation::DeleteProjectKeys { .. } => MutationKind::DeleteProjectKeys,
            Mutation::InsertProjectVariable(_) => MutationKind::InsertProjectVariable,
            Mutation::DeleteProjectVariables { .. } => MutationKind::DeleteProjectVariables,
        }
    }
}

/// Ordered list of mutations applied atomically.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    mutations: Vec<Mutation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mutation> {
        self.mutations.iter()
    }

    pub fn kinds(&self) -> Vec<MutationKind> {
        self.mutations.iter().map(Mutation::kind).collect()
    }
}

impl IntoIterator for WriteBatch {
    type Item = Mutation;
    type IntoIter = std::vec::IntoIter<Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.into_iter()
    }
}

impl<'a> IntoIterator for &'a WriteBatch {
    type Item = &'a Mutation;
    type IntoIter = std::slice::Iter<'a, Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.iter()
    }
}

/// A unit of work against an [`AuthzStore`].
///
/// Holds the store's writer permit for its whole lifetime. Reads through
/// [`Transaction::read`] see committed state; writes are staged and only
/// reach the store on [`Transaction::commit`]. Dropping the transaction
/// discards the staged writes.
pub struct Transaction<S: AuthzStore> {
    store: S,
    batch: WriteBatch,
    _permit: S::Permit,
}

impl<S: AuthzStore> Transaction<S> {
    pub fn new(store: S, permit: S::Permit) -> Self {
        Self {
            store,
            batch: WriteBatch::new(),
            _permit: permit,
        }
    }

    pub fn read(&self) -> &S {
        &self.store
    }

    pub fn stage(&mut self, mutation: Mutation) {
        self.batch.push(mutation);
    }

    /// Mutations staged so far.
    pub fn staged(&self) -> &WriteBatch {
        &self.batch
    }

    pub async fn commit(self) -> CohortResult<()> {
        let Transaction {
            store,
            batch,
            _permit: permit,
        } = self;

        if batch.is_empty() {
            return Ok(());
        }

        debug!(mutations = batch.len(), "Committing transaction");
        let result = store.apply(batch).await;
        drop(permit);
        result
    }

    pub fn rollback(self) {
        debug!(mutations = self.batch.len(), "Rolling back transaction");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_preserves_staging_order() {
        let group = Group::new("ops");
        let group_id = group.id;

        let mut batch = WriteBatch::new();
        batch.push(Mutation::DeleteGroupMemberships { group_id });
        batch.push(Mutation::DeleteGroupGrants { group_id });
        batch.push(Mutation::DeleteGroup { group_id });

        assert_eq!(
            batch.kinds(),
            vec![
                MutationKind::DeleteGroupMemberships,
                MutationKind::DeleteGroupGrants,
                MutationKind::DeleteGroup,
            ]
        );
        assert_eq!(batch.len(), 3);
    }
}
