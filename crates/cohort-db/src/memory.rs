//! In-process store with the same transactional semantics as the
//! SurrealDB backend.
//!
//! A batch is applied to a copy of the state which replaces the live
//! state only once every mutation succeeded.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use cohort_core::error::{CohortError, CohortResult};
use cohort_core::models::{
    group::Group,
    membership::{GroupMembership, Membership},
    permission::PermissionGrant,
    project::{GroupGrant, Project, ProjectGroup, ProjectKey, ProjectVariable},
};
use cohort_core::repository::{AuthzStore, GrantQuery, StoreRead};
use cohort_core::transaction::{Mutation, MutationKind, WriteBatch};
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    groups: BTreeMap<Uuid, Group>,
    /// Keyed by (group, user).
    memberships: BTreeMap<(Uuid, Uuid), Membership>,
    /// Keyed by (group, project).
    grants: BTreeMap<(Uuid, Uuid), PermissionGrant>,
    projects: BTreeMap<Uuid, Project>,
    keys: BTreeMap<Uuid, ProjectKey>,
    variables: BTreeMap<Uuid, ProjectVariable>,
}

impl MemoryState {
    /// The project key, or the ID when the project is unknown.
    fn project_label(&self, project_id: Uuid) -> String {
        self.projects
            .get(&project_id)
            .map(|p| p.key.clone())
            .unwrap_or_else(|| project_id.to_string())
    }

    fn admins(&self, group_id: Uuid) -> usize {
        self.memberships
            .values()
            .filter(|m| m.group_id == group_id && m.is_admin)
            .count()
    }

    fn name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.groups
            .values()
            .any(|g| g.name == name && Some(g.id) != except)
    }

    fn apply(&mut self, mutation: Mutation) -> CohortResult<()> {
        match mutation {
            Mutation::InsertGroup(group) => {
                if self.name_taken(&group.name, None) {
                    return Err(CohortError::NameConflict { name: group.name });
                }
                self.groups.insert(group.id, group);
            }
            Mutation::RenameGroup { group_id, name } => {
                if self.name_taken(&name, Some(group_id)) {
                    return Err(CohortError::NameConflict { name });
                }
                if let Some(group) = self.groups.get_mut(&group_id) {
                    group.name = name;
                    group.updated_at = chrono::Utc::now();
                }
            }
            Mutation::DeleteGroup { group_id } => {
                self.groups.remove(&group_id);
            }
            Mutation::InsertMembership(membership) => {
                let pair = (membership.group_id, membership.user_id);
                if self.memberships.contains_key(&pair) {
                    return Err(CohortError::AlreadyMember {
                        group_id: pair.0,
                        user_id: pair.1,
                    });
                }
                self.memberships.insert(pair, membership);
            }
            Mutation::SetAdmin {
                group_id,
                user_id,
                is_admin,
            } => match self.memberships.get_mut(&(group_id, user_id)) {
                Some(membership) => membership.is_admin = is_admin,
                None if is_admin => {
                    return Err(CohortError::NotAMember { group_id, user_id });
                }
                None => {}
            },
            Mutation::DeleteMembership { group_id, user_id } => {
                let removed = self
                    .memberships
                    .remove(&(group_id, user_id))
                    .ok_or(CohortError::NotAMember { group_id, user_id })?;
                if removed.is_admin && self.admins(group_id) == 0 {
                    return Err(CohortError::InsufficientAdmins { group_id });
                }
            }
            Mutation::DeleteGroupMemberships { group_id } => {
                self.memberships.retain(|(g, _), _| *g != group_id);
            }
            Mutation::UpsertGrant(grant) => {
                self.grants
                    .insert((grant.group_id, grant.project_id), grant);
            }
            Mutation::DeleteGrant {
                group_id,
                project_id,
            } => {
                self.grants.remove(&(group_id, project_id));
            }
            Mutation::DeleteGroupGrants { group_id } => {
                self.grants.retain(|(g, _), _| *g != group_id);
            }
            Mutation::DeleteProjectGrants { project_id } => {
                self.grants.retain(|(_, p), _| *p != project_id);
            }
            Mutation::InsertProject(project) => {
                if self.projects.values().any(|p| p.key == project.key) {
                    return Err(CohortError::ProjectExists { key: project.key });
                }
                self.projects.insert(project.id, project);
            }
            Mutation::DeleteProject { project_id } => {
                self.projects.remove(&project_id);
            }
            Mutation::InsertProjectKey(key) => {
                if self
                    .keys
                    .values()
                    .any(|k| k.project_id == key.project_id && k.name == key.name)
                {
                    return Err(CohortError::DuplicateName {
                        entity: "key".into(),
                        project: self.project_label(key.project_id),
                        name: key.name,
                    });
                }
                self.keys.insert(key.id, key);
            }
            Mutation::DeleteProjectKeys { project_id } => {
                self.keys.retain(|_, k| k.project_id != project_id);
            }
            Mutation::InsertProjectVariable(variable) => {
                if self
                    .variables
                    .values()
                    .any(|v| v.project_id == variable.project_id && v.name == variable.name)
                {
                    return Err(CohortError::DuplicateName {
                        entity: "variable".into(),
                        project: self.project_label(variable.project_id),
                        name: variable.name,
                    });
                }
                self.variables.insert(variable.id, variable);
            }
            Mutation::DeleteProjectVariables { project_id } => {
                self.variables.retain(|_, v| v.project_id != project_id);
            }
        }
        Ok(())
    }
}

/// Volatile [`AuthzStore`] for development and tests.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    writer: Arc<Semaphore>,
    fault: Arc<Mutex<Option<MutationKind>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            writer: Arc::new(Semaphore::new(1)),
            fault: Arc::new(Mutex::new(None)),
        }
    }

    /// Makes every later batch fail when it reaches a mutation of `kind`.
    #[cfg(any(test, feature = "test_utils"))]
    pub fn fail_on(&self, kind: MutationKind) {
        if let Ok(mut fault) = self.fault.lock() {
            *fault = Some(kind);
        }
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub fn clear_failure(&self) {
        if let Ok(mut fault) = self.fault.lock() {
            *fault = None;
        }
    }

    fn injected_fault(&self) -> Option<MutationKind> {
        self.fault.lock().ok().and_then(|fault| *fault)
    }
}

impl StoreRead for MemoryStore {
    async fn get_group(&self, id: Uuid) -> CohortResult<Option<Group>> {
        Ok(self.state.read().await.groups.get(&id).cloned())
    }

    async fn get_group_by_name(&self, name: &str) -> CohortResult<Option<Group>> {
        let state = self.state.read().await;
        Ok(state.groups.values().find(|g| g.name == name).cloned())
    }

    async fn list_groups(&self) -> CohortResult<Vec<Group>> {
        let state = self.state.read().await;
        let mut groups: Vec<Group> = state.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn get_membership(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> CohortResult<Option<Membership>> {
        let state = self.state.read().await;
        Ok(state.memberships.get(&(group_id, user_id)).cloned())
    }

    async fn list_members(&self, group_id: Uuid) -> CohortResult<Vec<Membership>> {
        let state = self.state.read().await;
        let mut members: Vec<Membership> = state
            .memberships
            .values()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| b.is_admin.cmp(&a.is_admin).then(a.user_id.cmp(&b.user_id)));
        Ok(members)
    }

    async fn count_admins(&self, group_id: Uuid) -> CohortResult<u64> {
        Ok(self.state.read().await.admins(group_id) as u64)
    }

    async fn list_user_groups(&self, user_id: Uuid) -> CohortResult<Vec<GroupMembership>> {
        let state = self.state.read().await;
        let mut groups: Vec<GroupMembership> = state
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                state.groups.get(&m.group_id).map(|group| GroupMembership {
                    group: group.clone(),
                    is_admin: m.is_admin,
                })
            })
            .collect();
        groups.sort_by(|a, b| {
            a.group
                .name
                .cmp(&b.group.name)
                .then(b.is_admin.cmp(&a.is_admin))
        });
        Ok(groups)
    }

    async fn get_project(&self, id: Uuid) -> CohortResult<Option<Project>> {
        Ok(self.state.read().await.projects.get(&id).cloned())
    }

    async fn get_project_by_key(&self, key: &str) -> CohortResult<Option<Project>> {
        let state = self.state.read().await;
        Ok(state.projects.values().find(|p| p.key == key).cloned())
    }

    async fn list_projects_by_ids(&self, ids: &[Uuid]) -> CohortResult<Vec<Project>> {
        let state = self.state.read().await;
        let mut projects: Vec<Project> = ids
            .iter()
            .filter_map(|id| state.projects.get(id).cloned())
            .collect();
        projects.sort_by(|a, b| a.key.cmp(&b.key));
        projects.dedup_by(|a, b| a.id == b.id);
        Ok(projects)
    }

    async fn list_project_groups(&self, project_id: Uuid) -> CohortResult<Vec<ProjectGroup>> {
        let state = self.state.read().await;
        let mut groups: Vec<ProjectGroup> = state
            .grants
            .values()
            .filter(|g| g.project_id == project_id)
            .filter_map(|grant| {
                state.groups.get(&grant.group_id).map(|group| ProjectGroup {
                    group: group.clone(),
                    level: grant.level,
                })
            })
            .collect();
        groups.sort_by(|a, b| a.group.name.cmp(&b.group.name));
        Ok(groups)
    }

    async fn list_group_grants(&self, group_id: Uuid) -> CohortResult<Vec<GroupGrant>> {
        let state = self.state.read().await;
        let mut grants: Vec<GroupGrant> = state
            .grants
            .values()
            .filter(|g| g.group_id == group_id)
            .filter_map(|grant| {
                state
                    .projects
                    .get(&grant.project_id)
                    .map(|project| GroupGrant {
                        project: project.clone(),
                        level: grant.level,
                    })
            })
            .collect();
        grants.sort_by(|a, b| a.project.key.cmp(&b.project.key));
        Ok(grants)
    }

    async fn list_grants(&self, query: &GrantQuery) -> CohortResult<Vec<PermissionGrant>> {
        let state = self.state.read().await;
        Ok(state
            .grants
            .values()
            .filter(|g| query.group_ids.contains(&g.group_id))
            .filter(|g| {
                query
                    .project_ids
                    .as_ref()
                    .is_none_or(|ids| ids.contains(&g.project_id))
            })
            .copied()
            .collect())
    }

    async fn list_project_keys(&self, project_id: Uuid) -> CohortResult<Vec<ProjectKey>> {
        let state = self.state.read().await;
        let mut keys: Vec<ProjectKey> = state
            .keys
            .values()
            .filter(|k| k.project_id == project_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(keys)
    }

    async fn list_project_variables(&self, project_id: Uuid) -> CohortResult<Vec<ProjectVariable>> {
        let state = self.state.read().await;
        let mut variables: Vec<ProjectVariable> = state
            .variables
            .values()
            .filter(|v| v.project_id == project_id)
            .cloned()
            .collect();
        variables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(variables)
    }
}

impl AuthzStore for MemoryStore {
    type Permit = OwnedSemaphorePermit;

    async fn acquire(&self) -> CohortResult<Self::Permit> {
        self.writer
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| CohortError::Internal(format!("writer lock closed: {e}")))
    }

    async fn apply(&self, batch: WriteBatch) -> CohortResult<()> {
        let fault = self.injected_fault();
        let mut state = self.state.write().await;
        let mut next = state.clone();

        for mutation in batch {
            let kind = mutation.kind();
            if fault == Some(kind) {
                debug!(?kind, "Injected failure, discarding batch");
                return Err(CohortError::Database(format!("injected failure at {kind:?}")));
            }
            next.apply(mutation)?;
        }

        *state = next;
        Ok(())
    }
}
