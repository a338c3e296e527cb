//! Project provisioning.
//!
//! Creating a project inserts the project, its owning groups and their
//! grants, its keys and its variables in a single transaction. Any failing
//! step, including a failing key generator or variable provisioner, leaves
//! no trace. Events are published after commit.

use std::collections::{HashMap, HashSet};

use cohort_core::error::{CohortError, CohortResult};
use cohort_core::models::group::Group;
use cohort_core::models::permission::PermissionLevel;
use cohort_core::models::project::{GroupAttachment, GroupRef, NewProject, Project, ProjectKey};
use cohort_core::repository::{AuthzStore, StoreRead};
use cohort_core::transaction::{Mutation, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{AuthzConfig, NamePolicy};
use crate::events::{CohortEvent, EventPublisher, ProjectChange, publish_or_warn};
use crate::grants::{grant_in, revoke_in};
use crate::keys::{KeyGenerator, VariableProvisioner, with_default_keys};
use crate::lifecycle::create_group_in;

/// Name of the group created when a project names no owning group.
pub fn owning_group_name(project_name: &str) -> String {
    project_name.chars().filter(|c| *c != ' ').collect()
}

/// Rejects the first name that appears twice.
fn ensure_unique_names<'a>(
    project_key: &str,
    entity: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> CohortResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(CohortError::DuplicateName {
                entity: entity.into(),
                project: project_key.into(),
                name: name.into(),
            });
        }
    }
    Ok(())
}

pub struct ProjectProvisioner<S, K, V, P> {
    store: S,
    policy: NamePolicy,
    default_group: Option<Uuid>,
    keys: K,
    variables: V,
    publisher: P,
}

impl<S, K, V, P> ProjectProvisioner<S, K, V, P>
where
    S: AuthzStore,
    K: KeyGenerator,
    V: VariableProvisioner,
    P: EventPublisher,
{
    pub fn new(
        store: S,
        config: &AuthzConfig,
        keys: K,
        variables: V,
        publisher: P,
    ) -> CohortResult<Self> {
        Ok(Self {
            store,
            policy: config.name_policy()?,
            default_group: config.default_group_id,
            keys,
            variables,
            publisher,
        })
    }

    async fn default_group_name(&self, store: &S) -> CohortResult<Option<String>> {
        match self.default_group {
            Some(id) => Ok(store.get_group(id).await?.map(|g| g.name)),
            None => Ok(None),
        }
    }

    /// Whether `attachment` names an owning group: a non-blank reference
    /// that is not the default group.
    fn is_attachable(&self, attachment: &GroupAttachment, default_name: Option<&str>) -> bool {
        match &attachment.group {
            GroupRef::Id(id) => Some(*id) != self.default_group,
            GroupRef::Name(name) => !name.trim().is_empty() && Some(name.as_str()) != default_name,
        }
    }

    /// Resolves a reference to a group, staging its creation when a name
    /// is unknown. Groups created earlier in the same request are reused.
    async fn resolve_group(
        &self,
        tx: &mut Transaction<S>,
        reference: &GroupRef,
        requester: Uuid,
        created: &mut HashMap<String, Group>,
    ) -> CohortResult<Group> {
        match reference {
            GroupRef::Id(id) => tx
                .read()
                .get_group(*id)
                .await?
                .ok_or_else(|| CohortError::not_found("group", id)),
            GroupRef::Name(name) => {
                if let Some(group) = created.get(name) {
                    return Ok(group.clone());
                }
                if let Some(group) = tx.read().get_group_by_name(name).await? {
                    return Ok(group);
                }
                let group = create_group_in(tx, &self.policy, name, requester).await?;
                debug!(group_id = %group.id, name = %group.name, "Creating owning group");
                created.insert(name.clone(), group.clone());
                Ok(group)
            }
        }
    }

    pub async fn create_project(
        &self,
        requester: Uuid,
        request: NewProject,
    ) -> CohortResult<Project> {
        self.policy.check_project_key(&request.key)?;
        if request.name.trim().is_empty() {
            return Err(CohortError::InvalidName {
                name: request.name,
                pattern: "non-empty".into(),
            });
        }
        for variable in &request.variables {
            self.policy.check_name(&variable.name)?;
        }
        let keys = with_default_keys(&request.key, request.keys);
        ensure_unique_names(&request.key, "key", keys.iter().map(|k| k.name.as_str()))?;
        ensure_unique_names(
            &request.key,
            "variable",
            request.variables.iter().map(|v| v.name.as_str()),
        )?;

        let mut tx = self.store.begin().await?;
        if tx.read().get_project_by_key(&request.key).await?.is_some() {
            return Err(CohortError::ProjectExists { key: request.key });
        }

        let project = Project::new(request.key.clone(), request.name.clone());
        tx.stage(Mutation::InsertProject(project.clone()));

        let default_name = self.default_group_name(tx.read()).await?;
        let mut attachments: Vec<GroupAttachment> = request
            .groups
            .into_iter()
            .filter(|a| !matches!(&a.group, GroupRef::Name(name) if name.trim().is_empty()))
            .collect();

        if !attachments
            .iter()
            .any(|a| self.is_attachable(a, default_name.as_deref()))
        {
            let name = owning_group_name(&project.name);
            if tx.read().get_group_by_name(&name).await?.is_some() {
                return Err(CohortError::NameConflict { name });
            }
            attachments.push(GroupAttachment {
                group: GroupRef::Name(name),
                level: PermissionLevel::ReadWriteExecute,
            });
        }

        let mut created = HashMap::new();
        for attachment in &attachments {
            let group = self
                .resolve_group(&mut tx, &attachment.group, requester, &mut created)
                .await?;
            let level = grant_in(
                &mut tx,
                project.id,
                group.id,
                attachment.level,
                self.default_group,
            );
            debug!(group = %group.name, level = %level, "Attaching group");
        }

        for key in keys {
            let material = self.keys.generate(key.kind, &key.name).await?;
            tx.stage(Mutation::InsertProjectKey(ProjectKey {
                id: Uuid::new_v4(),
                project_id: project.id,
                name: key.name,
                kind: key.kind,
                public: material.public,
                private: material.private,
                key_id: material.key_id,
            }));
        }

        for variable in request.variables {
            let variable = self.variables.provision(&project, variable).await?;
            tx.stage(Mutation::InsertProjectVariable(variable));
        }

        tx.commit().await?;
        info!(
            project_id = %project.id,
            key = %project.key,
            groups = attachments.len(),
            "Project created"
        );

        publish_or_warn(
            &self.publisher,
            CohortEvent::ProjectCreated {
                project: project.clone(),
                requester,
            },
        );
        Ok(project)
    }

    /// Grants `group_id` access to the project. Returns the stored level.
    pub async fn attach_group(
        &self,
        project_id: Uuid,
        group_id: Uuid,
        level: PermissionLevel,
    ) -> CohortResult<PermissionLevel> {
        let mut tx = self.store.begin().await?;
        let project = self.require_project(tx.read(), project_id).await?;
        if tx.read().get_group(group_id).await?.is_none() {
            return Err(CohortError::not_found("group", group_id));
        }
        let level = grant_in(&mut tx, project_id, group_id, level, self.default_group);
        tx.commit().await?;

        info!(key = %project.key, group_id = %group_id, level = %level, "Group attached");
        publish_or_warn(
            &self.publisher,
            CohortEvent::ProjectUpdated {
                project,
                change: ProjectChange::GroupAttached { group_id, level },
            },
        );
        Ok(level)
    }

    pub async fn detach_group(&self, project_id: Uuid, group_id: Uuid) -> CohortResult<()> {
        let mut tx = self.store.begin().await?;
        let project = self.require_project(tx.read(), project_id).await?;
        revoke_in(&mut tx, project_id, group_id);
        tx.commit().await?;

        info!(key = %project.key, group_id = %group_id, "Group detached");
        publish_or_warn(
            &self.publisher,
            CohortEvent::ProjectUpdated {
                project,
                change: ProjectChange::GroupDetached { group_id },
            },
        );
        Ok(())
    }

    /// Deletes the project with its grants, keys and variables.
    pub async fn delete_project(&self, key: &str) -> CohortResult<Project> {
        let mut tx = self.store.begin().await?;
        let project = tx
            .read()
            .get_project_by_key(key)
            .await?
            .ok_or_else(|| CohortError::not_found("project", key))?;

        let project_id = project.id;
        tx.stage(Mutation::DeleteProjectGrants { project_id });
        tx.stage(Mutation::DeleteProjectKeys { project_id });
        tx.stage(Mutation::DeleteProjectVariables { project_id });
        tx.stage(Mutation::DeleteProject { project_id });
        tx.commit().await?;

        info!(project_id = %project_id, key = %project.key, "Project deleted");
        publish_or_warn(
            &self.publisher,
            CohortEvent::ProjectDeleted {
                project: project.clone(),
            },
        );
        Ok(project)
    }

    async fn require_project(&self, store: &S, project_id: Uuid) -> CohortResult<Project> {
        store
            .get_project(project_id)
            .await?
            .ok_or_else(|| CohortError::not_found("project", project_id))
    }
}
