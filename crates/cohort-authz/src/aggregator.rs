//! Effective permission computation.
//!
//! A user's level on a project is the maximum level granted to any group
//! the user belongs to. Nothing is cached: every call reads the grants
//! from the store.

use std::collections::HashMap;

use cohort_core::error::CohortResult;
use cohort_core::models::permission::{PermissionGrant, PermissionLevel, Permissions};
use cohort_core::models::project::Project;
use cohort_core::repository::{GrantQuery, StoreRead};
use uuid::Uuid;

/// Highest level per project. Projects without a grant are absent.
pub fn max_levels<I>(grants: I) -> HashMap<Uuid, PermissionLevel>
where
    I: IntoIterator<Item = PermissionGrant>,
{
    let mut levels = HashMap::new();
    for grant in grants {
        levels
            .entry(grant.project_id)
            .and_modify(|level: &mut PermissionLevel| *level = (*level).max(grant.level))
            .or_insert(grant.level);
    }
    levels
}

#[derive(Clone)]
pub struct PermissionAggregator<S> {
    store: S,
}

impl<S: StoreRead> PermissionAggregator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn user_group_ids(&self, user_id: Uuid) -> CohortResult<Vec<Uuid>> {
        Ok(self
            .store
            .list_user_groups(user_id)
            .await?
            .into_iter()
            .map(|m| m.group.id)
            .collect())
    }

    /// Maximum grant level per project for the given groups, restricted to
    /// `project_ids`.
    pub async fn max_level_for_groups(
        &self,
        project_ids: &[Uuid],
        group_ids: &[Uuid],
    ) -> CohortResult<HashMap<Uuid, PermissionLevel>> {
        if project_ids.is_empty() || group_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let grants = self
            .store
            .list_grants(&GrantQuery {
                group_ids: group_ids.to_vec(),
                project_ids: Some(project_ids.to_vec()),
            })
            .await?;
        Ok(max_levels(grants))
    }

    /// `None` when no group of the user holds a grant on the project.
    pub async fn effective_permission(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> CohortResult<PermissionLevel> {
        let group_ids = self.user_group_ids(user_id).await?;
        let levels = self.max_level_for_groups(&[project_id], &group_ids).await?;
        Ok(levels.get(&project_id).copied().unwrap_or_default())
    }

    /// Permission flags per project key. Unknown keys are skipped; known
    /// projects without a grant report `None`.
    pub async fn project_permissions(
        &self,
        user_id: Uuid,
        project_keys: &[String],
    ) -> CohortResult<HashMap<String, Permissions>> {
        let mut projects = Vec::new();
        for key in project_keys {
            if let Some(project) = self.store.get_project_by_key(key).await? {
                projects.push(project);
            }
        }

        let project_ids: Vec<Uuid> = projects.iter().map(|p| p.id).collect();
        let group_ids = self.user_group_ids(user_id).await?;
        let levels = self.max_level_for_groups(&project_ids, &group_ids).await?;

        Ok(projects
            .into_iter()
            .map(|project| {
                let level = levels.get(&project.id).copied().unwrap_or_default();
                (project.key, Permissions::from(level))
            })
            .collect())
    }

    /// Projects on which the user reaches at least `min_level`, ordered by
    /// project key.
    pub async fn accessible_projects(
        &self,
        user_id: Uuid,
        min_level: PermissionLevel,
    ) -> CohortResult<Vec<(Project, Permissions)>> {
        let group_ids = self.user_group_ids(user_id).await?;
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        let grants = self
            .store
            .list_grants(&GrantQuery {
                group_ids,
                project_ids: None,
            })
            .await?;
        let levels = max_levels(grants);

        let project_ids: Vec<Uuid> = levels
            .iter()
            .filter(|(_, level)| **level >= min_level)
            .map(|(id, _)| *id)
            .collect();
        let projects = self.store.list_projects_by_ids(&project_ids).await?;

        Ok(projects
            .into_iter()
            .filter_map(|project| {
                levels
                    .get(&project.id)
                    .map(|level| (project, Permissions::from(*level)))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(project_id: Uuid, level: PermissionLevel) -> PermissionGrant {
        PermissionGrant {
            group_id: Uuid::new_v4(),
            project_id,
            level,
        }
    }

    #[test]
    fn max_levels_keeps_the_highest_grant() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let levels = max_levels([
            grant(a, PermissionLevel::Read),
            grant(a, PermissionLevel::ReadWriteExecute),
            grant(a, PermissionLevel::ReadWrite),
            grant(b, PermissionLevel::Read),
        ]);

        assert_eq!(levels[&a], PermissionLevel::ReadWriteExecute);
        assert_eq!(levels[&b], PermissionLevel::Read);
        assert_eq!(levels.len(), 2);
    }

    #[test]
    fn max_levels_of_nothing_is_empty() {
        assert!(max_levels(Vec::new()).is_empty());
    }
}
