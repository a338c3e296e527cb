//! Grant reads over `group -> has_access -> project` edges.

use std::collections::HashMap;

use cohort_core::models::permission::{PermissionGrant, PermissionLevel};
use cohort_core::models::project::{GroupGrant, ProjectGroup};
use cohort_core::repository::GrantQuery;
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::group::{GroupRow, into_groups};
use super::project::{ProjectRow, into_projects};
use super::{SurrealStore, parse_id, record_list};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct GrantRow {
    group_id: String,
    project_id: String,
    level: i64,
}

impl GrantRow {
    fn try_into_grant(self) -> Result<PermissionGrant, DbError> {
        Ok(PermissionGrant {
            group_id: parse_id("has_access", &self.group_id)?,
            project_id: parse_id("has_access", &self.project_id)?,
            level: PermissionLevel::try_from(self.level)
                .map_err(|e| DbError::decode("has_access", e))?,
        })
    }
}

fn into_grants(rows: Vec<GrantRow>) -> Result<Vec<PermissionGrant>, DbError> {
    rows.into_iter().map(GrantRow::try_into_grant).collect()
}

const GRANT_FIELDS: &str = "meta::id(in) AS group_id, meta::id(out) AS project_id, level";

impl<C: Connection> SurrealStore<C> {
    pub(super) async fn fetch_project_groups(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ProjectGroup>, DbError> {
        let query = format!(
            "SELECT {GRANT_FIELDS} FROM has_access \
             WHERE out = type::record('project', $project_id); \
             SELECT meta::id(id) AS record_id, * FROM group \
             WHERE id IN (\
                 SELECT VALUE in FROM has_access \
                 WHERE out = type::record('project', $project_id)\
             )"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("project_id", project_id.to_string()))
            .await?;

        let edges: Vec<GrantRow> = result.take(0)?;
        let groups: Vec<GroupRow> = result.take(1)?;

        let levels: HashMap<Uuid, PermissionLevel> = into_grants(edges)?
            .into_iter()
            .map(|g| (g.group_id, g.level))
            .collect();

        let mut attached: Vec<ProjectGroup> = into_groups(groups)?
            .into_iter()
            .filter_map(|group| {
                levels.get(&group.id).map(|level| ProjectGroup {
                    level: *level,
                    group,
                })
            })
            .collect();
        attached.sort_by(|a, b| a.group.name.cmp(&b.group.name));
        Ok(attached)
    }

    pub(super) async fn fetch_group_grants(
        &self,
        group_id: Uuid,
    ) -> Result<Vec<GroupGrant>, DbError> {
        let query = format!(
            "SELECT {GRANT_FIELDS} FROM has_access \
             WHERE in = type::record('group', $group_id); \
             SELECT meta::id(id) AS record_id, * FROM project \
             WHERE id IN (\
                 SELECT VALUE out FROM has_access \
                 WHERE in = type::record('group', $group_id)\
             )"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("group_id", group_id.to_string()))
            .await?;

        let edges: Vec<GrantRow> = result.take(0)?;
        let projects: Vec<ProjectRow> = result.take(1)?;

        let levels: HashMap<Uuid, PermissionLevel> = into_grants(edges)?
            .into_iter()
            .map(|g| (g.project_id, g.level))
            .collect();

        let mut grants: Vec<GroupGrant> = into_projects(projects)?
            .into_iter()
            .filter_map(|project| {
                levels.get(&project.id).map(|level| GroupGrant {
                    level: *level,
                    project,
                })
            })
            .collect();
        grants.sort_by(|a, b| a.project.key.cmp(&b.project.key));
        Ok(grants)
    }

    pub(super) async fn fetch_grants(
        &self,
        query: &GrantQuery,
    ) -> Result<Vec<PermissionGrant>, DbError> {
        if query.group_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {GRANT_FIELDS} FROM has_access WHERE in IN {}",
            record_list("group", &query.group_ids)
        );
        if let Some(project_ids) = &query.project_ids {
            if project_ids.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(" AND out IN {}", record_list("project", project_ids)));
        }

        let mut result = self.db.query(sql).await?;
        let rows: Vec<GrantRow> = result.take(0)?;
        into_grants(rows)
    }
}
