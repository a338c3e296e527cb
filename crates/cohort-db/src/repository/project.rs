//! Project, key and variable reads.

use chrono::{DateTime, Utc};
use cohort_core::models::project::{KeyKind, Project, ProjectKey, ProjectVariable, VariableKind};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{SurrealStore, parse_id, record_list};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
pub(super) struct ProjectRow {
    record_id: String,
    project_key: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProjectRow {
    pub(super) fn try_into_project(self) -> Result<Project, DbError> {
        Ok(Project {
            id: parse_id("project", &self.record_id)?,
            key: self.project_key,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(super) fn into_projects(rows: Vec<ProjectRow>) -> Result<Vec<Project>, DbError> {
    rows.into_iter().map(ProjectRow::try_into_project).collect()
}

#[derive(Debug, SurrealValue)]
struct ProjectKeyRow {
    record_id: String,
    project_id: String,
    name: String,
    kind: String,
    public_key: String,
    private_key: String,
    key_id: String,
}

fn parse_key_kind(s: &str) -> Result<KeyKind, DbError> {
    match s {
        "Ssh" => Ok(KeyKind::Ssh),
        "Pgp" => Ok(KeyKind::Pgp),
        other => Err(DbError::decode("project_key", format!("unknown kind: {other}"))),
    }
}

impl ProjectKeyRow {
    fn try_into_key(self) -> Result<ProjectKey, DbError> {
        Ok(ProjectKey {
            id: parse_id("project_key", &self.record_id)?,
            project_id: parse_id("project_key", &self.project_id)?,
            name: self.name,
            kind: parse_key_kind(&self.kind)?,
            public: self.public_key,
            private: self.private_key,
            key_id: self.key_id,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct ProjectVariableRow {
    record_id: String,
    project_id: String,
    name: String,
    kind: String,
    var_value: String,
}

fn parse_variable_kind(s: &str) -> Result<VariableKind, DbError> {
    match s {
        "String" => Ok(VariableKind::String),
        "Secret" => Ok(VariableKind::Secret),
        "Text" => Ok(VariableKind::Text),
        other => Err(DbError::decode(
            "project_variable",
            format!("unknown kind: {other}"),
        )),
    }
}

impl ProjectVariableRow {
    fn try_into_variable(self) -> Result<ProjectVariable, DbError> {
        Ok(ProjectVariable {
            id: parse_id("project_variable", &self.record_id)?,
            project_id: parse_id("project_variable", &self.project_id)?,
            name: self.name,
            kind: parse_variable_kind(&self.kind)?,
            value: self.var_value,
        })
    }
}

impl<C: Connection> SurrealStore<C> {
    pub(super) async fn fetch_project(&self, id: Uuid) -> Result<Option<Project>, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('project', $id)")
            .bind(("id", id.to_string()))
            .await?;

        let rows: Vec<ProjectRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(ProjectRow::try_into_project)
            .transpose()
    }

    pub(super) async fn fetch_project_by_key(&self, key: &str) -> Result<Option<Project>, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM project WHERE project_key = $key")
            .bind(("key", key.to_string()))
            .await?;

        let rows: Vec<ProjectRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(ProjectRow::try_into_project)
            .transpose()
    }

    pub(super) async fn fetch_projects(&self, ids: &[Uuid]) -> Result<Vec<Project>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM project \
             WHERE id IN {} ORDER BY project_key ASC",
            record_list("project", ids)
        );
        let mut result = self.db.query(query).await?;

        let rows: Vec<ProjectRow> = result.take(0)?;
        into_projects(rows)
    }

    pub(super) async fn fetch_project_keys(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ProjectKey>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM project_key \
                 WHERE project_id = $project_id ORDER BY name ASC",
            )
            .bind(("project_id", project_id.to_string()))
            .await?;

        let rows: Vec<ProjectKeyRow> = result.take(0)?;
        rows.into_iter().map(ProjectKeyRow::try_into_key).collect()
    }

    pub(super) async fn fetch_project_variables(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ProjectVariable>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM project_variable \
                 WHERE project_id = $project_id ORDER BY name ASC",
            )
            .bind(("project_id", project_id.to_string()))
            .await?;

        let rows: Vec<ProjectVariableRow> = result.take(0)?;
        rows.into_iter()
            .map(ProjectVariableRow::try_into_variable)
            .collect()
    }
}
