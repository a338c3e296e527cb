//! Group reads.

use chrono::{DateTime, Utc};
use cohort_core::models::group::Group;
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{SurrealStore, parse_id};
use crate::error::DbError;

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
pub(super) struct GroupRow {
    record_id: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    pub(super) fn try_into_group(self) -> Result<Group, DbError> {
        Ok(Group {
            id: parse_id("group", &self.record_id)?,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(super) fn into_groups(rows: Vec<GroupRow>) -> Result<Vec<Group>, DbError> {
    rows.into_iter().map(GroupRow::try_into_group).collect()
}

impl<C: Connection> SurrealStore<C> {
    pub(super) async fn fetch_group(&self, id: Uuid) -> Result<Option<Group>, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('group', $id)")
            .bind(("id", id.to_string()))
            .await?;

        let rows: Vec<GroupRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(GroupRow::try_into_group)
            .transpose()
    }

    pub(super) async fn fetch_group_by_name(&self, name: &str) -> Result<Option<Group>, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM group WHERE name = $name")
            .bind(("name", name.to_string()))
            .await?;

        let rows: Vec<GroupRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(GroupRow::try_into_group)
            .transpose()
    }

    pub(super) async fn fetch_groups(&self) -> Result<Vec<Group>, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM group ORDER BY name ASC")
            .await?;

        let rows: Vec<GroupRow> = result.take(0)?;
        into_groups(rows)
    }
}
