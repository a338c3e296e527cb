//! SurrealDB implementation of the storage traits.
//!
//! Reads are plain `SELECT`s against committed data. A [`WriteBatch`]
//! is rendered into one `BEGIN TRANSACTION … COMMIT TRANSACTION` request
//! (see [`batch`]).

mod batch;
mod grant;
mod group;
mod membership;
mod project;

use std::sync::Arc;

use cohort_core::error::CohortResult;
use cohort_core::models::{
    group::Group,
    membership::{GroupMembership, Membership},
    permission::PermissionGrant,
    project::{GroupGrant, Project, ProjectGroup, ProjectKey, ProjectVariable},
};
use cohort_core::repository::{AuthzStore, GrantQuery, StoreRead};
use cohort_core::transaction::WriteBatch;
use surrealdb::{Connection, Surreal};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::error::DbError;

/// Renders a record literal such as ``group:`…` `` for edge queries.
fn record(table: &str, id: Uuid) -> String {
    format!("{table}:`{id}`")
}

fn record_list(table: &str, ids: &[Uuid]) -> String {
    let items: Vec<String> = ids.iter().map(|id| record(table, *id)).collect();
    format!("[{}]", items.join(", "))
}

fn parse_id(table: &'static str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::decode(table, format!("invalid UUID: {e}")))
}

/// SurrealDB-backed [`AuthzStore`].
pub struct SurrealStore<C: Connection> {
    db: Surreal<C>,
    writer: Arc<Semaphore>,
}

impl<C: Connection> Clone for SurrealStore<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            writer: self.writer.clone(),
        }
    }
}

impl<C: Connection> SurrealStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            db,
            writer: Arc::new(Semaphore::new(1)),
        }
    }
}

impl<C: Connection> StoreRead for SurrealStore<C> {
    async fn get_group(&self, id: Uuid) -> CohortResult<Option<Group>> {
        Ok(self.fetch_group(id).await?)
    }

    async fn get_group_by_name(&self, name: &str) -> CohortResult<Option<Group>> {
        Ok(self.fetch_group_by_name(name).await?)
    }

    async fn list_groups(&self) -> CohortResult<Vec<Group>> {
        Ok(self.fetch_groups().await?)
    }

    async fn get_membership(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> CohortResult<Option<Membership>> {
        Ok(self.fetch_membership(group_id, user_id).await?)
    }

    async fn list_members(&self, group_id: Uuid) -> CohortResult<Vec<Membership>> {
        Ok(self.fetch_members(group_id).await?)
    }

    async fn count_admins(&self, group_id: Uuid) -> CohortResult<u64> {
        Ok(self.fetch_admin_count(group_id).await?)
    }

    async fn list_user_groups(&self, user_id: Uuid) -> CohortResult<Vec<GroupMembership>> {
        Ok(self.fetch_user_groups(user_id).await?)
    }

    async fn get_project(&self, id: Uuid) -> CohortResult<Option<Project>> {
        Ok(self.fetch_project(id).await?)
    }

    async fn get_project_by_key(&self, key: &str) -> CohortResult<Option<Project>> {
        Ok(self.fetch_project_by_key(key).await?)
    }

    async fn list_projects_by_ids(&self, ids: &[Uuid]) -> CohortResult<Vec<Project>> {
        Ok(self.fetch_projects(ids).await?)
    }

    async fn list_project_groups(&self, project_id: Uuid) -> CohortResult<Vec<ProjectGroup>> {
        Ok(self.fetch_project_groups(project_id).await?)
    }

    async fn list_group_grants(&self, group_id: Uuid) -> CohortResult<Vec<GroupGrant>> {
        Ok(self.fetch_group_grants(group_id).await?)
    }

    async fn list_grants(&self, query: &GrantQuery) -> CohortResult<Vec<PermissionGrant>> {
        Ok(self.fetch_grants(query).await?)
    }

    async fn list_project_keys(&self, project_id: Uuid) -> CohortResult<Vec<ProjectKey>> {
        Ok(self.fetch_project_keys(project_id).await?)
    }

    async fn list_project_variables(
        &self,
        project_id: Uuid,
    ) -> CohortResult<Vec<ProjectVariable>> {
        Ok(self.fetch_project_variables(project_id).await?)
    }
}

impl<C: Connection> AuthzStore for SurrealStore<C> {
    type Permit = OwnedSemaphorePermit;

    async fn acquire(&self) -> CohortResult<Self::Permit> {
        self.writer
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| DbError::Aborted(format!("writer lock closed: {e}")).into())
    }

    async fn apply(&self, batch: WriteBatch) -> CohortResult<()> {
        self.execute_batch(batch).await
    }
}
