//! Membership reads over `user -> member_of -> group` edges.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use cohort_core::models::membership::{GroupMembership, Membership};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::group::{GroupRow, into_groups};
use super::{SurrealStore, parse_id};
use crate::error::DbError;

const MEMBERSHIP_FIELDS: &str = "meta::id(in) AS user_id, meta::id(out) AS group_id, \
     is_admin, created_at";

#[derive(Debug, SurrealValue)]
struct MembershipRow {
    user_id: String,
    group_id: String,
    is_admin: bool,
    created_at: DateTime<Utc>,
}

impl MembershipRow {
    fn try_into_membership(self) -> Result<Membership, DbError> {
        Ok(Membership {
            group_id: parse_id("member_of", &self.group_id)?,
            user_id: parse_id("member_of", &self.user_id)?,
            is_admin: self.is_admin,
            created_at: self.created_at,
        })
    }
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

impl<C: Connection> SurrealStore<C> {
    pub(super) async fn fetch_membership(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, DbError> {
        let query = format!(
            "SELECT {MEMBERSHIP_FIELDS} FROM member_of \
             WHERE in = type::record('user', $user_id) \
             AND out = type::record('group', $group_id)"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("user_id", user_id.to_string()))
            .bind(("group_id", group_id.to_string()))
            .await?;

        let rows: Vec<MembershipRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(MembershipRow::try_into_membership)
            .transpose()
    }

    pub(super) async fn fetch_members(&self, group_id: Uuid) -> Result<Vec<Membership>, DbError> {
        let query = format!(
            "SELECT {MEMBERSHIP_FIELDS} FROM member_of \
             WHERE out = type::record('group', $group_id)"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("group_id", group_id.to_string()))
            .await?;

        let rows: Vec<MembershipRow> = result.take(0)?;
        let mut members = rows
            .into_iter()
            .map(MembershipRow::try_into_membership)
            .collect::<Result<Vec<_>, DbError>>()?;
        members.sort_by(|a, b| b.is_admin.cmp(&a.is_admin).then(a.user_id.cmp(&b.user_id)));
        Ok(members)
    }

    pub(super) async fn fetch_admin_count(&self, group_id: Uuid) -> Result<u64, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM member_of \
                 WHERE out = type::record('group', $group_id) \
                 AND is_admin = true GROUP ALL",
            )
            .bind(("group_id", group_id.to_string()))
            .await?;

        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    pub(super) async fn fetch_user_groups(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<GroupMembership>, DbError> {
        let query = format!(
            "SELECT {MEMBERSHIP_FIELDS} FROM member_of \
             WHERE in = type::record('user', $user_id); \
             SELECT meta::id(id) AS record_id, * FROM group \
             WHERE id IN (\
                 SELECT VALUE out FROM member_of \
                 WHERE in = type::record('user', $user_id)\
             )"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("user_id", user_id.to_string()))
            .await?;

        let edges: Vec<MembershipRow> = result.take(0)?;
        let groups: Vec<GroupRow> = result.take(1)?;

        let admin_flags = edges
            .into_iter()
            .map(|row| row.try_into_membership().map(|m| (m.group_id, m.is_admin)))
            .collect::<Result<HashMap<_, _>, DbError>>()?;

        let mut memberships: Vec<GroupMembership> = into_groups(groups)?
            .into_iter()
            .map(|group| GroupMembership {
                is_admin: admin_flags.get(&group.id).copied().unwrap_or(false),
                group,
            })
            .collect();
        memberships.sort_by(|a, b| {
            a.group
                .name
                .cmp(&b.group.name)
                .then(b.is_admin.cmp(&a.is_admin))
        });
        Ok(memberships)
    }
}
