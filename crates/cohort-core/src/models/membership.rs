//! Membership domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::group::Group;

/// Link between a user and a group. Unique per (`group_id`, `user_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(group_id: Uuid, user_id: Uuid, is_admin: bool) -> Self {
        Self {
            group_id,
            user_id,
            is_admin,
            created_at: Utc::now(),
        }
    }
}

/// A group the user belongs to, as returned by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group: Group,
    pub is_admin: bool,
}

/// A group the user belongs to, annotated with the default-group marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGroup {
    pub group: Group,
    pub is_admin: bool,
    pub is_default: bool,
}
