//! Group domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::membership::Membership;

/// A named set of users. Project access is granted to groups, never to
/// individual users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// Builds a fresh group with a new identifier.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A group as seen by listings, flagged when it is the configured
/// default group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: Group,
    pub is_default: bool,
}

/// A group together with its memberships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDetails {
    pub group: Group,
    pub is_default: bool,
    pub members: Vec<Membership>,
}

/// Filters for group listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupListOptions {
    /// Leave the default group out of the result.
    pub exclude_default: bool,
}
