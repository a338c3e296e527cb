//! Permission levels and grants.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CohortError;

/// Access level a group holds on a project.
///
/// Levels are totally ordered and serialize as their numeric value
/// (`0`, `4`, `6`, `7`), so any other raw value is rejected with
/// [`CohortError::InvalidLevel`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub enum PermissionLevel {
    #[default]
    None,
    Read,
    ReadWrite,
    ReadWriteExecute,
}

impl PermissionLevel {
    pub const fn as_i64(self) -> i64 {
        match self {
            PermissionLevel::None => 0,
            PermissionLevel::Read => 4,
            PermissionLevel::ReadWrite => 6,
            PermissionLevel::ReadWriteExecute => 7,
        }
    }
}

impl TryFrom<i64> for PermissionLevel {
    type Error = CohortError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(PermissionLevel::None),
            4 => Ok(PermissionLevel::Read),
            6 => Ok(PermissionLevel::ReadWrite),
            7 => Ok(PermissionLevel::ReadWriteExecute),
            other => Err(CohortError::InvalidLevel(other)),
        }
    }
}

impl From<PermissionLevel> for i64 {
    fn from(level: PermissionLevel) -> Self {
        level.as_i64()
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionLevel::None => "none",
            PermissionLevel::Read => "read",
            PermissionLevel::ReadWrite => "read-write",
            PermissionLevel::ReadWriteExecute => "read-write-execute",
        };
        f.write_str(name)
    }
}

/// A group's access to a project. Unique per (`group_id`, `project_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub group_id: Uuid,
    pub project_id: Uuid,
    pub level: PermissionLevel,
}

/// Derived view of a level as capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub level: PermissionLevel,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

impl From<PermissionLevel> for Permissions {
    fn from(level: PermissionLevel) -> Self {
        Self {
            level,
            readable: level >= PermissionLevel::Read,
            writable: level >= PermissionLevel::ReadWrite,
            executable: level == PermissionLevel::ReadWriteExecute,
        }
    }
}
