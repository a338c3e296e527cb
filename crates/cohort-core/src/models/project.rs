//! Project domain model and provisioning inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::group::Group;
use super::permission::PermissionLevel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    /// Short upper-case identifier, unique across projects.
    pub key: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Reference to a group in a provisioning request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupRef {
    /// An existing group.
    Id(Uuid),
    /// An existing group, or a new one to create with this name.
    Name(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupAttachment {
    pub group: GroupRef,
    pub level: PermissionLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    Ssh,
    Pgp,
}

impl KeyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyKind::Ssh => "Ssh",
            KeyKind::Pgp => "Pgp",
        }
    }

    /// Short tag used in generated key names (`proj-ssh-…`).
    pub fn tag(self) -> &'static str {
        match self {
            KeyKind::Ssh => "ssh",
            KeyKind::Pgp => "pgp",
        }
    }
}

/// Key requested at project creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewKey {
    pub name: String,
    pub kind: KeyKind,
}

/// Key material produced by a key generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMaterial {
    pub public: String,
    pub private: String,
    pub key_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectKey {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub kind: KeyKind,
    pub public: String,
    pub private: String,
    pub key_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableKind {
    String,
    Secret,
    Text,
}

impl VariableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VariableKind::String => "String",
            VariableKind::Secret => "Secret",
            VariableKind::Text => "Text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVariable {
    pub name: String,
    pub kind: VariableKind,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectVariable {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub kind: VariableKind,
    pub value: String,
}

/// Everything needed to provision a project in one transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProject {
    pub key: String,
    pub name: String,
    pub groups: Vec<GroupAttachment>,
    pub keys: Vec<NewKey>,
    pub variables: Vec<NewVariable>,
}

/// A group attached to a project, with its grant level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectGroup {
    pub group: Group,
    pub level: PermissionLevel,
}

/// A project a group has access to, with the grant level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupGrant {
    pub project: Project,
    pub level: PermissionLevel,
}
