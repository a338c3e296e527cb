//! Authorization engine configuration.

use cohort_core::error::{CohortError, CohortResult};
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

pub const DEFAULT_GROUP_NAME_PATTERN: &str = r"^[a-zA-Z0-9._-]{1,}$";
pub const DEFAULT_PROJECT_KEY_PATTERN: &str = r"^[A-Z0-9]{1,}$";

/// Configuration for the authorization engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Pattern every group (and variable) name must match.
    pub group_name_pattern: String,
    /// Pattern every project key must match.
    pub project_key_pattern: String,
    /// The group every user implicitly belongs to. It only ever holds
    /// Read on projects and is never treated as an owning group.
    pub default_group_id: Option<Uuid>,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            group_name_pattern: DEFAULT_GROUP_NAME_PATTERN.into(),
            project_key_pattern: DEFAULT_PROJECT_KEY_PATTERN.into(),
            default_group_id: None,
        }
    }
}

impl AuthzConfig {
    pub fn with_default_group(mut self, group_id: Uuid) -> Self {
        self.default_group_id = Some(group_id);
        self
    }

    /// Compiles the configured patterns.
    pub fn name_policy(&self) -> CohortResult<NamePolicy> {
        NamePolicy::new(&self.group_name_pattern, &self.project_key_pattern)
    }
}

/// Compiled name and key patterns.
#[derive(Debug, Clone)]
pub struct NamePolicy {
    name: Regex,
    project_key: Regex,
}

impl NamePolicy {
    pub fn new(name_pattern: &str, project_key_pattern: &str) -> CohortResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| CohortError::Config(format!("invalid pattern {pattern}: {e}")))
        };
        Ok(Self {
            name: compile(name_pattern)?,
            project_key: compile(project_key_pattern)?,
        })
    }

    pub fn check_name(&self, name: &str) -> CohortResult<()> {
        if self.name.is_match(name) {
            Ok(())
        } else {
            Err(CohortError::InvalidName {
                name: name.into(),
                pattern: self.name.as_str().into(),
            })
        }
    }

    pub fn check_project_key(&self, key: &str) -> CohortResult<()> {
        if self.project_key.is_match(key) {
            Ok(())
        } else {
            Err(CohortError::InvalidKey {
                key: key.into(),
                pattern: self.project_key.as_str().into(),
            })
        }
    }
}
