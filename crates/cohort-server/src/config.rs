use cohort_authz::AuthzConfig;
use cohort_authz::config::{DEFAULT_GROUP_NAME_PATTERN, DEFAULT_PROJECT_KEY_PATTERN};
use cohort_db::DbConfig;
use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // SurrealDB
    #[serde(default = "default_db_url")]
    pub db_url: String,

    #[serde(default = "default_db_namespace")]
    pub db_namespace: String,

    #[serde(default = "default_db_database")]
    pub db_database: String,

    #[serde(default = "default_db_credential")]
    pub db_username: String,

    #[serde(default = "default_db_credential")]
    pub db_password: String,

    // Authorization engine
    #[serde(default = "default_group_name_pattern")]
    pub group_name_pattern: String,

    #[serde(default = "default_project_key_pattern")]
    pub project_key_pattern: String,

    /// Group every user joins. Created at startup when missing; an empty
    /// value disables the default group.
    #[serde(default = "default_default_group")]
    pub default_group: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_url() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_db_namespace() -> String {
    "cohort".to_string()
}

fn default_db_database() -> String {
    "main".to_string()
}

fn default_db_credential() -> String {
    "root".to_string()
}

fn default_group_name_pattern() -> String {
    DEFAULT_GROUP_NAME_PATTERN.to_string()
}

fn default_project_key_pattern() -> String {
    DEFAULT_PROJECT_KEY_PATTERN.to_string()
}

fn default_default_group() -> Option<String> {
    Some("shared.infra".to_string())
}

impl ServerConfig {
    /// Reads `COHORT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(Environment::with_prefix("COHORT"))
    }

    fn from_source(env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    pub fn db(&self) -> DbConfig {
        DbConfig {
            url: self.db_url.clone(),
            namespace: self.db_namespace.clone(),
            database: self.db_database.clone(),
            username: self.db_username.clone(),
            password: self.db_password.clone(),
        }
    }

    pub fn authz(&self, default_group_id: Option<Uuid>) -> AuthzConfig {
        AuthzConfig {
            group_name_pattern: self.group_name_pattern.clone(),
            project_key_pattern: self.project_key_pattern.clone(),
            default_group_id,
        }
    }
}
