//! Opening the SurrealDB-backed store.

use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::repository::SurrealStore;
use crate::schema::run_migrations;

/// Where the authorization data lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// WebSocket endpoint, e.g. `127.0.0.1:8000`.
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials.
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "cohort".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

/// Connects as root, selects the configured database and migrates it
/// before handing out the store.
pub async fn open_store(config: &DbConfig) -> Result<SurrealStore<Client>, DbError> {
    let db = Surreal::new::<Ws>(&config.url).await?;
    db.signin(Root {
        username: config.username.clone(),
        password: config.password.clone(),
    })
    .await?;
    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await?;
    run_migrations(&db).await?;

    info!(
        url = %config.url,
        namespace = %config.namespace,
        database = %config.database,
        "Store ready"
    );
    Ok(SurrealStore::new(db))
}
