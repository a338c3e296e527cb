//! Cohort server: applies migrations, ensures the default group exists
//! and reports the effective configuration.

mod config;

use cohort_authz::{AuthzService, GroupLifecycle, StaticRegistry, TracingPublisher};
use cohort_db::open_store;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("cohort={}", config.log_level).parse()?),
        )
        .json()
        .init();

    tracing::info!("Starting cohort server...");

    let store = open_store(&config.db()).await?;

    let default_group_id = match config.default_group.as_deref().filter(|n| !n.is_empty()) {
        Some(name) => {
            let lifecycle = GroupLifecycle::new(store.clone(), &config.authz(None))?;
            let group = lifecycle.bootstrap_default_group(name).await?;
            tracing::info!(group_id = %group.id, name = %group.name, "Default group ready");
            Some(group.id)
        }
        None => None,
    };

    let authz = config.authz(default_group_id);
    let service = AuthzService::new(store, &authz, StaticRegistry::new(), TracingPublisher)?;
    let groups = service.groups().list_groups(Default::default()).await?;

    tracing::info!(
        groups = groups.len(),
        default_group = ?authz.default_group_id,
        "Authorization engine ready"
    );
    tracing::info!("Cohort server stopped.");
    Ok(())
}
