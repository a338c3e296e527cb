//! Cohort Authz: group membership, permission grants and aggregation,
//! group lifecycle and project provisioning.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod events;
pub mod grants;
pub mod identity;
pub mod keys;
pub mod lifecycle;
pub mod membership;
pub mod provisioning;
pub mod service;

pub use aggregator::PermissionAggregator;
pub use config::{AuthzConfig, NamePolicy};
pub use error::CollaboratorError;
pub use events::{ChannelPublisher, CohortEvent, EventPublisher, ProjectChange, TracingPublisher};
pub use grants::PermissionGrants;
pub use identity::{IdentityRegistry, StaticRegistry};
pub use keys::{KeyGenerator, PlainVariables, VariableProvisioner};
pub use lifecycle::{DeletedGroup, GroupLifecycle};
pub use membership::MembershipLedger;
pub use provisioning::ProjectProvisioner;
pub use service::AuthzService;
