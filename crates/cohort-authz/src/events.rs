//! Domain events and publishers.
//!
//! Events are published only after the transaction that produced them
//! committed. Publication is fire-and-forget: a failing publisher is
//! logged and never undoes the write.

use std::sync::Arc;

use cohort_core::models::group::Group;
use cohort_core::models::permission::PermissionLevel;
use cohort_core::models::project::Project;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::CollaboratorError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ProjectChange {
    GroupAttached {
        group_id: Uuid,
        level: PermissionLevel,
    },
    GroupDetached {
        group_id: Uuid,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CohortEvent {
    /// A deleted group's grant on a project disappeared with it.
    GroupPermissionDeleted {
        project: Project,
        group: Group,
        level: PermissionLevel,
    },
    ProjectCreated {
        project: Project,
        requester: Uuid,
    },
    ProjectUpdated {
        project: Project,
        change: ProjectChange,
    },
    ProjectDeleted {
        project: Project,
    },
}

impl CohortEvent {
    pub fn project_key(&self) -> &str {
        match self {
            CohortEvent::GroupPermissionDeleted { project, .. }
            | CohortEvent::ProjectCreated { project, .. }
            | CohortEvent::ProjectUpdated { project, .. }
            | CohortEvent::ProjectDeleted { project } => &project.key,
        }
    }
}

pub trait EventPublisher: Send + Sync {
    /// Must not block.
    fn publish(&self, event: CohortEvent) -> Result<(), CollaboratorError>;
}

impl<P: EventPublisher + ?Sized> EventPublisher for Arc<P> {
    fn publish(&self, event: CohortEvent) -> Result<(), CollaboratorError> {
        (**self).publish(event)
    }
}

/// Publishes `event`, logging instead of failing.
pub(crate) fn publish_or_warn<P: EventPublisher>(publisher: &P, event: CohortEvent) {
    let key = event.project_key().to_string();
    if let Err(err) = publisher.publish(event) {
        warn!(project = %key, error = %err, "Dropping domain event");
    }
}

/// Writes every event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPublisher;

impl EventPublisher for TracingPublisher {
    fn publish(&self, event: CohortEvent) -> Result<(), CollaboratorError> {
        info!(project = %event.project_key(), event = ?event, "Domain event");
        Ok(())
    }
}

/// Forwards events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<CohortEvent>,
}

impl ChannelPublisher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CohortEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventPublisher for ChannelPublisher {
    fn publish(&self, event: CohortEvent) -> Result<(), CollaboratorError> {
        self.tx
            .send(event)
            .map_err(|_| CollaboratorError::Publish("event receiver dropped".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_channel_reports_a_publish_error() {
        let (publisher, rx) = ChannelPublisher::channel();
        drop(rx);

        let event = CohortEvent::ProjectDeleted {
            project: Project::new("PRJ", "Proj"),
        };
        assert!(matches!(
            publisher.publish(event),
            Err(CollaboratorError::Publish(_))
        ));
    }
}
