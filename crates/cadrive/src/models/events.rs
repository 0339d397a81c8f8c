//! Outbound activity and notification events.
//!
//! Sinks are fire-and-forget: implementations must return immediately and
//! must never fail the drive operation that produced the event.

use serde::Serialize;

/// Context for an activity-log entry
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEvent {
    pub tenant_id: String,
    pub client_id: String,
    pub actor: String,
    pub action: ActivityAction,
    pub resource_id: Option<String>,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    FoldersGenerated,
    DocumentUploaded,
    FolderCreated,
    ItemDeleted,
    ItemRestored,
    ItemPurged,
    ClientDriveRemoved,
}

impl ActivityEvent {
    pub fn new(
        tenant_id: impl ToString,
        client_id: impl ToString,
        actor: &str,
        action: ActivityAction,
        details: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            actor: actor.to_string(),
            action,
            resource_id: None,
            details: details.into(),
        }
    }

    pub fn with_resource(mut self, resource_id: impl ToString) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }
}

/// Push notification addressed to one client
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub client_id: String,
    pub title: String,
    pub body: String,
}

pub trait ActivitySink: Send + Sync {
    fn record(&self, event: ActivityEvent);
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}
