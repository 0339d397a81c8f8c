//! Activity and notification sinks wired into the drive

use cadrive::models::{ActivityEvent, ActivitySink, Notification, NotificationSink};
use tracing::{info, warn};

/// Writes activity events to the structured log
pub struct LogActivitySink;

impl ActivitySink for LogActivitySink {
    fn record(&self, event: ActivityEvent) {
        info!(
            target: "cadrive::activity",
            tenant_id = %event.tenant_id,
            client_id = %event.client_id,
            actor = %event.actor,
            action = ?event.action,
            resource_id = event.resource_id.as_deref().unwrap_or(""),
            "{}",
            event.details
        );
    }
}

/// Posts notifications as JSON to a webhook. Delivery runs in the background
/// and failures are only logged.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl NotificationSink for WebhookNotifier {
    fn notify(&self, notification: Notification) {
        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&notification).send().await {
                Ok(response) if !response.status().is_success() => {
                    warn!(
                        "Notification webhook returned {} for client {}",
                        response.status(),
                        notification.client_id
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        "Notification webhook failed for client {}: {}",
                        notification.client_id, e
                    );
                }
            }
        });
    }
}
