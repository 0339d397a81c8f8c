//! Services module - business logic layer
//!
//! Services are cheap to construct: they hold `Arc` handles to the catalog,
//! storage and registry and are built per request from the shared state.

pub mod client_service;
pub mod document_service;
pub mod folder_service;
pub mod recycle_bin_service;
pub mod taxonomy_service;

pub use client_service::{ClientService, ProvisionReport, RemovalReport, RolloverReport};
pub use document_service::DocumentService;
pub use folder_service::{ClientDriveContents, FolderContents, FolderQuery, FolderService, Resolution};
pub use recycle_bin_service::{BinContents, PurgeReport, RecycleBinService};
pub use taxonomy_service::{taxonomy_plan, FolderPlan, GenerationReport, TaxonomyService};

use std::sync::Arc;

use crate::models::{ActivityEvent, ActivitySink, Notification, NotificationSink};

/// Optional outbound sinks. Missing sinks drop events silently.
#[derive(Clone, Default)]
pub struct EventSinks {
    pub activity: Option<Arc<dyn ActivitySink>>,
    pub notifications: Option<Arc<dyn NotificationSink>>,
}

impl EventSinks {
    pub fn record(&self, event: ActivityEvent) {
        if let Some(sink) = &self.activity {
            sink.record(event);
        }
    }

    pub fn notify(&self, notification: Notification) {
        if let Some(sink) = &self.notifications {
            sink.notify(notification);
        }
    }
}
