//! HTTP routes of the drive, mounted by the server under `/api/drive`

pub mod bin;
pub mod clients;
pub mod drive;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use mongodb::bson::oid::ObjectId;

use crate::catalog::Catalog;
use crate::config::DriveConfig;
use crate::error::{DriveError, DriveResult};
use crate::models::{ActivitySink, ClientProfile, NotificationSink};
use crate::registry::ClientRegistry;
use crate::services::{
    ClientService, DocumentService, EventSinks, FolderService, RecycleBinService,
};
use crate::storage::ObjectStorage;
use crate::AuthenticatedPrincipal;

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared state of every drive route
pub struct AppState {
    pub catalog: Arc<dyn Catalog>,
    pub storage: Arc<dyn ObjectStorage>,
    pub registry: Arc<dyn ClientRegistry>,
    pub activity_sink: Option<Arc<dyn ActivitySink>>,
    pub notification_sink: Option<Arc<dyn NotificationSink>>,
    pub config: DriveConfig,
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        storage: Arc<dyn ObjectStorage>,
        registry: Arc<dyn ClientRegistry>,
        config: DriveConfig,
    ) -> Self {
        Self {
            catalog,
            storage,
            registry,
            activity_sink: None,
            notification_sink: None,
            config,
        }
    }

    pub fn sinks(&self) -> EventSinks {
        EventSinks {
            activity: self.activity_sink.clone(),
            notifications: self.notification_sink.clone(),
        }
    }

    pub fn folder_service(&self) -> FolderService {
        FolderService::new(self.catalog.clone(), self.config.clone())
    }

    pub fn document_service(&self) -> DocumentService {
        DocumentService::new(
            self.catalog.clone(),
            self.storage.clone(),
            self.config.clone(),
            self.sinks(),
        )
    }

    pub fn recycle_bin_service(&self) -> RecycleBinService {
        RecycleBinService::new(
            self.catalog.clone(),
            self.storage.clone(),
            self.registry.clone(),
            self.config.clone(),
            self.sinks(),
        )
    }

    pub fn client_service(&self) -> ClientService {
        ClientService::new(
            self.catalog.clone(),
            self.storage.clone(),
            self.registry.clone(),
            self.config.clone(),
            self.sinks(),
        )
    }

    /// Client the principal may act on. Unknown and out-of-scope clients
    /// are both `NotFound`.
    pub async fn authorize_client(
        &self,
        principal: &AuthenticatedPrincipal,
        client_id: &ObjectId,
    ) -> DriveResult<ClientProfile> {
        let not_found = || DriveError::not_found("client", client_id.to_hex());

        if !principal.is_staff() && principal.client_id.as_ref() != Some(client_id) {
            return Err(not_found());
        }
        let client = self.registry.get(client_id).await?.ok_or_else(not_found)?;
        if client.tenant_id != principal.tenant_id {
            return Err(not_found());
        }
        Ok(client)
    }

    /// Client addressed by a request: the explicit id for staff, the
    /// principal's own client otherwise
    pub async fn authorize_request_client(
        &self,
        principal: &AuthenticatedPrincipal,
        requested: Option<&str>,
    ) -> DriveResult<ClientProfile> {
        let client_id = match (requested.filter(|s| !s.trim().is_empty()), principal.client_id) {
            (Some(id), _) => parse_object_id(id)?,
            (None, Some(own)) => own,
            (None, None) => return Err(DriveError::Validation("clientId is required".into())),
        };
        self.authorize_client(principal, &client_id).await
    }
}

pub fn require_staff(principal: &AuthenticatedPrincipal, action: &str) -> DriveResult<()> {
    if principal.is_staff() {
        Ok(())
    } else {
        Err(DriveError::PermissionDenied(format!("only practice staff can {}", action)))
    }
}

pub fn parse_object_id(id: &str) -> DriveResult<ObjectId> {
    Ok(ObjectId::parse_str(id.trim())?)
}

/// Configure all drive routes
pub fn configure(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;
    Router::new()
        .merge(drive::drive_routes())
        .merge(bin::bin_routes())
        .merge(clients::client_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
