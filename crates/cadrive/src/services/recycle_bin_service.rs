//! Recycle bin: soft delete, restore, permanent delete and the retention purge.
//!
//! Every record moves `ACTIVE -> SOFT_DELETED -> ACTIVE | PURGED`. Storage
//! failures on the delete paths are logged and never block catalog cleanup.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::config::DriveConfig;
use crate::error::{DriveError, DriveResult};
use crate::models::{
    ActivityAction, ActivityEvent, ClientProfile, DeletionMarker, Document, DocumentSummary,
    Folder, FolderSummary, ItemKind, Recyclable, RecycleState,
};
use crate::registry::ClientRegistry;
use crate::storage::{bucket_name, ObjectStorage, ObjectUrlResolver};

use super::EventSinks;

/// Soft-deleted items of one client, newest-deleted first
#[derive(Debug, Clone, Serialize)]
pub struct BinContents {
    pub folders: Vec<FolderSummary>,
    pub documents: Vec<DocumentSummary>,
}

/// Outcome of one purge sweep
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub documents: u64,
    pub folders: u64,
    pub objects_removed: u64,
    pub failures: u64,
}

pub struct RecycleBinService {
    catalog: Arc<dyn Catalog>,
    storage: Arc<dyn ObjectStorage>,
    registry: Arc<dyn ClientRegistry>,
    config: DriveConfig,
    sinks: EventSinks,
}

impl RecycleBinService {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        storage: Arc<dyn ObjectStorage>,
        registry: Arc<dyn ClientRegistry>,
        config: DriveConfig,
        sinks: EventSinks,
    ) -> Self {
        Self {
            catalog,
            storage,
            registry,
            config,
            sinks,
        }
    }

    /// Client owning a folder or document, in any recycle state
    pub async fn owner_of(&self, kind: ItemKind, id: &ObjectId) -> DriveResult<ObjectId> {
        let owner = match kind {
            ItemKind::Folder => self.catalog.get_folder(id).await?.map(|f| f.client_id),
            ItemKind::Document => self.catalog.get_document(id).await?.map(|d| d.client_id),
        };
        owner.ok_or_else(|| DriveError::not_found(kind_resource(kind), id.to_hex()))
    }

    async fn owned_folder(&self, client_id: &ObjectId, id: &ObjectId) -> DriveResult<Folder> {
        match self.catalog.get_folder(id).await? {
            Some(folder) if folder.client_id == *client_id => Ok(folder),
            _ => Err(DriveError::not_found("folder", id.to_hex())),
        }
    }

    async fn owned_document(&self, client_id: &ObjectId, id: &ObjectId) -> DriveResult<Document> {
        match self.catalog.get_document(id).await? {
            Some(document) if document.client_id == *client_id => Ok(document),
            _ => Err(DriveError::not_found("document", id.to_hex())),
        }
    }

    /// Move an item to the bin. A folder with active children is rejected;
    /// an item already in the bin keeps its original timestamp.
    pub async fn soft_delete(
        &self,
        client: &ClientProfile,
        kind: ItemKind,
        id: &ObjectId,
        actor: &str,
    ) -> DriveResult<()> {
        let name = match kind {
            ItemKind::Folder => {
                let folder = self.owned_folder(&client.id, id).await?;
                if !folder.is_active() {
                    return Ok(());
                }
                if self.catalog.has_children(id, true).await? {
                    return Err(DriveError::Conflict(format!(
                        "folder '{}' is not empty",
                        folder.name
                    )));
                }
                self.catalog
                    .set_folder_deletion(id, &DeletionMarker::deleted(Utc::now(), actor))
                    .await?;
                folder.name
            }
            ItemKind::Document => {
                let document = self.owned_document(&client.id, id).await?;
                if !document.is_active() {
                    return Ok(());
                }
                self.catalog
                    .set_document_deletion(id, &DeletionMarker::deleted(Utc::now(), actor))
                    .await?;
                document.file_name
            }
        };

        tracing::info!("Moved {} {} to the recycle bin", kind, id);
        self.sinks.record(
            ActivityEvent::new(
                client.tenant_id.to_hex(),
                client.id.to_hex(),
                actor,
                ActivityAction::ItemDeleted,
                format!("Deleted {} {}", kind, name),
            )
            .with_resource(id.to_hex()),
        );
        Ok(())
    }

    /// Clear the delete marker. Soft-deleted ancestor folders are restored
    /// first so the item is reachable again.
    pub async fn restore(
        &self,
        client: &ClientProfile,
        kind: ItemKind,
        id: &ObjectId,
        actor: &str,
    ) -> DriveResult<()> {
        let (ancestors, name) = match kind {
            ItemKind::Folder => {
                let folder = self.owned_folder(&client.id, id).await?;
                let ancestors: Vec<ObjectId> = folder.path.iter().map(|p| p.id).collect();
                (ancestors, folder.name)
            }
            ItemKind::Document => {
                let document = self.owned_document(&client.id, id).await?;
                let mut ancestors = match self.catalog.get_folder(&document.folder_id).await? {
                    Some(folder) => folder.path.iter().map(|p| p.id).collect(),
                    None => Vec::new(),
                };
                ancestors.push(document.folder_id);
                (ancestors, document.file_name)
            }
        };

        for ancestor_id in &ancestors {
            if let Some(ancestor) = self.catalog.get_folder(ancestor_id).await? {
                if !ancestor.is_active() {
                    self.catalog
                        .set_folder_deletion(ancestor_id, &DeletionMarker::active())
                        .await?;
                    tracing::info!("Restored ancestor folder {} of {} {}", ancestor_id, kind, id);
                }
            }
        }

        match kind {
            ItemKind::Folder => self.catalog.set_folder_deletion(id, &DeletionMarker::active()).await?,
            ItemKind::Document => {
                self.catalog
                    .set_document_deletion(id, &DeletionMarker::active())
                    .await?
            }
        };

        tracing::info!("Restored {} {}", kind, id);
        self.sinks.record(
            ActivityEvent::new(
                client.tenant_id.to_hex(),
                client.id.to_hex(),
                actor,
                ActivityAction::ItemRestored,
                format!("Restored {} {}", kind, name),
            )
            .with_resource(id.to_hex()),
        );
        Ok(())
    }

    pub async fn list_bin(&self, client: &ClientProfile) -> DriveResult<BinContents> {
        let folders = self.catalog.list_deleted_folders(&client.id).await?;
        let documents = self.catalog.list_deleted_documents(&client.id).await?;

        let bucket = bucket_name(&self.config.bucket_prefix, &client.tenant_id);
        let resolver = ObjectUrlResolver::new(&self.config.public_endpoint);

        Ok(BinContents {
            folders: folders.into_iter().map(FolderSummary::from).collect(),
            documents: documents
                .into_iter()
                .map(|d| {
                    let url = resolver.resolve(&bucket, &d.storage_key);
                    d.into_summary(url)
                })
                .collect(),
        })
    }

    /// Erase an item that is already in the bin
    pub async fn permanent_delete(
        &self,
        client: &ClientProfile,
        kind: ItemKind,
        id: &ObjectId,
        actor: &str,
    ) -> DriveResult<()> {
        let name = match kind {
            ItemKind::Folder => {
                let folder = self.owned_folder(&client.id, id).await?;
                ensure_in_bin(&folder, kind)?;
                self.erase_folder(&folder).await?;
                folder.name
            }
            ItemKind::Document => {
                let document = self.owned_document(&client.id, id).await?;
                ensure_in_bin(&document, kind)?;
                let bucket = bucket_name(&self.config.bucket_prefix, &client.tenant_id);
                self.erase_document(&document, Some(&bucket)).await?;
                document.file_name
            }
        };

        self.sinks.record(
            ActivityEvent::new(
                client.tenant_id.to_hex(),
                client.id.to_hex(),
                actor,
                ActivityAction::ItemPurged,
                format!("Permanently deleted {} {}", kind, name),
            )
            .with_resource(id.to_hex()),
        );
        Ok(())
    }

    /// Remove the catalog row of a folder with no children in any state
    async fn erase_folder(&self, folder: &Folder) -> DriveResult<()> {
        if self.catalog.has_children(&folder.id, false).await? {
            return Err(DriveError::Conflict(format!(
                "folder '{}' still has children",
                folder.name
            )));
        }
        self.catalog.remove_folder(&folder.id).await?;
        tracing::info!("Permanently deleted folder {}", folder.id);
        Ok(())
    }

    /// Best-effort object removal, then the catalog row. Returns whether the
    /// object was removed.
    async fn erase_document(&self, document: &Document, bucket: Option<&str>) -> DriveResult<bool> {
        let object_removed = match bucket {
            Some(bucket) => match self.storage.delete_object(bucket, &document.storage_key).await {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(
                        "Failed to delete object {} of document {}: {}",
                        document.storage_key,
                        document.id,
                        err
                    );
                    false
                }
            },
            None => false,
        };
        self.catalog.remove_document(&document.id).await?;
        tracing::info!("Permanently deleted document {}", document.id);
        Ok(object_removed)
    }

    /// Erase everything soft-deleted more than the retention window before
    /// `now`. Documents go first, then folders deepest-first; each item is
    /// independent and failures are only counted and logged.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> DriveResult<PurgeReport> {
        let cutoff = now - Duration::days(i64::from(self.config.retention_days));
        let mut report = PurgeReport::default();

        for document in self.catalog.list_expired_documents(cutoff).await? {
            let bucket = match self.registry.get(&document.client_id).await {
                Ok(Some(client)) => Some(bucket_name(&self.config.bucket_prefix, &client.tenant_id)),
                Ok(None) => {
                    tracing::warn!(
                        "Client {} of document {} is not registered; object left in storage",
                        document.client_id,
                        document.id
                    );
                    None
                }
                Err(err) => {
                    tracing::warn!("Failed to look up client {}: {}", document.client_id, err);
                    None
                }
            };

            match self.erase_document(&document, bucket.as_deref()).await {
                Ok(object_removed) => {
                    report.documents += 1;
                    if object_removed {
                        report.objects_removed += 1;
                    }
                }
                Err(err) => {
                    report.failures += 1;
                    tracing::warn!("Purge of document {} failed: {}", document.id, err);
                }
            }
        }

        let mut folders = self.catalog.list_expired_folders(cutoff).await?;
        folders.sort_by(|a, b| b.depth().cmp(&a.depth()));
        for folder in folders {
            match self.erase_folder(&folder).await {
                Ok(()) => report.folders += 1,
                Err(err) => {
                    report.failures += 1;
                    tracing::warn!("Purge of folder {} failed: {}", folder.id, err);
                }
            }
        }

        tracing::info!(
            "Recycle bin purge: {} documents, {} folders, {} objects, {} failures",
            report.documents,
            report.folders,
            report.objects_removed,
            report.failures
        );
        Ok(report)
    }
}

fn kind_resource(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Folder => "folder",
        ItemKind::Document => "document",
    }
}

fn ensure_in_bin<T: Recyclable>(item: &T, kind: ItemKind) -> DriveResult<()> {
    if item.recycle_state() != RecycleState::SoftDeleted {
        return Err(DriveError::Conflict(format!(
            "{} must be moved to the recycle bin before it can be permanently deleted",
            kind
        )));
    }
    Ok(())
}
