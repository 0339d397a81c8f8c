//! Document uploads and downloads

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;

use crate::catalog::Catalog;
use crate::config::DriveConfig;
use crate::error::{DriveError, DriveResult};
use crate::models::{
    ActivityAction, ActivityEvent, ClientProfile, DeletionMarker, Document, DocumentSummary,
    NewUpload, Notification, Recyclable, UploaderRole,
};
use crate::storage::{bucket_name, object_key, ObjectDownload, ObjectMetadata, ObjectStorage, ObjectUrlResolver};

use super::folder_service::{FolderQuery, FolderService, Resolution};
use super::EventSinks;

pub struct DocumentService {
    catalog: Arc<dyn Catalog>,
    storage: Arc<dyn ObjectStorage>,
    config: DriveConfig,
    sinks: EventSinks,
}

impl DocumentService {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        storage: Arc<dyn ObjectStorage>,
        config: DriveConfig,
        sinks: EventSinks,
    ) -> Self {
        Self {
            catalog,
            storage,
            config,
            sinks,
        }
    }

    fn bucket_for(&self, client: &ClientProfile) -> String {
        bucket_name(&self.config.bucket_prefix, &client.tenant_id)
    }

    /// Store an upload in the addressed folder.
    ///
    /// The catalog row is written only after the object write succeeded; a
    /// storage failure leaves nothing behind.
    pub async fn upload(
        &self,
        client: &ClientProfile,
        target: &FolderQuery,
        upload: NewUpload,
        today: NaiveDate,
    ) -> DriveResult<DocumentSummary> {
        let file_name = upload.file_name.trim().to_string();
        if file_name.is_empty() {
            return Err(DriveError::Validation("file name is required".into()));
        }
        if upload.data.len() > self.config.max_upload_bytes {
            return Err(DriveError::Validation(format!(
                "file exceeds the {} byte upload limit",
                self.config.max_upload_bytes
            )));
        }

        let folders = FolderService::new(self.catalog.clone(), self.config.clone());
        let folder = match folders.resolve_folder(&client.id, target, today).await? {
            Resolution::Folder(folder) => folder,
            Resolution::TopLevel => {
                return Err(DriveError::Validation(
                    "an upload needs a folder id or a category".into(),
                ))
            }
            Resolution::Missing => {
                return Err(DriveError::not_found(
                    "folder",
                    target
                        .category
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "unknown".into()),
                ))
            }
        };

        let bucket = self.bucket_for(client);
        self.storage.ensure_bucket(&bucket).await?;

        let now = Utc::now();
        let storage_key = object_key(&client.id, folder.category, now.timestamp_millis(), &file_name);
        let size = upload.data.len() as i64;
        let metadata = ObjectMetadata {
            content_type: upload.content_type.clone(),
            original_name: Some(file_name.clone()),
        };
        self.storage
            .put_object(&bucket, &storage_key, upload.data, &metadata)
            .await?;

        let document = Document {
            id: ObjectId::new(),
            client_id: client.id,
            folder_id: folder.id,
            file_name: file_name.clone(),
            storage_key: storage_key.clone(),
            content_type: upload.content_type,
            file_size: size,
            uploaded_by: upload.uploaded_by,
            uploader_id: upload.uploader_id.clone(),
            category: folder.category,
            deletion: DeletionMarker::active(),
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.catalog.insert_document(&document).await {
            // Drop the orphaned object; its key is never handed out
            if let Err(cleanup) = self.storage.delete_object(&bucket, &storage_key).await {
                tracing::warn!("Failed to remove orphaned object {}: {}", storage_key, cleanup);
            }
            return Err(err);
        }

        tracing::info!(
            "Uploaded '{}' ({} bytes) for client {} into {}",
            file_name,
            size,
            client.id,
            folder.name
        );

        self.sinks.record(
            ActivityEvent::new(
                client.tenant_id.to_hex(),
                client.id.to_hex(),
                &upload.uploader_id,
                ActivityAction::DocumentUploaded,
                format!("Uploaded {} to {}", file_name, folder.name),
            )
            .with_resource(document.id.to_hex()),
        );
        if document.uploaded_by == UploaderRole::Staff {
            self.sinks.notify(Notification {
                client_id: client.id.to_hex(),
                title: "New document".into(),
                body: format!("{} was added to {}", file_name, folder.name),
            });
        }

        let url = ObjectUrlResolver::new(&self.config.public_endpoint).resolve(&bucket, &storage_key);
        Ok(document.into_summary(url))
    }

    /// Document owned by the client, in any recycle state
    pub async fn get_owned(&self, client_id: &ObjectId, document_id: &ObjectId) -> DriveResult<Document> {
        match self.catalog.get_document(document_id).await? {
            Some(document) if document.client_id == *client_id => Ok(document),
            _ => Err(DriveError::not_found("document", document_id.to_hex())),
        }
    }

    /// Open an active document for a proxied download
    pub async fn download(
        &self,
        client: &ClientProfile,
        document_id: &ObjectId,
    ) -> DriveResult<(Document, ObjectDownload)> {
        let document = self.get_owned(&client.id, document_id).await?;
        if !document.is_active() {
            return Err(DriveError::not_found("document", document_id.to_hex()));
        }
        let download = self
            .storage
            .get_object_stream(&self.bucket_for(client), &document.storage_key)
            .await?;
        Ok((document, download))
    }
}
