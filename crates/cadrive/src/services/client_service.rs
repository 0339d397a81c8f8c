//! Client drive lifecycle: provisioning, cascade removal and the yearly rollover

use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::config::DriveConfig;
use crate::error::DriveResult;
use crate::models::{ActivityAction, ActivityEvent, ClientProfile, Notification};
use crate::registry::ClientRegistry;
use crate::storage::{bucket_name, client_prefix, ObjectMetadata, ObjectStorage};

use super::taxonomy_service::{GenerationReport, TaxonomyService};
use super::EventSinks;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionReport {
    pub bucket: String,
    pub generation: GenerationReport,
}

/// Catalog rows and objects removed by a client cascade
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalReport {
    pub folders: u64,
    pub documents: u64,
    pub objects: u64,
    /// False when storage cleanup failed and objects may remain
    pub storage_cleaned: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloverReport {
    pub clients: u64,
    pub folders_created: u64,
    pub failures: u64,
}

pub struct ClientService {
    catalog: Arc<dyn Catalog>,
    storage: Arc<dyn ObjectStorage>,
    registry: Arc<dyn ClientRegistry>,
    config: DriveConfig,
    sinks: EventSinks,
}

impl ClientService {
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

    /// Set up a new client's drive: tenant bucket, client placeholder object,
    /// then the initial folder tree.
    pub async fn provision(
        &self,
        client: &ClientProfile,
        actor: &str,
        today: NaiveDate,
    ) -> DriveResult<ProvisionReport> {
        let bucket = bucket_name(&self.config.bucket_prefix, &client.tenant_id);
        self.storage.ensure_bucket(&bucket).await?;
        self.storage
            .put_object(
                &bucket,
                &client_prefix(&client.id),
                Bytes::new(),
                &ObjectMetadata {
                    content_type: "application/x-directory".into(),
                    original_name: None,
                },
            )
            .await?;

        let generation = TaxonomyService::new(self.catalog.clone())
            .generate(client, today)
            .await?;

        if !generation.skipped {
            self.sinks.record(ActivityEvent::new(
                client.tenant_id.to_hex(),
                client.id.to_hex(),
                actor,
                ActivityAction::FoldersGenerated,
                format!("Generated {} folders", generation.created),
            ));
            self.sinks.notify(Notification {
                client_id: client.id.to_hex(),
                title: "Your drive is ready".into(),
                body: "Folders for your documents have been created".into(),
            });
        }

        tracing::info!("Provisioned drive for client {} in bucket {}", client.id, bucket);
        Ok(ProvisionReport { bucket, generation })
    }

    /// Remove every folder and document of the client, whatever their state,
    /// then best-effort remove the client's objects. Safe to repeat.
    pub async fn remove_client(&self, client: &ClientProfile, actor: &str) -> DriveResult<RemovalReport> {
        let mut report = RemovalReport {
            documents: self.catalog.remove_client_documents(&client.id).await?,
            folders: self.catalog.remove_client_folders(&client.id).await?,
            ..Default::default()
        };

        let bucket = bucket_name(&self.config.bucket_prefix, &client.tenant_id);
        match self.storage.delete_prefix(&bucket, &client_prefix(&client.id)).await {
            Ok(objects) => {
                report.objects = objects;
                report.storage_cleaned = true;
            }
            Err(err) => {
                tracing::warn!("Storage cleanup for client {} failed: {}", client.id, err);
            }
        }

        tracing::info!(
            "Removed drive of client {}: {} folders, {} documents, {} objects",
            client.id,
            report.folders,
            report.documents,
            report.objects
        );
        self.sinks.record(ActivityEvent::new(
            client.tenant_id.to_hex(),
            client.id.to_hex(),
            actor,
            ActivityAction::ClientDriveRemoved,
            format!("Removed {} folders and {} documents", report.folders, report.documents),
        ));
        Ok(report)
    }

    /// Incremental generation for every registered client. A failing client
    /// is logged and skipped.
    pub async fn rollover(&self, today: NaiveDate) -> DriveResult<RolloverReport> {
        let taxonomy = TaxonomyService::new(self.catalog.clone());
        let mut report = RolloverReport::default();

        for client in self.registry.list_all().await? {
            report.clients += 1;
            match taxonomy.refresh(&client, today).await {
                Ok(generation) => report.folders_created += generation.created as u64,
                Err(err) => {
                    report.failures += 1;
                    tracing::warn!("Rollover for client {} failed: {}", client.id, err);
                }
            }
        }

        tracing::info!(
            "Fiscal-year rollover: {} clients, {} folders created, {} failures",
            report.clients,
            report.folders_created,
            report.failures
        );
        Ok(report)
    }
}
