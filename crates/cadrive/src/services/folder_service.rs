//! Folder browsing and ad-hoc folder creation

use std::sync::Arc;

use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::config::DriveConfig;
use crate::error::{DriveError, DriveResult};
use crate::fiscal_year::{current_fiscal_year, FiscalYear};
use crate::models::{Category, ClientProfile, DocumentSummary, Folder, FolderSummary, Recyclable};
use crate::storage::{bucket_name, ObjectUrlResolver};

use super::taxonomy_service::KYC_FOLDER;

/// Which folder a browse or upload request addresses
#[derive(Debug, Clone, Default)]
pub struct FolderQuery {
    pub folder_id: Option<ObjectId>,
    pub category: Option<Category>,
    /// Fiscal-year label; the current year when absent
    pub fiscal_year: Option<String>,
}

/// Result of resolving a [`FolderQuery`]
#[derive(Debug, Clone)]
pub enum Resolution {
    Folder(Folder),
    /// No folder named: the client's root level
    TopLevel,
    /// The addressed branch is not provisioned (yet)
    Missing,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderContents {
    pub folders: Vec<FolderSummary>,
    pub documents: Vec<DocumentSummary>,
    pub available_fiscal_years: Vec<String>,
    pub current_fiscal_year: String,
}

/// Every active folder and document of one client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDriveContents {
    pub folders: Vec<FolderSummary>,
    pub documents: Vec<DocumentSummary>,
}

pub struct FolderService {
    catalog: Arc<dyn Catalog>,
    config: DriveConfig,
}

impl FolderService {
    pub fn new(catalog: Arc<dyn Catalog>, config: DriveConfig) -> Self {
        Self { catalog, config }
    }

    /// Active folder owned by the client; anything else is `NotFound`
    pub async fn get_owned(&self, client_id: &ObjectId, folder_id: &ObjectId) -> DriveResult<Folder> {
        match self.catalog.get_folder(folder_id).await? {
            Some(folder) if folder.client_id == *client_id && folder.is_active() => Ok(folder),
            _ => Err(DriveError::not_found("folder", folder_id.to_hex())),
        }
    }

    /// Resolution order: explicit folder id, then category within a fiscal
    /// year (KYC is client-wide), then the fiscal-year root itself.
    pub async fn resolve_folder(
        &self,
        client_id: &ObjectId,
        query: &FolderQuery,
        today: NaiveDate,
    ) -> DriveResult<Resolution> {
        if let Some(folder_id) = &query.folder_id {
            return self.get_owned(client_id, folder_id).await.map(Resolution::Folder);
        }

        let year_label = || {
            query
                .fiscal_year
                .clone()
                .unwrap_or_else(|| current_fiscal_year(&today))
        };

        match query.category {
            Some(Category::Kyc) => Ok(self.find_or_missing(client_id, None, KYC_FOLDER).await?),
            Some(category) => {
                let Some(year_root) = self
                    .catalog
                    .find_active_folder(client_id, None, &year_label())
                    .await?
                else {
                    tracing::debug!("No fiscal-year root {} for client {}", year_label(), client_id);
                    return Ok(Resolution::Missing);
                };
                let sections = self.catalog.list_active_folders(client_id, Some(&year_root.id)).await?;
                Ok(sections
                    .into_iter()
                    .find(|f| f.category == category)
                    .map(Resolution::Folder)
                    .unwrap_or(Resolution::Missing))
            }
            None if query.fiscal_year.is_some() => {
                Ok(self.find_or_missing(client_id, None, &year_label()).await?)
            }
            None => Ok(Resolution::TopLevel),
        }
    }

    async fn find_or_missing(
        &self,
        client_id: &ObjectId,
        parent: Option<&ObjectId>,
        name: &str,
    ) -> DriveResult<Resolution> {
        Ok(self
            .catalog
            .find_active_folder(client_id, parent, name)
            .await?
            .map(Resolution::Folder)
            .unwrap_or(Resolution::Missing))
    }

    /// Active children and documents of the resolved folder, documents with
    /// public URLs. An unprovisioned branch yields empty lists.
    pub async fn list_contents(
        &self,
        client: &ClientProfile,
        query: &FolderQuery,
        today: NaiveDate,
    ) -> DriveResult<FolderContents> {
        let resolution = self.resolve_folder(&client.id, query, today).await?;

        let (folders, documents) = match resolution {
            Resolution::Folder(folder) => {
                let folders = self.catalog.list_active_folders(&client.id, Some(&folder.id)).await?;
                let documents = self.catalog.list_active_documents(&client.id, &folder.id).await?;
                (folders, documents)
            }
            Resolution::TopLevel => (self.catalog.list_active_folders(&client.id, None).await?, Vec::new()),
            Resolution::Missing => (Vec::new(), Vec::new()),
        };

        let bucket = bucket_name(&self.config.bucket_prefix, &client.tenant_id);
        let resolver = ObjectUrlResolver::new(&self.config.public_endpoint);

        Ok(FolderContents {
            folders: folders.into_iter().map(FolderSummary::from).collect(),
            documents: documents
                .into_iter()
                .map(|d| {
                    let url = resolver.resolve(&bucket, &d.storage_key);
                    d.into_summary(url)
                })
                .collect(),
            available_fiscal_years: self.available_fiscal_years(&client.id).await?,
            current_fiscal_year: current_fiscal_year(&today),
        })
    }

    /// The client's whole active tree in one response, document URLs
    /// resolved as in [`Self::list_contents`]
    pub async fn all_contents(&self, client: &ClientProfile) -> DriveResult<ClientDriveContents> {
        let folders = self.catalog.list_client_folders(&client.id).await?;
        let documents = self.catalog.list_client_documents(&client.id).await?;

        let bucket = bucket_name(&self.config.bucket_prefix, &client.tenant_id);
        let resolver = ObjectUrlResolver::new(&self.config.public_endpoint);
        Ok(ClientDriveContents {
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

    /// Labels of the client's fiscal-year roots, newest first
    pub async fn available_fiscal_years(&self, client_id: &ObjectId) -> DriveResult<Vec<String>> {
        let mut years: Vec<FiscalYear> = self
            .catalog
            .list_active_folders(client_id, None)
            .await?
            .iter()
            .filter_map(|f| FiscalYear::parse(&f.name))
            .collect();
        years.sort_by(|a, b| b.cmp(a));
        years.dedup();
        Ok(years.iter().map(FiscalYear::label).collect())
    }

    /// Ad-hoc folder outside generation. A child inherits its parent's
    /// category; a new root is GENERAL.
    pub async fn create_folder(
        &self,
        client_id: &ObjectId,
        name: &str,
        parent_folder_id: Option<&ObjectId>,
        actor: &str,
    ) -> DriveResult<Folder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DriveError::Validation("folder name is required".into()));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(DriveError::Validation("folder name cannot contain path separators".into()));
        }

        let folder = match parent_folder_id {
            Some(parent_id) => {
                let parent = self.get_owned(client_id, parent_id).await?;
                parent.new_child(name, parent.category, actor)
            }
            None => Folder::new_root(*client_id, name, Category::General, actor),
        };

        self.catalog.insert_folder(&folder).await?;
        tracing::info!("Created folder '{}' for client {}", folder.name, client_id);
        Ok(folder)
    }
}
