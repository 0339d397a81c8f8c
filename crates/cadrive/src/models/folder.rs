//! Folder model for MongoDB

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::{Category, DeletionMarker, Recyclable};

/// One breadcrumb step, from the root towards a folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
}

/// Folder document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub client_id: ObjectId,
    pub name: String,
    pub category: Category,
    /// `None` for a root folder
    pub parent_folder_id: Option<ObjectId>,
    /// Breadcrumb from the root down to (excluding) this folder
    #[serde(default)]
    pub path: Vec<PathEntry>,
    #[serde(default)]
    pub deletion: DeletionMarker,
    pub created_by: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Folder {
    pub fn new_root(client_id: ObjectId, name: &str, category: Category, created_by: &str) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            client_id,
            name: name.to_string(),
            category,
            parent_folder_id: None,
            path: Vec::new(),
            deletion: DeletionMarker::active(),
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a child whose breadcrumb is this folder's breadcrumb plus this folder.
    pub fn new_child(&self, name: &str, category: Category, created_by: &str) -> Self {
        let mut child = Folder::new_root(self.client_id, name, category, created_by);
        child.parent_folder_id = Some(self.id);
        child.path = self.child_path();
        child
    }

    pub fn child_path(&self) -> Vec<PathEntry> {
        let mut path = self.path.clone();
        path.push(PathEntry {
            id: self.id,
            name: self.name.clone(),
        });
        path
    }

    pub fn is_root(&self) -> bool {
        self.parent_folder_id.is_none()
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

impl Recyclable for Folder {
    fn deletion(&self) -> &DeletionMarker {
        &self.deletion
    }
}

/// Breadcrumb entry as returned over the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathEntryInfo {
    pub id: String,
    pub name: String,
}

/// Folder summary for list views
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderSummary {
    pub id: String,
    pub client_id: String,
    pub name: String,
    pub category: Category,
    pub parent_folder_id: Option<String>,
    pub path: Vec<PathEntryInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Folder> for FolderSummary {
    fn from(f: Folder) -> Self {
        Self {
            id: f.id.to_hex(),
            client_id: f.client_id.to_hex(),
            name: f.name,
            category: f.category,
            parent_folder_id: f.parent_folder_id.map(|id| id.to_hex()),
            path: f
                .path
                .into_iter()
                .map(|p| PathEntryInfo {
                    id: p.id.to_hex(),
                    name: p.name,
                })
                .collect(),
            deleted_at: f.deletion.deleted_at,
            deleted_by: f.deletion.deleted_by,
            created_at: f.created_at,
        }
    }
}
