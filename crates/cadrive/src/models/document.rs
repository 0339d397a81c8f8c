//! Document model for MongoDB (object bytes live in the tenant bucket)

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::{Category, DeletionMarker, Recyclable};

/// Who uploaded a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UploaderRole {
    /// Staff of the tenant practice
    #[default]
    Staff,
    Client,
}

impl UploaderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploaderRole::Staff => "staff",
            UploaderRole::Client => "client",
        }
    }
}

impl std::str::FromStr for UploaderRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "staff" | "ca" => Ok(UploaderRole::Staff),
            "client" | "customer" => Ok(UploaderRole::Client),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Document metadata (stored in documents collection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub client_id: ObjectId,
    pub folder_id: ObjectId,
    pub file_name: String,
    /// Key inside the tenant bucket; never reused
    pub storage_key: String,
    pub content_type: String,
    pub file_size: i64,
    pub uploaded_by: UploaderRole,
    pub uploader_id: String,
    pub category: Category,
    #[serde(default)]
    pub deletion: DeletionMarker,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Convert to a summary carrying a resolved, fetchable URL
    pub fn into_summary(self, file_url: String) -> DocumentSummary {
        DocumentSummary {
            id: self.id.to_hex(),
            client_id: self.client_id.to_hex(),
            folder_id: self.folder_id.to_hex(),
            file_name: self.file_name,
            file_url,
            storage_key: self.storage_key,
            content_type: self.content_type,
            file_size: self.file_size,
            uploaded_by: self.uploaded_by,
            category: self.category,
            deleted_at: self.deletion.deleted_at,
            deleted_by: self.deletion.deleted_by,
            created_at: self.created_at,
        }
    }
}

impl Recyclable for Document {
    fn deletion(&self) -> &DeletionMarker {
        &self.deletion
    }
}

/// Document summary for list views
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: String,
    pub client_id: String,
    pub folder_id: String,
    pub file_name: String,
    pub file_url: String,
    pub storage_key: String,
    pub content_type: String,
    pub file_size: i64,
    pub uploaded_by: UploaderRole,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Upload input after the multipart body has been read
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: bytes::Bytes,
    pub uploaded_by: UploaderRole,
    pub uploader_id: String,
}
