//! Data models for the client drive

mod client;
mod document;
mod events;
mod folder;
mod serde_helpers;

pub use client::*;
pub use document::*;
pub use events::*;
pub use folder::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tax domain a folder subtree belongs to.
///
/// The tag is stored on every node when it is created and never recomputed
/// from ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Kyc,
    Itr,
    Gst,
    Tds,
    #[default]
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Kyc => "KYC",
            Category::Itr => "ITR",
            Category::Gst => "GST",
            Category::Tds => "TDS",
            Category::General => "GENERAL",
        }
    }

    /// Lowercase form used inside storage keys
    pub fn key_segment(&self) -> String {
        self.as_str().to_lowercase()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "KYC" => Ok(Category::Kyc),
            "ITR" => Ok(Category::Itr),
            "GST" => Ok(Category::Gst),
            // Older records used TAN for the TDS branch
            "TDS" | "TAN" => Ok(Category::Tds),
            "GENERAL" => Ok(Category::General),
            _ => Err(format!("Invalid category: {}", s)),
        }
    }
}

/// Recycle-bin state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecycleState {
    Active,
    SoftDeleted,
}

/// Soft-delete marker shared by folders and documents.
///
/// Stored as an embedded `deletion` sub-document so both collections are
/// queried with the same field paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeletionMarker {
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default, with = "serde_helpers::bson_datetime_option")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_by: Option<String>,
}

impl DeletionMarker {
    pub fn active() -> Self {
        Self::default()
    }

    pub fn deleted(at: DateTime<Utc>, actor: &str) -> Self {
        Self {
            is_deleted: true,
            deleted_at: Some(at),
            deleted_by: Some(actor.to_string()),
        }
    }

    pub fn state(&self) -> RecycleState {
        if self.is_deleted {
            RecycleState::SoftDeleted
        } else {
            RecycleState::Active
        }
    }

    /// True when the record was soft-deleted strictly before `cutoff`
    pub fn expired_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.is_deleted && self.deleted_at.map(|at| at < cutoff).unwrap_or(false)
    }
}

/// Records that move through the recycle bin
pub trait Recyclable {
    fn deletion(&self) -> &DeletionMarker;

    fn is_active(&self) -> bool {
        !self.deletion().is_deleted
    }

    fn recycle_state(&self) -> RecycleState {
        self.deletion().state()
    }
}

/// Which kind of record a recycle-bin operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Folder,
    Document,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Folder => write!(f, "folder"),
            ItemKind::Document => write!(f, "document"),
        }
    }
}

impl std::str::FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "folder" | "folders" => Ok(ItemKind::Folder),
            "document" | "documents" | "file" | "files" => Ok(ItemKind::Document),
            _ => Err(format!("Invalid item type: {}", s)),
        }
    }
}
