//! Folder/document catalog persistence.
//!
//! `Catalog` is the only seam between the services and the database. Every
//! method is a single-record (or single filter) operation; nothing spans a
//! transaction, so multi-step flows must tolerate partial completion.

mod memory;
mod mongo;

pub use memory::MemoryCatalog;
pub use mongo::MongoCatalog;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;

use crate::error::DriveResult;
use crate::models::{DeletionMarker, Document, Folder};

#[async_trait]
pub trait Catalog: Send + Sync {
    // --- Folders ---

    /// Insert a folder. Fails with `Conflict` if an active sibling of the
    /// same name already exists under the same parent.
    async fn insert_folder(&self, folder: &Folder) -> DriveResult<()>;

    /// Fetch a folder regardless of its recycle state
    async fn get_folder(&self, id: &ObjectId) -> DriveResult<Option<Folder>>;

    /// Active folder with the given name directly under `parent` (`None` = root)
    async fn find_active_folder(
        &self,
        client_id: &ObjectId,
        parent: Option<&ObjectId>,
        name: &str,
    ) -> DriveResult<Option<Folder>>;

    /// Folder with the given name directly under `parent` in any recycle
    /// state. An active match is preferred over a soft-deleted one.
    async fn find_folder_any_state(
        &self,
        client_id: &ObjectId,
        parent: Option<&ObjectId>,
        name: &str,
    ) -> DriveResult<Option<Folder>>;

    /// Active children of `parent` (`None` lists root folders), sorted by name
    async fn list_active_folders(
        &self,
        client_id: &ObjectId,
        parent: Option<&ObjectId>,
    ) -> DriveResult<Vec<Folder>>;

    /// Number of root folders the client has, in any recycle state
    async fn count_root_folders(&self, client_id: &ObjectId) -> DriveResult<u64>;

    /// Replace the deletion marker; returns false when the folder is missing
    async fn set_folder_deletion(&self, id: &ObjectId, marker: &DeletionMarker) -> DriveResult<bool>;

    /// Remove the catalog row; returns false when nothing was removed
    async fn remove_folder(&self, id: &ObjectId) -> DriveResult<bool>;

    // --- Documents ---

    async fn insert_document(&self, document: &Document) -> DriveResult<()>;

    async fn get_document(&self, id: &ObjectId) -> DriveResult<Option<Document>>;

    /// Active documents in a folder, newest first
    async fn list_active_documents(
        &self,
        client_id: &ObjectId,
        folder_id: &ObjectId,
    ) -> DriveResult<Vec<Document>>;

    async fn set_document_deletion(
        &self,
        id: &ObjectId,
        marker: &DeletionMarker,
    ) -> DriveResult<bool>;

    async fn remove_document(&self, id: &ObjectId) -> DriveResult<bool>;

    // --- Tree queries ---

    /// Whether the folder has any child folder or document (`active_only`
    /// restricts the check to non-deleted children)
    async fn has_children(&self, folder_id: &ObjectId, active_only: bool) -> DriveResult<bool>;

    /// Every active folder of the client, sorted by name
    async fn list_client_folders(&self, client_id: &ObjectId) -> DriveResult<Vec<Folder>>;

    /// Every active document of the client, newest first
    async fn list_client_documents(&self, client_id: &ObjectId) -> DriveResult<Vec<Document>>;

    // --- Recycle bin ---

    async fn list_deleted_folders(&self, client_id: &ObjectId) -> DriveResult<Vec<Folder>>;

    async fn list_deleted_documents(&self, client_id: &ObjectId) -> DriveResult<Vec<Document>>;

    /// Soft-deleted folders of every client deleted before `cutoff`
    async fn list_expired_folders(&self, cutoff: DateTime<Utc>) -> DriveResult<Vec<Folder>>;

    /// Soft-deleted documents of every client deleted before `cutoff`
    async fn list_expired_documents(&self, cutoff: DateTime<Utc>) -> DriveResult<Vec<Document>>;

    // --- Client cascade ---

    /// Remove every document row of the client; returns the number removed
    async fn remove_client_documents(&self, client_id: &ObjectId) -> DriveResult<u64>;

    /// Remove every folder row of the client; returns the number removed
    async fn remove_client_folders(&self, client_id: &ObjectId) -> DriveResult<u64>;

    /// Cheap reachability probe for health checks
    async fn ping(&self) -> DriveResult<()>;
}
