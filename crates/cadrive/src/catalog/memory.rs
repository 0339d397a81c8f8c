use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;

use super::Catalog;
use crate::error::{DriveError, DriveResult};
use crate::models::{DeletionMarker, Document, Folder, Recyclable};

/// In-memory catalog for local development and tests.
///
/// Uses a `Mutex` per collection; guards are dropped before every return so
/// nothing is held across an `.await`.
#[derive(Default)]
pub struct MemoryCatalog {
    folders: Mutex<HashMap<ObjectId, Folder>>,
    documents: Mutex<HashMap<ObjectId, Document>>,
    /// Remaining writes before inserts and updates start failing
    write_budget: Mutex<Option<usize>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every insert and update fail with a database error.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        *lock(&self.write_budget) = if simulate { Some(0) } else { None };
    }

    /// Allow `writes` more inserts or updates, then fail the rest.
    pub fn fail_writes_after(&self, writes: usize) {
        *lock(&self.write_budget) = Some(writes);
    }

    /// Test helper to backdate a soft delete. Returns true if the record
    /// existed and was updated.
    pub fn set_deleted_at(&self, id: &ObjectId, at: DateTime<Utc>) -> bool {
        if let Some(folder) = lock(&self.folders).get_mut(id) {
            folder.deletion.deleted_at = Some(at);
            return true;
        }
        if let Some(document) = lock(&self.documents).get_mut(id) {
            document.deletion.deleted_at = Some(at);
            return true;
        }
        false
    }

    /// Every folder row of a client, in any state
    pub fn all_folders(&self, client_id: &ObjectId) -> Vec<Folder> {
        lock(&self.folders)
            .values()
            .filter(|f| f.client_id == *client_id)
            .cloned()
            .collect()
    }

    /// Every document row of a client, in any state
    pub fn all_documents(&self, client_id: &ObjectId) -> Vec<Document> {
        lock(&self.documents)
            .values()
            .filter(|d| d.client_id == *client_id)
            .cloned()
            .collect()
    }

    fn check_writable(&self) -> DriveResult<()> {
        let mut budget = lock(&self.write_budget);
        match budget.as_mut() {
            Some(0) => Err(DriveError::Database("Simulated write error".to_string())),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn newest_deleted_first<T: Recyclable>(items: &mut [T]) {
    items.sort_by(|a, b| b.deletion().deleted_at.cmp(&a.deletion().deleted_at));
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn insert_folder(&self, folder: &Folder) -> DriveResult<()> {
        self.check_writable()?;
        let mut folders = lock(&self.folders);
        let duplicate = folders.values().any(|f| {
            f.is_active()
                && f.client_id == folder.client_id
                && f.parent_folder_id == folder.parent_folder_id
                && f.name == folder.name
        });
        if duplicate && folder.is_active() {
            return Err(DriveError::Conflict(format!(
                "folder '{}' already exists here",
                folder.name
            )));
        }
        if folders.contains_key(&folder.id) {
            return Err(DriveError::Conflict(format!("duplicate folder id {}", folder.id)));
        }
        folders.insert(folder.id, folder.clone());
        Ok(())
    }

    async fn get_folder(&self, id: &ObjectId) -> DriveResult<Option<Folder>> {
        Ok(lock(&self.folders).get(id).cloned())
    }

    async fn find_active_folder(
        &self,
        client_id: &ObjectId,
        parent: Option<&ObjectId>,
        name: &str,
    ) -> DriveResult<Option<Folder>> {
        Ok(lock(&self.folders)
            .values()
            .find(|f| {
                f.is_active()
                    && f.client_id == *client_id
                    && f.parent_folder_id.as_ref() == parent
                    && f.name == name
            })
            .cloned())
    }

    async fn find_folder_any_state(
        &self,
        client_id: &ObjectId,
        parent: Option<&ObjectId>,
        name: &str,
    ) -> DriveResult<Option<Folder>> {
        let folders = lock(&self.folders);
        let mut binned = None;
        for folder in folders.values().filter(|f| {
            f.client_id == *client_id && f.parent_folder_id.as_ref() == parent && f.name == name
        }) {
            if folder.is_active() {
                return Ok(Some(folder.clone()));
            }
            binned.get_or_insert_with(|| folder.clone());
        }
        Ok(binned)
    }

    async fn list_active_folders(
        &self,
        client_id: &ObjectId,
        parent: Option<&ObjectId>,
    ) -> DriveResult<Vec<Folder>> {
        let mut folders: Vec<Folder> = lock(&self.folders)
            .values()
            .filter(|f| {
                f.is_active() && f.client_id == *client_id && f.parent_folder_id.as_ref() == parent
            })
            .cloned()
            .collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    async fn count_root_folders(&self, client_id: &ObjectId) -> DriveResult<u64> {
        Ok(lock(&self.folders)
            .values()
            .filter(|f| f.client_id == *client_id && f.is_root())
            .count() as u64)
    }

    async fn set_folder_deletion(&self, id: &ObjectId, marker: &DeletionMarker) -> DriveResult<bool> {
        self.check_writable()?;
        let mut folders = lock(&self.folders);
        if !marker.is_deleted {
            // Restoring must not produce two active siblings with one name
            if let Some(target) = folders.get(id) {
                let clash = folders.values().any(|f| {
                    f.id != target.id
                        && f.is_active()
                        && f.client_id == target.client_id
                        && f.parent_folder_id == target.parent_folder_id
                        && f.name == target.name
                });
                if clash {
                    return Err(DriveError::Conflict(format!(
                        "an active folder named '{}' already exists here",
                        target.name
                    )));
                }
            }
        }
        match folders.get_mut(id) {
            Some(folder) => {
                folder.deletion = marker.clone();
                folder.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_folder(&self, id: &ObjectId) -> DriveResult<bool> {
        Ok(lock(&self.folders).remove(id).is_some())
    }

    async fn insert_document(&self, document: &Document) -> DriveResult<()> {
        self.check_writable()?;
        let mut documents = lock(&self.documents);
        if documents.contains_key(&document.id) {
            return Err(DriveError::Conflict(format!("duplicate document id {}", document.id)));
        }
        documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn get_document(&self, id: &ObjectId) -> DriveResult<Option<Document>> {
        Ok(lock(&self.documents).get(id).cloned())
    }

    async fn list_active_documents(
        &self,
        client_id: &ObjectId,
        folder_id: &ObjectId,
    ) -> DriveResult<Vec<Document>> {
        let mut documents: Vec<Document> = lock(&self.documents)
            .values()
            .filter(|d| d.is_active() && d.client_id == *client_id && d.folder_id == *folder_id)
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }

    async fn list_client_folders(&self, client_id: &ObjectId) -> DriveResult<Vec<Folder>> {
        let mut folders: Vec<Folder> = lock(&self.folders)
            .values()
            .filter(|f| f.is_active() && f.client_id == *client_id)
            .cloned()
            .collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    async fn list_client_documents(&self, client_id: &ObjectId) -> DriveResult<Vec<Document>> {
        let mut documents: Vec<Document> = lock(&self.documents)
            .values()
            .filter(|d| d.is_active() && d.client_id == *client_id)
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }

    async fn set_document_deletion(
        &self,
        id: &ObjectId,
        marker: &DeletionMarker,
    ) -> DriveResult<bool> {
        self.check_writable()?;
        match lock(&self.documents).get_mut(id) {
            Some(document) => {
                document.deletion = marker.clone();
                document.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_document(&self, id: &ObjectId) -> DriveResult<bool> {
        Ok(lock(&self.documents).remove(id).is_some())
    }

    async fn has_children(&self, folder_id: &ObjectId, active_only: bool) -> DriveResult<bool> {
        let child_folder = lock(&self.folders)
            .values()
            .any(|f| f.parent_folder_id.as_ref() == Some(folder_id) && (!active_only || f.is_active()));
        if child_folder {
            return Ok(true);
        }
        Ok(lock(&self.documents)
            .values()
            .any(|d| d.folder_id == *folder_id && (!active_only || d.is_active())))
    }

    async fn list_deleted_folders(&self, client_id: &ObjectId) -> DriveResult<Vec<Folder>> {
        let mut folders: Vec<Folder> = lock(&self.folders)
            .values()
            .filter(|f| f.client_id == *client_id && !f.is_active())
            .cloned()
            .collect();
        newest_deleted_first(&mut folders);
        Ok(folders)
    }

    async fn list_deleted_documents(&self, client_id: &ObjectId) -> DriveResult<Vec<Document>> {
        let mut documents: Vec<Document> = lock(&self.documents)
            .values()
            .filter(|d| d.client_id == *client_id && !d.is_active())
            .cloned()
            .collect();
        newest_deleted_first(&mut documents);
        Ok(documents)
    }

    async fn list_expired_folders(&self, cutoff: DateTime<Utc>) -> DriveResult<Vec<Folder>> {
        Ok(lock(&self.folders)
            .values()
            .filter(|f| f.deletion.expired_before(cutoff))
            .cloned()
            .collect())
    }

    async fn list_expired_documents(&self, cutoff: DateTime<Utc>) -> DriveResult<Vec<Document>> {
        Ok(lock(&self.documents)
            .values()
            .filter(|d| d.deletion.expired_before(cutoff))
            .cloned()
            .collect())
    }

    async fn remove_client_documents(&self, client_id: &ObjectId) -> DriveResult<u64> {
        let mut documents = lock(&self.documents);
        let before = documents.len();
        documents.retain(|_, d| d.client_id != *client_id);
        Ok((before - documents.len()) as u64)
    }

    async fn remove_client_folders(&self, client_id: &ObjectId) -> DriveResult<u64> {
        let mut folders = lock(&self.folders);
        let before = folders.len();
        folders.retain(|_, f| f.client_id != *client_id);
        Ok((before - folders.len()) as u64)
    }

    async fn ping(&self) -> DriveResult<()> {
        Ok(())
    }
}
