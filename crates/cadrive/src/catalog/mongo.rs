//! MongoDB-backed catalog

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document as BsonDoc};
use mongodb::options::{FindOneOptions, FindOptions};
use mongodb::Collection;

use super::Catalog;
use crate::db::{collections, MongoDb};
use crate::error::DriveResult;
use crate::models::{DeletionMarker, Document, Folder};

pub struct MongoCatalog {
    db: MongoDb,
}

impl MongoCatalog {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    fn folders(&self) -> Collection<Folder> {
        self.db.collection::<Folder>(collections::FOLDERS)
    }

    fn documents(&self) -> Collection<Document> {
        self.db.collection::<Document>(collections::DOCUMENTS)
    }
}

fn parent_filter(parent: Option<&ObjectId>) -> Bson {
    match parent {
        Some(id) => Bson::ObjectId(*id),
        None => Bson::Null,
    }
}

fn active() -> Bson {
    Bson::Document(doc! { "$ne": true })
}

fn deletion_update(marker: &DeletionMarker) -> DriveResult<BsonDoc> {
    Ok(doc! {
        "$set": {
            "deletion": bson::to_bson(marker)?,
            "updated_at": bson::DateTime::from_chrono(Utc::now()),
        }
    })
}

fn expired_filter(cutoff: DateTime<Utc>) -> BsonDoc {
    doc! {
        "deletion.is_deleted": true,
        "deletion.deleted_at": { "$lt": bson::DateTime::from_chrono(cutoff) },
    }
}

fn newest_deleted_first() -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "deletion.deleted_at": -1 })
        .build()
}

#[async_trait]
impl Catalog for MongoCatalog {
    async fn insert_folder(&self, folder: &Folder) -> DriveResult<()> {
        self.folders().insert_one(folder, None).await?;
        Ok(())
    }

    async fn get_folder(&self, id: &ObjectId) -> DriveResult<Option<Folder>> {
        Ok(self.folders().find_one(doc! { "_id": *id }, None).await?)
    }

    async fn find_active_folder(
        &self,
        client_id: &ObjectId,
        parent: Option<&ObjectId>,
        name: &str,
    ) -> DriveResult<Option<Folder>> {
        let filter = doc! {
            "client_id": *client_id,
            "parent_folder_id": parent_filter(parent),
            "name": name,
            "deletion.is_deleted": active(),
        };
        Ok(self.folders().find_one(filter, None).await?)
    }

    async fn find_folder_any_state(
        &self,
        client_id: &ObjectId,
        parent: Option<&ObjectId>,
        name: &str,
    ) -> DriveResult<Option<Folder>> {
        let filter = doc! {
            "client_id": *client_id,
            "parent_folder_id": parent_filter(parent),
            "name": name,
        };
        // Missing and false both sort before true
        let options = FindOneOptions::builder()
            .sort(doc! { "deletion.is_deleted": 1 })
            .build();
        Ok(self.folders().find_one(filter, options).await?)
    }

    async fn list_active_folders(
        &self,
        client_id: &ObjectId,
        parent: Option<&ObjectId>,
    ) -> DriveResult<Vec<Folder>> {
        let filter = doc! {
            "client_id": *client_id,
            "parent_folder_id": parent_filter(parent),
            "deletion.is_deleted": active(),
        };
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        let cursor = self.folders().find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count_root_folders(&self, client_id: &ObjectId) -> DriveResult<u64> {
        let filter = doc! { "client_id": *client_id, "parent_folder_id": Bson::Null };
        Ok(self.folders().count_documents(filter, None).await?)
    }

    async fn set_folder_deletion(&self, id: &ObjectId, marker: &DeletionMarker) -> DriveResult<bool> {
        let result = self
            .folders()
            .update_one(doc! { "_id": *id }, deletion_update(marker)?, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn remove_folder(&self, id: &ObjectId) -> DriveResult<bool> {
        let result = self.folders().delete_one(doc! { "_id": *id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_document(&self, document: &Document) -> DriveResult<()> {
        self.documents().insert_one(document, None).await?;
        Ok(())
    }

    async fn get_document(&self, id: &ObjectId) -> DriveResult<Option<Document>> {
        Ok(self.documents().find_one(doc! { "_id": *id }, None).await?)
    }

    async fn list_active_documents(
        &self,
        client_id: &ObjectId,
        folder_id: &ObjectId,
    ) -> DriveResult<Vec<Document>> {
        let filter = doc! {
            "client_id": *client_id,
            "folder_id": *folder_id,
            "deletion.is_deleted": active(),
        };
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self.documents().find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_client_folders(&self, client_id: &ObjectId) -> DriveResult<Vec<Folder>> {
        let filter = doc! { "client_id": *client_id, "deletion.is_deleted": active() };
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        let cursor = self.folders().find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_client_documents(&self, client_id: &ObjectId) -> DriveResult<Vec<Document>> {
        let filter = doc! { "client_id": *client_id, "deletion.is_deleted": active() };
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self.documents().find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_document_deletion(
        &self,
        id: &ObjectId,
        marker: &DeletionMarker,
    ) -> DriveResult<bool> {
        let result = self
            .documents()
            .update_one(doc! { "_id": *id }, deletion_update(marker)?, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn remove_document(&self, id: &ObjectId) -> DriveResult<bool> {
        let result = self.documents().delete_one(doc! { "_id": *id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn has_children(&self, folder_id: &ObjectId, active_only: bool) -> DriveResult<bool> {
        let mut folder_filter = doc! { "parent_folder_id": *folder_id };
        let mut document_filter = doc! { "folder_id": *folder_id };
        if active_only {
            folder_filter.insert("deletion.is_deleted", active());
            document_filter.insert("deletion.is_deleted", active());
        }

        if self.folders().find_one(folder_filter, None).await?.is_some() {
            return Ok(true);
        }
        Ok(self.documents().find_one(document_filter, None).await?.is_some())
    }

    async fn list_deleted_folders(&self, client_id: &ObjectId) -> DriveResult<Vec<Folder>> {
        let filter = doc! { "client_id": *client_id, "deletion.is_deleted": true };
        let cursor = self.folders().find(filter, newest_deleted_first()).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_deleted_documents(&self, client_id: &ObjectId) -> DriveResult<Vec<Document>> {
        let filter = doc! { "client_id": *client_id, "deletion.is_deleted": true };
        let cursor = self.documents().find(filter, newest_deleted_first()).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_expired_folders(&self, cutoff: DateTime<Utc>) -> DriveResult<Vec<Folder>> {
        let cursor = self.folders().find(expired_filter(cutoff), None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_expired_documents(&self, cutoff: DateTime<Utc>) -> DriveResult<Vec<Document>> {
        let cursor = self.documents().find(expired_filter(cutoff), None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn remove_client_documents(&self, client_id: &ObjectId) -> DriveResult<u64> {
        let result = self
            .documents()
            .delete_many(doc! { "client_id": *client_id }, None)
            .await?;
        Ok(result.deleted_count)
    }

    async fn remove_client_folders(&self, client_id: &ObjectId) -> DriveResult<u64> {
        let result = self
            .folders()
            .delete_many(doc! { "client_id": *client_id }, None)
            .await?;
        Ok(result.deleted_count)
    }

    async fn ping(&self) -> DriveResult<()> {
        self.db
            .ping()
            .await
            .map_err(|e| crate::error::DriveError::Database(e.to_string()))
    }
}
