//! Read-only view of the client registry (owned by another service)

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};

use crate::db::{collections, MongoDb};
use crate::error::DriveResult;
use crate::models::ClientProfile;

#[async_trait]
pub trait ClientRegistry: Send + Sync {
    async fn get(&self, client_id: &ObjectId) -> DriveResult<Option<ClientProfile>>;

    /// Every known client across all tenants
    async fn list_all(&self) -> DriveResult<Vec<ClientProfile>>;
}

pub struct MongoClientRegistry {
    db: MongoDb,
}

impl MongoClientRegistry {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    fn clients(&self) -> mongodb::Collection<ClientProfile> {
        self.db.collection(collections::CLIENTS)
    }
}

#[async_trait]
impl ClientRegistry for MongoClientRegistry {
    async fn get(&self, client_id: &ObjectId) -> DriveResult<Option<ClientProfile>> {
        Ok(self.clients().find_one(doc! { "_id": *client_id }, None).await?)
    }

    async fn list_all(&self) -> DriveResult<Vec<ClientProfile>> {
        let cursor = self.clients().find(doc! {}, None).await?;
        Ok(cursor.try_collect().await?)
    }
}

/// Registry held in memory; clients are added with [`MemoryClientRegistry::insert`]
#[derive(Default)]
pub struct MemoryClientRegistry {
    clients: RwLock<HashMap<ObjectId, ClientProfile>>,
}

impl MemoryClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, client: ClientProfile) {
        if let Ok(mut clients) = self.clients.write() {
            clients.insert(client.id, client);
        }
    }
}

#[async_trait]
impl ClientRegistry for MemoryClientRegistry {
    async fn get(&self, client_id: &ObjectId) -> DriveResult<Option<ClientProfile>> {
        Ok(self
            .clients
            .read()
            .ok()
            .and_then(|clients| clients.get(client_id).cloned()))
    }

    async fn list_all(&self) -> DriveResult<Vec<ClientProfile>> {
        let mut clients: Vec<ClientProfile> = self
            .clients
            .read()
            .map(|clients| clients.values().cloned().collect())
            .unwrap_or_default();
        clients.sort_by_key(|c| c.id);
        Ok(clients)
    }
}
