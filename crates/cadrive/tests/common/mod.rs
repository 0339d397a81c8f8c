#![allow(dead_code)]

use std::sync::Arc;

use cadrive::catalog::MemoryCatalog;
use cadrive::models::{ClientProfile, EntityType, Folder};
use cadrive::registry::MemoryClientRegistry;
use cadrive::routes::AppState;
use cadrive::storage::MemoryStorage;
use cadrive::DriveConfig;
use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;

pub struct TestDrive {
    pub catalog: Arc<MemoryCatalog>,
    pub storage: Arc<MemoryStorage>,
    pub registry: Arc<MemoryClientRegistry>,
    pub state: Arc<AppState>,
}

pub fn setup() -> TestDrive {
    let catalog = Arc::new(MemoryCatalog::new());
    let storage = Arc::new(MemoryStorage::new());
    let registry = Arc::new(MemoryClientRegistry::new());
    let state = Arc::new(AppState::new(
        catalog.clone(),
        storage.clone(),
        registry.clone(),
        DriveConfig::default(),
    ));
    TestDrive {
        catalog,
        storage,
        registry,
        state,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn client(tenant_id: ObjectId, entity_type: EntityType, tan: Option<&str>) -> ClientProfile {
    ClientProfile {
        id: ObjectId::new(),
        tenant_id,
        name: "Sharma & Sons".into(),
        entity_type,
        tan_number: tan.map(str::to_string),
    }
}

impl TestDrive {
    /// Register a client and generate its tree as of `today`
    pub async fn provisioned_client(
        &self,
        entity_type: EntityType,
        tan: Option<&str>,
        today: NaiveDate,
    ) -> ClientProfile {
        let profile = client(ObjectId::new(), entity_type, tan);
        self.registry.insert(profile.clone());
        self.state
            .client_service()
            .provision(&profile, "staff@practice", today)
            .await
            .unwrap();
        profile
    }

    /// Active folder reached by walking names from the root
    pub fn folder_at(&self, client_id: &ObjectId, names: &[&str]) -> Folder {
        let folders = self.catalog.all_folders(client_id);
        let mut parent: Option<ObjectId> = None;
        let mut found = None;
        for name in names {
            let next = folders
                .iter()
                .find(|f| f.parent_folder_id == parent && f.name == *name && !f.deletion.is_deleted)
                .unwrap_or_else(|| panic!("folder {:?} not found", names))
                .clone();
            parent = Some(next.id);
            found = Some(next);
        }
        found.expect("empty path")
    }
}
