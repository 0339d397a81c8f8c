//! MongoDB database connection and configuration

use mongodb::bson::doc;
use mongodb::{options::ClientOptions, options::IndexOptions, Client, Database, IndexModel};

/// Collection names
pub mod collections {
    pub const FOLDERS: &str = "folders";
    pub const DOCUMENTS: &str = "documents";
    /// Owned by the client registry; read-only here
    pub const CLIENTS: &str = "clients";
}

/// MongoDB database wrapper
#[derive(Clone)]
pub struct MongoDb {
    #[allow(dead_code)]
    client: Client,
    db: Database,
}

impl MongoDb {
    /// Connect to MongoDB
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;
        let db = client.database(db_name);

        // Test connection
        db.run_command(doc! { "ping": 1 }, None).await?;
        tracing::info!("Connected to MongoDB: {}", db_name);

        let instance = Self { client, db };

        instance.ensure_indexes().await?;

        Ok(instance)
    }

    /// Get collection
    pub fn collection<T>(&self, name: &str) -> mongodb::Collection<T> {
        self.db.collection(name)
    }

    /// Ping the database to check connection
    pub async fn ping(&self) -> anyhow::Result<()> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }

    /// Ensure all required indexes exist
    pub async fn ensure_indexes(&self) -> anyhow::Result<()> {
        tracing::info!("Ensuring MongoDB indexes...");

        self.create_indexes(
            collections::FOLDERS,
            vec![
                IndexModel::builder()
                    .keys(doc! { "client_id": 1, "parent_folder_id": 1 })
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "client_id": 1, "deletion.is_deleted": 1 })
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "deletion.is_deleted": 1, "deletion.deleted_at": 1 })
                    .build(),
                // One active folder per (client, parent, name). Concurrent
                // generation of the same node fails here instead of duplicating.
                IndexModel::builder()
                    .keys(doc! { "client_id": 1, "parent_folder_id": 1, "name": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("uniq_active_sibling_name".to_string())
                            .unique(true)
                            .partial_filter_expression(doc! { "deletion.is_deleted": false })
                            .build(),
                    )
                    .build(),
            ],
        )
        .await?;

        self.create_indexes(
            collections::DOCUMENTS,
            vec![
                IndexModel::builder().keys(doc! { "client_id": 1 }).build(),
                IndexModel::builder()
                    .keys(doc! { "folder_id": 1, "deletion.is_deleted": 1 })
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "client_id": 1, "deletion.is_deleted": 1 })
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "deletion.is_deleted": 1, "deletion.deleted_at": 1 })
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "created_at": -1 })
                    .build(),
            ],
        )
        .await?;

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }

    async fn create_indexes(&self, collection: &str, indexes: Vec<IndexModel>) -> anyhow::Result<()> {
        let coll = self.db.collection::<mongodb::bson::Document>(collection);
        coll.create_indexes(indexes, None).await?;
        Ok(())
    }
}
