//! Object storage adapter.
//!
//! One bucket per tenant, objects keyed under `client_<id>/`. Buckets are
//! public-read so resolved URLs are directly fetchable.

mod memory;
mod s3;

pub use memory::MemoryStorage;
pub use s3::{S3Settings, S3Storage};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use mongodb::bson::oid::ObjectId;

use crate::error::DriveResult;
use crate::models::Category;

/// Byte stream of a stored object
pub type ObjectStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Metadata sent with an object write
#[derive(Debug, Clone, Default)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub original_name: Option<String>,
}

/// An object opened for streaming download
pub struct ObjectDownload {
    pub stream: ObjectStream,
    pub content_type: Option<String>,
    pub content_length: Option<i64>,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Create the bucket if absent and apply the public-read policy.
    /// Calling it for an existing bucket is a no-op apart from the policy.
    async fn ensure_bucket(&self, bucket: &str) -> DriveResult<()>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        metadata: &ObjectMetadata,
    ) -> DriveResult<()>;

    /// `NotFound` when the key does not exist
    async fn get_object_stream(&self, bucket: &str, key: &str) -> DriveResult<ObjectDownload>;

    /// Deleting a missing key succeeds
    async fn delete_object(&self, bucket: &str, key: &str) -> DriveResult<()>;

    /// Delete every key starting with `prefix`; returns the number deleted
    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> DriveResult<u64>;
}

/// Bucket of a tenant: `<prefix><tenant id>`, lowercased for S3 naming rules
pub fn bucket_name(prefix: &str, tenant_id: &ObjectId) -> String {
    format!("{}{}", prefix, tenant_id.to_hex()).to_lowercase()
}

/// Key prefix holding everything a client owns
pub fn client_prefix(client_id: &ObjectId) -> String {
    format!("client_{}/", client_id.to_hex())
}

/// `client_<id>/<category>/<timestamp>-<filename>`
pub fn object_key(client_id: &ObjectId, category: Category, timestamp_ms: i64, file_name: &str) -> String {
    let safe_name = file_name.replace(['/', '\\'], "_");
    format!(
        "{}{}/{}-{}",
        client_prefix(client_id),
        category.key_segment(),
        timestamp_ms,
        safe_name
    )
}

/// Builds public URLs from stored keys at read time
#[derive(Debug, Clone)]
pub struct ObjectUrlResolver {
    endpoint: String,
}

impl ObjectUrlResolver {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Absolute `http(s)://` keys are returned untouched
    pub fn resolve(&self, bucket: &str, key: &str) -> String {
        if key.starts_with("http://") || key.starts_with("https://") {
            return key.to_string();
        }
        format!("{}/{}/{}", self.endpoint, bucket, key.trim_start_matches('/'))
    }
}

/// Anonymous `s3:GetObject` on every object in the bucket
pub fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "AWS": ["*"] },
            "Action": ["s3:GetObject"],
            "Resource": [format!("arn:aws:s3:::{}/*", bucket)],
        }]
    })
    .to_string()
}
