//! S3-compatible backend (MinIO in production, any S3 API in principle)

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::StreamExt;
use tokio_util::io::ReaderStream;

use super::{public_read_policy, ObjectDownload, ObjectMetadata, ObjectStorage};
use crate::error::{DriveError, DriveResult};

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

pub struct S3Storage {
    client: Client,
    /// Buckets already provisioned by this process
    provisioned: RwLock<HashSet<String>>,
}

fn unavailable(op: &str, err: impl std::error::Error) -> DriveError {
    DriveError::StorageUnavailable(format!("{}: {}", op, DisplayErrorContext(err)))
}

impl S3Storage {
    pub fn new(settings: &S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "cadrive-static",
        );
        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(settings.endpoint.clone())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
            provisioned: RwLock::new(HashSet::new()),
        }
    }

    fn is_provisioned(&self, bucket: &str) -> bool {
        self.provisioned
            .read()
            .map(|set| set.contains(bucket))
            .unwrap_or(false)
    }

    fn mark_provisioned(&self, bucket: &str) {
        if let Ok(mut set) = self.provisioned.write() {
            set.insert(bucket.to_string());
        }
    }

    async fn bucket_exists(&self, bucket: &str) -> DriveResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.as_service_error().map(|e| e.is_not_found()).unwrap_or(false) {
                    Ok(false)
                } else {
                    Err(unavailable("head bucket", err))
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn ensure_bucket(&self, bucket: &str) -> DriveResult<()> {
        if self.is_provisioned(bucket) {
            return Ok(());
        }

        if !self.bucket_exists(bucket).await? {
            if let Err(err) = self.client.create_bucket().bucket(bucket).send().await {
                let owned = err
                    .as_service_error()
                    .map(|e| e.is_bucket_already_owned_by_you())
                    .unwrap_or(false);
                if !owned {
                    return Err(unavailable("create bucket", err));
                }
            }
            tracing::info!("Created bucket {}", bucket);
        }

        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(public_read_policy(bucket))
            .send()
            .await
            .map_err(|e| unavailable("put bucket policy", e))?;

        self.mark_provisioned(bucket);
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        metadata: &ObjectMetadata,
    ) -> DriveResult<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(data.len() as i64)
            .body(ByteStream::from(data));
        if !metadata.content_type.is_empty() {
            request = request.content_type(metadata.content_type.clone());
        }
        if let Some(name) = &metadata.original_name {
            request = request.metadata("original-name", name.clone());
        }

        request
            .send()
            .await
            .map_err(|e| unavailable("put object", e))?;
        Ok(())
    }

    async fn get_object_stream(&self, bucket: &str, key: &str) -> DriveResult<ObjectDownload> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) => {
                if err.as_service_error().map(|e| e.is_no_such_key()).unwrap_or(false) {
                    return Err(DriveError::not_found("object", key));
                }
                return Err(unavailable("get object", err));
            }
        };

        let content_type = output.content_type().map(str::to_string);
        let content_length = output.content_length();
        let stream = ReaderStream::new(output.body.into_async_read()).boxed();

        Ok(ObjectDownload {
            stream,
            content_type,
            content_length,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> DriveResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| unavailable("delete object", e))?;
        Ok(())
    }

    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> DriveResult<u64> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| unavailable("list objects", e))?;

            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match page.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        let mut deleted = 0u64;
        for key in keys {
            self.delete_object(bucket, &key).await?;
            deleted += 1;
        }
        Ok(deleted)
    }
}
