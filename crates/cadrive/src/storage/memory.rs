use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use super::{ObjectDownload, ObjectMetadata, ObjectStorage};
use crate::error::{DriveError, DriveResult};

#[derive(Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

/// In-memory object storage for development and tests
#[derive(Default)]
pub struct MemoryStorage {
    buckets: Mutex<HashSet<String>>,
    objects: Mutex<HashMap<String, BTreeMap<String, StoredObject>>>,
    policies: Mutex<HashMap<String, String>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make object writes and bucket provisioning fail
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make object and prefix deletes fail
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn bucket_exists(&self, bucket: &str) -> bool {
        lock(&self.buckets).contains(bucket)
    }

    pub fn object_exists(&self, bucket: &str, key: &str) -> bool {
        lock(&self.objects)
            .get(bucket)
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false)
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        lock(&self.objects).get(bucket).map(BTreeMap::len).unwrap_or(0)
    }

    pub fn bucket_policy(&self, bucket: &str) -> Option<String> {
        lock(&self.policies).get(bucket).cloned()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn ensure_bucket(&self, bucket: &str) -> DriveResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(DriveError::StorageUnavailable("simulated outage".into()));
        }
        lock(&self.buckets).insert(bucket.to_string());
        lock(&self.policies).insert(bucket.to_string(), super::public_read_policy(bucket));
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        metadata: &ObjectMetadata,
    ) -> DriveResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(DriveError::StorageUnavailable("simulated outage".into()));
        }
        if !self.bucket_exists(bucket) {
            return Err(DriveError::StorageUnavailable(format!("no such bucket: {}", bucket)));
        }
        lock(&self.objects).entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: metadata.content_type.clone(),
            },
        );
        Ok(())
    }

    async fn get_object_stream(&self, bucket: &str, key: &str) -> DriveResult<ObjectDownload> {
        let object = lock(&self.objects)
            .get(bucket)
            .and_then(|objects| objects.get(key).cloned())
            .ok_or_else(|| DriveError::not_found("object", key))?;

        let length = object.data.len() as i64;
        let stream = futures::stream::iter(vec![Ok::<_, std::io::Error>(object.data)]).boxed();
        Ok(ObjectDownload {
            stream,
            content_type: Some(object.content_type),
            content_length: Some(length),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> DriveResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(DriveError::StorageUnavailable("simulated outage".into()));
        }
        if let Some(objects) = lock(&self.objects).get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> DriveResult<u64> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(DriveError::StorageUnavailable("simulated outage".into()));
        }
        let mut objects = lock(&self.objects);
        let Some(bucket_objects) = objects.get_mut(bucket) else {
            return Ok(0);
        };
        let before = bucket_objects.len();
        bucket_objects.retain(|key, _| !key.starts_with(prefix));
        Ok((before - bucket_objects.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_requires_bucket() {
        let storage = MemoryStorage::new();
        let meta = ObjectMetadata::default();
        let err = storage
            .put_object("ca-t", "k", Bytes::from_static(b"x"), &meta)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "STORAGE_UNAVAILABLE");

        storage.ensure_bucket("ca-t").await.unwrap();
        storage
            .put_object("ca-t", "k", Bytes::from_static(b"x"), &meta)
            .await
            .unwrap();
        assert!(storage.object_exists("ca-t", "k"));
        assert!(storage.bucket_policy("ca-t").is_some());
    }

    #[tokio::test]
    async fn test_delete_prefix_only_touches_prefix() {
        let storage = MemoryStorage::new();
        let meta = ObjectMetadata::default();
        storage.ensure_bucket("b").await.unwrap();
        for key in ["client_a/", "client_a/itr/1-x.pdf", "client_b/itr/1-y.pdf"] {
            storage
                .put_object("b", key, Bytes::new(), &meta)
                .await
                .unwrap();
        }

        assert_eq!(storage.delete_prefix("b", "client_a/").await.unwrap(), 2);
        assert_eq!(storage.object_count("b"), 1);
        assert_eq!(storage.delete_prefix("missing", "client_a/").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stream_yields_content() {
        let storage = MemoryStorage::new();
        storage.ensure_bucket("b").await.unwrap();
        let meta = ObjectMetadata {
            content_type: "text/plain".into(),
            original_name: None,
        };
        storage
            .put_object("b", "k", Bytes::from_static(b"hello"), &meta)
            .await
            .unwrap();

        let download = storage.get_object_stream("b", "k").await.unwrap();
        let chunks: Vec<_> = download.stream.collect().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap(), &Bytes::from_static(b"hello"));
        assert_eq!(download.content_type.as_deref(), Some("text/plain"));

        let missing = storage.get_object_stream("b", "nope").await;
        assert!(matches!(missing, Err(e) if e.is_not_found()));
    }
}
