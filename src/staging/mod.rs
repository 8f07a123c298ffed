//! Durable staging of chunk payloads.
//!
//! Some providers require a fetchable reference instead of inline bytes.
//! The staging store uploads a chunk to a blob store keyed by content hash,
//! so identical bytes are never uploaded twice — retries of the same chunk
//! reuse the existing object.

use crate::defaults;
use crate::error::{LongscribeError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Backing blob storage, addressed by key.
pub trait BlobStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;
    fn contains(&self, key: &str) -> Result<bool>;
    fn url(&self, key: &str) -> Result<String>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// A staged chunk payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedObject {
    /// Storage key, derived from the content hash.
    pub key: String,
    /// Payload size in bytes.
    pub size: u64,
    /// SHA-256 of the payload, lowercase hex.
    pub content_hash: String,
    /// How long the object is guaranteed to stay fetchable.
    pub ttl: Duration,
}

/// Content-addressed staging over a `BlobStore`.
pub struct StagingStore {
    store: Arc<dyn BlobStore>,
    ttl: Duration,
}

impl StagingStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            ttl: Duration::from_secs(defaults::STAGING_TTL_SECS),
        }
    }

    /// Sets the time-to-live recorded on staged objects.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Stages a payload, skipping the upload when identical bytes are
    /// already present.
    pub fn put(&self, bytes: &[u8]) -> Result<StagedObject> {
        let content_hash = content_hash(bytes);
        let key = format!("{}.wav", content_hash);

        if !self.store.contains(&key)? {
            self.store.put(&key, bytes)?;
        }

        Ok(StagedObject {
            key,
            size: bytes.len() as u64,
            content_hash,
            ttl: self.ttl,
        })
    }

    /// Returns a fetchable reference to a staged object.
    pub fn url(&self, object: &StagedObject) -> Result<String> {
        self.store.url(&object.key)
    }

    pub fn delete(&self, object: &StagedObject) -> Result<()> {
        self.store.delete(&object.key)
    }
}

/// SHA-256 of a payload as lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Filesystem-backed blob store with `file://` URLs.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root).map_err(|e| LongscribeError::Staging {
            message: format!("cannot create staging dir {}: {}", root.display(), e),
        })?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl BlobStore for LocalBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        std::fs::write(self.path_for(key), bytes).map_err(|e| LongscribeError::Staging {
            message: format!("write {} failed: {}", key, e),
        })
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.path_for(key).exists())
    }

    fn url(&self, key: &str) -> Result<String> {
        Ok(format!("file://{}", self.path_for(key).display()))
    }

    fn delete(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            // Already gone (e.g. TTL cleanup raced us) — nothing to do
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LongscribeError::Staging {
                message: format!("delete {} failed: {}", key, e),
            }),
        }
    }
}

/// In-memory blob store for tests.
///
/// Counts uploads and can be configured to fail the first N puts to
/// exercise the retry path.
#[derive(Default)]
pub struct MockBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    puts: AtomicU32,
    failures_remaining: AtomicU32,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the store to fail the first `n` uploads.
    pub fn failing_puts(self, n: u32) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Number of successful uploads so far.
    pub fn puts(&self) -> u32 {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl BlobStore for MockBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining
                .store(remaining - 1, Ordering::SeqCst);
            return Err(LongscribeError::Staging {
                message: "mock upload failure".to_string(),
            });
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self
            .objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key))
    }

    fn url(&self, key: &str) -> Result<String> {
        Ok(format!("mock://{}", key))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_bytes_stage_once() {
        let store = Arc::new(MockBlobStore::new());
        let staging = StagingStore::new(store.clone());

        let first = staging.put(b"audio bytes").unwrap();
        let second = staging.put(b"audio bytes").unwrap();

        assert_eq!(first.key, second.key);
        assert_eq!(first.content_hash, second.content_hash);
        assert_eq!(store.puts(), 1);
        assert_eq!(store.object_count(), 1);
    }

    #[test]
    fn test_different_bytes_get_different_keys() {
        let store = Arc::new(MockBlobStore::new());
        let staging = StagingStore::new(store.clone());

        let a = staging.put(b"chunk a").unwrap();
        let b = staging.put(b"chunk b").unwrap();

        assert_ne!(a.key, b.key);
        assert_eq!(store.object_count(), 2);
    }

    #[test]
    fn test_staged_object_records_size_and_ttl() {
        let staging = StagingStore::new(Arc::new(MockBlobStore::new()))
            .with_ttl(Duration::from_secs(7200));

        let object = staging.put(b"12345").unwrap();

        assert_eq!(object.size, 5);
        assert_eq!(object.ttl, Duration::from_secs(7200));
        assert!(object.key.ends_with(".wav"));
        assert_eq!(object.content_hash.len(), 64);
    }

    #[test]
    fn test_url_and_delete() {
        let store = Arc::new(MockBlobStore::new());
        let staging = StagingStore::new(store.clone());

        let object = staging.put(b"payload").unwrap();
        let url = staging.url(&object).unwrap();
        assert_eq!(url, format!("mock://{}", object.key));

        staging.delete(&object).unwrap();
        assert_eq!(store.object_count(), 0);
    }

    #[test]
    fn test_failed_upload_is_staging_error() {
        let store = Arc::new(MockBlobStore::new().failing_puts(1));
        let staging = StagingStore::new(store.clone());

        let result = staging.put(b"payload");
        assert!(matches!(result, Err(LongscribeError::Staging { .. })));
        assert!(result.unwrap_err().is_retryable());

        // Next attempt succeeds — the mock only failed once
        staging.put(b"payload").unwrap();
        assert_eq!(store.puts(), 1);
    }

    #[test]
    fn test_local_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalBlobStore::new(dir.path().to_path_buf()).unwrap());
        let staging = StagingStore::new(store.clone());

        let object = staging.put(b"disk payload").unwrap();
        assert!(store.contains(&object.key).unwrap());

        let url = staging.url(&object).unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(&object.key));

        staging.delete(&object).unwrap();
        assert!(!store.contains(&object.key).unwrap());
    }

    #[test]
    fn test_local_store_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().to_path_buf()).unwrap();
        // Deleting a key that was never stored is not an error
        store.delete("missing.wav").unwrap();
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
    }
}
