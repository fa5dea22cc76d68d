//! In-memory storage backend.
//!
//! Selected explicitly by configuration for development, and used as the
//! test double throughout the workspace. Identifiers are `sim-` followed by a
//! prefix of the blob's SHA-256, so they are deterministic per content.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::StorageBackend;
use crate::{Result, StorageError};

/// Identifier prefix for simulated pins.
pub const SIMULATED_CID_PREFIX: &str = "sim-";

#[derive(Default)]
pub struct SimulatedBackend {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    offline: AtomicBool,
    uploads: AtomicUsize,
    fetches: AtomicUsize,
    unpins: AtomicUsize,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the network were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn upload_calls(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn unpin_calls(&self) -> usize {
        self.unpins.load(Ordering::SeqCst)
    }

    /// Total calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.upload_calls() + self.fetch_calls() + self.unpin_calls()
    }

    /// Whether a blob is currently pinned under `cid`.
    pub fn is_pinned(&self, cid: &str) -> bool {
        self.blobs
            .lock()
            .map(|blobs| blobs.contains_key(cid))
            .unwrap_or(false)
    }

    /// Overwrite a pinned blob in place (tamper simulation).
    pub fn corrupt(&self, cid: &str, bytes: Vec<u8>) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(cid.to_string(), bytes);
        }
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("simulated network offline".to_string()))
        } else {
            Ok(())
        }
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("simulated store lock poisoned".to_string())
}

#[async_trait]
impl StorageBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn upload(&self, bytes: &[u8], _name: &str) -> Result<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let digest = scribe_crypto::content_hash::digest(bytes);
        let cid = format!("{SIMULATED_CID_PREFIX}{}", &digest.as_str()[..32]);
        self.blobs
            .lock()
            .map_err(|_| poisoned())?
            .insert(cid.clone(), bytes.to_vec());
        Ok(cid)
    }

    async fn fetch(&self, cid: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        self.blobs
            .lock()
            .map_err(|_| poisoned())?
            .get(cid)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(cid.to_string()))
    }

    async fn unpin(&self, cid: &str) -> Result<()> {
        self.unpins.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        self.blobs
            .lock()
            .map_err(|_| poisoned())?
            .remove(cid)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(cid.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_fetch_unpin() {
        let backend = SimulatedBackend::new();
        let cid = backend.upload(b"blob", "a.bin").await.expect("upload");
        assert!(cid.starts_with(SIMULATED_CID_PREFIX));
        assert!(backend.is_pinned(&cid));

        assert_eq!(backend.fetch(&cid).await.expect("fetch"), b"blob");
        backend.unpin(&cid).await.expect("unpin");
        assert!(!backend.is_pinned(&cid));
        assert!(matches!(
            backend.fetch(&cid).await,
            Err(StorageError::NotFound(_))
        ));
        assert_eq!(backend.total_calls(), 4);
    }

    #[tokio::test]
    async fn test_same_bytes_same_cid() {
        let backend = SimulatedBackend::new();
        let a = backend.upload(b"same", "a").await.expect("upload");
        let b = backend.upload(b"same", "b").await.expect("upload");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_offline() {
        let backend = SimulatedBackend::new();
        backend.set_offline(true);
        assert!(matches!(
            backend.upload(b"x", "x").await,
            Err(StorageError::Unavailable(_))
        ));
        assert_eq!(backend.upload_calls(), 1);
    }
}
