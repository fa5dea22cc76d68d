//! Storage adapter: the single storage dependency handed to the pipeline.
//!
//! - `upload` never fails. If the backend is unreachable or unconfigured it
//!   returns a [`StorageRef::Placeholder`] so ingestion is not blocked.
//! - `fetch` surfaces every failure; a placeholder cannot be fetched.
//! - `unpin` is best-effort and never escalates.

use std::sync::Arc;

use scribe_types::{ContentHash, StorageRef};
use tracing::{debug, warn};

use crate::backend::StorageBackend;
use crate::{Result, StorageError};

#[derive(Clone)]
pub struct StorageAdapter {
    backend: Arc<dyn StorageBackend>,
}

impl StorageAdapter {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Pin `bytes`, degrading to a placeholder derived from `content_hash`.
    pub async fn upload(&self, bytes: &[u8], name: &str, content_hash: &ContentHash) -> StorageRef {
        match self.backend.upload(bytes, name).await {
            Ok(cid) => {
                debug!(backend = self.backend.name(), cid = %cid, "upload complete");
                StorageRef::Pinned(cid)
            }
            Err(e) => {
                let placeholder = StorageRef::placeholder_for(content_hash);
                warn!(
                    backend = self.backend.name(),
                    content_hash = %content_hash.short(),
                    placeholder = %placeholder,
                    error = %e,
                    "storage upload failed, issuing placeholder reference"
                );
                placeholder
            }
        }
    }

    pub async fn fetch(&self, storage_ref: &StorageRef) -> Result<Vec<u8>> {
        match storage_ref {
            StorageRef::Pinned(cid) => self.backend.fetch(cid).await,
            StorageRef::Placeholder(_) => Err(StorageError::Placeholder(storage_ref.to_string())),
        }
    }

    pub async fn unpin(&self, storage_ref: &StorageRef) {
        let Some(cid) = storage_ref.cid() else {
            return;
        };
        if let Err(e) = self.backend.unpin(cid).await {
            warn!(backend = self.backend.name(), cid, error = %e, "unpin failed, ignoring");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DisabledBackend;
    use crate::simulated::SimulatedBackend;

    fn hash() -> ContentHash {
        scribe_crypto::content_hash::digest(b"payload")
    }

    #[tokio::test]
    async fn test_upload_pins_when_online() {
        let backend = Arc::new(SimulatedBackend::new());
        let adapter = StorageAdapter::new(backend.clone());

        let r = adapter.upload(b"payload", "p.txt", &hash()).await;
        assert!(!r.is_placeholder());
        assert_eq!(adapter.fetch(&r).await.expect("fetch"), b"payload");
    }

    #[tokio::test]
    async fn test_upload_degrades_when_unconfigured() {
        let adapter = StorageAdapter::new(Arc::new(DisabledBackend));
        let r = adapter.upload(b"payload", "p.txt", &hash()).await;
        assert!(r.is_placeholder());
        assert_eq!(r, StorageRef::placeholder_for(&hash()));
    }

    #[tokio::test]
    async fn test_upload_degrades_when_offline() {
        let backend = Arc::new(SimulatedBackend::new());
        backend.set_offline(true);
        let adapter = StorageAdapter::new(backend);
        assert!(adapter.upload(b"payload", "p.txt", &hash()).await.is_placeholder());
    }

    #[tokio::test]
    async fn test_fetch_placeholder_is_error() {
        let backend = Arc::new(SimulatedBackend::new());
        let adapter = StorageAdapter::new(backend.clone());
        let placeholder = StorageRef::placeholder_for(&hash());
        assert!(matches!(
            adapter.fetch(&placeholder).await,
            Err(StorageError::Placeholder(_))
        ));
        assert_eq!(backend.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_unpin_swallows_errors_and_skips_placeholders() {
        let backend = Arc::new(SimulatedBackend::new());
        let adapter = StorageAdapter::new(backend.clone());

        adapter.unpin(&StorageRef::placeholder_for(&hash())).await;
        assert_eq!(backend.unpin_calls(), 0);

        // Not pinned: backend errors, adapter swallows.
        adapter.unpin(&StorageRef::Pinned("sim-missing".to_string())).await;
        assert_eq!(backend.unpin_calls(), 1);
    }
}
