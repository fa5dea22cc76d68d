//! The storage backend seam.

use async_trait::async_trait;

use crate::{Result, StorageError};

/// A content-addressed blob store.
///
/// Identical bytes uploaded twice may or may not yield the same identifier;
/// deduplication is keyed on the content hash upstream, not on identifiers.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Pin `bytes` under a display `name`, returning the content identifier.
    async fn upload(&self, bytes: &[u8], name: &str) -> Result<String>;

    /// Retrieve the blob pinned under `cid`.
    async fn fetch(&self, cid: &str) -> Result<Vec<u8>>;

    /// Release the pin on `cid`.
    async fn unpin(&self, cid: &str) -> Result<()>;
}

/// Backend used when no storage network is configured. Every call fails
/// with [`StorageError::Unconfigured`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBackend;

#[async_trait]
impl StorageBackend for DisabledBackend {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn upload(&self, _bytes: &[u8], _name: &str) -> Result<String> {
        Err(StorageError::Unconfigured)
    }

    async fn fetch(&self, _cid: &str) -> Result<Vec<u8>> {
        Err(StorageError::Unconfigured)
    }

    async fn unpin(&self, _cid: &str) -> Result<()> {
        Err(StorageError::Unconfigured)
    }
}
