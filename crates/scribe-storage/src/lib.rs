//! # scribe-storage
//!
//! Pinning of opaque blobs to a content-addressed storage network.
//!
//! ## Modules
//!
//! - [`backend`]: The [`StorageBackend`](backend::StorageBackend) seam and the disabled backend.
//! - [`pinning`]: HTTP client for a pinning service plus IPFS gateway reads.
//! - [`simulated`]: In-memory backend for development and tests.
//! - [`adapter`]: [`StorageAdapter`](adapter::StorageAdapter): placeholder degradation and best-effort unpin.

pub mod adapter;
pub mod backend;
pub mod pinning;
pub mod simulated;

pub use adapter::StorageAdapter;
pub use backend::StorageBackend;

/// Error types for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No backend credentials were configured.
    #[error("storage backend is not configured")]
    Unconfigured,

    /// The backend could not be reached (connect error, timeout).
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with a non-success status.
    #[error("storage backend rejected request: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The backend answered with a body we could not interpret.
    #[error("malformed storage response: {0}")]
    Malformed(String),

    /// No blob is pinned under this identifier.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The reference is a placeholder; there is nothing to fetch.
    #[error("reference is a placeholder, content was never pinned: {0}")]
    Placeholder(String),

    /// HTTP client construction failed.
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Convenience result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
