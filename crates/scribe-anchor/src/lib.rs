//! # scribe-anchor
//!
//! Everything that faces the external anchoring service.
//!
//! ## Modules
//!
//! - [`envelope`]: Metadata envelope, bootstrap descriptor and inscription content builders.
//! - [`stitch`]: Deterministic splitting of oversized payloads into linked units.
//! - [`client`]: The [`AnchorService`](client::AnchorService) seam and its wire types.
//! - [`remote`]: HTTP client for the inscription service.
//! - [`simulated`]: Scriptable in-memory service for development and tests.

pub mod client;
pub mod envelope;
pub mod remote;
pub mod simulated;
pub mod stitch;

pub use client::{AnchorService, RemoteStatus, StatusReport};

/// Error types for anchoring operations.
#[derive(Debug, thiserror::Error)]
pub enum AnchorError {
    /// No bearer token was configured for the remote service.
    #[error("anchoring service is not configured")]
    Unconfigured,

    /// Submission could not reach the service (connect error, timeout, 5xx).
    #[error("anchoring service unavailable: {0}")]
    Unavailable(String),

    /// The service refused the request outright.
    #[error("anchoring service rejected request: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The service answered with a body we could not interpret.
    #[error("malformed anchoring response: {0}")]
    Malformed(String),

    /// A single status query failed. The reconciler consumes these.
    #[error("status query failed: {0}")]
    PollingTransient(String),

    /// Stitch units were missing, out of order, or failed link verification.
    #[error("stitch error: {0}")]
    Stitch(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// HTTP client construction failed.
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Convenience result type for anchoring operations.
pub type Result<T> = std::result::Result<T, AnchorError>;
