//! # scribe-pipeline
//!
//! Takes one file from "uploaded" to "durably anchored or definitively
//! failed".
//!
//! ## Modules
//!
//! - [`policy`]: Ingestion policy checks, run before any side effect.
//! - [`custody`]: Where decryption keys go after sealing.
//! - [`ingest`]: The [`Pipeline`](ingest::Pipeline) orchestrator.
//! - [`submit`]: Packaging and submission to the anchoring service.
//! - [`reconcile`]: Bounded status polling, one task per anchor.
//! - [`events`]: Broadcast bus for lifecycle events.

pub mod custody;
pub mod events;
pub mod ingest;
pub mod policy;
pub mod reconcile;
pub mod submit;

pub use ingest::{Pipeline, PipelineConfig};

use scribe_db::DbError;
use scribe_types::ingest::IngestReceipt;
use scribe_types::DocumentId;

/// Shared handle to a SQLite connection.
pub type SharedConnection = std::sync::Arc<tokio::sync::Mutex<rusqlite::Connection>>;

/// Pipeline error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A document with identical content already exists. Nothing was done.
    #[error("duplicate content: {content_hash} already stored as {existing}")]
    DuplicateContent {
        content_hash: String,
        existing: String,
    },

    #[error("encryption failure: {0}")]
    EncryptionFailure(String),

    /// Fetch from the storage backend failed, or the reference is a placeholder.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Submission failed; the document (if any) stays `unsubmitted`.
    /// During ingestion the receipt is attached so a client-held key is not lost.
    #[error("anchoring unavailable: {reason}")]
    AnchoringUnavailable {
        document_id: Option<DocumentId>,
        reason: String,
        receipt: Option<Box<IngestReceipt>>,
    },

    /// The document was recorded but a later ingestion step failed for a
    /// reason other than the anchoring service. The receipt is attached so a
    /// client-held key is not lost; the document stays `unsubmitted`.
    #[error("ingest incomplete for document {document_id}: {reason}")]
    IngestIncomplete {
        document_id: DocumentId,
        reason: String,
        receipt: Box<IngestReceipt>,
    },

    /// Authentication tag did not verify.
    #[error("ciphertext tampered or wrong key")]
    TamperedOrWrongKey,

    /// The document is encrypted and no key was supplied or vaulted.
    #[error("decryption key required for document {0}")]
    KeyRequired(DocumentId),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// Retrieved plaintext does not match the recorded content hash.
    #[error("integrity mismatch for document {0}")]
    IntegrityMismatch(DocumentId),

    #[error("database error: {0}")]
    Database(DbError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DbError> for PipelineError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => PipelineError::NotFound(what),
            other => PipelineError::Database(other),
        }
    }
}

impl From<scribe_crypto::CryptoError> for PipelineError {
    fn from(e: scribe_crypto::CryptoError) -> Self {
        match e {
            scribe_crypto::CryptoError::TamperedOrWrongKey => PipelineError::TamperedOrWrongKey,
            scribe_crypto::CryptoError::Encryption(msg) => PipelineError::EncryptionFailure(msg),
        }
    }
}

/// Convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
