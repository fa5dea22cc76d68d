//! Metadata envelope and bootstrap descriptor shapes.
//!
//! Both are serialized with camelCase keys because they are embedded verbatim
//! in the inscription payload read by third-party tooling.

use serde::{Deserialize, Serialize};

use crate::document::Category;
use crate::{ContentHash, DocumentId};

/// Versioned, self-describing record of a document's descriptive fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEnvelope {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub tags: Vec<String>,
    /// Uploader identity, or `"Anonymous"`.
    pub author: String,
    /// RFC 3339, millisecond precision, UTC.
    pub created_at: String,
    pub encrypted: bool,
    pub content_hash: ContentHash,
    pub file_size: u64,
    pub mime_type: String,
    pub schema_version: String,
}

/// Lets a reader locate and reassemble a payload split across anchor units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapDescriptor {
    pub mode: u8,
    pub document_id: DocumentId,
    pub encrypted: bool,
}

/// Descriptive inputs to the envelope builder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeFields {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub author_identity: String,
    pub anonymous: bool,
    /// Unix seconds.
    pub created_at: u64,
    pub encrypted: bool,
    pub content_hash: ContentHash,
    pub file_size: u64,
    pub mime_type: String,
}
