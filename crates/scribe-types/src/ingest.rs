//! Ingestion request and receipt (the boundary with the request layer).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::{AnchorStatus, Category};
use crate::{AnchorId, ContentHash, DocumentId, StorageRef};

/// Everything the request layer hands to the pipeline for one upload.
#[derive(Clone)]
pub struct IngestRequest {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub encrypt_requested: bool,
    pub anonymize: bool,
    pub author_identity: String,
}

impl fmt::Debug for IngestRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestRequest")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("title", &self.title)
            .field("category", &self.category)
            .field("encrypt_requested", &self.encrypt_requested)
            .field("anonymize", &self.anonymize)
            .finish_non_exhaustive()
    }
}

/// What the caller gets back once ingestion reached `pending` (or stopped earlier).
#[derive(Clone, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub document_id: DocumentId,
    pub content_hash: ContentHash,
    pub storage_ref: StorageRef,
    pub anchor_id: Option<AnchorId>,
    pub anchor_status: AnchorStatus,
    /// Hex key, returned exactly once when the uploader holds custody.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decryption_key: Option<String>,
}

impl fmt::Debug for IngestReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestReceipt")
            .field("document_id", &self.document_id)
            .field("content_hash", &self.content_hash)
            .field("storage_ref", &self.storage_ref)
            .field("anchor_id", &self.anchor_id)
            .field("anchor_status", &self.anchor_status)
            .field(
                "decryption_key",
                &self.decryption_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
