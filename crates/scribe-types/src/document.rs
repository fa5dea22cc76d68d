//! The Document record and its anchoring lifecycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::envelope::MetadataEnvelope;
use crate::{AnchorId, ContentHash, DocumentId, ParseError, StorageRef};

/// Anchoring lifecycle of a document.
///
/// Moves only forward: `Unsubmitted -> Pending -> {Confirmed | Failed}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorStatus {
    Unsubmitted,
    Pending,
    Confirmed,
    Failed,
}

impl AnchorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsubmitted => "unsubmitted",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    /// Whether `self -> next` is a legal forward step.
    pub fn can_transition_to(&self, next: AnchorStatus) -> bool {
        matches!(
            (self, next),
            (Self::Unsubmitted, Self::Pending)
                | (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Failed)
        )
    }
}

impl fmt::Display for AnchorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnchorStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unsubmitted" => Ok(Self::Unsubmitted),
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            other => Err(ParseError::AnchorStatus(other.to_string())),
        }
    }
}

/// Document category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Journalism,
    Activism,
    Whistleblowing,
    Research,
    Legal,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::Journalism,
        Self::Activism,
        Self::Whistleblowing,
        Self::Research,
        Self::Legal,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Journalism => "journalism",
            Self::Activism => "activism",
            Self::Whistleblowing => "whistleblowing",
            Self::Research => "research",
            Self::Legal => "legal",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseError::Category(s.to_string()))
    }
}

/// Non-secret cipher parameters persisted with an encrypted document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherParams {
    /// Hex-encoded 96-bit nonce.
    pub iv: String,
    /// Hex-encoded 128-bit authentication tag.
    pub auth_tag: String,
}

/// Full key/IV/tag triple needed to open a sealed blob.
///
/// The key never lives in the documents table; it is either handed back to
/// the uploader or kept in the separate key vault.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionMaterial {
    /// Hex-encoded 256-bit key.
    pub key: String,
    pub iv: String,
    pub auth_tag: String,
}

impl EncryptionMaterial {
    /// The parts of the triple that are safe to persist next to the blob reference.
    pub fn params(&self) -> CipherParams {
        CipherParams {
            iv: self.iv.clone(),
            auth_tag: self.auth_tag.clone(),
        }
    }

    /// Recombine persisted parameters with an out-of-band key.
    pub fn from_parts(key: impl Into<String>, params: &CipherParams) -> Self {
        Self {
            key: key.into(),
            iv: params.iv.clone(),
            auth_tag: params.auth_tag.clone(),
        }
    }
}

impl fmt::Debug for EncryptionMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionMaterial")
            .field("key", &"<redacted>")
            .field("iv", &self.iv)
            .field("auth_tag", &self.auth_tag)
            .finish()
    }
}

/// The unit of work: one ingested file and its anchoring state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub author_identity: String,
    pub anonymous: bool,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    /// Digest of the original bytes. Unique across all documents.
    pub content_hash: ContentHash,
    pub storage_ref: Option<StorageRef>,
    /// Present only when encryption was requested.
    pub encryption: Option<CipherParams>,
    pub anchor_id: Option<AnchorId>,
    pub anchor_status: AnchorStatus,
    /// Populated only once confirmed.
    pub txid: Option<String>,
    pub anchor_height: Option<u64>,
    pub metadata_envelope: MetadataEnvelope,
    /// Unix seconds.
    pub created_at: u64,
    /// Set when a reconciler ran out of attempts while the anchor was still pending.
    pub reconcile_exhausted_at: Option<u64>,
}

impl Document {
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }
}
