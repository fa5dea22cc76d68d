//! # scribe-types
//!
//! Shared domain types used across the scribe workspace: the Document record
//! and its lifecycle status, the metadata envelope, ingestion request/receipt
//! shapes, and daemon events.

pub mod document;
pub mod envelope;
pub mod events;
pub mod ingest;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Document identifier (UUID v4).
pub type DocumentId = uuid::Uuid;

/// Identifier returned by the anchoring service.
pub type AnchorId = String;

/// Length of a hex-encoded SHA-256 digest.
pub const CONTENT_HASH_HEX_LEN: usize = 64;

/// Payloads larger than this are split into linked anchor units (bytes).
pub const STITCH_SPLIT_THRESHOLD: usize = 350_000;

/// Version tag written into every metadata envelope.
pub const ENVELOPE_SCHEMA_VERSION: &str = "1.0.0";

/// Bootstrap descriptor mode understood by stitch-aware readers.
pub const BOOTSTRAP_MODE: u8 = 4;

/// Author shown in place of the uploader when anonymity is requested.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// Error parsing one of the string-encoded domain types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid content hash: {0}")]
    ContentHash(String),

    #[error("unknown anchor status: {0}")]
    AnchorStatus(String),

    #[error("unknown category: {0}")]
    Category(String),

    #[error("invalid storage reference: {0}")]
    StorageRef(String),
}

/// Lowercase hex SHA-256 digest of a document's original (pre-encryption) bytes.
///
/// This is the deduplication key and is assigned exactly once at ingestion.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix used in log lines and placeholder identifiers.
    pub fn short(&self) -> &str {
        &self.0[..16]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == CONTENT_HASH_HEX_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(ParseError::ContentHash(s.to_string()))
        }
    }
}

impl TryFrom<String> for ContentHash {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.0
    }
}

/// Reference to a blob in content-addressed storage.
///
/// A `Placeholder` is issued when the storage network was unreachable or not
/// configured at upload time. It is never a real content identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StorageRef {
    /// Content identifier returned by the storage backend.
    Pinned(String),
    /// Deterministic marker derived from the content hash.
    Placeholder(String),
}

impl StorageRef {
    pub const PLACEHOLDER_PREFIX: &'static str = "placeholder:";

    /// Placeholder for content that could not be pinned.
    pub fn placeholder_for(content_hash: &ContentHash) -> Self {
        Self::Placeholder(content_hash.short().to_string())
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }

    /// The backend content identifier, if this is a real reference.
    pub fn cid(&self) -> Option<&str> {
        match self {
            Self::Pinned(cid) => Some(cid),
            Self::Placeholder(_) => None,
        }
    }
}

impl fmt::Display for StorageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pinned(cid) => f.write_str(cid),
            Self::Placeholder(tag) => write!(f, "{}{tag}", Self::PLACEHOLDER_PREFIX),
        }
    }
}

impl FromStr for StorageRef {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseError::StorageRef(s.to_string()));
        }
        match s.strip_prefix(Self::PLACEHOLDER_PREFIX) {
            Some(tag) => Ok(Self::Placeholder(tag.to_string())),
            None => Ok(Self::Pinned(s.to_string())),
        }
    }
}

impl TryFrom<String> for StorageRef {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StorageRef> for String {
    fn from(value: StorageRef) -> Self {
        value.to_string()
    }
}
