//! Ingestion policy.
//!
//! Checked before hashing so that a rejected request leaves no trace.

use serde::{Deserialize, Serialize};

use scribe_types::ingest::IngestRequest;

use crate::{PipelineError, Result};

/// 50 MiB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;
pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;
pub const MAX_TAG_CHARS: usize = 50;

pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "text/markdown",
    "image/jpeg",
    "image/png",
    "image/gif",
    "audio/mpeg",
    "audio/wav",
    "video/mp4",
    "video/webm",
];

/// Limits applied to every ingestion request (config section `[ingest]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestPolicy {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default)]
    pub allow_empty: bool,
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

impl Default for IngestPolicy {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            allow_empty: false,
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

fn default_allowed_mime_types() -> Vec<String> {
    DEFAULT_ALLOWED_MIME_TYPES.iter().map(|s| s.to_string()).collect()
}

impl IngestPolicy {
    pub fn check(&self, request: &IngestRequest) -> Result<()> {
        let size = request.bytes.len() as u64;
        if size == 0 && !self.allow_empty {
            return Err(violation("empty files are not accepted"));
        }
        if size > self.max_file_bytes {
            return Err(violation(format!(
                "file is {size} bytes, limit is {}",
                self.max_file_bytes
            )));
        }
        if !self
            .allowed_mime_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(&request.mime_type))
        {
            return Err(violation(format!(
                "file type not supported: {}",
                request.mime_type
            )));
        }

        let title_len = request.title.trim().chars().count();
        if title_len == 0 || title_len > MAX_TITLE_CHARS {
            return Err(violation(format!(
                "title must be 1-{MAX_TITLE_CHARS} characters"
            )));
        }
        if request.description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(violation(format!(
                "description must be at most {MAX_DESCRIPTION_CHARS} characters"
            )));
        }
        if let Some(tag) = request
            .tags
            .iter()
            .find(|t| t.trim().chars().count() > MAX_TAG_CHARS)
        {
            return Err(violation(format!(
                "tag exceeds {MAX_TAG_CHARS} characters: {tag}"
            )));
        }
        Ok(())
    }
}

/// Trimmed, non-empty tags in their original order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn violation(msg: impl Into<String>) -> PipelineError {
    PipelineError::PolicyViolation(msg.into())
}
