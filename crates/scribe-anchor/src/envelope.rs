//! Metadata envelope construction.
//!
//! All builders here are pure: identical inputs always produce identical
//! output, byte for byte once serialized.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use scribe_types::envelope::{BootstrapDescriptor, EnvelopeFields, MetadataEnvelope};
use scribe_types::{
    DocumentId, ANONYMOUS_AUTHOR, BOOTSTRAP_MODE, ENVELOPE_SCHEMA_VERSION, STITCH_SPLIT_THRESHOLD,
};

use crate::{AnchorError, Result};

/// Media type of the inscription content.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Tells stitch-aware readers how the content may have been split.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StitchConfig {
    pub content_type: String,
    pub split_threshold: usize,
}

/// The bootstrap block as it appears inside inscription content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapBlock {
    pub mode: u8,
    pub data: BootstrapData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapData {
    pub document_id: DocumentId,
    pub encrypted: bool,
}

/// The JSON document that is actually inscribed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InscriptionContent {
    pub metadata: MetadataEnvelope,
    pub stitch_config: StitchConfig,
    pub bootstrap: BootstrapBlock,
}

/// Map descriptive fields into a versioned envelope.
pub fn build_envelope(fields: &EnvelopeFields) -> MetadataEnvelope {
    let author = if fields.anonymous {
        ANONYMOUS_AUTHOR.to_string()
    } else {
        fields.author_identity.clone()
    };

    MetadataEnvelope {
        title: fields.title.clone(),
        description: fields.description.clone(),
        category: fields.category,
        tags: fields.tags.clone(),
        author,
        created_at: rfc3339_millis(fields.created_at),
        encrypted: fields.encrypted,
        content_hash: fields.content_hash.clone(),
        file_size: fields.file_size,
        mime_type: fields.mime_type.clone(),
        schema_version: ENVELOPE_SCHEMA_VERSION.to_string(),
    }
}

pub fn build_bootstrap(document_id: DocumentId, encrypted: bool) -> BootstrapDescriptor {
    BootstrapDescriptor {
        mode: BOOTSTRAP_MODE,
        document_id,
        encrypted,
    }
}

/// Wrap an envelope with its stitch config and bootstrap block.
pub fn inscription_content(document_id: DocumentId, envelope: &MetadataEnvelope) -> InscriptionContent {
    let bootstrap = build_bootstrap(document_id, envelope.encrypted);
    InscriptionContent {
        metadata: envelope.clone(),
        stitch_config: StitchConfig {
            content_type: CONTENT_TYPE_JSON.to_string(),
            split_threshold: STITCH_SPLIT_THRESHOLD,
        },
        bootstrap: BootstrapBlock {
            mode: bootstrap.mode,
            data: BootstrapData {
                document_id: bootstrap.document_id,
                encrypted: bootstrap.encrypted,
            },
        },
    }
}

/// Serialize inscription content to the bytes that get inscribed.
pub fn encode_content(content: &InscriptionContent) -> Result<Vec<u8>> {
    serde_json::to_vec(content).map_err(|e| AnchorError::Serialization(e.to_string()))
}

fn rfc3339_millis(unix_secs: u64) -> String {
    let secs = i64::try_from(unix_secs).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp(secs, 0)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_types::document::Category;

    fn fields() -> EnvelopeFields {
        EnvelopeFields {
            title: "Leaked memo".to_string(),
            description: "Internal memo".to_string(),
            category: Category::Whistleblowing,
            tags: vec!["memo".to_string(), "2024".to_string()],
            author_identity: "bc1qauthor".to_string(),
            anonymous: false,
            created_at: 1_704_067_200,
            encrypted: true,
            content_hash: scribe_crypto::content_hash::digest(b"memo"),
            file_size: 4,
            mime_type: "text/plain".to_string(),
        }
    }

    #[test]
    fn test_envelope_fields() {
        let env = build_envelope(&fields());
        assert_eq!(env.author, "bc1qauthor");
        assert_eq!(env.created_at, "2024-01-01T00:00:00.000Z");
        assert_eq!(env.schema_version, "1.0.0");
        assert!(env.encrypted);
    }

    #[test]
    fn test_anonymous_author() {
        let mut f = fields();
        f.anonymous = true;
        assert_eq!(build_envelope(&f).author, ANONYMOUS_AUTHOR);
    }

    #[test]
    fn test_envelope_deterministic() {
        let a = encode_content(&inscription_content(DocumentId::nil(), &build_envelope(&fields())))
            .expect("encode");
        let b = encode_content(&inscription_content(DocumentId::nil(), &build_envelope(&fields())))
            .expect("encode");
        assert_eq!(a, b);
    }

    #[test]
    fn test_inscription_content_shape() {
        let content = inscription_content(DocumentId::nil(), &build_envelope(&fields()));
        let json = serde_json::to_value(&content).expect("to_value");

        assert_eq!(json["stitchConfig"]["contentType"], "application/json");
        assert_eq!(json["stitchConfig"]["splitThreshold"], 350_000);
        assert_eq!(json["bootstrap"]["mode"], 4);
        assert_eq!(json["bootstrap"]["data"]["encrypted"], true);
        assert_eq!(json["metadata"]["schemaVersion"], "1.0.0");
        assert_eq!(json["metadata"]["category"], "whistleblowing");
    }
}
