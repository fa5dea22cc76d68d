//! Document ingestion and retrieval handlers.

use std::str::FromStr;
use std::sync::Arc;

use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value;

use scribe_types::document::Category;
use scribe_types::envelope::EnvelopeFields;
use scribe_types::ingest::IngestRequest;
use scribe_types::ContentHash;

use super::{parse_params, require_document_id, to_value, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

#[derive(Debug, Deserialize)]
struct IngestParams {
    /// File bytes, base64.
    content: String,
    file_name: String,
    mime_type: String,
    title: String,
    #[serde(default)]
    description: String,
    category: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    encrypt: bool,
    #[serde(default)]
    anonymize: bool,
    #[serde(default)]
    author_identity: String,
}

#[derive(Debug, Deserialize)]
struct PreviewParams {
    title: String,
    #[serde(default)]
    description: String,
    category: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    author_identity: String,
    #[serde(default)]
    anonymous: bool,
    #[serde(default)]
    encrypted: bool,
    content_hash: String,
    file_size: u64,
    mime_type: String,
    created_at: Option<u64>,
}


fn parse_category(raw: &str) -> std::result::Result<Category, RpcError> {
    Category::from_str(raw).map_err(|e| RpcError::invalid_params(&e.to_string()))
}

/// Ingest a document. Bytes arrive base64-encoded.
pub async fn ingest_document(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: IngestParams = parse_params(params)?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(p.content.as_bytes())
        .map_err(|_| RpcError::invalid_params("content must be base64"))?;

    let request = IngestRequest {
        bytes,
        file_name: p.file_name,
        mime_type: p.mime_type,
        title: p.title,
        description: p.description,
        category: parse_category(&p.category)?,
        tags: p.tags,
        encrypt_requested: p.encrypt,
        anonymize: p.anonymize,
        author_identity: p.author_identity,
    };

    let receipt = state.pipeline.ingest(request).await?;
    to_value(&receipt)
}

pub async fn get_document(state: &Arc<DaemonState>, params: &Value) -> Result {
    let id = require_document_id(params)?;
    let doc = state.pipeline.get_document(&id).await?;
    to_value(&doc)
}

/// Retry anchoring of an `unsubmitted` document.
pub async fn retry_submission(state: &Arc<DaemonState>, params: &Value) -> Result {
    let id = require_document_id(params)?;
    let receipt = state.pipeline.retry_submission(&id).await?;
    to_value(&receipt)
}

/// Fetch, decrypt and verify a document. `key` is optional in vault mode.
pub async fn fetch_document(state: &Arc<DaemonState>, params: &Value) -> Result {
    let id = require_document_id(params)?;
    let key = params.get("key").and_then(|v| v.as_str());
    let bytes = state.pipeline.fetch_document(&id, key).await?;

    Ok(serde_json::json!({
        "document_id": id,
        "size": bytes.len(),
        "content": base64::engine::general_purpose::STANDARD.encode(&bytes),
    }))
}

/// Build a metadata envelope without storing anything.
pub async fn preview_metadata(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: PreviewParams = parse_params(params)?;
    let content_hash = ContentHash::from_str(&p.content_hash)
        .map_err(|e| RpcError::invalid_params(&e.to_string()))?;

    let fields = EnvelopeFields {
        title: p.title,
        description: p.description,
        category: parse_category(&p.category)?,
        tags: p.tags,
        author_identity: p.author_identity,
        anonymous: p.anonymous,
        created_at: p.created_at.unwrap_or_else(scribe_db::unix_now),
        encrypted: p.encrypted,
        content_hash,
        file_size: p.file_size,
        mime_type: p.mime_type,
    };
    to_value(&state.pipeline.preview_envelope(&fields))
}

/// Documents still waiting on the anchoring service.
pub async fn list_pending(state: &Arc<DaemonState>) -> Result {
    let docs = state.pipeline.list_pending().await?;
    let result: Vec<Value> = docs
        .iter()
        .map(|doc| {
            serde_json::json!({
                "document_id": doc.id,
                "title": doc.title,
                "anchor_id": doc.anchor_id,
                "created_at": doc.created_at,
                "reconcile_exhausted_at": doc.reconcile_exhausted_at,
            })
        })
        .collect();
    Ok(serde_json::json!(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::simulated_state;

    fn ingest_params(content: &[u8]) -> Value {
        serde_json::json!({
            "content": base64::engine::general_purpose::STANDARD.encode(content),
            "file_name": "note.txt",
            "mime_type": "text/plain",
            "title": "Note",
            "category": "research",
            "tags": ["a"],
        })
    }

    #[tokio::test]
    async fn test_ingest_then_fetch() {
        let state = simulated_state();
        let mut params = ingest_params(b"hello-doc-");
        params["encrypt"] = serde_json::json!(true);
        let receipt = ingest_document(&state, &params).await.expect("ingest");
        assert_eq!(receipt["anchor_status"], "pending");
        let key = receipt["decryption_key"].as_str().expect("key").to_string();
        let id = receipt["document_id"].as_str().expect("id").to_string();

        let fetched = fetch_document(&state, &serde_json::json!({"document_id": id, "key": key}))
            .await
            .expect("fetch");
        assert_eq!(fetched["content"], base64::engine::general_purpose::STANDARD.encode(b"hello-doc-"));

        let doc = get_document(&state, &serde_json::json!({"document_id": id}))
            .await
            .expect("get");
        assert_eq!(doc["anchor_status"], "pending");
        assert!(doc.get("decryption_key").is_none());
    }

    #[tokio::test]
    async fn test_omitted_encrypt_stores_plaintext() {
        let state = simulated_state();
        let receipt = ingest_document(&state, &ingest_params(b"left-open"))
            .await
            .expect("ingest");
        assert!(receipt["decryption_key"].is_null());
        let id = receipt["document_id"].as_str().expect("id").to_string();

        let doc = state
            .pipeline
            .get_document(&scribe_types::DocumentId::parse_str(&id).expect("uuid"))
            .await
            .expect("get");
        assert!(!doc.is_encrypted());

        let fetched = fetch_document(&state, &serde_json::json!({"document_id": id}))
            .await
            .expect("fetch without key");
        assert_eq!(fetched["content"], base64::engine::general_purpose::STANDARD.encode(b"left-open"));
    }

    #[tokio::test]
    async fn test_duplicate_maps_to_error_code() {
        let state = simulated_state();
        ingest_document(&state, &ingest_params(b"dup")).await.expect("first");
        let err = ingest_document(&state, &ingest_params(b"dup"))
            .await
            .expect_err("duplicate");
        assert_eq!(err.message, "DUPLICATE_CONTENT");
    }

    #[tokio::test]
    async fn test_bad_params() {
        let state = simulated_state();
        let mut params = ingest_params(b"x");
        params["category"] = serde_json::json!("gossip");
        let err = ingest_document(&state, &params).await.expect_err("bad category");
        assert_eq!(err.code, -32602);

        let err = get_document(&state, &serde_json::json!({"document_id": "nope"}))
            .await
            .expect_err("bad id");
        assert_eq!(err.code, -32602);

        let err = get_document(&state, &serde_json::json!({"document_id": uuid::Uuid::new_v4()}))
            .await
            .expect_err("unknown");
        assert_eq!(err.message, "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_preview_metadata() {
        let state = simulated_state();
        let hash = "a".repeat(64);
        let env = preview_metadata(
            &state,
            &serde_json::json!({
                "title": "T",
                "category": "legal",
                "anonymous": true,
                "author_identity": "someone",
                "content_hash": hash,
                "file_size": 3,
                "mime_type": "text/plain",
                "created_at": 0,
            }),
        )
        .await
        .expect("preview");
        assert_eq!(env["author"], "Anonymous");
        assert_eq!(env["createdAt"], "1970-01-01T00:00:00.000Z");
        assert_eq!(env["schemaVersion"], "1.0.0");
        assert!(state.pipeline.list_pending().await.expect("pending").is_empty());
    }
}
