//! Anchoring and reconciler handlers.

use std::sync::Arc;

use serde_json::Value;

use super::{require_document_id, require_str, to_value, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

/// Ask the anchoring service directly. Does not change any document.
pub async fn query_anchor_status(state: &Arc<DaemonState>, params: &Value) -> Result {
    let anchor_id = require_str(params, "anchor_id")?;
    let report = state.pipeline.query_anchor_status(anchor_id).await?;
    Ok(serde_json::json!({
        "report": report,
        "remote_status": report.remote_status(),
    }))
}

pub async fn reconciler_status(state: &Arc<DaemonState>, params: &Value) -> Result {
    let anchor_id = require_str(params, "anchor_id")?;
    let snapshot = state
        .pipeline
        .reconcilers()
        .snapshot(anchor_id)
        .await
        .ok_or_else(|| RpcError::not_found(&format!("no reconciler for {anchor_id}")))?;
    to_value(&snapshot)
}

/// All reconcilers, or only running ones with `active_only: true`.
pub async fn list_reconcilers(state: &Arc<DaemonState>, params: &Value) -> Result {
    let active_only = params
        .get("active_only")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let registry = state.pipeline.reconcilers();
    let snapshots = if active_only {
        registry.active().await
    } else {
        registry.all().await
    };
    to_value(&snapshots)
}

pub async fn stop_reconciler(state: &Arc<DaemonState>, params: &Value) -> Result {
    let anchor_id = require_str(params, "anchor_id")?;
    let stopped = state.pipeline.reconcilers().stop(anchor_id).await;
    Ok(serde_json::json!({ "stopped": stopped }))
}

/// Fresh polling budget for a `pending` document.
pub async fn resume_reconciler(state: &Arc<DaemonState>, params: &Value) -> Result {
    let document_id = require_document_id(params)?;
    let started = state.pipeline.reconcilers().resume(&document_id).await?;
    Ok(serde_json::json!({ "started": started }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::documents::ingest_document;
    use crate::test_support::simulated_state;
    use base64::Engine as _;

    async fn ingest(state: &Arc<DaemonState>) -> (String, String) {
        let receipt = ingest_document(
            state,
            &serde_json::json!({
                "content": base64::engine::general_purpose::STANDARD.encode(b"anchor me"),
                "file_name": "a.txt",
                "mime_type": "text/plain",
                "title": "A",
                "category": "activism",
                "encrypt": false,
            }),
        )
        .await
        .expect("ingest");
        (
            receipt["document_id"].as_str().expect("id").to_string(),
            receipt["anchor_id"].as_str().expect("anchor").to_string(),
        )
    }

    #[tokio::test]
    async fn test_reconciler_lifecycle_over_rpc() {
        let state = simulated_state();
        let (document_id, anchor_id) = ingest(&state).await;

        let status = reconciler_status(&state, &serde_json::json!({"anchor_id": anchor_id}))
            .await
            .expect("status");
        assert_eq!(status["phase"], "running");

        let listed = list_reconcilers(&state, &serde_json::json!({"active_only": true}))
            .await
            .expect("list");
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let stopped = stop_reconciler(&state, &serde_json::json!({"anchor_id": anchor_id}))
            .await
            .expect("stop");
        assert_eq!(stopped["stopped"], true);

        let resumed = resume_reconciler(&state, &serde_json::json!({"document_id": document_id}))
            .await
            .expect("resume");
        assert_eq!(resumed["started"], true);
    }

    #[tokio::test]
    async fn test_query_anchor_status_passthrough() {
        let state = simulated_state();
        let (_, anchor_id) = ingest(&state).await;
        let result = query_anchor_status(&state, &serde_json::json!({"anchor_id": anchor_id}))
            .await
            .expect("query");
        assert_eq!(result["report"]["id"], anchor_id);
        assert!(result["remote_status"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_reconciler() {
        let state = simulated_state();
        let err = reconciler_status(&state, &serde_json::json!({"anchor_id": "missing"}))
            .await
            .expect_err("missing");
        assert_eq!(err.message, "NOT_FOUND");
    }
}
