//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! newline-delimited JSON-RPC 2.0 method calls to the command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use scribe_pipeline::PipelineError;

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    pub id: serde_json::Value,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    pub code: i32,
    /// Error name.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    fn new(code: i32, message: &str, data: Option<serde_json::Value>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data,
        }
    }

    fn detail(code: i32, message: &str, detail: impl std::fmt::Display) -> Self {
        Self::new(code, message, Some(serde_json::json!({"detail": detail.to_string()})))
    }

    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self::new(-32700, "PARSE_ERROR", None)
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self::new(-32600, "INVALID_REQUEST", None)
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self::new(-32601, "METHOD_NOT_FOUND", Some(serde_json::json!({"method": method})))
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self::detail(-32602, "INVALID_PARAMS", detail)
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self::detail(-32603, "INTERNAL_ERROR", detail)
    }

    // Pipeline errors

    /// Duplicate content (-32020).
    pub fn duplicate_content(content_hash: &str, existing: &str) -> Self {
        Self::new(
            -32020,
            "DUPLICATE_CONTENT",
            Some(serde_json::json!({"content_hash": content_hash, "existing": existing})),
        )
    }

    /// Policy violation (-32021).
    pub fn policy_violation(detail: &str) -> Self {
        Self::detail(-32021, "POLICY_VIOLATION", detail)
    }

    /// Encryption failure (-32022).
    pub fn encryption_failure(detail: &str) -> Self {
        Self::detail(-32022, "ENCRYPTION_FAILURE", detail)
    }

    /// Tampered ciphertext or wrong key (-32023).
    pub fn tampered_or_wrong_key() -> Self {
        Self::new(-32023, "TAMPERED_OR_WRONG_KEY", None)
    }

    /// Decryption key required (-32024).
    pub fn key_required(document_id: &str) -> Self {
        Self::new(-32024, "KEY_REQUIRED", Some(serde_json::json!({"document_id": document_id})))
    }

    /// Content does not match its hash (-32025).
    pub fn integrity_mismatch(document_id: &str) -> Self {
        Self::new(
            -32025,
            "INTEGRITY_MISMATCH",
            Some(serde_json::json!({"document_id": document_id})),
        )
    }

    /// Storage unavailable (-32030).
    pub fn storage_unavailable(detail: &str) -> Self {
        Self::detail(-32030, "STORAGE_UNAVAILABLE", detail)
    }

    /// Anchoring unavailable (-32031).
    pub fn anchoring_unavailable(data: serde_json::Value) -> Self {
        Self::new(-32031, "ANCHORING_UNAVAILABLE", Some(data))
    }

    /// Ingest recorded the document but did not finish (-32032).
    pub fn ingest_incomplete(data: serde_json::Value) -> Self {
        Self::new(-32032, "INGEST_INCOMPLETE", Some(data))
    }

    /// Not found (-32040).
    pub fn not_found(detail: &str) -> Self {
        Self::detail(-32040, "NOT_FOUND", detail)
    }

    /// Invalid state (-32041).
    pub fn invalid_state(detail: &str) -> Self {
        Self::detail(-32041, "INVALID_STATE", detail)
    }
}

impl From<PipelineError> for RpcError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::DuplicateContent {
                content_hash,
                existing,
            } => RpcError::duplicate_content(&content_hash, &existing),
            PipelineError::PolicyViolation(detail) => RpcError::policy_violation(&detail),
            PipelineError::EncryptionFailure(detail) => RpcError::encryption_failure(&detail),
            PipelineError::TamperedOrWrongKey => RpcError::tampered_or_wrong_key(),
            PipelineError::KeyRequired(id) => RpcError::key_required(&id.to_string()),
            PipelineError::IntegrityMismatch(id) => RpcError::integrity_mismatch(&id.to_string()),
            PipelineError::StorageUnavailable(detail) => RpcError::storage_unavailable(&detail),
            PipelineError::AnchoringUnavailable {
                document_id,
                reason,
                receipt,
            } => RpcError::anchoring_unavailable(serde_json::json!({
                "document_id": document_id,
                "reason": reason,
                "receipt": receipt,
            })),
            PipelineError::IngestIncomplete {
                document_id,
                reason,
                receipt,
            } => {
                error!(document_id = %document_id, reason = %reason, "ingest incomplete");
                RpcError::ingest_incomplete(serde_json::json!({
                    "document_id": document_id,
                    "reason": reason,
                    "receipt": receipt,
                }))
            }
            PipelineError::NotFound(detail) => RpcError::not_found(&detail),
            PipelineError::InvalidState(detail) => RpcError::invalid_state(&detail),
            other @ (PipelineError::Database(_) | PipelineError::Internal(_)) => {
                error!(error = %other, "internal pipeline error");
                RpcError::internal_error(&other.to_string())
            }
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(socket = ?self.socket_path, "IPC server listening");

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(state: Arc<DaemonState>, stream: tokio::net::UnixStream) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(&state, &line).await;
        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Parse one request line and dispatch it.
pub async fn handle_line(state: &Arc<DaemonState>, line: &str) -> RpcResponse {
    match serde_json::from_str::<RpcRequest>(line) {
        Ok(request) if request.jsonrpc == "2.0" => dispatch_request(state, request).await,
        Ok(request) => RpcResponse::error(request.id, RpcError::invalid_request()),
        Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
    }
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
async fn dispatch_request(state: &Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();
    let params = &request.params;

    debug!(method, "dispatching RPC method");

    let result = match method {
        // Documents
        "ingest_document" => commands::documents::ingest_document(state, params).await,
        "get_document" => commands::documents::get_document(state, params).await,
        "retry_submission" => commands::documents::retry_submission(state, params).await,
        "fetch_document" => commands::documents::fetch_document(state, params).await,
        "preview_metadata" => commands::documents::preview_metadata(state, params).await,
        "list_pending" => commands::documents::list_pending(state).await,

        // Anchoring
        "query_anchor_status" => commands::anchoring::query_anchor_status(state, params).await,
        "reconciler_status" => commands::anchoring::reconciler_status(state, params).await,
        "list_reconcilers" => commands::anchoring::list_reconcilers(state, params).await,
        "stop_reconciler" => commands::anchoring::stop_reconciler(state, params).await,
        "resume_reconciler" => commands::anchoring::resume_reconciler(state, params).await,

        // Daemon
        "shutdown" => commands::daemon::shutdown(state),

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}
