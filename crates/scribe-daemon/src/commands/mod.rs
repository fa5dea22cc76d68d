//! IPC command handlers.
//!
//! Each submodule implements the commands for one IPC category.

pub mod anchoring;
pub mod daemon;
pub mod documents;

use serde::de::DeserializeOwned;
use serde_json::Value;

use scribe_types::DocumentId;

use crate::rpc::RpcError;

pub(crate) type Result = std::result::Result<Value, RpcError>;

pub(crate) fn parse_params<T: DeserializeOwned>(params: &Value) -> std::result::Result<T, RpcError> {
    serde_json::from_value(params.clone()).map_err(|e| RpcError::invalid_params(&e.to_string()))
}

pub(crate) fn require_str<'a>(params: &'a Value, name: &str) -> std::result::Result<&'a str, RpcError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params(&format!("{name} required")))
}

pub(crate) fn require_document_id(params: &Value) -> std::result::Result<DocumentId, RpcError> {
    let raw = require_str(params, "document_id")?;
    DocumentId::parse_str(raw).map_err(|_| RpcError::invalid_params("document_id must be a UUID"))
}

pub(crate) fn to_value<T: serde::Serialize>(value: &T) -> Result {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(&e.to_string()))
}
