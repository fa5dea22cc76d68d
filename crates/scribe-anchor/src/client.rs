//! The anchoring service seam and its wire types.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use scribe_types::AnchorId;

use crate::Result;

/// Default fee rate in sats/vB.
pub const DEFAULT_FEE: u64 = 10;

/// One file in an inscription request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InscriptionFile {
    pub name: String,
    /// Base64 (standard alphabet, padded).
    pub content: String,
    pub media_type: String,
}

impl InscriptionFile {
    pub fn new(name: impl Into<String>, bytes: &[u8], media_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: media_type.into(),
        }
    }

    /// Decoded file body.
    pub fn decode(&self) -> Option<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.content)
            .ok()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InscriptionRequest {
    pub files: Vec<InscriptionFile>,
    pub low_postage: bool,
    pub receive_address: String,
    pub fee: u64,
}

/// Acknowledgement of a submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub id: AnchorId,
    pub status: String,
}

/// Classified remote status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Pending,
    Confirmed,
    Failed,
}

impl RemoteStatus {
    /// Map the service's status vocabulary. Unknown words are pending.
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "completed" | "confirmed" | "inscribed" => RemoteStatus::Confirmed,
            "failed" | "error" | "cancelled" | "expired" => RemoteStatus::Failed,
            _ => RemoteStatus::Pending,
        }
    }
}

/// One status observation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub id: AnchorId,
    pub status: String,
    #[serde(default)]
    pub inscription_id: Option<String>,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub height: Option<u64>,
}

impl StatusReport {
    /// Classified status. A `completed` report that names neither an
    /// inscription nor a transaction is still pending.
    pub fn remote_status(&self) -> RemoteStatus {
        let classified = RemoteStatus::classify(&self.status);
        if classified == RemoteStatus::Confirmed
            && self.status.trim().eq_ignore_ascii_case("completed")
            && self.inscription_id.is_none()
            && self.txid.is_none()
        {
            return RemoteStatus::Pending;
        }
        classified
    }
}

/// External anchoring service.
#[async_trait]
pub trait AnchorService: Send + Sync {
    fn name(&self) -> &'static str;

    /// Submit an inscription request. Errors are `Unavailable`, `Rejected`,
    /// `Malformed` or `Unconfigured`.
    async fn submit(&self, request: &InscriptionRequest) -> Result<SubmitReceipt>;

    /// Query the status of a submitted anchor. Errors are `PollingTransient`.
    async fn query_status(&self, anchor_id: &str) -> Result<StatusReport>;
}
