//! HTTP client for the inscription service.
//!
//! `POST {base}/inscribe` submits; `GET {base}/inscription/{id}` polls.
//! Both carry `Authorization: Bearer <token>`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::client::{AnchorService, InscriptionRequest, StatusReport, SubmitReceipt};
use crate::{AnchorError, Result};

/// Default service base URL.
pub const DEFAULT_BASE_URL: &str = "https://ordinalsbot.com/api";

/// Submission timeout.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Status query timeout.
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct RemoteAnchorConfig {
    pub base_url: String,
    pub api_key: String,
    pub submit_timeout: Duration,
    pub status_timeout: Duration,
}

impl Default for RemoteAnchorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            submit_timeout: SUBMIT_TIMEOUT,
            status_timeout: STATUS_TIMEOUT,
        }
    }
}

pub struct RemoteAnchorService {
    config: RemoteAnchorConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct InscribeResponse {
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl RemoteAnchorService {
    /// Build a client. Fails with [`AnchorError::Unconfigured`] without a token.
    pub fn new(config: RemoteAnchorConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AnchorError::Unconfigured);
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AnchorError::Client(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl AnchorService for RemoteAnchorService {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn submit(&self, request: &InscriptionRequest) -> Result<SubmitReceipt> {
        let response = self
            .client
            .post(self.url("inscribe"))
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.submit_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| AnchorError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnchorError::Unavailable(format!("HTTP {}: {body}", status.as_u16())));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnchorError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: InscribeResponse = response
            .json()
            .await
            .map_err(|e| AnchorError::Malformed(e.to_string()))?;
        let id = parsed
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AnchorError::Malformed("response carries no id".to_string()))?;

        debug!(anchor_id = %id, files = request.files.len(), "inscription submitted");
        Ok(SubmitReceipt {
            id,
            status: parsed.status.unwrap_or_else(|| "pending".to_string()),
        })
    }

    async fn query_status(&self, anchor_id: &str) -> Result<StatusReport> {
        let response = self
            .client
            .get(self.url(&format!("inscription/{anchor_id}")))
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.status_timeout)
            .send()
            .await
            .map_err(|e| AnchorError::PollingTransient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnchorError::PollingTransient(format!("HTTP {}", status.as_u16())));
        }

        response
            .json::<StatusReport>()
            .await
            .map_err(|e| AnchorError::PollingTransient(format!("malformed status body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token_is_unconfigured() {
        let result = RemoteAnchorService::new(RemoteAnchorConfig::default());
        assert!(matches!(result, Err(AnchorError::Unconfigured)));
    }

    #[test]
    fn test_url_join() {
        let service = RemoteAnchorService::new(RemoteAnchorConfig {
            base_url: "https://example.invalid/api/".to_string(),
            api_key: "token".to_string(),
            ..RemoteAnchorConfig::default()
        })
        .expect("build");
        assert_eq!(service.url("inscribe"), "https://example.invalid/api/inscribe");
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let service = RemoteAnchorService::new(RemoteAnchorConfig {
            // Nothing listens on the local discard port.
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: "token".to_string(),
            submit_timeout: Duration::from_secs(2),
            status_timeout: Duration::from_secs(2),
        })
        .expect("build");

        let request = InscriptionRequest {
            files: vec![],
            low_postage: true,
            receive_address: String::new(),
            fee: 10,
        };
        assert!(matches!(
            service.submit(&request).await,
            Err(AnchorError::Unavailable(_))
        ));
        assert!(matches!(
            service.query_status("x").await,
            Err(AnchorError::PollingTransient(_))
        ));
    }
}
