//! Pinning-service backend.
//!
//! Uploads go to the service's `pinning/pinFileToIPFS` endpoint as multipart
//! form data; reads go through a public IPFS gateway; unpins use
//! `pinning/unpin/{cid}`. Credentials are sent as `pinata_api_key` and
//! `pinata_secret_api_key` headers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::backend::StorageBackend;
use crate::{Result, StorageError};

/// Default pinning API base URL.
pub const DEFAULT_API_URL: &str = "https://api.pinata.cloud";

/// Default IPFS gateway base URL.
pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.pinata.cloud";

/// Gateway read timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// App tag written into pin metadata.
const APP_TAG: &str = "scribe";

/// Connection settings for the pinning service.
#[derive(Clone, Debug)]
pub struct PinningConfig {
    pub api_url: String,
    pub gateway_url: String,
    pub api_key: String,
    pub secret_key: String,
    /// Upload request timeout. Large files need generous values.
    pub upload_timeout: Duration,
}

/// HTTP client for the pinning service.
pub struct PinningServiceBackend {
    config: PinningConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: Option<String>,
}

impl PinningServiceBackend {
    /// Build a backend. Fails with [`StorageError::Unconfigured`] if either
    /// credential is empty.
    pub fn new(config: PinningConfig) -> Result<Self> {
        if config.api_key.is_empty() || config.secret_key.is_empty() {
            return Err(StorageError::Unconfigured);
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| StorageError::Client(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn api(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn with_credentials(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("pinata_api_key", &self.config.api_key)
            .header("pinata_secret_api_key", &self.config.secret_key)
    }
}

fn transport_error(e: reqwest::Error) -> StorageError {
    StorageError::Unavailable(e.to_string())
}

async fn reject(response: reqwest::Response) -> StorageError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    StorageError::Rejected { status, body }
}

#[async_trait]
impl StorageBackend for PinningServiceBackend {
    fn name(&self) -> &'static str {
        "pinning"
    }

    async fn upload(&self, bytes: &[u8], name: &str) -> Result<String> {
        let metadata = serde_json::json!({
            "name": name,
            "keyvalues": {
                "app": APP_TAG,
                "uploadedAt": chrono::Utc::now().to_rfc3339(),
            },
        });
        let options = serde_json::json!({ "cidVersion": 0 });

        let form = Form::new()
            .part("file", Part::bytes(bytes.to_vec()).file_name(name.to_string()))
            .text("pinataMetadata", metadata.to_string())
            .text("pinataOptions", options.to_string());

        let response = self
            .with_credentials(self.client.post(self.api("pinning/pinFileToIPFS")))
            .timeout(self.config.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }

        let body: PinResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Malformed(e.to_string()))?;
        let cid = body
            .ipfs_hash
            .filter(|h| !h.is_empty())
            .ok_or_else(|| StorageError::Malformed("response carried no IpfsHash".to_string()))?;

        debug!(cid = %cid, size = bytes.len(), "pinned blob");
        Ok(cid)
    }

    async fn fetch(&self, cid: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/ipfs/{}",
            self.config.gateway_url.trim_end_matches('/'),
            cid
        );
        let response = self
            .client
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => return Err(StorageError::NotFound(cid.to_string())),
            _ => return Err(reject(response).await),
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }

    async fn unpin(&self, cid: &str) -> Result<()> {
        let response = self
            .with_credentials(self.client.delete(self.api(&format!("pinning/unpin/{cid}"))))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }
        Ok(())
    }
}
