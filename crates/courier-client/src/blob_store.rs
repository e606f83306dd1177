//! HTTP-backed [`BlobStore`]: uploads encrypted payload ciphertext to a
//! content-addressed blob endpoint and fetches it back by URL.

use async_trait::async_trait;
use courier_core::capabilities::{BlobStore, FetchOutcome};
use courier_core::{CourierError, Result};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::errors::wrap_reqwest;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "Url")]
    url: String,
}

/// A blob store reached over HTTP: `POST {base_url}?expiresUtc=<unix ms>`
/// with the raw ciphertext body, returning `{"Url": "<absolute url>"}`.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBlobStore {
    /// Builds a store that uploads to `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(&self, bytes: &[u8], expires_utc_unix_ms: u64, cancel: &CancellationToken) -> Result<String> {
        let url = format!("{}?expiresUtc={expires_utc_unix_ms}", self.base_url.trim_end_matches('/'));
        let request = self.http.post(&url).body(bytes.to_vec()).send();
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CourierError::Cancelled),
            result = request => result.map_err(|e| wrap_reqwest("blob upload", e))?,
        };

        if !response.status().is_success() {
            return Err(CourierError::transport(format!("blob upload: store returned status {}", response.status())));
        }

        let body: UploadResponse = response.json().await.map_err(|e| wrap_reqwest("blob upload: decode body", e))?;
        Ok(body.url)
    }

    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<FetchOutcome> {
        let request = self.http.get(url).send();
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CourierError::Cancelled),
            result = request => result.map_err(|e| wrap_reqwest("blob fetch", e))?,
        };

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(FetchOutcome::NotFound);
        }
        if !response.status().is_success() {
            return Err(CourierError::transport(format!("blob fetch: store returned status {}", response.status())));
        }

        let bytes = response.bytes().await.map_err(|e| wrap_reqwest("blob fetch: read body", e))?;
        Ok(FetchOutcome::Found(bytes.to_vec()))
    }
}
