//! HTTP inbox relay client (C6): inbox lifecycle and notification delivery
//! against the relay HTTP API described in this crate's design notes.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_core::capabilities::{FetchOutcome, InboxCreated, IncomingItem, InboxRelay};
use courier_core::{CourierError, Result};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::wrap_reqwest;

/// Default `reqwest` request timeout. Long-poll requests extend this via
/// [`RelayClient::with_long_poll_timeout`].
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct CreateInboxResponse {
    #[serde(rename = "MessageReceivingEndpoint")]
    message_receiving_endpoint: String,
    #[serde(rename = "InboxOwnerCode")]
    inbox_owner_code: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(rename = "Items")]
    items: Vec<ListItem>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "ReceivedUtc")]
    received_utc: DateTime<Utc>,
}

/// An HTTP-backed [`InboxRelay`]. The owner-code authentication header
/// scheme is configurable because this crate's own choice
/// (`Authorization: InboxOwner <code>`) is not guaranteed to match a
/// pre-existing relay deployment (see `DESIGN.md`, open question 3).
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    auth_scheme: String,
}

impl Default for RelayClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayClient {
    /// Builds a client with the default `InboxOwner` auth scheme and a
    /// 30-second request timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_auth_scheme("InboxOwner")
    }

    /// Builds a client using a caller-supplied `Authorization` scheme, for
    /// relays that do not speak this crate's own convention.
    #[must_use]
    pub fn with_auth_scheme(scheme: impl Into<String>) -> Self {
        #[allow(clippy::expect_used)] // static config, cannot fail in practice
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("reqwest client builds with static configuration");
        Self { http, auth_scheme: scheme.into() }
    }

    fn auth_header(&self, owner_code: &str) -> String {
        format!("{} {}", self.auth_scheme, owner_code)
    }
}

#[async_trait]
impl InboxRelay for RelayClient {
    async fn create_inbox(&self, base_url: &str) -> Result<InboxCreated> {
        let url = format!("{}/create", base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| wrap_reqwest("create_inbox", e))?;

        if !response.status().is_success() {
            return Err(CourierError::transport(format!(
                "create_inbox: relay returned status {}",
                response.status()
            )));
        }

        let body: CreateInboxResponse =
            response.json().await.map_err(|e| wrap_reqwest("create_inbox: decode body", e))?;

        Ok(InboxCreated {
            message_receiving_endpoint: body.message_receiving_endpoint,
            inbox_owner_code: body.inbox_owner_code,
        })
    }

    async fn list(
        &self,
        inbox_url: &str,
        owner_code: &str,
        long_poll: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<IncomingItem>> {
        let url = if long_poll { format!("{inbox_url}?longPoll=true") } else { inbox_url.to_owned() };

        let request = self.http.get(&url).header("Authorization", self.auth_header(owner_code)).send();

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CourierError::Cancelled),
            result = request => result,
        };

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() && !cancel.is_cancelled() => {
                debug!("inbox long-poll timed out server-side, will be retried by the caller");
                return Err(CourierError::transport("list: long-poll timeout"));
            }
            Err(_) if cancel.is_cancelled() => return Err(CourierError::Cancelled),
            Err(e) => return Err(wrap_reqwest("list", e)),
        };

        if !response.status().is_success() {
            return Err(CourierError::transport(format!("list: relay returned status {}", response.status())));
        }

        let body: ListResponse = response.json().await.map_err(|e| wrap_reqwest("list: decode body", e))?;

        Ok(body
            .items
            .into_iter()
            .map(|item| IncomingItem {
                location: item.location,
                received_utc_unix_ms: item.received_utc.timestamp_millis().max(0) as u64,
            })
            .collect())
    }

    async fn fetch_item(&self, location: &str, owner_code: &str, cancel: &CancellationToken) -> Result<FetchOutcome> {
        let request = self.http.get(location).header("Authorization", self.auth_header(owner_code)).send();
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CourierError::Cancelled),
            result = request => result.map_err(|e| wrap_reqwest("fetch_item", e))?,
        };

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(FetchOutcome::NotFound);
        }
        if !response.status().is_success() {
            return Err(CourierError::transport(format!(
                "fetch_item: relay returned status {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await.map_err(|e| wrap_reqwest("fetch_item: read body", e))?;
        Ok(FetchOutcome::Found(bytes.to_vec()))
    }

    async fn post_notification(
        &self,
        recipient_inbox_url: &str,
        body: Vec<u8>,
        lifetime_minutes: i64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let url = format!("{recipient_inbox_url}?lifetime={}", lifetime_minutes.max(0));
        let request = self.http.post(&url).body(body).send();
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CourierError::Cancelled),
            result = request => result.map_err(|e| wrap_reqwest("post_notification", e))?,
        };

        if !response.status().is_success() {
            return Err(CourierError::transport(format!(
                "post_notification: relay returned status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn delete(
        &self,
        inbox_url: &str,
        notification_location: &str,
        owner_code: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let encoded = utf8_percent_encode(notification_location, NON_ALPHANUMERIC).to_string();
        let url = format!("{inbox_url}?notification={encoded}");

        let request = self.http.delete(&url).header("Authorization", self.auth_header(owner_code)).send();
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CourierError::Cancelled),
            result = request => result.map_err(|e| wrap_reqwest("delete", e))?,
        };

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            warn!("delete: inbox pointer already gone, treating as success");
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(CourierError::transport(format!("delete: relay returned status {}", response.status())));
        }
        Ok(())
    }
}
