//! [`Channel`]: ties the envelope-construction and inbound-verification
//! logic in `courier-core` to a concrete crypto provider, blob store, and
//! inbox relay (C8).
//!
//! `Channel<P, B, R>` is monomorphized over its capabilities rather than
//! using trait objects, matching this crate's preference for generic
//! dispatch at the capability boundary. Recipient fan-out in [`Channel::post`]
//! uses an independent [`tokio::task::JoinSet`] entry per recipient so one
//! recipient's failure never blocks delivery to the others.

use std::sync::Arc;

use courier_core::capabilities::{Clock, SystemClock};
use courier_core::{
    BlobStore, ChannelConfig, CourierError, CryptoProvider, Endpoint, InboxRelay, OwnEndpoint,
    Payload, PayloadReference, Result, fetch_payload, lifetime_minutes, post_payload,
};
use courier_core::notification::{build_notification, parse_notification};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::errors::PostError;

/// Progress reported by [`Channel::receive`] as each item is processed.
#[derive(Debug, Clone)]
pub enum ReceiveProgress {
    /// A payload was successfully decrypted and verified.
    Delivered {
        /// Position in this batch, zero-indexed.
        index: usize,
    },
    /// An inbox pointer had already expired at the relay; it was cleaned up
    /// and skipped.
    ExpiredPointerSkipped {
        /// Position in this batch, zero-indexed.
        index: usize,
    },
    /// An item failed verification or decoding and
    /// [`ChannelConfig::continue_on_item_error`] is set, so processing
    /// continued past it.
    ItemRejected {
        /// Position in this batch, zero-indexed.
        index: usize,
        /// Why the item was rejected.
        error: String,
    },
}

/// Ties the secure-channel envelope logic to concrete capabilities.
pub struct Channel<P, B, R>
where
    P: CryptoProvider,
    B: BlobStore,
    R: InboxRelay,
{
    crypto: Arc<P>,
    blob_store: Arc<B>,
    relay: Arc<R>,
    clock: Arc<dyn Clock>,
    own: Arc<Mutex<OwnEndpoint>>,
    config: ChannelConfig,
}

impl<P, B, R> Channel<P, B, R>
where
    P: CryptoProvider,
    B: BlobStore,
    R: InboxRelay,
{
    /// Builds a channel from its capabilities and the caller's own identity,
    /// using [`SystemClock`] for timestamps.
    #[must_use]
    pub fn new(crypto: P, blob_store: B, relay: R, own: OwnEndpoint, config: ChannelConfig) -> Self {
        Self::with_clock(crypto, blob_store, relay, own, config, Arc::new(SystemClock))
    }

    /// Builds a channel with an injected [`Clock`], for deterministic tests.
    #[must_use]
    pub fn with_clock(
        crypto: P,
        blob_store: B,
        relay: R,
        own: OwnEndpoint,
        config: ChannelConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::from_shared(Arc::new(crypto), Arc::new(blob_store), Arc::new(relay), own, config, clock)
    }

    /// Builds a channel over already-shared capabilities, so several
    /// channels (distinct identities) can be driven against the same blob
    /// store and relay, as a multi-party scenario needs.
    #[must_use]
    pub fn from_shared(
        crypto: Arc<P>,
        blob_store: Arc<B>,
        relay: Arc<R>,
        own: OwnEndpoint,
        config: ChannelConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { crypto, blob_store, relay, clock, own: Arc::new(Mutex::new(own)), config }
    }

    /// Returns a clone of the current public endpoint (cheap: no private
    /// material).
    pub async fn public_endpoint(&self) -> Endpoint {
        self.own.lock().await.public.clone()
    }

    /// Creates this channel's inbox at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::Precondition`] if an inbox already exists, or
    /// propagates the relay's failure.
    pub async fn create_inbox(&self, base_url: &str) -> Result<()> {
        let mut own = self.own.lock().await;
        if own.public.inbox_url.is_some() {
            return Err(CourierError::precondition("inbox already created for this endpoint"));
        }
        let created = self.relay.create_inbox(base_url).await?;
        own.public.inbox_url = Some(created.message_receiving_endpoint);
        own.inbox_owner_code = Some(created.inbox_owner_code);
        Ok(())
    }

    /// Encrypts and uploads `payload`, then notifies every recipient
    /// concurrently and independently.
    ///
    /// # Errors
    ///
    /// Returns [`PostError::Precondition`] if `recipients` is empty or
    /// `expires_utc_unix_ms` is unset, or [`PostError::PartialFailure`]
    /// naming every recipient whose delivery failed. Recipients not named
    /// in the failure succeeded.
    pub async fn post(
        &self,
        payload: &Payload,
        recipients: &[Endpoint],
        expires_utc_unix_ms: u64,
        cancel: CancellationToken,
    ) -> std::result::Result<(), PostError> {
        if recipients.is_empty() {
            return Err(PostError::Precondition("recipient set must not be empty".to_owned()));
        }

        let (sender_public, sender_signing_priv) = {
            let own = self.own.lock().await;
            (own.public.clone(), own.signing_priv.to_vec())
        };

        let reference =
            post_payload(self.crypto.as_ref(), self.blob_store.as_ref(), payload, expires_utc_unix_ms, &cancel)
                .await
                .map_err(PostError::from)?;

        let now = self.clock.now_unix_ms();
        let total_recipients = recipients.len();
        let mut tasks = JoinSet::new();

        for recipient in recipients.iter().cloned() {
            let crypto = Arc::clone(&self.crypto);
            let relay = Arc::clone(&self.relay);
            let sender_public = sender_public.clone();
            let sender_signing_priv = sender_signing_priv.clone();
            let reference = reference.clone();
            let cancel = cancel.clone();
            let thumbprint = recipient.thumbprint(crypto.as_ref());

            tasks.spawn(async move {
                let result = post_to_recipient(
                    crypto,
                    relay,
                    sender_signing_priv,
                    sender_public,
                    recipient,
                    reference,
                    now,
                    cancel,
                )
                .await;
                (thumbprint, result)
            });
        }

        let mut failed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((thumbprint, Ok(()))) => debug!(recipient = %thumbprint, "notification delivered"),
                Ok((thumbprint, Err(err))) => {
                    warn!(recipient = %thumbprint, error = %err, "notification delivery failed");
                    failed.push((thumbprint, err));
                }
                Err(join_err) => {
                    error!(error = %join_err, "recipient delivery task panicked or was cancelled");
                    failed.push(("<unknown>".to_owned(), CourierError::transport(join_err.to_string())));
                }
            }
        }

        if failed.is_empty() { Ok(()) } else { Err(PostError::PartialFailure { total_recipients, failed }) }
    }

    /// Lists, fetches, verifies, and decrypts everything currently in this
    /// channel's inbox.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::Cancelled`] if `cancel` fires, or the first
    /// per-item failure unless [`ChannelConfig::continue_on_item_error`] is
    /// set (in which case failures are reported via `progress` and
    /// processing continues).
    pub async fn receive(
        &self,
        progress: Option<&(dyn Fn(ReceiveProgress) + Send + Sync)>,
        cancel: CancellationToken,
    ) -> Result<Vec<Payload>> {
        let (inbox_url, owner_code) = {
            let own = self.own.lock().await;
            let inbox_url = own
                .public
                .inbox_url
                .clone()
                .ok_or_else(|| CourierError::precondition("inbox has not been created yet"))?;
            let owner_code = own
                .inbox_owner_code
                .clone()
                .ok_or_else(|| CourierError::precondition("missing inbox owner code"))?;
            (inbox_url, owner_code)
        };

        let items = loop {
            match self.relay.list(&inbox_url, &owner_code, self.config.long_poll, &cancel).await {
                Ok(items) => break items,
                Err(CourierError::Cancelled) => return Err(CourierError::Cancelled),
                Err(_) if cancel.is_cancelled() => return Err(CourierError::Cancelled),
                Err(_) => continue, // server-side long-poll timeout: retry transparently
            }
        };

        let (own_encryption_priv, own_signing_pub) = {
            let own = self.own.lock().await;
            (own.encryption_priv.to_vec(), own.public.signing_pub.clone())
        };

        let mut delivered = Vec::with_capacity(items.len());

        for (index, item) in items.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(CourierError::Cancelled);
            }

            match self
                .process_item(
                    &inbox_url,
                    &item.location,
                    &owner_code,
                    &own_encryption_priv,
                    &own_signing_pub,
                    &cancel,
                )
                .await
            {
                Ok(Some(payload)) => {
                    if let Some(cb) = progress {
                        cb(ReceiveProgress::Delivered { index });
                    }
                    delivered.push(payload);
                }
                Ok(None) => {
                    if let Some(cb) = progress {
                        cb(ReceiveProgress::ExpiredPointerSkipped { index });
                    }
                }
                Err(err) => {
                    if self.config.continue_on_item_error {
                        warn!(location = %item.location, error = %err, "rejecting inbox item, continuing");
                        if let Some(cb) = progress {
                            cb(ReceiveProgress::ItemRejected { index, error: err.to_string() });
                        }
                    } else {
                        return Err(err);
                    }
                }
            }
        }

        Ok(delivered)
    }

    async fn process_item(
        &self,
        inbox_url: &str,
        location: &str,
        owner_code: &str,
        own_encryption_priv: &[u8],
        own_signing_pub: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Option<Payload>> {
        use courier_core::capabilities::FetchOutcome;

        let wire = match self.relay.fetch_item(location, owner_code, cancel).await? {
            FetchOutcome::Found(bytes) => bytes,
            FetchOutcome::NotFound => {
                self.relay.delete(inbox_url, location, owner_code, cancel).await?;
                return Ok(None);
            }
        };

        let crypto = Arc::clone(&self.crypto);
        let own_encryption_priv = own_encryption_priv.to_vec();
        let own_signing_pub = own_signing_pub.to_vec();
        let ceiling = self.config.framing_ceiling;
        let parsed = tokio::task::spawn_blocking(move || {
            parse_notification(crypto.as_ref(), &own_encryption_priv, &own_signing_pub, &wire, ceiling)
        })
        .await
        .map_err(|e| CourierError::transport(format!("notification parse task failed: {e}")))??;

        let mut reference = parsed.payload_reference;
        reference.reference_location = Some(location.to_owned());

        let payload = fetch_payload(
            self.crypto.as_ref(),
            self.blob_store.as_ref(),
            &reference,
            self.config.framing_ceiling,
            cancel,
        )
        .await?;

        let Some(payload) = payload else {
            // The relay has already expired the blob itself; the
            // notification pointer that referenced it is now useless.
            self.relay.delete(inbox_url, location, owner_code, cancel).await?;
            return Ok(None);
        };

        Ok(Some(payload))
    }

    /// Deletes the inbox item a previously received `payload` arrived
    /// through. A no-op if the payload carries no reference (never
    /// received).
    ///
    /// # Errors
    ///
    /// Propagates the relay's failure, other than not-found, or returns
    /// [`CourierError::Cancelled`] if `cancel` fires first.
    pub async fn delete_inbox_item(&self, payload: &Payload, cancel: &CancellationToken) -> Result<()> {
        let Some(location) = payload.payload_reference_uri.as_deref() else {
            return Err(CourierError::precondition("payload has no associated inbox item"));
        };

        let (inbox_url, owner_code) = {
            let own = self.own.lock().await;
            let inbox_url = own
                .public
                .inbox_url
                .clone()
                .ok_or_else(|| CourierError::precondition("inbox has not been created yet"))?;
            let owner_code = own
                .inbox_owner_code
                .clone()
                .ok_or_else(|| CourierError::precondition("missing inbox owner code"))?;
            (inbox_url, owner_code)
        };

        self.relay.delete(&inbox_url, location, &owner_code, cancel).await
    }
}

#[allow(clippy::too_many_arguments)]
async fn post_to_recipient<P: CryptoProvider, R: InboxRelay>(
    crypto: Arc<P>,
    relay: Arc<R>,
    sender_signing_priv: Vec<u8>,
    sender_public: Endpoint,
    recipient: Endpoint,
    reference: PayloadReference,
    now_unix_ms: u64,
    cancel: CancellationToken,
) -> Result<()> {
    let recipient_inbox_url = recipient
        .inbox_url
        .clone()
        .ok_or_else(|| CourierError::precondition("recipient endpoint has no inbox_url"))?;

    let build_crypto = Arc::clone(&crypto);
    let build_recipient = recipient.clone();
    let build_sender_public = sender_public.clone();
    let build_reference = reference.clone();
    let wire = tokio::task::spawn_blocking(move || {
        build_notification(
            build_crypto.as_ref(),
            &sender_signing_priv,
            &build_sender_public,
            &build_recipient,
            &build_reference,
            now_unix_ms,
        )
    })
    .await
    .map_err(|e| CourierError::transport(format!("notification build task failed: {e}")))?;

    let lifetime = lifetime_minutes(now_unix_ms, reference.expires_utc_unix_ms);

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CourierError::Cancelled),
        result = relay.post_notification(&recipient_inbox_url, wire, lifetime, &cancel) => result,
    }
}
