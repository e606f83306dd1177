//! Capability traits: the external collaborators this crate depends on but
//! does not implement. Production implementations live in `courier-crypto`
//! (cryptography) and `courier-client` (blob storage, inbox relay); in-memory
//! fakes for tests live in `courier-harness`.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::{CourierError, Result};

/// Wall-clock access, injected so tests can run with deterministic
/// timestamps instead of the real clock.
pub trait Clock: Send + Sync + 'static {
    /// The current time, as Unix milliseconds.
    fn now_unix_ms(&self) -> u64;
}

/// [`Clock`] backed by [`std::time::SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// The result of a one-shot symmetric encryption.
///
/// Key and IV are one-time: a fresh pair is generated per payload and per
/// per-recipient notification. Never reused across calls.
#[derive(Debug, Clone)]
pub struct SymmetricEncryptionResult {
    /// One-time symmetric key.
    pub key: Vec<u8>,
    /// One-time IV/nonce.
    pub iv: Vec<u8>,
    /// Authenticated ciphertext.
    pub ciphertext: Vec<u8>,
}

/// Cryptographic primitives the channel is built from.
///
/// CPU-bound and deliberately synchronous: callers that need to avoid
/// blocking an async reactor run these on a blocking thread pool (see
/// `courier_client::Channel`, which wraps every call in
/// `tokio::task::spawn_blocking`). Implementations must be safe to share
/// across threads without interior mutability surprises.
pub trait CryptoProvider: Send + Sync + 'static {
    /// Generates a fresh `(private, public)` signing keypair.
    fn generate_signing_keypair(&self) -> (Vec<u8>, Vec<u8>);

    /// Generates a fresh `(private, public)` encryption keypair.
    fn generate_encryption_keypair(&self) -> (Vec<u8>, Vec<u8>);

    /// Signs `message` with `signing_priv`.
    fn sign(&self, signing_priv: &[u8], message: &[u8]) -> Vec<u8>;

    /// Verifies `signature` over `message` under `signing_pub`.
    #[must_use]
    fn verify(&self, signing_pub: &[u8], message: &[u8], signature: &[u8]) -> bool;

    /// Encrypts `plaintext` for `recipient_encryption_pub`. The result
    /// carries everything the matching `asym_decrypt` needs (e.g. an
    /// ephemeral public key) inline in the returned bytes.
    fn asym_encrypt(&self, recipient_encryption_pub: &[u8], plaintext: &[u8]) -> Vec<u8>;

    /// Decrypts bytes produced by `asym_encrypt` for `own_encryption_priv`.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::InvalidMessage`] if the ciphertext does not
    /// authenticate.
    fn asym_decrypt(&self, own_encryption_priv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Encrypts `plaintext` under a freshly generated one-time key and IV.
    fn sym_encrypt(&self, plaintext: &[u8]) -> SymmetricEncryptionResult;

    /// Decrypts `ciphertext` under the given one-time `key` and `iv`.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::InvalidMessage`] if authentication fails.
    fn sym_decrypt(&self, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Computes a content hash of `bytes`.
    fn hash(&self, bytes: &[u8]) -> Vec<u8>;

    /// Derives the stable identity thumbprint for a signing public key.
    fn thumbprint(&self, signing_pub: &[u8]) -> String;
}

/// Outcome of fetching a resource that may legitimately be gone (expired
/// relay pointer, already-deleted blob).
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The resource was present; here are its bytes.
    Found(Vec<u8>),
    /// The resource was not found (HTTP 404 or equivalent).
    NotFound,
}

/// Content-addressed blob storage for encrypted payloads.
///
/// `upload` and `fetch` operate on opaque bytes; this crate never asks the
/// store to interpret them.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Uploads `bytes`, expiring at `expires_utc_unix_ms`, and returns an
    /// absolute, fetchable URL.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::Transport`] on a store-level failure, or
    /// [`CourierError::Cancelled`] if `cancel` fires first.
    async fn upload(&self, bytes: &[u8], expires_utc_unix_ms: u64, cancel: &CancellationToken) -> Result<String>;

    /// Fetches the bytes at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::Transport`] on anything other than a
    /// successful fetch or a clean not-found, or [`CourierError::Cancelled`]
    /// if `cancel` fires first.
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<FetchOutcome>;
}

/// A relay-reported inbox item: a pointer to a notification, not the
/// notification itself.
#[derive(Debug, Clone)]
pub struct IncomingItem {
    /// Absolute URL of the notification.
    pub location: String,
    /// When the relay received this item, as Unix milliseconds.
    pub received_utc_unix_ms: u64,
}

/// Details returned by a successful inbox creation.
#[derive(Debug, Clone)]
pub struct InboxCreated {
    /// The newly created inbox's absolute URL.
    pub message_receiving_endpoint: String,
    /// Bearer secret proving list/delete authority over the inbox.
    pub inbox_owner_code: String,
}

/// The untrusted store-and-forward relay: inbox lifecycle and notification
/// delivery. The relay never authenticates senders; only the owner-code
/// bearer secret gates list/fetch/delete.
#[async_trait]
pub trait InboxRelay: Send + Sync + 'static {
    /// Creates a new inbox under `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::Transport`] on failure.
    async fn create_inbox(&self, base_url: &str) -> Result<InboxCreated>;

    /// Lists pending items in the inbox at `inbox_url`.
    ///
    /// When `long_poll` is set, implementations may block server-side until
    /// an item arrives or a server timeout elapses; callers distinguish a
    /// server-side long-poll timeout from `cancel` firing by checking
    /// `cancel.is_cancelled()` after this call returns an error.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::Cancelled`] if `cancel` fired, or
    /// [`CourierError::Transport`] on any other failure.
    async fn list(
        &self,
        inbox_url: &str,
        owner_code: &str,
        long_poll: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<IncomingItem>>;

    /// Fetches a single inbox item's bytes (the encrypted notification).
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::Transport`] on anything other than a
    /// successful fetch or a clean not-found, or [`CourierError::Cancelled`]
    /// if `cancel` fires first.
    async fn fetch_item(&self, location: &str, owner_code: &str, cancel: &CancellationToken) -> Result<FetchOutcome>;

    /// Posts a notification to `recipient_inbox_url`, expiring in
    /// `lifetime_minutes` (floored to zero if already in the past). The
    /// relay performs no sender authentication on this call.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::Transport`] on failure, or
    /// [`CourierError::Cancelled`] if `cancel` fires first.
    async fn post_notification(
        &self,
        recipient_inbox_url: &str,
        body: Vec<u8>,
        lifetime_minutes: i64,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Deletes the inbox pointer `notification_location` from the inbox at
    /// `inbox_url`. A 404 is treated as success by implementations, not
    /// surfaced as an error.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::Transport`] on any failure other than
    /// not-found, or [`CourierError::Cancelled`] if `cancel` fires first.
    async fn delete(
        &self,
        inbox_url: &str,
        notification_location: &str,
        owner_code: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;
}
