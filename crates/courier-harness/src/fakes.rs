//! In-memory [`BlobStore`] and [`InboxRelay`] fakes with injectable faults,
//! used to drive the concrete end-to-end scenarios in `scenarios.rs`.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use courier_core::capabilities::{BlobStore, FetchOutcome, InboxCreated, IncomingItem, InboxRelay};
use courier_core::{CourierError, Result};
use tokio_util::sync::CancellationToken;

/// An in-memory, content-addressed blob store. Tests can reach into
/// `blobs` to tamper with stored ciphertext (simulating relay or
/// storage-layer corruption) or simulate expiry by removing an entry.
#[derive(Default)]
pub struct FakeBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    next_id: Mutex<u64>,
}

impl FakeBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the first byte of the blob at `url`, simulating tamper or bit
    /// rot between upload and fetch.
    pub fn corrupt(&self, url: &str) {
        let mut blobs = self.blobs.lock().expect("not poisoned");
        if let Some(bytes) = blobs.get_mut(url) {
            if let Some(first) = bytes.first_mut() {
                *first ^= 0xFF;
            }
        }
    }

    /// Removes the blob at `url`, simulating expiry.
    pub fn expire(&self, url: &str) {
        self.blobs.lock().expect("not poisoned").remove(url);
    }

    /// Number of blobs ever uploaded, for scenarios asserting a single
    /// upload regardless of recipient count.
    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.blobs.lock().expect("not poisoned").len()
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn upload(&self, bytes: &[u8], _expires_utc_unix_ms: u64, cancel: &CancellationToken) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(CourierError::Cancelled);
        }
        let mut next_id = self.next_id.lock().expect("not poisoned");
        let url = format!("https://blob.fake/{next_id}");
        *next_id += 1;
        self.blobs.lock().expect("not poisoned").insert(url.clone(), bytes.to_vec());
        Ok(url)
    }

    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<FetchOutcome> {
        if cancel.is_cancelled() {
            return Err(CourierError::Cancelled);
        }
        let blobs = self.blobs.lock().expect("not poisoned");
        Ok(blobs.get(url).cloned().map_or(FetchOutcome::NotFound, FetchOutcome::Found))
    }
}

#[derive(Default)]
struct RelayState {
    /// `inbox_url -> [(item_location, body)]`.
    inboxes: HashMap<String, Vec<(String, Vec<u8>)>>,
    next_item_id: u64,
}

/// An in-memory relay shared by every participant in a scenario: recipients
/// are distinguished by their own inbox URL. Supports fault injection for
/// partial post failures, a one-shot long-poll timeout, and expired
/// pointers.
#[derive(Default)]
pub struct FakeInboxRelay {
    state: Mutex<RelayState>,
    /// Recipient inbox URLs whose `post_notification` always fails.
    pub failing_recipients: Mutex<HashSet<String>>,
    /// Item locations that should answer 404 on the next `fetch_item`
    /// (simulating an already-expired relay pointer).
    pub expired_items: Mutex<HashSet<String>>,
    /// Number of remaining `list` calls that should report a transport
    /// timeout before succeeding (simulates a long-poll timeout that the
    /// caller should retry transparently).
    pub list_timeouts_remaining: Mutex<u32>,
}

impl FakeInboxRelay {
    /// Creates a relay with no fault injection configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `recipient_inbox_url` so every `post_notification` to it fails.
    pub fn fail_recipient(&self, recipient_inbox_url: &str) {
        self.failing_recipients.lock().expect("not poisoned").insert(recipient_inbox_url.to_owned());
    }

    /// Arranges for the next `count` calls to `list` to report a transport
    /// timeout rather than the real listing.
    pub fn queue_long_poll_timeouts(&self, count: u32) {
        *self.list_timeouts_remaining.lock().expect("not poisoned") = count;
    }

    /// Marks `item_location` so the next `fetch_item` for it reports 404,
    /// simulating a relay-side expired pointer.
    pub fn expire_item(&self, item_location: &str) {
        self.expired_items.lock().expect("not poisoned").insert(item_location.to_owned());
    }

    /// Number of pending items currently queued in `inbox_url`.
    #[must_use]
    pub fn pending_count(&self, inbox_url: &str) -> usize {
        self.state.lock().expect("not poisoned").inboxes.get(inbox_url).map_or(0, Vec::len)
    }

    /// Returns a copy of the raw notification bytes at `inbox_url`'s item
    /// `index`, for tests simulating an attacker capturing a notification
    /// and re-posting it verbatim into a different recipient's inbox.
    #[must_use]
    pub fn captured_item_body(&self, inbox_url: &str, index: usize) -> Vec<u8> {
        self.state.lock().expect("not poisoned").inboxes[inbox_url][index].1.clone()
    }
}

#[async_trait]
impl InboxRelay for FakeInboxRelay {
    async fn create_inbox(&self, base_url: &str) -> Result<InboxCreated> {
        let inbox_url = format!("{base_url}/inbox/{}", uuid_like());
        self.state.lock().expect("not poisoned").inboxes.entry(inbox_url.clone()).or_default();
        Ok(InboxCreated { message_receiving_endpoint: inbox_url, inbox_owner_code: "owner-secret".to_owned() })
    }

    async fn list(
        &self,
        inbox_url: &str,
        _owner_code: &str,
        _long_poll: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<IncomingItem>> {
        {
            let mut remaining = self.list_timeouts_remaining.lock().expect("not poisoned");
            if *remaining > 0 {
                *remaining -= 1;
                if cancel.is_cancelled() {
                    return Err(CourierError::Cancelled);
                }
                return Err(CourierError::transport("simulated long-poll timeout"));
            }
        }

        let state = self.state.lock().expect("not poisoned");
        let items = state
            .inboxes
            .get(inbox_url)
            .map(|items| {
                items
                    .iter()
                    .map(|(location, _)| IncomingItem { location: location.clone(), received_utc_unix_ms: 0 })
                    .collect()
            })
            .unwrap_or_default();
        Ok(items)
    }

    async fn fetch_item(&self, location: &str, _owner_code: &str, cancel: &CancellationToken) -> Result<FetchOutcome> {
        if cancel.is_cancelled() {
            return Err(CourierError::Cancelled);
        }
        if self.expired_items.lock().expect("not poisoned").remove(location) {
            return Ok(FetchOutcome::NotFound);
        }

        let state = self.state.lock().expect("not poisoned");
        for items in state.inboxes.values() {
            if let Some((_, body)) = items.iter().find(|(l, _)| l == location) {
                return Ok(FetchOutcome::Found(body.clone()));
            }
        }
        Ok(FetchOutcome::NotFound)
    }

    async fn post_notification(
        &self,
        recipient_inbox_url: &str,
        body: Vec<u8>,
        _lifetime_minutes: i64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(CourierError::Cancelled);
        }
        if self.failing_recipients.lock().expect("not poisoned").contains(recipient_inbox_url) {
            return Err(CourierError::transport("simulated relay failure for this recipient"));
        }

        let mut state = self.state.lock().expect("not poisoned");
        let item_id = state.next_item_id;
        state.next_item_id += 1;
        let location = format!("{recipient_inbox_url}/item/{item_id}");
        state.inboxes.entry(recipient_inbox_url.to_owned()).or_default().push((location, body));
        Ok(())
    }

    async fn delete(
        &self,
        inbox_url: &str,
        notification_location: &str,
        _owner_code: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(CourierError::Cancelled);
        }
        let mut state = self.state.lock().expect("not poisoned");
        if let Some(items) = state.inboxes.get_mut(inbox_url) {
            items.retain(|(location, _)| location != notification_location);
        }
        Ok(())
    }
}

fn uuid_like() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!("{:016x}", COUNTER.fetch_add(1, Ordering::Relaxed))
}
