//! Concrete end-to-end scenarios for the courier secure channel, exercised
//! against the real [`DefaultCryptoProvider`] and the in-memory relay/blob
//! fakes.

use std::sync::Arc;

use courier_client::{Channel, PostError};
use courier_core::capabilities::{InboxRelay, SystemClock};
use courier_core::{ChannelConfig, CourierError, InvalidMessageKind, OwnEndpoint, Payload};
use courier_crypto::DefaultCryptoProvider;
use courier_harness::{FakeBlobStore, FakeInboxRelay};
use tokio_util::sync::CancellationToken;

const TEN_MINUTES_MS: u64 = 10 * 60 * 1000;

fn config() -> ChannelConfig {
    ChannelConfig { long_poll: false, ..ChannelConfig::default() }
}

async fn new_channel(
    crypto: &Arc<DefaultCryptoProvider>,
    blob_store: &Arc<FakeBlobStore>,
    relay: &Arc<FakeInboxRelay>,
    base_url: &str,
) -> Channel<DefaultCryptoProvider, FakeBlobStore, FakeInboxRelay> {
    let own = OwnEndpoint::generate(crypto.as_ref());
    let channel = Channel::from_shared(
        Arc::clone(crypto),
        Arc::clone(blob_store),
        Arc::clone(relay),
        own,
        config(),
        Arc::new(SystemClock),
    );
    channel.create_inbox(base_url).await.expect("creates inbox");
    channel
}

#[tokio::test]
async fn e1_loopback_delivers_exact_bytes() {
    let crypto = Arc::new(DefaultCryptoProvider::new());
    let blob_store = Arc::new(FakeBlobStore::new());
    let relay = Arc::new(FakeInboxRelay::new());

    let alice = new_channel(&crypto, &blob_store, &relay, "https://relay.test").await;
    let alice_endpoint = alice.public_endpoint().await;

    let payload = Payload::new(vec![0xDE, 0xAD, 0xBE, 0xEF]);
    alice
        .post(&payload, &[alice_endpoint], TEN_MINUTES_MS, CancellationToken::new())
        .await
        .expect("posts to self");

    let received = alice.receive(None, CancellationToken::new()).await.expect("receives");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].bytes, vec![0xDE, 0xAD, 0xBE, 0xEF]);
    assert!(received[0].payload_reference_uri.is_some());
}

#[tokio::test]
async fn e2_two_recipients_share_one_upload() {
    let crypto = Arc::new(DefaultCryptoProvider::new());
    let blob_store = Arc::new(FakeBlobStore::new());
    let relay = Arc::new(FakeInboxRelay::new());

    let alice = new_channel(&crypto, &blob_store, &relay, "https://relay.test").await;
    let bob = new_channel(&crypto, &blob_store, &relay, "https://relay.test").await;
    let carol = new_channel(&crypto, &blob_store, &relay, "https://relay.test").await;

    let payload = Payload::new(b"broadcast".to_vec());
    alice
        .post(
            &payload,
            &[bob.public_endpoint().await, carol.public_endpoint().await],
            TEN_MINUTES_MS,
            CancellationToken::new(),
        )
        .await
        .expect("posts to both recipients");

    assert_eq!(blob_store.upload_count(), 1);

    let bob_received = bob.receive(None, CancellationToken::new()).await.expect("bob receives");
    let carol_received = carol.receive(None, CancellationToken::new()).await.expect("carol receives");
    assert_eq!(bob_received.len(), 1);
    assert_eq!(carol_received.len(), 1);
    assert_eq!(bob_received[0].bytes, payload.bytes);
    assert_eq!(carol_received[0].bytes, payload.bytes);
}

#[tokio::test]
async fn e3_tampered_blob_fails_hash_check() {
    let crypto = Arc::new(DefaultCryptoProvider::new());
    let blob_store = Arc::new(FakeBlobStore::new());
    let relay = Arc::new(FakeInboxRelay::new());

    let alice = new_channel(&crypto, &blob_store, &relay, "https://relay.test").await;
    let alice_endpoint = alice.public_endpoint().await;

    let payload = Payload::new(b"tamper me".to_vec());
    alice
        .post(&payload, &[alice_endpoint], TEN_MINUTES_MS, CancellationToken::new())
        .await
        .expect("posts to self");

    blob_store.corrupt("https://blob.fake/0");

    let err = alice.receive(None, CancellationToken::new()).await;
    assert!(matches!(err, Err(courier_core::CourierError::InvalidMessage(_))));
}

#[tokio::test]
async fn e4_misdirected_notification_is_rejected() {
    let crypto = Arc::new(DefaultCryptoProvider::new());
    let blob_store = Arc::new(FakeBlobStore::new());
    let relay = Arc::new(FakeInboxRelay::new());

    let alice = new_channel(&crypto, &blob_store, &relay, "https://relay.test").await;
    let bob = new_channel(&crypto, &blob_store, &relay, "https://relay.test").await;
    let carol = new_channel(&crypto, &blob_store, &relay, "https://relay.test").await;

    let bob_endpoint = bob.public_endpoint().await;
    let bob_inbox_url = bob_endpoint.inbox_url.clone().expect("bob has an inbox");

    let payload = Payload::new(b"for bob's eyes only".to_vec());
    alice.post(&payload, &[bob_endpoint], TEN_MINUTES_MS, CancellationToken::new()).await.expect("posts to bob");

    // Eve captures the notification Alice addressed to Bob and re-posts it
    // verbatim into Carol's inbox, hoping the relay's lack of sender
    // authentication lets her redirect it.
    let captured = relay.captured_item_body(&bob_inbox_url, 0);
    let carol_inbox_url = carol.public_endpoint().await.inbox_url.clone().expect("carol has an inbox");
    relay
        .post_notification(&carol_inbox_url, captured, 10, &CancellationToken::new())
        .await
        .expect("eve can post without any relay-side sender authentication");

    let err = carol.receive(None, CancellationToken::new()).await;
    assert!(matches!(err, Err(CourierError::InvalidMessage(InvalidMessageKind::Misdirected))));
}

#[tokio::test]
async fn e5_expired_payload_blob_is_skipped_and_pointer_cleaned_up() {
    let crypto = Arc::new(DefaultCryptoProvider::new());
    let blob_store = Arc::new(FakeBlobStore::new());
    let relay = Arc::new(FakeInboxRelay::new());

    let alice = new_channel(&crypto, &blob_store, &relay, "https://relay.test").await;
    let alice_endpoint = alice.public_endpoint().await;
    let inbox_url = alice_endpoint.inbox_url.clone().expect("inbox created");

    let payload = Payload::new(b"will expire".to_vec());
    alice
        .post(&payload, &[alice_endpoint], TEN_MINUTES_MS, CancellationToken::new())
        .await
        .expect("posts to self");

    assert_eq!(relay.pending_count(&inbox_url), 1);
    // The relay has already reclaimed the payload blob itself (not the
    // notification pointing at it): a 404 on the payload-reference GET, the
    // scenario this spec calls out explicitly.
    blob_store.expire("https://blob.fake/0");

    let received = alice.receive(None, CancellationToken::new()).await.expect("receives without error");
    assert!(received.is_empty());
    assert_eq!(relay.pending_count(&inbox_url), 0);
}

#[tokio::test]
async fn notification_pointer_404_is_skipped_and_cleaned_up() {
    let crypto = Arc::new(DefaultCryptoProvider::new());
    let blob_store = Arc::new(FakeBlobStore::new());
    let relay = Arc::new(FakeInboxRelay::new());

    let alice = new_channel(&crypto, &blob_store, &relay, "https://relay.test").await;
    let alice_endpoint = alice.public_endpoint().await;
    let inbox_url = alice_endpoint.inbox_url.clone().expect("inbox created");

    let payload = Payload::new(b"will expire".to_vec());
    alice
        .post(&payload, &[alice_endpoint], TEN_MINUTES_MS, CancellationToken::new())
        .await
        .expect("posts to self");

    assert_eq!(relay.pending_count(&inbox_url), 1);
    // The notification pointer itself has already expired at the relay,
    // before the payload blob it references was ever reached.
    relay.expire_item(&format!("{inbox_url}/item/0"));

    let received = alice.receive(None, CancellationToken::new()).await.expect("receives without error");
    assert!(received.is_empty());
    assert_eq!(relay.pending_count(&inbox_url), 0);
}

#[tokio::test]
async fn e6_long_poll_timeout_is_retried_transparently() {
    let crypto = Arc::new(DefaultCryptoProvider::new());
    let blob_store = Arc::new(FakeBlobStore::new());
    let relay = Arc::new(FakeInboxRelay::new());

    let alice = new_channel(&crypto, &blob_store, &relay, "https://relay.test").await;
    let alice_endpoint = alice.public_endpoint().await;

    let payload = Payload::new(b"after the timeout".to_vec());
    alice
        .post(&payload, &[alice_endpoint], TEN_MINUTES_MS, CancellationToken::new())
        .await
        .expect("posts to self");

    relay.queue_long_poll_timeouts(2);

    let received = alice.receive(None, CancellationToken::new()).await.expect("retries past the timeouts");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].bytes, payload.bytes);
}

#[tokio::test]
async fn e7_fan_out_partial_failure_names_exactly_the_failed_recipient() {
    let crypto = Arc::new(DefaultCryptoProvider::new());
    let blob_store = Arc::new(FakeBlobStore::new());
    let relay = Arc::new(FakeInboxRelay::new());

    let alice = new_channel(&crypto, &blob_store, &relay, "https://relay.test").await;
    let bob = new_channel(&crypto, &blob_store, &relay, "https://relay.test").await;
    let carol = new_channel(&crypto, &blob_store, &relay, "https://relay.test").await;
    let dave = new_channel(&crypto, &blob_store, &relay, "https://relay.test").await;

    let carol_endpoint = carol.public_endpoint().await;
    relay.fail_recipient(carol_endpoint.inbox_url.as_deref().expect("carol has an inbox"));

    let payload = Payload::new(b"fan out".to_vec());
    let err = alice
        .post(
            &payload,
            &[bob.public_endpoint().await, carol_endpoint, dave.public_endpoint().await],
            TEN_MINUTES_MS,
            CancellationToken::new(),
        )
        .await
        .expect_err("carol's delivery fails");

    let PostError::PartialFailure { total_recipients, failed } = err else {
        panic!("expected a partial failure");
    };
    assert_eq!(total_recipients, 3);
    assert_eq!(failed.len(), 1);

    let bob_received = bob.receive(None, CancellationToken::new()).await.expect("bob receives");
    let dave_received = dave.receive(None, CancellationToken::new()).await.expect("dave receives");
    assert_eq!(bob_received.len(), 1);
    assert_eq!(dave_received.len(), 1);
}

#[tokio::test]
async fn e8_address_book_entry_round_trips_and_detects_tampering() {
    let crypto = DefaultCryptoProvider::new();
    let own = OwnEndpoint::generate(&crypto);

    let text = own.address_book_entry_text(&crypto);
    let (encoded, fragment) = text.split_once('#').expect("entry has a thumbprint fragment");
    assert_eq!(fragment, own.public.thumbprint(&crypto));

    let entry_bytes = courier_proto::base64url::decode(encoded).expect("valid base64url");
    let recovered = courier_core::verify_address_book_entry(&entry_bytes, &crypto).expect("verifies");
    assert_eq!(recovered, own.public);

    let mut tampered = entry_bytes.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0xFF;
    assert!(courier_core::verify_address_book_entry(&tampered, &crypto).is_err());
}
