//! Payload envelope construction: encrypt, hash, upload, and reference a
//! payload blob (C3).

use courier_proto::record::{PayloadRecord, Record};
use courier_proto::encode_to_vec;
use tokio_util::sync::CancellationToken;

use crate::capabilities::{BlobStore, CryptoProvider};
use crate::errors::{CourierError, Result};

/// An application payload, round-tripped through the channel.
///
/// `payload_reference_uri` is `None` until a receiver populates it from the
/// inbox item the notification carrying this payload arrived at; it is used
/// to later acknowledge the item via `delete_inbox_item`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Opaque application bytes.
    pub bytes: Vec<u8>,
    /// The inbox item URL this payload was delivered through, once received.
    pub payload_reference_uri: Option<String>,
}

impl Payload {
    /// Wraps raw bytes as an outbound payload with no reference yet.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, payload_reference_uri: None }
    }
}

/// A pointer to an uploaded, encrypted payload blob.
///
/// `reference_location` is populated by the inbound pipeline from the
/// inbox item's own URL; it is never carried on the wire (see
/// `courier_proto::record::PayloadReferenceRecord`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadReference {
    /// Absolute URL of the encrypted blob.
    pub location: String,
    /// Hash of the ciphertext at `location`.
    pub hash: Vec<u8>,
    /// Symmetric key used to decrypt the blob.
    pub sym_key: Vec<u8>,
    /// Symmetric IV/nonce used to decrypt the blob.
    pub sym_iv: Vec<u8>,
    /// UTC expiry, as Unix milliseconds.
    pub expires_utc_unix_ms: u64,
    /// The inbox item this reference arrived attached to, once received.
    pub reference_location: Option<String>,
}

impl PayloadReference {
    pub(crate) fn to_record(&self) -> courier_proto::record::PayloadReferenceRecord {
        courier_proto::record::PayloadReferenceRecord {
            location: self.location.clone(),
            hash: self.hash.clone(),
            sym_key: self.sym_key.clone(),
            sym_iv: self.sym_iv.clone(),
            expires_utc_unix_ms: self.expires_utc_unix_ms,
        }
    }

    pub(crate) fn from_record(record: courier_proto::record::PayloadReferenceRecord) -> Self {
        Self {
            location: record.location,
            hash: record.hash,
            sym_key: record.sym_key,
            sym_iv: record.sym_iv,
            expires_utc_unix_ms: record.expires_utc_unix_ms,
            reference_location: None,
        }
    }
}

/// Encrypts, hashes, and uploads `payload`, producing a [`PayloadReference`].
///
/// # Errors
///
/// Returns [`CourierError::Precondition`] if `expires_utc_unix_ms` is zero
/// (used as a sentinel for "not set"), [`CourierError::Cancelled`] if
/// `cancel` fires first, or propagates the blob store's error.
pub async fn post_payload(
    crypto: &dyn CryptoProvider,
    blob_store: &dyn BlobStore,
    payload: &Payload,
    expires_utc_unix_ms: u64,
    cancel: &CancellationToken,
) -> Result<PayloadReference> {
    if expires_utc_unix_ms == 0 {
        return Err(CourierError::precondition("expires_utc_unix_ms must be set"));
    }

    let plaintext = encode_to_vec(&PayloadRecord { bytes: payload.bytes.clone() });
    let encrypted = crypto.sym_encrypt(&plaintext);
    let content_hash = crypto.hash(&encrypted.ciphertext);
    let location = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(CourierError::Cancelled),
        result = blob_store.upload(&encrypted.ciphertext, expires_utc_unix_ms, cancel) => result?,
    };

    Ok(PayloadReference {
        location,
        hash: content_hash,
        sym_key: encrypted.key,
        sym_iv: encrypted.iv,
        expires_utc_unix_ms,
        reference_location: None,
    })
}

/// Fetches and decrypts the payload blob described by `reference`,
/// verifying its hash first.
///
/// Returns `Ok(None)` if the blob store reports the blob missing: the
/// relay's own expiry has already reclaimed it, which is not an error (see
/// `courier_client::Channel::process_item`, which deletes the now-useless
/// inbox pointer in response and treats this as a skipped item, mirroring
/// how it handles a 404 on the notification fetch itself).
///
/// # Errors
///
/// Returns [`CourierError::InvalidMessage`] if the fetched bytes' hash does
/// not match `reference.hash`, [`CourierError::Cancelled`] if `cancel`
/// fires first, or propagates a blob-store/decryption failure.
pub async fn fetch_payload(
    crypto: &dyn CryptoProvider,
    blob_store: &dyn BlobStore,
    reference: &PayloadReference,
    ceiling: usize,
    cancel: &CancellationToken,
) -> Result<Option<Payload>> {
    use crate::capabilities::FetchOutcome;
    use crate::errors::InvalidMessageKind;

    let fetched = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(CourierError::Cancelled),
        result = blob_store.fetch(&reference.location, cancel) => result?,
    };

    let ciphertext = match fetched {
        FetchOutcome::Found(bytes) => bytes,
        FetchOutcome::NotFound => return Ok(None),
    };

    let actual_hash = crypto.hash(&ciphertext);
    if actual_hash != reference.hash {
        return Err(CourierError::invalid_message(InvalidMessageKind::HashMismatch));
    }

    let plaintext = crypto.sym_decrypt(&reference.sym_key, &reference.sym_iv, &ciphertext)?;
    let mut reader = courier_proto::Reader::with_ceiling(&plaintext, ceiling);
    let record = PayloadRecord::decode(&mut reader)?;

    Ok(Some(Payload {
        bytes: record.bytes,
        payload_reference_uri: reference.reference_location.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::capabilities::FetchOutcome;

    struct EchoCrypto;

    impl CryptoProvider for EchoCrypto {
        fn generate_signing_keypair(&self) -> (Vec<u8>, Vec<u8>) {
            (vec![], vec![])
        }
        fn generate_encryption_keypair(&self) -> (Vec<u8>, Vec<u8>) {
            (vec![], vec![])
        }
        fn sign(&self, _priv: &[u8], _message: &[u8]) -> Vec<u8> {
            vec![]
        }
        fn verify(&self, _pub: &[u8], _message: &[u8], _signature: &[u8]) -> bool {
            true
        }
        fn asym_encrypt(&self, _recipient_pub: &[u8], plaintext: &[u8]) -> Vec<u8> {
            plaintext.to_vec()
        }
        fn asym_decrypt(&self, _own_priv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
            Ok(ciphertext.to_vec())
        }
        fn sym_encrypt(&self, plaintext: &[u8]) -> crate::capabilities::SymmetricEncryptionResult {
            crate::capabilities::SymmetricEncryptionResult {
                key: vec![1; 16],
                iv: vec![2; 12],
                ciphertext: plaintext.to_vec(),
            }
        }
        fn sym_decrypt(&self, _key: &[u8], _iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
            Ok(ciphertext.to_vec())
        }
        fn hash(&self, bytes: &[u8]) -> Vec<u8> {
            bytes.iter().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(*b))).to_le_bytes().to_vec()
        }
        fn thumbprint(&self, signing_pub: &[u8]) -> String {
            courier_proto::base64url::encode(signing_pub)
        }
    }

    struct InMemoryBlobStore {
        blobs: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl InMemoryBlobStore {
        fn new() -> Self {
            Self { blobs: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl BlobStore for InMemoryBlobStore {
        async fn upload(&self, bytes: &[u8], _expires_utc_unix_ms: u64, _cancel: &CancellationToken) -> Result<String> {
            let mut blobs = self.blobs.lock().expect("not poisoned");
            let url = format!("https://blob.test/{}", blobs.len());
            blobs.push((url.clone(), bytes.to_vec()));
            Ok(url)
        }

        async fn fetch(&self, url: &str, _cancel: &CancellationToken) -> Result<FetchOutcome> {
            let blobs = self.blobs.lock().expect("not poisoned");
            Ok(blobs
                .iter()
                .find(|(u, _)| u == url)
                .map(|(_, bytes)| FetchOutcome::Found(bytes.clone()))
                .unwrap_or(FetchOutcome::NotFound))
        }
    }

    #[tokio::test]
    async fn payload_round_trips_through_upload_and_fetch() {
        let crypto = EchoCrypto;
        let store = InMemoryBlobStore::new();
        let payload = Payload::new(b"hello courier".to_vec());

        let reference =
            post_payload(&crypto, &store, &payload, 1_700_000_000_000, &CancellationToken::new()).await.unwrap();
        let recovered =
            fetch_payload(&crypto, &store, &reference, courier_proto::DEFAULT_CEILING, &CancellationToken::new())
                .await
                .unwrap()
                .expect("blob is present");

        assert_eq!(recovered.bytes, payload.bytes);
    }

    #[tokio::test]
    async fn tampered_blob_fails_hash_check() {
        let crypto = EchoCrypto;
        let store = InMemoryBlobStore::new();
        let payload = Payload::new(b"hello courier".to_vec());

        let reference =
            post_payload(&crypto, &store, &payload, 1_700_000_000_000, &CancellationToken::new()).await.unwrap();
        {
            let mut blobs = store.blobs.lock().unwrap();
            blobs[0].1[0] ^= 0xFF;
        }

        let err =
            fetch_payload(&crypto, &store, &reference, courier_proto::DEFAULT_CEILING, &CancellationToken::new())
                .await;
        assert!(matches!(err, Err(CourierError::InvalidMessage(_))));
    }

    #[tokio::test]
    async fn expired_blob_is_reported_as_none_not_an_error() {
        let crypto = EchoCrypto;
        let store = InMemoryBlobStore::new();
        let payload = Payload::new(b"will expire".to_vec());

        let reference =
            post_payload(&crypto, &store, &payload, 1_700_000_000_000, &CancellationToken::new()).await.unwrap();
        store.blobs.lock().unwrap().clear();

        let outcome =
            fetch_payload(&crypto, &store, &reference, courier_proto::DEFAULT_CEILING, &CancellationToken::new())
                .await
                .expect("a missing blob is not an error");
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn zero_expiry_is_rejected() {
        let crypto = EchoCrypto;
        let store = InMemoryBlobStore::new();
        let payload = Payload::new(b"x".to_vec());

        let err = post_payload(&crypto, &store, &payload, 0, &CancellationToken::new()).await;
        assert!(matches!(err, Err(CourierError::Precondition(_))));
    }
}
