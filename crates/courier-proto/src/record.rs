//! Deterministic record encodings for the domain types exchanged over the
//! wire: endpoints, payload references, and payloads.
//!
//! Every record is a fixed, ordered sequence of size-and-buffer fields or
//! fixed-width integers (see [`crate::framing`]). Field order is part of the
//! schema and must never change without a new format-version byte.

use bytes::BufMut;

use crate::errors::{ProtoError, Result};
use crate::framing::{self, Reader};

/// Implemented by every wire record. Kept object-unsafe on purpose (generic
/// `decode` returns `Self`) since callers always know the concrete type they
/// expect.
pub trait Record: Sized {
    /// Appends this record's wire bytes to `dst`.
    fn encode(&self, dst: &mut impl BufMut);

    /// Parses a record from `reader`, enforcing the reader's ceiling on every
    /// nested field.
    ///
    /// # Errors
    ///
    /// Propagates [`ProtoError`] from any malformed or truncated field.
    fn decode(reader: &mut Reader<'_>) -> Result<Self>;
}

fn write_optional_str(dst: &mut impl BufMut, value: Option<&str>) -> Result<()> {
    match value {
        Some(s) => {
            dst.put_u8(1);
            framing::write_framed(dst, s.as_bytes())
        }
        None => {
            dst.put_u8(0);
            Ok(())
        }
    }
}

/// Endpoint identity: signing and encryption public keys, plus an optional
/// inbox URL (absent until the owner has created an inbox).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRecord {
    /// Ed25519 public signing key bytes.
    pub signing_pub: Vec<u8>,
    /// X25519 public encryption key bytes.
    pub encryption_pub: Vec<u8>,
    /// Absolute inbox URL, once an inbox has been created for this endpoint.
    pub inbox_url: Option<String>,
}

impl Record for EndpointRecord {
    fn encode(&self, dst: &mut impl BufMut) {
        let _ = framing::write_framed(dst, &self.signing_pub);
        let _ = framing::write_framed(dst, &self.encryption_pub);
        let _ = write_optional_str(dst, self.inbox_url.as_deref());
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let signing_pub = reader.read_framed()?.to_vec();
        let encryption_pub = reader.read_framed()?.to_vec();
        let inbox_url = decode_optional_str(reader)?;
        Ok(Self { signing_pub, encryption_pub, inbox_url })
    }
}

fn decode_optional_str(reader: &mut Reader<'_>) -> Result<Option<String>> {
    let present = reader.read_byte()?;
    match present {
        0 => Ok(None),
        1 => {
            let bytes = reader.read_framed()?;
            let s = std::str::from_utf8(bytes)
                .map_err(|_| ProtoError::InvalidField("non-utf8 inbox_url"))?;
            Ok(Some(s.to_owned()))
        }
        _ => Err(ProtoError::InvalidField("optional-string tag")),
    }
}

/// A pointer to an uploaded, encrypted payload blob.
///
/// `reference_location` is deliberately absent from the wire form: it is
/// populated by the receiver from the inbox item's URL, never transmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadReferenceRecord {
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
}

impl Record for PayloadReferenceRecord {
    fn encode(&self, dst: &mut impl BufMut) {
        let _ = framing::write_framed(dst, self.location.as_bytes());
        let _ = framing::write_framed(dst, &self.hash);
        let _ = framing::write_framed(dst, &self.sym_key);
        let _ = framing::write_framed(dst, &self.sym_iv);
        framing::write_u64(dst, self.expires_utc_unix_ms);
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let location = std::str::from_utf8(reader.read_framed()?)
            .map_err(|_| ProtoError::InvalidField("non-utf8 location"))?
            .to_owned();
        let hash = reader.read_framed()?.to_vec();
        let sym_key = reader.read_framed()?.to_vec();
        let sym_iv = reader.read_framed()?.to_vec();
        let expires_utc_unix_ms = reader.read_u64()?;
        Ok(Self { location, hash, sym_key, sym_iv, expires_utc_unix_ms })
    }
}

/// An application payload: opaque bytes the channel carries without
/// interpreting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadRecord {
    /// Opaque application bytes.
    pub bytes: Vec<u8>,
}

impl Record for PayloadRecord {
    fn encode(&self, dst: &mut impl BufMut) {
        let _ = framing::write_framed(dst, &self.bytes);
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self { bytes: reader.read_framed()?.to_vec() })
    }
}

/// A published, self-attesting endpoint: the serialized [`EndpointRecord`]
/// plus a signature over those exact bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBookEntryRecord {
    /// Serialized [`EndpointRecord`] bytes (not the struct itself, so the
    /// signature covers exactly the bytes a verifier will re-hash).
    pub endpoint_bytes: Vec<u8>,
    /// Signature over `endpoint_bytes`.
    pub signature: Vec<u8>,
}

impl Record for AddressBookEntryRecord {
    fn encode(&self, dst: &mut impl BufMut) {
        let _ = framing::write_framed(dst, &self.endpoint_bytes);
        let _ = framing::write_framed(dst, &self.signature);
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let endpoint_bytes = reader.read_framed()?.to_vec();
        let signature = reader.read_framed()?.to_vec();
        Ok(Self { endpoint_bytes, signature })
    }
}

/// Encodes a [`Record`] into a freshly allocated buffer.
#[must_use]
pub fn encode_to_vec<R: Record>(record: &R) -> Vec<u8> {
    let mut buf = Vec::new();
    record.encode(&mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn arb_bytes() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(any::<u8>(), 0..64)
    }

    proptest! {
        #[test]
        fn endpoint_round_trip(
            signing_pub in arb_bytes(),
            encryption_pub in arb_bytes(),
            has_url in any::<bool>(),
        ) {
            let inbox_url = has_url.then(|| "https://relay.example/inbox/abc".to_owned());
            let record = EndpointRecord { signing_pub, encryption_pub, inbox_url };
            let wire = encode_to_vec(&record);
            let mut reader = Reader::new(&wire);
            let decoded = EndpointRecord::decode(&mut reader).expect("decodes");
            prop_assert_eq!(decoded, record);
            prop_assert_eq!(reader.remaining(), 0);
        }

        #[test]
        fn payload_reference_round_trip(
            hash in arb_bytes(),
            sym_key in arb_bytes(),
            sym_iv in arb_bytes(),
            expires_utc_unix_ms in any::<u64>(),
        ) {
            let record = PayloadReferenceRecord {
                location: "https://blob.example/x".to_owned(),
                hash,
                sym_key,
                sym_iv,
                expires_utc_unix_ms,
            };
            let wire = encode_to_vec(&record);
            let mut reader = Reader::new(&wire);
            let decoded = PayloadReferenceRecord::decode(&mut reader).expect("decodes");
            prop_assert_eq!(decoded, record);
        }

        #[test]
        fn payload_round_trip(bytes in arb_bytes()) {
            let record = PayloadRecord { bytes };
            let wire = encode_to_vec(&record);
            let mut reader = Reader::new(&wire);
            let decoded = PayloadRecord::decode(&mut reader).expect("decodes");
            prop_assert_eq!(decoded, record);
        }
    }

    #[test]
    fn endpoint_without_inbox_url_round_trips() {
        let record = EndpointRecord {
            signing_pub: vec![1, 2, 3],
            encryption_pub: vec![4, 5, 6],
            inbox_url: None,
        };
        let wire = encode_to_vec(&record);
        let mut reader = Reader::new(&wire);
        let decoded = EndpointRecord::decode(&mut reader).expect("decodes");
        assert_eq!(decoded, record);
    }
}
