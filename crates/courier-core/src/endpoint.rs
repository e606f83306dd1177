//! Endpoint identity: the public [`Endpoint`] and the caller's own private
//! [`OwnEndpoint`].

use std::io::{Read, Write};

use bytes::BufMut;
use courier_proto::record::{AddressBookEntryRecord, EndpointRecord, Record};
use courier_proto::{Reader, base64url, encode_to_vec};
use zeroize::Zeroizing;

use crate::capabilities::CryptoProvider;
use crate::errors::{CourierError, InvalidMessageKind, Result};

/// An endpoint's public identity: signing and encryption public keys, plus
/// the inbox URL once one has been created. Immutable once populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Public signing key bytes.
    pub signing_pub: Vec<u8>,
    /// Public encryption key bytes.
    pub encryption_pub: Vec<u8>,
    /// Absolute inbox URL, if one has been created for this endpoint.
    pub inbox_url: Option<String>,
}

impl Endpoint {
    /// The stable identity thumbprint: `base64url(hash(signing_pub))`.
    #[must_use]
    pub fn thumbprint(&self, crypto: &dyn CryptoProvider) -> String {
        crypto.thumbprint(&self.signing_pub)
    }

    pub(crate) fn to_record(&self) -> EndpointRecord {
        EndpointRecord {
            signing_pub: self.signing_pub.clone(),
            encryption_pub: self.encryption_pub.clone(),
            inbox_url: self.inbox_url.clone(),
        }
    }

    pub(crate) fn from_record(record: EndpointRecord) -> Self {
        Self {
            signing_pub: record.signing_pub,
            encryption_pub: record.encryption_pub,
            inbox_url: record.inbox_url,
        }
    }
}

/// A published, signed [`Endpoint`], recovered from its serialized form.
///
/// # Errors
///
/// Returns [`CourierError::Malformed`] if `entry_bytes` is not a
/// well-formed [`AddressBookEntryRecord`], or
/// [`CourierError::InvalidMessage`] if the entry's signature does not
/// verify against its own embedded signing key (the entry is self-signed).
pub fn verify_address_book_entry(
    entry_bytes: &[u8],
    crypto: &dyn CryptoProvider,
) -> Result<Endpoint> {
    let mut reader = Reader::new(entry_bytes);
    let entry = AddressBookEntryRecord::decode(&mut reader)?;

    let mut endpoint_reader = Reader::new(&entry.endpoint_bytes);
    let endpoint = Endpoint::from_record(EndpointRecord::decode(&mut endpoint_reader)?);

    if !crypto.verify(&endpoint.signing_pub, &entry.endpoint_bytes, &entry.signature) {
        return Err(CourierError::invalid_message(InvalidMessageKind::BadSignature));
    }

    Ok(endpoint)
}

/// An endpoint's private material: the signing and encryption private keys
/// and, once an inbox exists, the owner code that proves list/delete
/// authority over it.
///
/// Private key buffers are wrapped in [`Zeroizing`] so they are scrubbed on
/// drop; they never leave the process except through [`OwnEndpoint::save`].
#[derive(Debug)]
pub struct OwnEndpoint {
    /// The public half of this identity.
    pub public: Endpoint,
    /// Private signing key bytes.
    pub signing_priv: Zeroizing<Vec<u8>>,
    /// Private encryption key bytes.
    pub encryption_priv: Zeroizing<Vec<u8>>,
    /// Bearer secret proving list/delete authority, once an inbox exists.
    pub inbox_owner_code: Option<String>,
}

impl OwnEndpoint {
    /// Generates a fresh identity with no inbox yet created.
    #[must_use]
    pub fn generate(crypto: &dyn CryptoProvider) -> Self {
        let (signing_priv, signing_pub) = crypto.generate_signing_keypair();
        let (encryption_priv, encryption_pub) = crypto.generate_encryption_keypair();
        Self {
            public: Endpoint { signing_pub, encryption_pub, inbox_url: None },
            signing_priv: Zeroizing::new(signing_priv),
            encryption_priv: Zeroizing::new(encryption_priv),
            inbox_owner_code: None,
        }
    }

    /// Builds a self-signed [`AddressBookEntryRecord`] for this identity's
    /// public half.
    #[must_use]
    pub fn create_address_book_entry(&self, crypto: &dyn CryptoProvider) -> AddressBookEntryRecord {
        let endpoint_bytes = encode_to_vec(&self.public.to_record());
        let signature = crypto.sign(&self.signing_priv, &endpoint_bytes);
        AddressBookEntryRecord { endpoint_bytes, signature }
    }

    /// Renders the address-book entry as `base64url(entry)#base64url(thumbprint)`,
    /// ready to publish.
    #[must_use]
    pub fn address_book_entry_text(&self, crypto: &dyn CryptoProvider) -> String {
        let entry = self.create_address_book_entry(crypto);
        let entry_bytes = encode_to_vec(&entry);
        format!("{}#{}", base64url::encode(&entry_bytes), self.public.thumbprint(crypto))
    }

    /// Serializes this identity's private material to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::Unexpected`] if writing to `sink` fails.
    pub fn save(&self, sink: &mut impl Write) -> Result<()> {
        let mut buf = Vec::new();
        buf.put_u8(courier_proto::OWN_ENDPOINT_FORMAT_VERSION);
        let _ = courier_proto::write_framed(&mut buf, &self.signing_priv);
        let _ = courier_proto::write_framed(&mut buf, &self.encryption_priv);
        self.public.to_record().encode(&mut buf);
        write_optional_string(&mut buf, self.inbox_owner_code.as_deref());
        sink.write_all(&buf).map_err(|e| CourierError::unexpected(IoError(e)))
    }

    /// Deserializes a private identity previously written by [`Self::save`].
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::Malformed`] if the stream is not a
    /// well-formed, version-compatible persisted endpoint.
    pub fn open(source: &mut impl Read) -> Result<Self> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes).map_err(|e| CourierError::unexpected(IoError(e)))?;

        let mut reader = Reader::new(&bytes);
        let version = reader.read_byte()?;
        if version != courier_proto::OWN_ENDPOINT_FORMAT_VERSION {
            return Err(CourierError::precondition(format!(
                "unsupported persisted endpoint format version {version}"
            )));
        }
        let signing_priv = Zeroizing::new(reader.read_framed()?.to_vec());
        let encryption_priv = Zeroizing::new(reader.read_framed()?.to_vec());
        let public = Endpoint::from_record(EndpointRecord::decode(&mut reader)?);
        let inbox_owner_code = read_optional_string(&mut reader)?;

        Ok(Self { public, signing_priv, encryption_priv, inbox_owner_code })
    }
}

fn write_optional_string(dst: &mut impl BufMut, value: Option<&str>) {
    match value {
        Some(s) => {
            dst.put_u8(1);
            let _ = courier_proto::write_framed(dst, s.as_bytes());
        }
        None => dst.put_u8(0),
    }
}

fn read_optional_string(reader: &mut Reader<'_>) -> Result<Option<String>> {
    match reader.read_byte()? {
        0 => Ok(None),
        1 => {
            let bytes = reader.read_framed()?;
            let s = std::str::from_utf8(bytes)
                .map_err(|_| courier_proto::ProtoError::InvalidField("non-utf8 owner code"))?;
            Ok(Some(s.to_owned()))
        }
        _ => Err(courier_proto::ProtoError::InvalidField("optional-string tag").into()),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("io failure: {0}")]
struct IoError(std::io::Error);

#[cfg(test)]
mod tests {
    use super::*;

    struct StubCrypto;

    impl CryptoProvider for StubCrypto {
        fn generate_signing_keypair(&self) -> (Vec<u8>, Vec<u8>) {
            (vec![1, 2, 3], vec![4, 5, 6])
        }
        fn generate_encryption_keypair(&self) -> (Vec<u8>, Vec<u8>) {
            (vec![7, 8, 9], vec![10, 11, 12])
        }
        fn sign(&self, _priv: &[u8], message: &[u8]) -> Vec<u8> {
            message.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)).to_le_bytes().to_vec()
        }
        fn verify(&self, _pub: &[u8], message: &[u8], signature: &[u8]) -> bool {
            self.sign(&[], message) == signature
        }
        fn asym_encrypt(&self, _recipient_pub: &[u8], plaintext: &[u8]) -> Vec<u8> {
            plaintext.to_vec()
        }
        fn asym_decrypt(&self, _own_priv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
            Ok(ciphertext.to_vec())
        }
        fn sym_encrypt(&self, plaintext: &[u8]) -> crate::capabilities::SymmetricEncryptionResult {
            crate::capabilities::SymmetricEncryptionResult {
                key: vec![0; 32],
                iv: vec![0; 12],
                ciphertext: plaintext.to_vec(),
            }
        }
        fn sym_decrypt(&self, _key: &[u8], _iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
            Ok(ciphertext.to_vec())
        }
        fn hash(&self, bytes: &[u8]) -> Vec<u8> {
            bytes.to_vec()
        }
        fn thumbprint(&self, signing_pub: &[u8]) -> String {
            courier_proto::base64url::encode(signing_pub)
        }
    }

    #[test]
    fn address_book_entry_round_trips_and_verifies() {
        let crypto = StubCrypto;
        let own = OwnEndpoint::generate(&crypto);
        let entry = own.create_address_book_entry(&crypto);
        let entry_bytes = encode_to_vec(&entry);

        let recovered = verify_address_book_entry(&entry_bytes, &crypto).expect("verifies");
        assert_eq!(recovered, own.public);
    }

    #[test]
    fn tampered_address_book_entry_fails_verification() {
        let crypto = StubCrypto;
        let own = OwnEndpoint::generate(&crypto);
        let entry = own.create_address_book_entry(&crypto);
        let mut entry_bytes = encode_to_vec(&entry);
        let last = entry_bytes.len() - 1;
        entry_bytes[last] ^= 0xFF;

        let err = verify_address_book_entry(&entry_bytes, &crypto);
        assert!(err.is_err());
    }

    #[test]
    fn save_and_open_round_trip_private_material() {
        let crypto = StubCrypto;
        let mut own = OwnEndpoint::generate(&crypto);
        own.inbox_owner_code = Some("owner-secret".to_owned());
        own.public.inbox_url = Some("https://relay.example/inbox/abc".to_owned());

        let mut buf = Vec::new();
        own.save(&mut buf).expect("saves");

        let reopened = OwnEndpoint::open(&mut buf.as_slice()).expect("opens");
        assert_eq!(reopened.public, own.public);
        assert_eq!(*reopened.signing_priv, *own.signing_priv);
        assert_eq!(*reopened.encryption_priv, *own.encryption_priv);
        assert_eq!(reopened.inbox_owner_code, own.inbox_owner_code);
    }
}
