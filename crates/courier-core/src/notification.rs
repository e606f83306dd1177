//! Notification envelope construction and parsing (C4, and the
//! crypto-verification half of C5).
//!
//! The bound plaintext is structured so that the recipient's own signing key
//! is covered by the signature: a notification re-addressed to a different
//! recipient by an untrusted relay will fail the binding check even though
//! the signature still verifies.

use courier_proto::record::{EndpointRecord, PayloadReferenceRecord, Record};
use courier_proto::{Reader, write_framed, write_u64};

use crate::capabilities::CryptoProvider;
use crate::endpoint::Endpoint;
use crate::errors::{CourierError, InvalidMessageKind, Result};
use crate::payload::PayloadReference;

/// Builds the wire bytes POSTed to a single recipient's inbox.
///
/// Construction order (inside-out, matching [`parse_notification`]'s
/// decode order in reverse): bound plaintext, signature, symmetric
/// encryption, asymmetric key wrap.
#[must_use]
pub fn build_notification(
    crypto: &dyn CryptoProvider,
    sender_signing_priv: &[u8],
    sender_public: &Endpoint,
    recipient: &Endpoint,
    reference: &PayloadReference,
    created_at_unix_ms: u64,
) -> Vec<u8> {
    let mut bound_plaintext = Vec::new();
    let _ = write_framed(&mut bound_plaintext, &recipient.signing_pub);
    write_u64(&mut bound_plaintext, created_at_unix_ms);
    sender_public.to_record().encode(&mut bound_plaintext);
    reference.to_record().encode(&mut bound_plaintext);

    let signature = crypto.sign(sender_signing_priv, &bound_plaintext);

    let mut signed_envelope = Vec::new();
    let _ = write_framed(&mut signed_envelope, &signature);
    signed_envelope.extend_from_slice(&bound_plaintext);

    let encrypted = crypto.sym_encrypt(&signed_envelope);
    let wrapped_key = crypto.asym_encrypt(&recipient.encryption_pub, &encrypted.key);

    let mut wire = Vec::new();
    let _ = write_framed(&mut wire, &wrapped_key);
    let _ = write_framed(&mut wire, &encrypted.iv);
    let _ = write_framed(&mut wire, &encrypted.ciphertext);
    wire
}

/// A verified, decrypted notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNotification {
    /// The author's public endpoint, as embedded (and signed) inside the
    /// notification.
    pub author: Endpoint,
    /// The payload reference this notification carries.
    pub payload_reference: PayloadReference,
    /// When the sender claims to have created this notification.
    pub created_at_unix_ms: u64,
}

/// Decrypts and verifies a notification addressed to `own`.
///
/// # Errors
///
/// Returns [`CourierError::Malformed`] if the bytes are not a well-formed
/// wire body, or [`CourierError::InvalidMessage`] if the signature fails to
/// verify or the notification was not addressed to `own_signing_pub`.
pub fn parse_notification(
    crypto: &dyn CryptoProvider,
    own_encryption_priv: &[u8],
    own_signing_pub: &[u8],
    wire: &[u8],
    ceiling: usize,
) -> Result<ParsedNotification> {
    let mut reader = Reader::with_ceiling(wire, ceiling);
    let wrapped_key = reader.read_framed()?;
    let iv = reader.read_framed()?;
    let ciphertext = reader.read_framed()?;

    let symmetric_key = crypto.asym_decrypt(own_encryption_priv, wrapped_key)?;
    let signed_envelope = crypto.sym_decrypt(&symmetric_key, iv, ciphertext)?;

    let mut envelope_reader = Reader::with_ceiling(&signed_envelope, ceiling);
    let signature = envelope_reader.read_framed()?.to_vec();
    let bound_plaintext = &signed_envelope[signed_envelope.len() - envelope_reader.remaining()..];

    let mut bound_reader = Reader::with_ceiling(bound_plaintext, ceiling);
    let declared_recipient_signing_pub = bound_reader.read_framed()?.to_vec();
    let created_at_unix_ms = bound_reader.read_u64()?;
    let author = Endpoint::from_record(EndpointRecord::decode(&mut bound_reader)?);
    let payload_reference = PayloadReference::from_record(PayloadReferenceRecord::decode(&mut bound_reader)?);

    if !crypto.verify(&author.signing_pub, bound_plaintext, &signature) {
        return Err(CourierError::invalid_message(InvalidMessageKind::BadSignature));
    }

    if declared_recipient_signing_pub != own_signing_pub {
        return Err(CourierError::invalid_message(InvalidMessageKind::Misdirected));
    }

    Ok(ParsedNotification { author, payload_reference, created_at_unix_ms })
}

/// Computes the `lifetime` query parameter (whole minutes until expiry,
/// floored to zero) posted alongside a notification.
#[must_use]
pub fn lifetime_minutes(now_unix_ms: u64, expires_utc_unix_ms: u64) -> i64 {
    let remaining_ms = expires_utc_unix_ms as i64 - now_unix_ms as i64;
    (remaining_ms / 60_000).max(0)
}
