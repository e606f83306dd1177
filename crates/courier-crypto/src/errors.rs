//! Errors internal to primitive construction, mapped onto
//! [`courier_core::CourierError`] at the [`CryptoProvider`](courier_core::CryptoProvider)
//! trait boundary.

use courier_core::{CourierError, InvalidMessageKind};

/// A primitive-level failure: malformed key length, or an AEAD/signature
/// operation that did not authenticate.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// A key or nonce did not have the length the algorithm requires.
    #[error("invalid key or nonce length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Bytes the algorithm requires.
        expected: usize,
        /// Bytes actually supplied.
        actual: usize,
    },

    /// AEAD decryption failed to authenticate.
    #[error("authenticated decryption failed")]
    Unauthenticated,
}

impl From<CryptoError> for CourierError {
    /// Every primitive-level failure surfaces to callers as a signature
    /// failure: neither a malformed local key nor a failed AEAD tag is
    /// distinguishable from an attacker-crafted message at this boundary.
    fn from(_err: CryptoError) -> Self {
        CourierError::invalid_message(InvalidMessageKind::BadSignature)
    }
}
