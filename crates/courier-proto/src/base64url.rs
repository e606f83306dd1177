//! Unpadded base64url encoding, used for address-book entries and thumbprints.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::errors::{ProtoError, Result};

/// Encodes `bytes` as unpadded base64url.
#[must_use]
pub fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes unpadded base64url text.
///
/// # Errors
///
/// Returns [`ProtoError::InvalidBase64`] if `text` is not valid unpadded
/// base64url.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(text).map_err(|_| ProtoError::InvalidBase64)
}
