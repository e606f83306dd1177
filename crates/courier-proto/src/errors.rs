//! Errors raised while encoding or decoding wire bytes.

/// Result alias for fallible codec operations.
pub type Result<T> = std::result::Result<T, ProtoError>;

/// Failures surfaced by the framing and record codec.
///
/// Every variant here corresponds to untrusted bytes failing a structural
/// check. None of these indicate a cryptographic failure; signature and hash
/// verification live one layer up, in `courier-core`.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// A size-and-buffer length prefix exceeds the configured ceiling.
    #[error("declared length {declared} exceeds ceiling {ceiling}")]
    LengthExceedsCeiling {
        /// Length claimed by the prefix.
        declared: usize,
        /// Configured maximum.
        ceiling: usize,
    },

    /// Fewer bytes remain in the buffer than the length prefix promised.
    #[error("buffer truncated: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required to satisfy the read.
        needed: usize,
        /// Bytes actually remaining.
        available: usize,
    },

    /// A record field held a value outside its declared domain (e.g. an
    /// unrecognized format-version byte, a non-UTF-8 URL).
    #[error("invalid record field: {0}")]
    InvalidField(&'static str),

    /// A length does not fit the wire's fixed-width integer encoding.
    #[error("value too large to encode on the wire")]
    TooLarge,

    /// base64url decoding failed.
    #[error("invalid base64url encoding")]
    InvalidBase64,
}
