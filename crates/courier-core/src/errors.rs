//! The channel-wide error taxonomy.
//!
//! Every fallible operation in this crate returns [`CourierError`] (or a
//! narrower alias built from it). The variants mirror the failure classes a
//! caller actually needs to branch on: malformed bytes, a failed
//! cryptographic check, a transport failure, cancellation, a precondition
//! violation, or something unanticipated.

use courier_proto::ProtoError;

/// Result alias used throughout `courier-core`.
pub type Result<T> = std::result::Result<T, CourierError>;

/// The reason an inbound message failed cryptographic verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidMessageKind {
    /// The outer signature did not verify under the claimed author key.
    BadSignature,
    /// The notification's bound recipient key does not match the receiver's
    /// own signing key — the message was not addressed to this endpoint.
    Misdirected,
    /// The downloaded payload blob's hash does not match the reference.
    HashMismatch,
}

impl std::fmt::Display for InvalidMessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BadSignature => "signature verification failed",
            Self::Misdirected => "notification was not addressed to this endpoint",
            Self::HashMismatch => "payload hash does not match the reference",
        };
        f.write_str(s)
    }
}

/// Top-level failure taxonomy for channel operations.
#[derive(Debug, thiserror::Error)]
pub enum CourierError {
    /// Untrusted bytes failed a structural check (framing, record schema).
    #[error("malformed input: {0}")]
    Malformed(#[from] ProtoError),

    /// A cryptographic or binding check failed on otherwise well-formed
    /// bytes.
    #[error("invalid message: {0}")]
    InvalidMessage(InvalidMessageKind),

    /// A network or blob-store operation failed.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// A precondition the caller was responsible for was not met.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// Any other failure, with the original error retained as the source.
    #[error("unexpected failure")]
    Unexpected(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CourierError {
    /// Convenience constructor for [`CourierError::InvalidMessage`].
    #[must_use]
    pub fn invalid_message(kind: InvalidMessageKind) -> Self {
        Self::InvalidMessage(kind)
    }

    /// Convenience constructor for [`CourierError::Precondition`].
    #[must_use]
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Convenience constructor for [`CourierError::Transport`].
    #[must_use]
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Wraps an arbitrary error as [`CourierError::Unexpected`].
    pub fn unexpected(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unexpected(Box::new(err))
    }
}
