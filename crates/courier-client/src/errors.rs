//! Mapping `reqwest` failures onto the shared [`courier_core::CourierError`]
//! taxonomy, and the aggregate error for a fanned-out `post`.

use courier_core::CourierError;

/// Wraps a `reqwest` error as a [`CourierError::Transport`].
pub(crate) fn wrap_reqwest(context: &str, err: reqwest::Error) -> CourierError {
    CourierError::transport(format!("{context}: {err}"))
}

/// Failure from [`crate::channel::Channel::post`].
#[derive(Debug, thiserror::Error)]
pub enum PostError {
    /// A precondition the caller was responsible for was not met (empty
    /// recipient list, non-UTC expiry) — the post was never attempted.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// Encrypting, hashing, or uploading the payload blob itself failed
    /// (transport failure, cancellation, or similar) before any
    /// notification was sent to a recipient.
    #[error("payload upload failed: {0}")]
    Upload(#[source] CourierError),

    /// At least one recipient's delivery failed. Every other recipient's
    /// task still ran to completion.
    #[error("post failed for {} of {} recipients", failed.len(), total_recipients)]
    PartialFailure {
        /// Total recipients the post was attempted for.
        total_recipients: usize,
        /// `(recipient thumbprint, failure)` pairs, one per recipient whose
        /// delivery did not succeed.
        failed: Vec<(String, CourierError)>,
    },
}

impl From<CourierError> for PostError {
    fn from(err: CourierError) -> Self {
        match err {
            CourierError::Precondition(msg) => Self::Precondition(msg),
            other => Self::Upload(other),
        }
    }
}
