use thiserror::Error;

/// Request-level failures of an update cycle.
///
/// Anything the provider said that we could not make sense of is not an
/// error: it is classified as [`crate::clients::UpdateOutcome::RetryLater`].
/// Only the cases below abort the cycle for an alias.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// The HTTP status line was rejected, the body is not trusted.
    #[error("HTTP status {status} rejected by transport")]
    TransportRejected { status: u16 },

    /// The rendered request did not fit the request buffer and must not be sent.
    #[error("update request needs {needed} bytes but the buffer holds {capacity}")]
    TruncatedRequest { needed: usize, capacity: usize },

    /// The request template does not carry the expected placeholders.
    #[error("request template has {found} placeholders, expected {expected}")]
    Template { expected: usize, found: usize },
}
