//! Provider error types.

use thiserror::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors returned by external provider calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transient failure reaching the provider; the same call may be retried.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The provider rejected this request terminally; retrying with the same
    /// inputs will not help.
    #[error("Provider request failed: {0}")]
    Failed(String),

    /// The provider response could not be interpreted.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// The provider reported success without delivering an artifact.
    #[error("Provider invariant violation: {0}")]
    InvariantViolation(String),
}

impl ProviderError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Check if the same call is safe to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Unavailable(_))
    }

    /// Classify a reqwest transport error.
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            Self::Unavailable(e.to_string())
        } else {
            Self::Failed(e.to_string())
        }
    }

    /// Classify a non-success HTTP status.
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::Unavailable(format!("HTTP {status}: {body}"))
        } else {
            Self::Failed(format!("HTTP {status}: {body}"))
        }
    }
}
