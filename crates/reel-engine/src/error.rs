//! Engine error taxonomy.

use thiserror::Error;

use reel_providers::ProviderError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by orchestration operations.
///
/// Precondition failures are raised before any external call. Provider
/// failures are recorded into the affected segment's error context and then
/// re-raised as one of these variants.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Segment index {index} out of range (workflow has {len} segments)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Precondition not met: {0}")]
    PreconditionNotMet(String),

    /// Transient external failure; the same call may be retried safely.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider rejected this request terminally.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The provider reported success without delivering an artifact.
    #[error("Provider invariant violation: {0}")]
    ProviderInvariantViolation(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Storage error: {0}")]
    Storage(#[from] reel_storage::StorageError),

    #[error("Store error: {0}")]
    Store(#[from] reel_docstore::StoreError),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),
}

impl EngineError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionNotMet(msg.into())
    }

    /// Check if the same call is safe to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ProviderUnavailable(_))
    }
}

impl From<ProviderError> for EngineError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Unavailable(msg) => EngineError::ProviderUnavailable(msg),
            ProviderError::InvariantViolation(msg) => EngineError::ProviderInvariantViolation(msg),
            ProviderError::Failed(msg) | ProviderError::InvalidResponse(msg) => {
                EngineError::Provider(msg)
            }
        }
    }
}
