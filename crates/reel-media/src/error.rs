//! Media error types.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media operations.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFmpeg failed (exit code {code:?}): {stderr}")]
    FfmpegFailed { stderr: String, code: Option<i32> },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("No input files to merge")]
    EmptyInput,

    #[error("Download failed: {0}")]
    Download(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn ffmpeg_failed(stderr: impl Into<String>, code: Option<i32>) -> Self {
        Self::FfmpegFailed {
            stderr: stderr.into(),
            code,
        }
    }

    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }
}
