//! HTTP clients for the external AI providers.
//!
//! This crate provides:
//! - [`TextClient`]: narration splitting and prompt optimization over a
//!   chat-completions API
//! - [`VideoGenClient`]: asynchronous image-to-video generation
//!   (submit returns a task id, completion is observed by polling)
//! - A shared provider error taxonomy distinguishing transient from
//!   terminal failures

pub mod error;
pub mod text;
pub mod video;

pub use error::{ProviderError, ProviderResult};
pub use text::{PromptMode, TextClient, TextConfig};
pub use video::{TaskState, VideoGenClient, VideoGenConfig, VideoTaskStatus};
