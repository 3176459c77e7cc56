//! Provider ports.
//!
//! One trait per external collaborator the engine depends on. Concrete
//! adapters live in [`crate::adapters`]; tests script these ports directly.

use async_trait::async_trait;

use reel_providers::{ProviderResult, VideoTaskStatus};
use reel_storage::StorageResult;

/// Text-splitting provider: narration text to ordered chunks.
#[async_trait]
pub trait SplitProvider: Send + Sync {
    /// Partition narration into ordered chunks. Must preserve input order.
    async fn split_text(&self, text: &str) -> ProviderResult<Vec<String>>;
}

/// Prompt-optimization provider.
#[async_trait]
pub trait PromptProvider: Send + Sync {
    /// Turn one narration chunk into a video generation prompt.
    async fn optimize_prompt(&self, segment_text: &str) -> ProviderResult<String>;
}

/// Asynchronous video-generation provider.
#[async_trait]
pub trait VideoGenProvider: Send + Sync {
    /// Submit an image-to-video job; returns the provider job id.
    async fn submit(&self, prompt: &str, image_url: &str) -> ProviderResult<String>;

    /// Poll a job. Idempotent; never mutates provider state.
    async fn poll(&self, job_id: &str) -> ProviderResult<VideoTaskStatus>;
}

/// Artifact storage for images and archived clips.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store first-frame image bytes; returns the artifact reference.
    async fn store_image(
        &self,
        workflow_id: &str,
        index: usize,
        bytes: Vec<u8>,
        content_type: &str,
        ext: &str,
    ) -> StorageResult<String>;

    /// Resolve an image reference to a URL the generation provider can fetch.
    async fn image_url(&self, reference: &str) -> StorageResult<String>;

    /// Copy a provider-hosted clip into owned storage; returns the new
    /// reference. Provider URLs expire, so clips are re-hosted before a
    /// segment is marked completed.
    async fn archive_segment_video(
        &self,
        workflow_id: &str,
        index: usize,
        source_url: &str,
    ) -> StorageResult<String>;

    /// Resolve a stored artifact reference to a short-lived delivery URL.
    async fn delivery_url(&self, reference: &str) -> StorageResult<String>;
}

/// Merge provider: ordered clip references to one final artifact.
#[async_trait]
pub trait MergeProvider: Send + Sync {
    /// Concatenate clips in the given order and return the final reference.
    /// Must fail without producing a final reference on any missing input.
    async fn merge(&self, workflow_id: &str, references: &[String]) -> ProviderResult<String>;
}
