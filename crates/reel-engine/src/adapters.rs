//! Concrete adapters wiring the provider ports to real clients.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use reel_media::{concat_copy, ConcatOptions};
use reel_providers::{
    ProviderError, ProviderResult, TextClient, VideoGenClient, VideoTaskStatus,
};
use reel_storage::{
    final_video_key, segment_image_key, segment_video_key, S3Client, StorageError, StorageResult,
};

use crate::ports::{ArtifactStore, MergeProvider, PromptProvider, SplitProvider, VideoGenProvider};

#[async_trait]
impl SplitProvider for TextClient {
    async fn split_text(&self, text: &str) -> ProviderResult<Vec<String>> {
        TextClient::split_text(self, text).await
    }
}

#[async_trait]
impl PromptProvider for TextClient {
    async fn optimize_prompt(&self, segment_text: &str) -> ProviderResult<String> {
        TextClient::optimize_prompt(self, segment_text).await
    }
}

#[async_trait]
impl VideoGenProvider for VideoGenClient {
    async fn submit(&self, prompt: &str, image_url: &str) -> ProviderResult<String> {
        VideoGenClient::submit(self, prompt, image_url).await
    }

    async fn poll(&self, job_id: &str) -> ProviderResult<VideoTaskStatus> {
        VideoGenClient::poll(self, job_id).await
    }
}

/// Artifact store over S3-compatible object storage.
///
/// References recorded on segments are bucket keys; URLs are presigned on
/// demand with bounded expiry.
pub struct S3ArtifactStore {
    s3: Arc<S3Client>,
    /// Expiry for provider-facing image URLs
    image_url_expiry: Duration,
    /// Expiry for caller-facing delivery URLs
    delivery_url_expiry: Duration,
}

impl S3ArtifactStore {
    /// Create an artifact store.
    pub fn new(s3: Arc<S3Client>, image_url_expiry: Duration) -> Self {
        Self {
            s3,
            image_url_expiry,
            delivery_url_expiry: Duration::from_secs(600),
        }
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn store_image(
        &self,
        workflow_id: &str,
        index: usize,
        bytes: Vec<u8>,
        content_type: &str,
        ext: &str,
    ) -> StorageResult<String> {
        let key = segment_image_key(workflow_id, index, ext);
        self.s3.upload_bytes(bytes, &key, content_type).await?;
        Ok(key)
    }

    async fn image_url(&self, reference: &str) -> StorageResult<String> {
        self.s3.presign_get(reference, self.image_url_expiry).await
    }

    async fn archive_segment_video(
        &self,
        workflow_id: &str,
        index: usize,
        source_url: &str,
    ) -> StorageResult<String> {
        let dir = tempfile::tempdir()?;
        let local = dir.path().join(format!("segment_{index}.mp4"));

        reel_media::download_to(source_url, &local)
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?;

        let key = segment_video_key(workflow_id, index);
        self.s3.upload_file(&local, &key, "video/mp4").await?;
        info!(workflow_id, index, "Archived generated clip to {}", key);
        Ok(key)
    }

    async fn delivery_url(&self, reference: &str) -> StorageResult<String> {
        self.s3
            .presign_get(reference, self.delivery_url_expiry)
            .await
    }
}

/// Merge provider backed by a local FFmpeg concat.
///
/// Fetches every input clip from storage, concatenates with a stream copy,
/// and uploads the result. Nothing is uploaded on any failure, so a failed
/// merge never leaves a partial final artifact referenced.
pub struct FfmpegMergeProvider {
    s3: Arc<S3Client>,
    options: ConcatOptions,
}

impl FfmpegMergeProvider {
    /// Create a merge provider.
    pub fn new(s3: Arc<S3Client>) -> Self {
        Self {
            s3,
            options: ConcatOptions::default(),
        }
    }
}

#[async_trait]
impl MergeProvider for FfmpegMergeProvider {
    async fn merge(&self, workflow_id: &str, references: &[String]) -> ProviderResult<String> {
        if references.is_empty() {
            return Err(ProviderError::failed("no clips to merge"));
        }

        let dir = tempfile::tempdir()
            .map_err(|e| ProviderError::unavailable(e.to_string()))?;

        let mut inputs = Vec::with_capacity(references.len());
        for (i, reference) in references.iter().enumerate() {
            let local = dir.path().join(format!("segment_{i}.mp4"));
            self.s3
                .download_to(reference, &local)
                .await
                .map_err(|e| match e {
                    StorageError::NotFound(key) => {
                        ProviderError::failed(format!("merge input missing: {key}"))
                    }
                    other => ProviderError::unavailable(other.to_string()),
                })?;
            inputs.push(local);
        }

        let output = dir.path().join("final.mp4");
        concat_copy(&inputs, &output, &self.options)
            .await
            .map_err(|e| match e {
                reel_media::MediaError::Timeout(_) => ProviderError::unavailable(e.to_string()),
                other => ProviderError::failed(other.to_string()),
            })?;

        let key = final_video_key(workflow_id);
        self.s3
            .upload_file(&output, &key, "video/mp4")
            .await
            .map_err(|e| ProviderError::unavailable(e.to_string()))?;

        info!(workflow_id, clips = references.len(), "Merged final video to {}", key);
        Ok(key)
    }
}
