//! Application state.

use std::sync::Arc;

use reel_docstore::FsWorkflowStore;
use reel_engine::{Engine, EngineConfig, FfmpegMergeProvider, S3ArtifactStore};
use reel_providers::{TextClient, VideoGenClient};
use reel_storage::S3Client;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub engine: Arc<Engine>,
}

impl AppState {
    /// Create new application state, wiring the engine to its collaborators.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let store = FsWorkflowStore::from_env().await?;
        let s3 = Arc::new(S3Client::from_env().await?);
        let text = Arc::new(TextClient::from_env()?);
        let video = Arc::new(VideoGenClient::from_env()?);

        let engine_config = EngineConfig::from_env();
        let artifacts = Arc::new(S3ArtifactStore::new(
            Arc::clone(&s3),
            engine_config.image_url_expiry,
        ));
        let merger = Arc::new(FfmpegMergeProvider::new(Arc::clone(&s3)));

        let engine = Arc::new(Engine::new(
            Arc::new(store),
            Arc::clone(&text) as _,
            text as _,
            video as _,
            artifacts as _,
            merger as _,
            engine_config,
        ));

        Ok(Self { config, engine })
    }

    /// Build state around an existing engine (tests, embedding).
    pub fn with_engine(config: ApiConfig, engine: Arc<Engine>) -> Self {
        Self { config, engine }
    }
}
