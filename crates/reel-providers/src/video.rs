//! Video generation provider client.
//!
//! Image-to-video generation over an asynchronous task API: submission
//! returns a task id immediately, and completion is observed by polling the
//! task resource. Polling is idempotent and never mutates provider state.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

/// Provider-side task state, as observed by polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Queued, not started
    Pending,
    /// Actively generating
    Running,
    /// Finished successfully
    Succeeded,
    /// Finished with an error
    Failed,
    /// Cancelled on the provider side
    Canceled,
    /// Provider reported something unrecognized
    Unknown,
}

impl TaskState {
    fn from_provider(s: &str) -> Self {
        match s {
            "PENDING" => TaskState::Pending,
            "RUNNING" => TaskState::Running,
            "SUCCEEDED" => TaskState::Succeeded,
            "FAILED" => TaskState::Failed,
            "CANCELED" | "CANCELLED" => TaskState::Canceled,
            _ => TaskState::Unknown,
        }
    }

    /// Check if the task will never change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Canceled
        )
    }
}

/// Result of polling a generation task.
#[derive(Debug, Clone)]
pub struct VideoTaskStatus {
    /// Observed provider state
    pub state: TaskState,
    /// Artifact URL; present once the task succeeded
    pub video_url: Option<String>,
    /// Provider message, if any (failure reason, progress note)
    pub message: Option<String>,
}

/// Configuration for the video generation client.
#[derive(Debug, Clone)]
pub struct VideoGenConfig {
    /// Provider API base URL
    pub base_url: String,
    /// API key
    pub api_key: String,
    /// Generation model name
    pub model: String,
    /// Clip duration in seconds
    pub duration_secs: u32,
    /// Output resolution, e.g. `1280*720`
    pub resolution: String,
    /// Let the provider expand the prompt
    pub prompt_extend: bool,
    /// Submit request timeout
    pub submit_timeout: Duration,
    /// Poll request timeout
    pub poll_timeout: Duration,
}

impl VideoGenConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            base_url: std::env::var("VIDEO_API_BASE")
                .map_err(|_| ProviderError::failed("VIDEO_API_BASE not set"))?,
            api_key: std::env::var("VIDEO_API_KEY")
                .map_err(|_| ProviderError::failed("VIDEO_API_KEY not set"))?,
            model: std::env::var("VIDEO_MODEL")
                .unwrap_or_else(|_| "wanx2.1-i2v-turbo".to_string()),
            duration_secs: std::env::var("VIDEO_DURATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            resolution: std::env::var("VIDEO_RESOLUTION")
                .unwrap_or_else(|_| "1280*720".to_string()),
            prompt_extend: std::env::var("VIDEO_PROMPT_EXTEND")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            submit_timeout: Duration::from_secs(30),
            poll_timeout: Duration::from_secs(15),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    output: Option<SubmitOutput>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitOutput {
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    #[serde(default)]
    output: Option<PollOutput>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PollOutput {
    #[serde(default)]
    task_status: Option<String>,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Video generation provider client.
pub struct VideoGenClient {
    http: Client,
    config: VideoGenConfig,
}

impl VideoGenClient {
    /// Create a new client.
    pub fn new(config: VideoGenConfig) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(config.submit_timeout.max(config.poll_timeout))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("reel-providers/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::failed(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(VideoGenConfig::from_env()?)
    }

    /// Submit an image-to-video generation task.
    ///
    /// Returns the provider task id. Transport failures surface as
    /// [`ProviderError::Unavailable`] with no task created as far as the
    /// caller knows, so the same submission may be retried safely.
    pub async fn submit(&self, prompt: &str, image_url: &str) -> ProviderResult<String> {
        let url = format!(
            "{}/services/aigc/video-generation/video-synthesis",
            self.config.base_url
        );

        let payload = json!({
            "model": self.config.model,
            "input": {
                "prompt": prompt,
                "img_url": image_url,
            },
            "parameters": {
                "duration": self.config.duration_secs,
                "size": self.config.resolution,
                "prompt_extend": self.config.prompt_extend,
            },
        });

        debug!(model = %self.config.model, "Submitting video generation task");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("X-DashScope-Async", "enable")
            .timeout(self.config.submit_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(e.to_string()))?;

        match parsed.output.and_then(|o| o.task_id) {
            Some(task_id) => {
                info!(task_id = %task_id, "Video generation task submitted");
                Ok(task_id)
            }
            None => Err(ProviderError::failed(
                parsed
                    .message
                    .unwrap_or_else(|| "submission returned no task id".to_string()),
            )),
        }
    }

    /// Poll a generation task.
    ///
    /// Non-blocking and idempotent; may be called arbitrarily often. A task
    /// reported succeeded without an artifact URL is a provider invariant
    /// violation and is never mapped to success.
    pub async fn poll(&self, task_id: &str) -> ProviderResult<VideoTaskStatus> {
        let url = format!("{}/tasks/{}", self.config.base_url, task_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.poll_timeout)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let parsed: PollResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(e.to_string()))?;

        let output = parsed.output.ok_or_else(|| {
            ProviderError::invalid_response(
                parsed
                    .message
                    .unwrap_or_else(|| "poll response missing output".to_string()),
            )
        })?;

        let state = output
            .task_status
            .as_deref()
            .map(TaskState::from_provider)
            .unwrap_or(TaskState::Unknown);

        if state == TaskState::Succeeded && output.video_url.is_none() {
            return Err(ProviderError::InvariantViolation(format!(
                "task {task_id} succeeded without a video artifact"
            )));
        }

        debug!(task_id = %task_id, state = ?state, "Polled video generation task");

        Ok(VideoTaskStatus {
            state,
            video_url: output.video_url,
            message: output.message,
        })
    }
}
