//! Narration segments and their generation lifecycle.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque id of an external video-generation job.
///
/// Issued by the generation provider on submission; a segment only ever
/// tracks its most recent job. Poll results carrying any other id are stale
/// and must be discarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoJobId(pub String);

impl VideoJobId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoJobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoJobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Video-generation status of a single segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentVideoStatus {
    /// No generation job submitted yet
    #[default]
    Pending,
    /// A generation job is in flight
    Generating,
    /// Generation succeeded and the clip is stored
    Completed,
    /// Generation failed (operator may retry)
    Failed,
}

impl SegmentVideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentVideoStatus::Pending => "pending",
            SegmentVideoStatus::Generating => "generating",
            SegmentVideoStatus::Completed => "completed",
            SegmentVideoStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates without an
    /// explicit operator action).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SegmentVideoStatus::Completed | SegmentVideoStatus::Failed
        )
    }
}

impl fmt::Display for SegmentVideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One narration chunk plus its derived artifacts.
///
/// Index order is merge order. Invariants maintained by the transition
/// helpers: `Completed` implies `video_reference` is set, and `Pending`
/// implies `video_job_id` is unset.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    /// Zero-based position, fixed at split time
    pub index: usize,

    /// Source narration chunk for this segment
    pub original_text: String,

    /// Optimized generation prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Reference to the stored first-frame image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_reference: Option<String>,

    /// Id of the most recently submitted generation job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_job_id: Option<VideoJobId>,

    /// Reference to the generated clip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_reference: Option<String>,

    /// Generation status
    #[serde(default)]
    pub video_status: SegmentVideoStatus,

    /// Error context from the most recent provider failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Segment {
    /// Create a fresh segment for a narration chunk.
    pub fn new(index: usize, original_text: impl Into<String>) -> Self {
        Self {
            index,
            original_text: original_text.into(),
            prompt: None,
            image_reference: None,
            video_job_id: None,
            video_reference: None,
            video_status: SegmentVideoStatus::Pending,
            last_error: None,
        }
    }

    /// Record a freshly submitted generation job.
    ///
    /// Supersedes any previous job: the old job id is replaced wholesale and
    /// the old clip reference is cleared. Poll results for the superseded job
    /// no longer match `video_job_id` and are discarded upstream.
    pub fn begin_generation(&mut self, job_id: VideoJobId) {
        self.video_job_id = Some(job_id);
        self.video_reference = None;
        self.video_status = SegmentVideoStatus::Generating;
        self.last_error = None;
    }

    /// Mark generation as completed with the stored clip reference.
    pub fn complete_generation(&mut self, video_reference: impl Into<String>) {
        self.video_reference = Some(video_reference.into());
        self.video_status = SegmentVideoStatus::Completed;
        self.last_error = None;
    }

    /// Mark generation as failed.
    pub fn fail_generation(&mut self, error: impl Into<String>) {
        self.video_status = SegmentVideoStatus::Failed;
        self.last_error = Some(error.into());
    }

    /// True when the given job id matches the segment's current job.
    ///
    /// The stale-job rule: any poll result for a non-matching id must not
    /// touch this segment.
    pub fn is_current_job(&self, job_id: &VideoJobId) -> bool {
        self.video_job_id.as_ref() == Some(job_id)
    }

    /// True once the segment's clip is generated and stored.
    pub fn is_completed(&self) -> bool {
        self.video_status == SegmentVideoStatus::Completed && self.video_reference.is_some()
    }
}
