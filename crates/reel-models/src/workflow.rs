//! Workflow aggregate: an ordered set of segments plus the merged artifact.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::gate;
use crate::segment::Segment;

/// Unique identifier for a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    /// Generate a new random workflow ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkflowId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkflowId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Coarse workflow status, derived from segment state.
///
/// Never mutated independently: recomputed via [`gate::derive_status`]
/// whenever segment state changes materially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// No segments yet, or freshly (re-)split
    #[default]
    Draft,
    /// Segments are being worked through the pipeline
    Processing,
    /// Merge succeeded; final video available
    Completed,
    /// At least one segment failed and none are generating
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Draft => "draft",
            WorkflowStatus::Processing => "processing",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A narration-to-video workflow.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Workflow {
    /// Unique workflow ID
    pub id: WorkflowId,

    /// Display name
    pub name: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Full narration text, set by the split operation
    #[serde(default)]
    pub original_text: String,

    /// Ordered segments; index order is merge order
    #[serde(default)]
    pub segments: Vec<Segment>,

    /// Reference to the merged final video
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video_reference: Option<String>,

    /// Derived status projection
    #[serde(default)]
    pub status: WorkflowStatus,
}

impl Workflow {
    /// Create a new empty draft workflow.
    ///
    /// When no name is given, a creation timestamp is used.
    pub fn new(name: Option<String>) -> Self {
        let now = Utc::now();
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| now.format("%Y-%m-%d %H:%M:%S").to_string());

        Self {
            id: WorkflowId::new(),
            name,
            created_at: now,
            updated_at: now,
            original_text: String::new(),
            segments: Vec::new(),
            final_video_reference: None,
            status: WorkflowStatus::Draft,
        }
    }

    /// Replace all segments with fresh ones from a new split.
    ///
    /// Destructive: prior segments, the merged artifact, and any derived
    /// progress are discarded wholesale. Status resets to draft before
    /// being re-derived.
    pub fn replace_segments(&mut self, original_text: impl Into<String>, chunks: Vec<String>) {
        self.original_text = original_text.into();
        self.segments = chunks
            .into_iter()
            .enumerate()
            .map(|(index, text)| Segment::new(index, text))
            .collect();
        self.final_video_reference = None;
        self.status = WorkflowStatus::Draft;
        self.recompute_status();
    }

    /// Get a segment by index.
    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Get a mutable segment by index.
    pub fn segment_mut(&mut self, index: usize) -> Option<&mut Segment> {
        self.segments.get_mut(index)
    }

    /// Recompute the derived status and bump `updated_at`.
    ///
    /// Call after every material segment mutation.
    pub fn recompute_status(&mut self) {
        self.status = gate::derive_status(self);
        self.updated_at = Utc::now();
    }

    /// Summary view for list endpoints.
    pub fn summary(&self) -> WorkflowSummary {
        WorkflowSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            status: self.status,
            segment_count: self.segments.len(),
        }
    }
}

/// Summary of a workflow (for list views).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowSummary {
    pub id: WorkflowId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(default)]
    pub segment_count: usize,
}
