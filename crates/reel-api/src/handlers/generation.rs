//! Generation and merge handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tracing::info;

use reel_engine::GenerateAllOutcome;
use reel_models::{SegmentVideoStatus, Workflow, WorkflowId};

use crate::error::ApiResult;
use crate::state::AppState;

/// Segment generation status view.
#[derive(Debug, Serialize)]
pub struct SegmentStatusResponse {
    /// Segment index
    pub index: usize,
    /// Current status: pending, generating, completed, failed
    pub status: SegmentVideoStatus,
    /// Stored clip reference (set once completed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_reference: Option<String>,
    /// Error context from the most recent failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final video delivery response.
#[derive(Debug, Serialize)]
pub struct FinalVideoResponse {
    /// Short-lived delivery URL for the merged video
    pub url: String,
}

/// POST /api/workflows/:id/segments/:idx/generate
pub async fn generate_video(
    State(state): State<AppState>,
    Path((id, idx)): Path<(String, usize)>,
) -> ApiResult<Json<Workflow>> {
    let workflow = state
        .engine
        .generate_video(&WorkflowId::from(id), idx)
        .await?;
    info!(workflow_id = %workflow.id, idx, "generate_video");
    Ok(Json(workflow))
}

/// POST /api/workflows/:id/generate-all
pub async fn generate_all(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<GenerateAllOutcome>> {
    let outcome = state.engine.generate_all(&WorkflowId::from(id)).await?;
    info!(
        workflow_id = %outcome.workflow.id,
        submitted = outcome.submitted.len(),
        failed = outcome.failed.len(),
        "generate_all"
    );
    Ok(Json(outcome))
}

/// GET /api/workflows/:id/segments/:idx/status
///
/// Polls the segment's generation job (when one is in flight) and returns
/// the refreshed segment view.
pub async fn poll_status(
    State(state): State<AppState>,
    Path((id, idx)): Path<(String, usize)>,
) -> ApiResult<Json<SegmentStatusResponse>> {
    let workflow = state
        .engine
        .poll_status(&WorkflowId::from(id), idx)
        .await?;

    // The segment can vanish between the poll and this read if a re-split
    // raced the request.
    let segment = workflow
        .segment(idx)
        .ok_or_else(|| crate::error::ApiError::not_found(format!("segment {idx}")))?;

    Ok(Json(SegmentStatusResponse {
        index: idx,
        status: segment.video_status,
        video_reference: segment.video_reference.clone(),
        error: segment.last_error.clone(),
    }))
}

/// POST /api/workflows/:id/merge
pub async fn merge(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Workflow>> {
    let workflow = state.engine.merge(&WorkflowId::from(id)).await?;
    info!(workflow_id = %workflow.id, "merge");
    Ok(Json(workflow))
}

/// GET /api/workflows/:id/final-video
pub async fn final_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FinalVideoResponse>> {
    let url = state
        .engine
        .final_video_url(&WorkflowId::from(id))
        .await?;
    Ok(Json(FinalVideoResponse { url }))
}
