//! Segment preparation handlers: split, edits, prompts, images.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use reel_models::{Workflow, WorkflowId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request body for narration splitting.
#[derive(Debug, Deserialize, Validate)]
pub struct SplitRequest {
    /// Full narration text. Re-splitting discards existing segments.
    #[validate(length(min = 1))]
    pub text: String,
}

/// Request body for segment text edits.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTextRequest {
    #[validate(length(min = 1))]
    pub text: String,
}

/// Request body for prompt edits.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePromptRequest {
    #[validate(length(min = 1))]
    pub prompt: String,
}

/// Request body for prompt optimization.
#[derive(Debug, Deserialize, Default)]
pub struct OptimizeRequest {
    /// Optional edited narration text; replaces the segment text when given.
    pub text: Option<String>,
}

/// POST /api/workflows/:id/split
pub async fn split_text(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SplitRequest>,
) -> ApiResult<Json<Workflow>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let workflow = state
        .engine
        .split(&WorkflowId::from(id), &request.text)
        .await?;
    info!(
        workflow_id = %workflow.id,
        segments = workflow.segments.len(),
        "split_text"
    );
    Ok(Json(workflow))
}

/// PATCH /api/workflows/:id/segments/:idx/text
pub async fn update_segment_text(
    State(state): State<AppState>,
    Path((id, idx)): Path<(String, usize)>,
    Json(request): Json<UpdateTextRequest>,
) -> ApiResult<Json<Workflow>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let workflow = state
        .engine
        .update_segment_text(&WorkflowId::from(id), idx, request.text)
        .await?;
    Ok(Json(workflow))
}

/// PATCH /api/workflows/:id/segments/:idx/prompt
pub async fn update_prompt(
    State(state): State<AppState>,
    Path((id, idx)): Path<(String, usize)>,
    Json(request): Json<UpdatePromptRequest>,
) -> ApiResult<Json<Workflow>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let workflow = state
        .engine
        .update_prompt(&WorkflowId::from(id), idx, request.prompt)
        .await?;
    Ok(Json(workflow))
}

/// POST /api/workflows/:id/segments/:idx/optimize
pub async fn optimize_prompt(
    State(state): State<AppState>,
    Path((id, idx)): Path<(String, usize)>,
    request: Option<Json<OptimizeRequest>>,
) -> ApiResult<Json<Workflow>> {
    let text = request.and_then(|Json(r)| r.text);
    let workflow = state
        .engine
        .optimize_prompt(&WorkflowId::from(id), idx, text)
        .await?;
    info!(workflow_id = %workflow.id, idx, "optimize_prompt");
    Ok(Json(workflow))
}

/// POST /api/workflows/:id/segments/:idx/image
///
/// Raw image bytes in the request body; the payload must sniff as a
/// supported image encoding.
pub async fn upload_image(
    State(state): State<AppState>,
    Path((id, idx)): Path<(String, usize)>,
    body: Bytes,
) -> ApiResult<Json<Workflow>> {
    if body.is_empty() {
        return Err(ApiError::bad_request("empty image payload"));
    }

    let workflow = state
        .engine
        .upload_image(&WorkflowId::from(id), idx, body.to_vec())
        .await?;
    info!(workflow_id = %workflow.id, idx, "upload_image");
    Ok(Json(workflow))
}

/// DELETE /api/workflows/:id/segments/:idx/image
pub async fn remove_image(
    State(state): State<AppState>,
    Path((id, idx)): Path<(String, usize)>,
) -> ApiResult<Json<Workflow>> {
    let workflow = state
        .engine
        .remove_image(&WorkflowId::from(id), idx)
        .await?;
    Ok(Json(workflow))
}
