//! Workflow lifecycle handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use reel_models::{Workflow, WorkflowId, WorkflowSummary};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request body for workflow creation.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkflowRequest {
    /// Optional display name; defaults to a creation timestamp.
    #[validate(length(max = 200))]
    pub name: Option<String>,
}

/// Request body for workflow rename.
#[derive(Debug, Deserialize, Validate)]
pub struct RenameWorkflowRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

/// POST /api/workflows
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(request): Json<CreateWorkflowRequest>,
) -> ApiResult<(StatusCode, Json<Workflow>)> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let workflow = state.engine.create_workflow(request.name).await?;
    info!(workflow_id = %workflow.id, "create_workflow");
    Ok((StatusCode::CREATED, Json(workflow)))
}

/// GET /api/workflows
pub async fn list_workflows(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<WorkflowSummary>>> {
    let summaries = state.engine.list_workflows().await?;
    Ok(Json(summaries))
}

/// GET /api/workflows/:id
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Workflow>> {
    let workflow = state.engine.get_workflow(&WorkflowId::from(id)).await?;
    Ok(Json(workflow))
}

/// PATCH /api/workflows/:id
pub async fn rename_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RenameWorkflowRequest>,
) -> ApiResult<Json<Workflow>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let workflow = state
        .engine
        .rename_workflow(&WorkflowId::from(id), request.name)
        .await?;
    Ok(Json(workflow))
}

/// DELETE /api/workflows/:id
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.engine.delete_workflow(&WorkflowId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
