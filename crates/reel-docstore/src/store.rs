//! The workflow persistence boundary.

use async_trait::async_trait;

use reel_models::{Workflow, WorkflowId, WorkflowSummary};

use crate::error::StoreResult;

/// Key-value-by-id store for workflow documents.
///
/// The store is the single source of truth for workflow state. All reads go
/// through it and all writes go through the engine's serialized per-workflow
/// path; no caller caches a workflow beyond a single operation.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Fetch a workflow by id. `None` when no such document exists.
    async fn get(&self, id: &WorkflowId) -> StoreResult<Option<Workflow>>;

    /// Persist a workflow document, replacing any previous version.
    async fn put(&self, workflow: &Workflow) -> StoreResult<()>;

    /// Remove a workflow document. Returns `false` when nothing existed.
    async fn delete(&self, id: &WorkflowId) -> StoreResult<bool>;

    /// List workflow summaries, newest first.
    async fn list(&self) -> StoreResult<Vec<WorkflowSummary>>;
}
