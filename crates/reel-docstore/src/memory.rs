//! In-memory workflow store for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use reel_models::{Workflow, WorkflowId, WorkflowSummary};

use crate::error::StoreResult;
use crate::store::WorkflowStore;

/// In-memory workflow store.
#[derive(Debug, Default)]
pub struct MemoryWorkflowStore {
    inner: RwLock<HashMap<WorkflowId, Workflow>>,
}

impl MemoryWorkflowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored workflows.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// True when no workflows are stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn get(&self, id: &WorkflowId) -> StoreResult<Option<Workflow>> {
        Ok(self.inner.read().await.get(id).cloned())
    }

    async fn put(&self, workflow: &Workflow) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .insert(workflow.id.clone(), workflow.clone());
        Ok(())
    }

    async fn delete(&self, id: &WorkflowId) -> StoreResult<bool> {
        Ok(self.inner.write().await.remove(id).is_some())
    }

    async fn list(&self) -> StoreResult<Vec<WorkflowSummary>> {
        let mut summaries: Vec<WorkflowSummary> = self
            .inner
            .read()
            .await
            .values()
            .map(|w| w.summary())
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }
}
