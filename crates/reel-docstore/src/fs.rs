//! File-backed workflow store.
//!
//! One JSON document per workflow under `{root}/workflows/{id}.json`.
//! Writes go through a temp file in the same directory followed by a rename,
//! so a crash mid-write never leaves a truncated document behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, info, warn};

use reel_models::{Workflow, WorkflowId, WorkflowSummary};

use crate::error::{StoreError, StoreResult};
use crate::store::WorkflowStore;

/// Subdirectory holding workflow documents.
const WORKFLOWS_DIR: &str = "workflows";

/// File-backed workflow store.
#[derive(Debug, Clone)]
pub struct FsWorkflowStore {
    root: PathBuf,
}

impl FsWorkflowStore {
    /// Create a store rooted at the given data directory.
    ///
    /// The `workflows/` subdirectory is created if missing.
    pub async fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(root.join(WORKFLOWS_DIR)).await?;
        info!("Workflow store at {}", root.display());
        Ok(Self { root })
    }

    /// Create from the `DATA_DIR` environment variable.
    pub async fn from_env() -> StoreResult<Self> {
        let root = std::env::var("DATA_DIR")
            .map_err(|_| StoreError::config_error("DATA_DIR not set"))?;
        Self::new(root).await
    }

    fn document_path(&self, id: &WorkflowId) -> PathBuf {
        self.root
            .join(WORKFLOWS_DIR)
            .join(format!("{}.json", id.as_str()))
    }
}

#[async_trait]
impl WorkflowStore for FsWorkflowStore {
    async fn get(&self, id: &WorkflowId) -> StoreResult<Option<Workflow>> {
        let path = self.document_path(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        counter!("reelforge_store_reads_total").increment(1);
        let workflow = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::corrupt(format!("{}: {}", path.display(), e)))?;
        Ok(Some(workflow))
    }

    async fn put(&self, workflow: &Workflow) -> StoreResult<()> {
        let path = self.document_path(&workflow.id);
        let bytes = serde_json::to_vec_pretty(workflow)?;

        // Write-then-rename keeps the previous document intact on failure.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        counter!("reelforge_store_writes_total").increment(1);
        debug!(workflow_id = %workflow.id, "Persisted workflow document");
        Ok(())
    }

    async fn delete(&self, id: &WorkflowId) -> StoreResult<bool> {
        let path = self.document_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                counter!("reelforge_store_deletes_total").increment(1);
                info!(workflow_id = %id, "Deleted workflow document");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> StoreResult<Vec<WorkflowSummary>> {
        let dir = self.root.join(WORKFLOWS_DIR);
        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut summaries = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match tokio::fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<Workflow>(&bytes) {
                    Ok(workflow) => summaries.push(workflow.summary()),
                    Err(e) => {
                        // Tolerate corrupt entries in list views; get() still
                        // reports them as errors.
                        warn!("Skipping unreadable workflow {}: {}", path.display(), e);
                    }
                },
                Err(e) => warn!("Skipping unreadable workflow {}: {}", path.display(), e),
            }
        }

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }
}
