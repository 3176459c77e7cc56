//! Per-workflow mutual exclusion.
//!
//! Every read-modify-write against the workflow store goes through the lock
//! for that workflow id, so concurrent operations on the same workflow never
//! interleave mutations. Operations on different workflow ids proceed fully
//! in parallel; there is no global lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reel_models::WorkflowId;
use tokio::sync::OwnedMutexGuard;

/// Registry of per-workflow async mutexes, created lazily.
#[derive(Debug, Default)]
pub struct WorkflowLocks {
    inner: Mutex<HashMap<WorkflowId, Arc<tokio::sync::Mutex<()>>>>,
}

impl WorkflowLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the mutation lock for a workflow id.
    ///
    /// The guard must only be held around the state mutation itself, never
    /// across a provider call.
    pub async fn acquire(&self, id: &WorkflowId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().expect("workflow lock registry poisoned");
            Arc::clone(
                map.entry(id.clone())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Drop the lock entry for a deleted workflow.
    pub fn forget(&self, id: &WorkflowId) {
        let mut map = self.inner.lock().expect("workflow lock registry poisoned");
        map.remove(id);
    }
}
