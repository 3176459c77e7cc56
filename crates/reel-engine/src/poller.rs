//! Background segment pollers.
//!
//! One cancellable periodic task per `(workflow, segment)` with an active
//! generation job: started on submission, stopped on terminal status,
//! workflow deletion, or re-split. The stale-job discard rule in the tracker
//! makes a duplicate or late poller harmless; these tasks only decide *when*
//! to poll, never *what* to apply.

use std::collections::HashMap;
use std::sync::{Mutex, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use reel_models::{SegmentVideoStatus, WorkflowId};

use crate::engine::Engine;

/// Registry of running segment pollers.
#[derive(Debug, Default)]
pub struct SegmentPollers {
    tasks: Mutex<HashMap<(WorkflowId, usize), JoinHandle<()>>>,
}

impl SegmentPollers {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling a segment's generation job, unless a poller for it is
    /// already running.
    pub fn start(&self, engine: std::sync::Arc<Engine>, workflow_id: WorkflowId, index: usize) {
        let mut tasks = self.tasks.lock().expect("poller registry poisoned");
        tasks.retain(|_, handle| !handle.is_finished());

        let key = (workflow_id.clone(), index);
        if tasks.contains_key(&key) {
            debug!(workflow_id = %workflow_id, index, "Poller already running");
            return;
        }

        // The task holds the engine weakly so a dropped engine tears the
        // pollers down instead of keeping it alive forever.
        let engine = std::sync::Arc::downgrade(&engine);
        let handle = tokio::spawn(poll_segment(engine, workflow_id, index));
        tasks.insert(key, handle);
    }

    /// Stop every poller belonging to a workflow.
    pub fn stop_workflow(&self, workflow_id: &WorkflowId) {
        let mut tasks = self.tasks.lock().expect("poller registry poisoned");
        tasks.retain(|(id, _), handle| {
            if id == workflow_id {
                handle.abort();
                false
            } else {
                true
            }
        });
    }

    /// Number of live pollers.
    pub fn active(&self) -> usize {
        let mut tasks = self.tasks.lock().expect("poller registry poisoned");
        tasks.retain(|_, handle| !handle.is_finished());
        tasks.len()
    }
}

impl Drop for SegmentPollers {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.lock() {
            for handle in tasks.values() {
                handle.abort();
            }
        }
    }
}

/// Exponential backoff after consecutive unavailable polls.
fn backoff_delay(base: Duration, attempt: u32, cap: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(cap)
}

/// Poll one segment's job until it reaches a terminal state or the bounded
/// retry policy gives up.
async fn poll_segment(engine: Weak<Engine>, workflow_id: WorkflowId, index: usize) {
    let Some(config) = engine.upgrade().map(|e| e.config().clone()) else {
        return;
    };

    let started = tokio::time::Instant::now();
    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut unavailable: u32 = 0;

    loop {
        interval.tick().await;

        if started.elapsed() > config.max_poll_duration {
            warn!(
                workflow_id = %workflow_id,
                index,
                "Poll deadline exceeded; leaving segment for operator retry"
            );
            return;
        }

        let Some(engine) = engine.upgrade() else {
            return;
        };

        match engine.poll_status(&workflow_id, index).await {
            Ok(workflow) => {
                unavailable = 0;
                let still_generating = workflow.segment(index).is_some_and(|s| {
                    s.video_status == SegmentVideoStatus::Generating && s.video_job_id.is_some()
                });
                if !still_generating {
                    debug!(workflow_id = %workflow_id, index, "Poller finished");
                    return;
                }
            }
            Err(e) if e.is_retryable() => {
                unavailable += 1;
                if unavailable >= config.max_unavailable_polls {
                    warn!(
                        workflow_id = %workflow_id,
                        index,
                        attempts = unavailable,
                        "Provider unavailable too long; poller giving up"
                    );
                    return;
                }
                let delay = backoff_delay(config.poll_interval, unavailable, config.max_backoff);
                debug!(
                    workflow_id = %workflow_id,
                    index,
                    attempt = unavailable,
                    "Provider unavailable, backing off {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                // Deleted workflow, vanished segment, or terminal provider
                // failure already recorded on the segment.
                debug!(workflow_id = %workflow_id, index, "Poller stopping: {e}");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let base = Duration::from_secs(5);
        let cap = Duration::from_secs(60);
        assert_eq!(backoff_delay(base, 1, cap), Duration::from_secs(5));
        assert_eq!(backoff_delay(base, 2, cap), Duration::from_secs(10));
        assert_eq!(backoff_delay(base, 3, cap), Duration::from_secs(20));
        assert_eq!(backoff_delay(base, 4, cap), Duration::from_secs(40));
        assert_eq!(backoff_delay(base, 5, cap), Duration::from_secs(60));
        assert_eq!(backoff_delay(base, 10, cap), Duration::from_secs(60));
    }
}
