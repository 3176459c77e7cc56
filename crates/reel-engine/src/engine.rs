//! The orchestration engine façade.
//!
//! One method per pipeline operation. Every mutating operation is a single
//! workflow-level read-modify-write: preconditions are checked before any
//! external call, the provider call happens with no lock held, and the apply
//! step re-reads the workflow under the per-workflow lock and re-validates
//! before writing. A provider result whose target vanished or was superseded
//! in the meantime is discarded rather than applied to newer state.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};

use reel_docstore::WorkflowStore;
use reel_models::{
    gate, Segment, SegmentVideoStatus, VideoJobId, Workflow, WorkflowId, WorkflowSummary,
};
use reel_providers::ProviderError;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::lock::WorkflowLocks;
use crate::poller::SegmentPollers;
use crate::ports::{ArtifactStore, MergeProvider, PromptProvider, SplitProvider, VideoGenProvider};
use crate::tracker::{JobTracker, PollApplication};

/// Per-segment failure from a batch generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateFailure {
    pub index: usize,
    pub error: String,
}

/// Outcome of [`Engine::generate_all`].
///
/// Batch generation is deliberately not atomic: each eligible segment is
/// attempted independently and failures never abort the remaining segments.
#[derive(Debug, Serialize)]
pub struct GenerateAllOutcome {
    /// Segments whose jobs were submitted
    pub submitted: Vec<usize>,
    /// Segments skipped (already completed, or gate not satisfied)
    pub skipped: Vec<usize>,
    /// Per-segment submission failures
    pub failed: Vec<GenerateFailure>,
    /// Workflow state after the batch
    pub workflow: Workflow,
}

/// Workflow orchestration engine.
pub struct Engine {
    store: Arc<dyn WorkflowStore>,
    splitter: Arc<dyn SplitProvider>,
    prompter: Arc<dyn PromptProvider>,
    tracker: JobTracker,
    artifacts: Arc<dyn ArtifactStore>,
    merger: Arc<dyn MergeProvider>,
    locks: WorkflowLocks,
    pollers: SegmentPollers,
    config: EngineConfig,
}

impl Engine {
    /// Assemble an engine from its collaborators.
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        splitter: Arc<dyn SplitProvider>,
        prompter: Arc<dyn PromptProvider>,
        video: Arc<dyn VideoGenProvider>,
        artifacts: Arc<dyn ArtifactStore>,
        merger: Arc<dyn MergeProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            splitter,
            prompter,
            tracker: JobTracker::new(video),
            artifacts,
            merger,
            locks: WorkflowLocks::new(),
            pollers: SegmentPollers::new(),
            config,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn load(&self, id: &WorkflowId) -> EngineResult<Workflow> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| EngineError::not_found(id.as_str()))
    }

    fn segment_checked(workflow: &Workflow, index: usize) -> EngineResult<&Segment> {
        let len = workflow.segments.len();
        workflow
            .segment(index)
            .ok_or(EngineError::IndexOutOfRange { index, len })
    }

    // ------------------------------------------------------------------
    // Workflow lifecycle
    // ------------------------------------------------------------------

    /// Create a new draft workflow.
    pub async fn create_workflow(&self, name: Option<String>) -> EngineResult<Workflow> {
        let workflow = Workflow::new(name);
        self.store.put(&workflow).await?;
        counter!("reelforge_workflows_created_total").increment(1);
        info!(workflow_id = %workflow.id, "Created workflow");
        Ok(workflow)
    }

    /// Fetch a workflow by id.
    pub async fn get_workflow(&self, id: &WorkflowId) -> EngineResult<Workflow> {
        self.load(id).await
    }

    /// List workflow summaries, newest first.
    pub async fn list_workflows(&self) -> EngineResult<Vec<WorkflowSummary>> {
        Ok(self.store.list().await?)
    }

    /// Rename a workflow.
    pub async fn rename_workflow(&self, id: &WorkflowId, name: String) -> EngineResult<Workflow> {
        let _guard = self.locks.acquire(id).await;
        let mut workflow = self.load(id).await?;
        workflow.name = name;
        workflow.recompute_status();
        self.store.put(&workflow).await?;
        Ok(workflow)
    }

    /// Delete a workflow.
    ///
    /// Outstanding provider jobs are not cancelled, only orphaned: their
    /// pollers stop and any later operation on this id is `NotFound` without
    /// reaching a provider.
    pub async fn delete_workflow(&self, id: &WorkflowId) -> EngineResult<()> {
        self.pollers.stop_workflow(id);
        let guard = self.locks.acquire(id).await;
        let deleted = self.store.delete(id).await?;
        drop(guard);
        self.locks.forget(id);

        if !deleted {
            return Err(EngineError::not_found(id.as_str()));
        }
        counter!("reelforge_workflows_deleted_total").increment(1);
        info!(workflow_id = %id, "Deleted workflow");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pipeline operations
    // ------------------------------------------------------------------

    /// Split narration text into segments, replacing any existing ones.
    ///
    /// Destructive: prior segments and the merged artifact are discarded.
    pub async fn split(&self, id: &WorkflowId, text: &str) -> EngineResult<Workflow> {
        if text.trim().is_empty() {
            return Err(EngineError::precondition("narration text is empty"));
        }
        // Cheap existence check before paying for the provider call.
        self.load(id).await?;

        let chunks = self.splitter.split_text(text).await?;

        self.pollers.stop_workflow(id);
        let _guard = self.locks.acquire(id).await;
        let mut workflow = self.load(id).await?;
        workflow.replace_segments(text, chunks);
        self.store.put(&workflow).await?;

        info!(
            workflow_id = %id,
            segments = workflow.segments.len(),
            "Split narration into segments"
        );
        Ok(workflow)
    }

    /// Edit a segment's narration text.
    ///
    /// Completed downstream artifacts are not invalidated; regeneration is an
    /// explicit separate action.
    pub async fn update_segment_text(
        &self,
        id: &WorkflowId,
        index: usize,
        text: String,
    ) -> EngineResult<Workflow> {
        let _guard = self.locks.acquire(id).await;
        let mut workflow = self.load(id).await?;
        Self::segment_checked(&workflow, index)?;

        workflow.segment_mut(index).expect("checked above").original_text = text;
        workflow.recompute_status();
        self.store.put(&workflow).await?;
        Ok(workflow)
    }

    /// Edit a segment's generation prompt. Same non-invalidation policy as
    /// [`Engine::update_segment_text`].
    pub async fn update_prompt(
        &self,
        id: &WorkflowId,
        index: usize,
        prompt: String,
    ) -> EngineResult<Workflow> {
        let _guard = self.locks.acquire(id).await;
        let mut workflow = self.load(id).await?;
        Self::segment_checked(&workflow, index)?;

        workflow.segment_mut(index).expect("checked above").prompt = Some(prompt);
        workflow.recompute_status();
        self.store.put(&workflow).await?;
        Ok(workflow)
    }

    /// Produce an optimized generation prompt for a segment.
    ///
    /// When `text` is given, it also replaces the segment's narration text
    /// before optimization.
    pub async fn optimize_prompt(
        &self,
        id: &WorkflowId,
        index: usize,
        text: Option<String>,
    ) -> EngineResult<Workflow> {
        let workflow = self.load(id).await?;
        let segment = Self::segment_checked(&workflow, index)?;
        let source = text.clone().unwrap_or_else(|| segment.original_text.clone());

        let prompt = self.prompter.optimize_prompt(&source).await?;

        let _guard = self.locks.acquire(id).await;
        let mut workflow = self.load(id).await?;
        if workflow.segment(index).is_none() {
            // Re-split while the provider was working; nothing to apply.
            warn!(workflow_id = %id, index, "Segment vanished during optimization");
            return Ok(workflow);
        }
        let segment = workflow.segment_mut(index).expect("presence checked");
        if let Some(text) = text {
            segment.original_text = text;
        }
        segment.prompt = Some(prompt);
        workflow.recompute_status();
        self.store.put(&workflow).await?;
        Ok(workflow)
    }

    /// Store a first-frame image for a segment.
    pub async fn upload_image(
        &self,
        id: &WorkflowId,
        index: usize,
        bytes: Vec<u8>,
    ) -> EngineResult<Workflow> {
        let workflow = self.load(id).await?;
        Self::segment_checked(&workflow, index)?;

        let (content_type, ext) = reel_storage::detect_image_media_type(&bytes).ok_or_else(|| {
            EngineError::UnsupportedMediaType(
                "payload is not a supported image encoding (jpeg/png/webp)".to_string(),
            )
        })?;

        let reference = self
            .artifacts
            .store_image(id.as_str(), index, bytes, content_type, ext)
            .await?;

        let _guard = self.locks.acquire(id).await;
        let mut workflow = self.load(id).await?;
        if workflow.segment(index).is_none() {
            warn!(workflow_id = %id, index, "Segment vanished during image upload");
            return Ok(workflow);
        }
        workflow.segment_mut(index).expect("presence checked").image_reference = Some(reference);
        workflow.recompute_status();
        self.store.put(&workflow).await?;
        Ok(workflow)
    }

    /// Remove a segment's first-frame image.
    pub async fn remove_image(&self, id: &WorkflowId, index: usize) -> EngineResult<Workflow> {
        let _guard = self.locks.acquire(id).await;
        let mut workflow = self.load(id).await?;
        Self::segment_checked(&workflow, index)?;

        workflow.segment_mut(index).expect("checked above").image_reference = None;
        workflow.recompute_status();
        self.store.put(&workflow).await?;
        Ok(workflow)
    }

    /// Submit video generation for one segment.
    ///
    /// Re-submission while a job is in flight supersedes the old job; its
    /// later poll results are discarded by the stale-job rule.
    pub async fn generate_video(
        self: &Arc<Self>,
        id: &WorkflowId,
        index: usize,
    ) -> EngineResult<Workflow> {
        let workflow = self.load(id).await?;
        let segment = Self::segment_checked(&workflow, index)?;

        if !gate::can_generate(segment) {
            return Err(EngineError::precondition(format!(
                "segment {index} needs an optimized prompt and a first-frame image before generation"
            )));
        }
        let prompt = segment.prompt.clone().expect("gate checked");
        let image_reference = segment.image_reference.clone().expect("gate checked");

        // The provider fetches the image itself; hand it a bounded-lifetime URL.
        let image_url = self.artifacts.image_url(&image_reference).await?;

        let submit_result = self.tracker.submit_video_job(&prompt, &image_url).await;

        let job_id = match submit_result {
            Ok(job_id) => job_id,
            Err(e) => {
                self.record_segment_error(id, index, &e.to_string()).await;
                counter!("reelforge_generation_submit_failures_total").increment(1);
                return Err(e.into());
            }
        };

        let _guard = self.locks.acquire(id).await;
        let mut workflow = self.load(id).await?;
        if workflow.segment(index).is_none() {
            // Re-split raced the submission; the job is orphaned.
            warn!(workflow_id = %id, index, job_id = %job_id, "Segment vanished during submission");
            return Ok(workflow);
        }
        workflow
            .segment_mut(index)
            .expect("presence checked")
            .begin_generation(job_id.clone());
        workflow.recompute_status();
        self.store.put(&workflow).await?;
        drop(_guard);

        counter!("reelforge_generation_jobs_submitted_total").increment(1);
        info!(workflow_id = %id, index, job_id = %job_id, "Video generation submitted");

        if self.config.auto_poll {
            self.pollers.start(Arc::clone(self), id.clone(), index);
        }
        Ok(workflow)
    }

    /// Submit generation for every eligible segment.
    ///
    /// Eligible: the generate gate holds and the segment is not already
    /// completed. Failures are collected per segment; the batch never aborts.
    pub async fn generate_all(self: &Arc<Self>, id: &WorkflowId) -> EngineResult<GenerateAllOutcome> {
        let workflow = self.load(id).await?;

        let mut eligible = Vec::new();
        let mut skipped = Vec::new();
        for segment in &workflow.segments {
            if gate::can_generate(segment)
                && segment.video_status != SegmentVideoStatus::Completed
            {
                eligible.push(segment.index);
            } else {
                skipped.push(segment.index);
            }
        }

        if eligible.is_empty() {
            return Err(EngineError::precondition(
                "no segments are eligible for generation",
            ));
        }

        let mut submitted = Vec::new();
        let mut failed = Vec::new();
        for index in eligible {
            match self.generate_video(id, index).await {
                Ok(_) => submitted.push(index),
                Err(e) => failed.push(GenerateFailure {
                    index,
                    error: e.to_string(),
                }),
            }
        }

        let workflow = self.load(id).await?;
        info!(
            workflow_id = %id,
            submitted = submitted.len(),
            failed = failed.len(),
            "Batch generation finished"
        );
        Ok(GenerateAllOutcome {
            submitted,
            skipped,
            failed,
            workflow,
        })
    }

    /// Poll the generation job of one segment and apply the result.
    ///
    /// No-op when the segment has no active job or is already terminal. A
    /// poll for a superseded job id never changes segment state.
    pub async fn poll_status(&self, id: &WorkflowId, index: usize) -> EngineResult<Workflow> {
        let workflow = self.load(id).await?;
        let segment = Self::segment_checked(&workflow, index)?;

        let job_id = match (&segment.video_job_id, segment.video_status) {
            (Some(job_id), SegmentVideoStatus::Generating) => job_id.clone(),
            _ => return Ok(workflow), // nothing in flight
        };

        let status = match self.tracker.poll_video_job(&job_id).await {
            Ok(status) => status,
            Err(ProviderError::InvariantViolation(msg)) => {
                self.fail_segment_if_current(id, index, &job_id, &msg).await?;
                return Err(EngineError::ProviderInvariantViolation(msg));
            }
            Err(e) => return Err(e.into()),
        };

        // Archiving is slow; do it before taking the lock. The apply step
        // re-checks the job id, so an archive for a superseded job is wasted
        // work but never wrong state.
        let archived = match (&status.state, &status.video_url) {
            (reel_providers::TaskState::Succeeded, Some(url)) => {
                match self
                    .artifacts
                    .archive_segment_video(id.as_str(), index, url)
                    .await
                {
                    Ok(reference) => Some(reference),
                    Err(e) => {
                        let msg = format!("failed to archive generated clip: {e}");
                        self.fail_segment_if_current(id, index, &job_id, &msg).await?;
                        return Err(e.into());
                    }
                }
            }
            _ => None,
        };

        let _guard = self.locks.acquire(id).await;
        let mut workflow = self.load(id).await?;
        if workflow.segment(index).is_none() {
            return Ok(workflow); // re-split during the poll; discard
        }
        let segment = workflow.segment_mut(index).expect("presence checked");

        match JobTracker::apply_poll(segment, &job_id, &status) {
            PollApplication::Succeeded { .. } => {
                let reference = archived.expect("archived before apply");
                segment.complete_generation(reference);
                counter!("reelforge_generation_jobs_completed_total").increment(1);
                info!(workflow_id = %id, index, "Segment video completed");
            }
            PollApplication::Failed | PollApplication::InvariantViolation => {
                counter!("reelforge_generation_jobs_failed_total").increment(1);
            }
            PollApplication::Stale | PollApplication::InFlight => {}
        }

        workflow.recompute_status();
        self.store.put(&workflow).await?;
        Ok(workflow)
    }

    /// Merge all segment clips into the final video, in index order.
    pub async fn merge(&self, id: &WorkflowId) -> EngineResult<Workflow> {
        let workflow = self.load(id).await?;

        if !gate::can_merge(&workflow) {
            let incomplete = gate::incomplete_segments(&workflow);
            return Err(EngineError::precondition(format!(
                "{incomplete} of {} segments have not completed video generation",
                workflow.segments.len()
            )));
        }

        let references: Vec<String> = workflow
            .segments
            .iter()
            .map(|s| s.video_reference.clone().expect("gate checked"))
            .collect();

        let final_reference = self.merger.merge(id.as_str(), &references).await?;

        let _guard = self.locks.acquire(id).await;
        let mut workflow = self.load(id).await?;

        // The inputs must still be exactly what was merged; a re-split or
        // regeneration in the meantime invalidates this result.
        let current: Vec<Option<&String>> = workflow
            .segments
            .iter()
            .map(|s| s.video_reference.as_ref())
            .collect();
        let unchanged = current.len() == references.len()
            && current
                .iter()
                .zip(references.iter())
                .all(|(c, r)| *c == Some(r));
        if !gate::can_merge(&workflow) || !unchanged {
            return Err(EngineError::precondition(
                "workflow changed while merging; merge result discarded",
            ));
        }

        workflow.final_video_reference = Some(final_reference);
        workflow.recompute_status();
        self.store.put(&workflow).await?;

        counter!("reelforge_workflows_merged_total").increment(1);
        info!(workflow_id = %id, "Merged final video");
        Ok(workflow)
    }

    /// Resolve the final video to a short-lived delivery URL.
    pub async fn final_video_url(&self, id: &WorkflowId) -> EngineResult<String> {
        let workflow = self.load(id).await?;
        let reference = workflow.final_video_reference.ok_or_else(|| {
            EngineError::precondition("workflow has no merged video yet")
        })?;
        Ok(self.artifacts.delivery_url(&reference).await?)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Record a provider failure into a segment's error context without
    /// touching its status. Best effort: a missing workflow or segment means
    /// there is nothing to record on.
    async fn record_segment_error(&self, id: &WorkflowId, index: usize, error: &str) {
        let _guard = self.locks.acquire(id).await;
        let Ok(Some(mut workflow)) = self.store.get(id).await else {
            return;
        };
        let Some(segment) = workflow.segment_mut(index) else {
            return;
        };
        segment.last_error = Some(error.to_string());
        workflow.recompute_status();
        if let Err(e) = self.store.put(&workflow).await {
            warn!(workflow_id = %id, "Failed to record segment error: {e}");
        }
    }

    /// Mark a segment failed, but only while the given job is still current.
    async fn fail_segment_if_current(
        &self,
        id: &WorkflowId,
        index: usize,
        job_id: &VideoJobId,
        error: &str,
    ) -> EngineResult<()> {
        let _guard = self.locks.acquire(id).await;
        let Some(mut workflow) = self.store.get(id).await? else {
            return Ok(());
        };
        let Some(segment) = workflow.segment_mut(index) else {
            return Ok(());
        };
        if !segment.is_current_job(job_id) {
            return Ok(()); // superseded; the failure belongs to a dead job
        }
        segment.fail_generation(error);
        workflow.recompute_status();
        self.store.put(&workflow).await?;
        Ok(())
    }
}
