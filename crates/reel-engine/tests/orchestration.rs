//! End-to-end orchestration tests against scripted providers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use reel_docstore::MemoryWorkflowStore;
use reel_engine::{
    ArtifactStore, Engine, EngineConfig, EngineError, MergeProvider, PromptProvider,
    SplitProvider, VideoGenProvider,
};
use reel_models::{SegmentVideoStatus, WorkflowId, WorkflowStatus};
use reel_providers::{ProviderError, ProviderResult, TaskState, VideoTaskStatus};
use reel_storage::{StorageError, StorageResult};

// ---------------------------------------------------------------------------
// Scripted providers
// ---------------------------------------------------------------------------

struct FakeSplitter {
    calls: AtomicU32,
}

#[async_trait]
impl SplitProvider for FakeSplitter {
    async fn split_text(&self, text: &str) -> ProviderResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(text
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("{s}."))
            .collect())
    }
}

struct FakePrompter;

#[async_trait]
impl PromptProvider for FakePrompter {
    async fn optimize_prompt(&self, segment_text: &str) -> ProviderResult<String> {
        Ok(format!("cinematic: {segment_text}"))
    }
}

#[derive(Default)]
struct FakeVideoGen {
    submits: AtomicU32,
    polls: AtomicU32,
    /// Prompts containing this marker fail submission as unavailable.
    submit_failure_marker: Mutex<Option<String>>,
    /// Scripted poll results per job id; unknown jobs read as running.
    poll_results: Mutex<HashMap<String, VideoTaskStatus>>,
}

impl FakeVideoGen {
    fn script_poll(&self, job_id: &str, state: TaskState, url: Option<&str>) {
        self.poll_results.lock().unwrap().insert(
            job_id.to_string(),
            VideoTaskStatus {
                state,
                video_url: url.map(String::from),
                message: match state {
                    TaskState::Failed => Some("generation failed".to_string()),
                    _ => None,
                },
            },
        );
    }

    fn fail_submits_containing(&self, marker: &str) {
        *self.submit_failure_marker.lock().unwrap() = Some(marker.to_string());
    }
}

#[async_trait]
impl VideoGenProvider for FakeVideoGen {
    async fn submit(&self, prompt: &str, _image_url: &str) -> ProviderResult<String> {
        if let Some(marker) = self.submit_failure_marker.lock().unwrap().as_deref() {
            if prompt.contains(marker) {
                return Err(ProviderError::unavailable("connection reset"));
            }
        }
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("job-{n}"))
    }

    async fn poll(&self, job_id: &str) -> ProviderResult<VideoTaskStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .poll_results
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .unwrap_or(VideoTaskStatus {
                state: TaskState::Running,
                video_url: None,
                message: None,
            }))
    }
}

#[derive(Default)]
struct FakeArtifacts {
    stored_images: AtomicU32,
    fail_archive: AtomicBool,
}

#[async_trait]
impl ArtifactStore for FakeArtifacts {
    async fn store_image(
        &self,
        workflow_id: &str,
        index: usize,
        _bytes: Vec<u8>,
        _content_type: &str,
        ext: &str,
    ) -> StorageResult<String> {
        self.stored_images.fetch_add(1, Ordering::SeqCst);
        Ok(format!("images/{workflow_id}/segment_{index}.{ext}"))
    }

    async fn image_url(&self, reference: &str) -> StorageResult<String> {
        Ok(format!("https://signed.example/{reference}"))
    }

    async fn archive_segment_video(
        &self,
        workflow_id: &str,
        index: usize,
        _source_url: &str,
    ) -> StorageResult<String> {
        if self.fail_archive.load(Ordering::SeqCst) {
            return Err(StorageError::download_failed("clip download failed"));
        }
        Ok(format!("segments/{workflow_id}/segment_{index}.mp4"))
    }

    async fn delivery_url(&self, reference: &str) -> StorageResult<String> {
        Ok(format!("https://signed.example/{reference}"))
    }
}

#[derive(Default)]
struct FakeMerger {
    calls: AtomicU32,
    fail: AtomicBool,
}

#[async_trait]
impl MergeProvider for FakeMerger {
    async fn merge(&self, workflow_id: &str, references: &[String]) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::failed("concat failed"));
        }
        assert!(!references.is_empty());
        Ok(format!("finals/{workflow_id}.mp4"))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    engine: Arc<Engine>,
    splitter: Arc<FakeSplitter>,
    video: Arc<FakeVideoGen>,
    artifacts: Arc<FakeArtifacts>,
    merger: Arc<FakeMerger>,
}

fn harness() -> Harness {
    let splitter = Arc::new(FakeSplitter {
        calls: AtomicU32::new(0),
    });
    let video = Arc::new(FakeVideoGen::default());
    let artifacts = Arc::new(FakeArtifacts::default());
    let merger = Arc::new(FakeMerger::default());

    // Background pollers off: tests drive polling explicitly.
    let config = EngineConfig {
        auto_poll: false,
        ..EngineConfig::default()
    };

    let engine = Arc::new(Engine::new(
        Arc::new(MemoryWorkflowStore::new()),
        Arc::clone(&splitter) as Arc<dyn SplitProvider>,
        Arc::new(FakePrompter) as Arc<dyn PromptProvider>,
        Arc::clone(&video) as Arc<dyn VideoGenProvider>,
        Arc::clone(&artifacts) as Arc<dyn ArtifactStore>,
        Arc::clone(&merger) as Arc<dyn MergeProvider>,
        config,
    ));

    Harness {
        engine,
        splitter,
        video,
        artifacts,
        merger,
    }
}

const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/// Create a workflow, split it, and bring every segment up to the generate
/// gate (prompt + image).
async fn ready_workflow(h: &Harness, text: &str) -> WorkflowId {
    let wf = h.engine.create_workflow(None).await.unwrap();
    let wf = h.engine.split(&wf.id, text).await.unwrap();
    for i in 0..wf.segments.len() {
        h.engine.optimize_prompt(&wf.id, i, None).await.unwrap();
        h.engine
            .upload_image(&wf.id, i, JPEG_BYTES.to_vec())
            .await
            .unwrap();
    }
    wf.id
}

/// Drive a generating segment to completion through poll.
async fn complete_segment(h: &Harness, id: &WorkflowId, index: usize) {
    let wf = h.engine.get_workflow(id).await.unwrap();
    let job_id = wf.segments[index].video_job_id.clone().unwrap();
    h.video.script_poll(
        job_id.as_str(),
        TaskState::Succeeded,
        Some("https://cdn.example/clip.mp4"),
    );
    h.engine.poll_status(id, index).await.unwrap();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_pipeline_reaches_completed() {
    let h = harness();
    let id = ready_workflow(&h, "Hello world. Buy now.").await;

    let wf = h.engine.get_workflow(&id).await.unwrap();
    assert_eq!(wf.segments.len(), 2);
    assert_eq!(wf.segments[0].original_text, "Hello world.");
    assert_eq!(wf.segments[1].original_text, "Buy now.");
    assert_eq!(h.splitter.calls.load(Ordering::SeqCst), 1);

    let outcome = h.engine.generate_all(&id).await.unwrap();
    assert_eq!(outcome.submitted, vec![0, 1]);
    assert!(outcome.failed.is_empty());

    let wf = h.engine.get_workflow(&id).await.unwrap();
    assert!(wf
        .segments
        .iter()
        .all(|s| s.video_status == SegmentVideoStatus::Generating));
    assert_eq!(wf.status, WorkflowStatus::Processing);

    complete_segment(&h, &id, 0).await;
    complete_segment(&h, &id, 1).await;

    let wf = h.engine.merge(&id).await.unwrap();
    assert_eq!(wf.status, WorkflowStatus::Completed);
    assert_eq!(
        wf.final_video_reference.as_deref(),
        Some(format!("finals/{}.mp4", id).as_str())
    );
    assert!(wf.segments.iter().all(|s| s.is_completed()));
    assert_eq!(h.merger.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn generate_without_gate_is_rejected_before_any_submit() {
    let h = harness();
    let wf = h.engine.create_workflow(None).await.unwrap();
    let wf = h.engine.split(&wf.id, "Only one chunk.").await.unwrap();

    // Image but no prompt
    h.engine
        .upload_image(&wf.id, 0, JPEG_BYTES.to_vec())
        .await
        .unwrap();

    let err = h.engine.generate_video(&wf.id, 0).await.unwrap_err();
    assert!(matches!(err, EngineError::PreconditionNotMet(_)));
    assert_eq!(h.video.submits.load(Ordering::SeqCst), 0);

    let wf = h.engine.get_workflow(&wf.id).await.unwrap();
    assert!(wf.segments[0].video_job_id.is_none());
    assert_eq!(wf.segments[0].video_status, SegmentVideoStatus::Pending);
}

#[tokio::test]
async fn merge_gate_names_incomplete_segments() {
    let h = harness();
    let id = ready_workflow(&h, "One. Two. Three.").await;
    h.engine.generate_all(&id).await.unwrap();

    complete_segment(&h, &id, 0).await;
    complete_segment(&h, &id, 1).await;
    // Segment 2 still generating

    let err = h.engine.merge(&id).await.unwrap_err();
    match err {
        EngineError::PreconditionNotMet(msg) => {
            assert!(msg.contains("1 of 3"), "unexpected message: {msg}");
        }
        other => panic!("expected PreconditionNotMet, got {other:?}"),
    }

    // Never reached the provider, never set a final reference
    assert_eq!(h.merger.calls.load(Ordering::SeqCst), 0);
    let wf = h.engine.get_workflow(&id).await.unwrap();
    assert!(wf.final_video_reference.is_none());
    assert_eq!(wf.status, WorkflowStatus::Processing);
}

#[tokio::test]
async fn resubmission_supersedes_and_stale_poll_is_discarded() {
    let h = harness();
    let id = ready_workflow(&h, "Just one.").await;

    h.engine.generate_video(&id, 0).await.unwrap();
    h.engine.generate_video(&id, 0).await.unwrap();

    let wf = h.engine.get_workflow(&id).await.unwrap();
    let seg = &wf.segments[0];
    assert_eq!(seg.video_status, SegmentVideoStatus::Generating);
    assert_eq!(seg.video_job_id.as_ref().unwrap().as_str(), "job-2");

    // The superseded first job finishing must not affect the segment; the
    // engine only polls the current job, so script both outcomes.
    h.video.script_poll(
        "job-1",
        TaskState::Succeeded,
        Some("https://cdn.example/old-clip.mp4"),
    );
    h.video.script_poll("job-2", TaskState::Running, None);

    let wf = h.engine.poll_status(&id, 0).await.unwrap();
    let seg = &wf.segments[0];
    assert_eq!(seg.video_status, SegmentVideoStatus::Generating);
    assert!(seg.video_reference.is_none());
    assert_eq!(seg.video_job_id.as_ref().unwrap().as_str(), "job-2");

    // Now the current job completes normally.
    complete_segment(&h, &id, 0).await;
    let wf = h.engine.get_workflow(&id).await.unwrap();
    assert_eq!(
        wf.segments[0].video_reference.as_deref(),
        Some(format!("segments/{id}/segment_0.mp4").as_str())
    );
}

#[tokio::test]
async fn resplit_clears_final_video_and_resets_status() {
    let h = harness();
    let id = ready_workflow(&h, "Alpha. Beta.").await;
    h.engine.generate_all(&id).await.unwrap();
    complete_segment(&h, &id, 0).await;
    complete_segment(&h, &id, 1).await;
    let wf = h.engine.merge(&id).await.unwrap();
    assert_eq!(wf.status, WorkflowStatus::Completed);

    let wf = h.engine.split(&id, "Fresh start. New text. Third bit.").await.unwrap();
    assert!(wf.final_video_reference.is_none());
    assert_eq!(wf.segments.len(), 3);
    assert!(wf
        .segments
        .iter()
        .all(|s| s.video_status == SegmentVideoStatus::Pending && s.video_job_id.is_none()));
    assert_ne!(wf.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn delete_then_poll_returns_not_found_without_provider_call() {
    let h = harness();
    let id = ready_workflow(&h, "Short one.").await;
    h.engine.generate_video(&id, 0).await.unwrap();

    let polls_before = h.video.polls.load(Ordering::SeqCst);
    h.engine.delete_workflow(&id).await.unwrap();

    let err = h.engine.poll_status(&id, 0).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert_eq!(h.video.polls.load(Ordering::SeqCst), polls_before);

    let err = h.engine.get_workflow(&id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn generate_all_records_independent_failures() {
    let h = harness();
    let id = ready_workflow(&h, "First. Second. Third.").await;

    // Prompts embed the narration, so target the middle segment.
    h.video.fail_submits_containing("Second");

    let outcome = h.engine.generate_all(&id).await.unwrap();
    assert_eq!(outcome.submitted, vec![0, 2]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].index, 1);

    let wf = h.engine.get_workflow(&id).await.unwrap();
    assert_eq!(wf.segments[0].video_status, SegmentVideoStatus::Generating);
    assert_eq!(wf.segments[2].video_status, SegmentVideoStatus::Generating);

    // Failed submission leaves the segment retryable: no job id, no status
    // change, error recorded.
    let seg = &wf.segments[1];
    assert_eq!(seg.video_status, SegmentVideoStatus::Pending);
    assert!(seg.video_job_id.is_none());
    assert!(seg.last_error.is_some());
}

#[tokio::test]
async fn generate_all_with_nothing_eligible_is_precondition_error() {
    let h = harness();
    let wf = h.engine.create_workflow(None).await.unwrap();
    let wf = h.engine.split(&wf.id, "No prompts here.").await.unwrap();

    let err = h.engine.generate_all(&wf.id).await.unwrap_err();
    assert!(matches!(err, EngineError::PreconditionNotMet(_)));
    assert_eq!(h.video.submits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn completed_segments_are_skipped_by_generate_all() {
    let h = harness();
    let id = ready_workflow(&h, "One. Two.").await;
    h.engine.generate_video(&id, 0).await.unwrap();
    complete_segment(&h, &id, 0).await;

    let outcome = h.engine.generate_all(&id).await.unwrap();
    assert_eq!(outcome.submitted, vec![1]);
    assert!(outcome.skipped.contains(&0));

    let wf = h.engine.get_workflow(&id).await.unwrap();
    assert_eq!(wf.segments[0].video_status, SegmentVideoStatus::Completed);
}

#[tokio::test]
async fn upload_rejects_non_image_payloads() {
    let h = harness();
    let id = ready_workflow(&h, "Only chunk.").await;
    let stored_before = h.artifacts.stored_images.load(Ordering::SeqCst);

    let err = h
        .engine
        .upload_image(&id, 0, b"#!/bin/sh\necho pwned".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedMediaType(_)));
    assert_eq!(h.artifacts.stored_images.load(Ordering::SeqCst), stored_before);
}

#[tokio::test]
async fn provider_success_without_artifact_fails_the_segment() {
    let h = harness();
    let id = ready_workflow(&h, "Single.").await;
    h.engine.generate_video(&id, 0).await.unwrap();

    let wf = h.engine.get_workflow(&id).await.unwrap();
    let job_id = wf.segments[0].video_job_id.clone().unwrap();
    h.video.script_poll(job_id.as_str(), TaskState::Succeeded, None);

    let err = h.engine.poll_status(&id, 0).await.unwrap_err();
    assert!(matches!(err, EngineError::ProviderInvariantViolation(_)));

    let wf = h.engine.get_workflow(&id).await.unwrap();
    assert_eq!(wf.segments[0].video_status, SegmentVideoStatus::Failed);
    assert!(wf.segments[0].video_reference.is_none());
}

#[tokio::test]
async fn archive_failure_fails_the_segment() {
    let h = harness();
    let id = ready_workflow(&h, "Single.").await;
    h.engine.generate_video(&id, 0).await.unwrap();

    let wf = h.engine.get_workflow(&id).await.unwrap();
    let job_id = wf.segments[0].video_job_id.clone().unwrap();
    h.video.script_poll(
        job_id.as_str(),
        TaskState::Succeeded,
        Some("https://cdn.example/clip.mp4"),
    );
    h.artifacts.fail_archive.store(true, Ordering::SeqCst);

    let err = h.engine.poll_status(&id, 0).await.unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));

    let wf = h.engine.get_workflow(&id).await.unwrap();
    assert_eq!(wf.segments[0].video_status, SegmentVideoStatus::Failed);
    assert!(wf.segments[0].last_error.is_some());
}

#[tokio::test]
async fn failed_generation_marks_segment_and_workflow() {
    let h = harness();
    let id = ready_workflow(&h, "Single.").await;
    h.engine.generate_video(&id, 0).await.unwrap();

    let wf = h.engine.get_workflow(&id).await.unwrap();
    let job_id = wf.segments[0].video_job_id.clone().unwrap();
    h.video.script_poll(job_id.as_str(), TaskState::Failed, None);

    let wf = h.engine.poll_status(&id, 0).await.unwrap();
    assert_eq!(wf.segments[0].video_status, SegmentVideoStatus::Failed);
    assert_eq!(wf.status, WorkflowStatus::Failed);

    // The operator can retry without restarting the workflow.
    h.engine.generate_video(&id, 0).await.unwrap();
    let wf = h.engine.get_workflow(&id).await.unwrap();
    assert_eq!(wf.segments[0].video_status, SegmentVideoStatus::Generating);
    assert_eq!(wf.status, WorkflowStatus::Processing);
}

#[tokio::test]
async fn poll_without_active_job_is_a_no_op() {
    let h = harness();
    let id = ready_workflow(&h, "Single.").await;

    let polls_before = h.video.polls.load(Ordering::SeqCst);
    let wf = h.engine.poll_status(&id, 0).await.unwrap();
    assert_eq!(wf.segments[0].video_status, SegmentVideoStatus::Pending);
    assert_eq!(h.video.polls.load(Ordering::SeqCst), polls_before);
}

#[tokio::test]
async fn polling_stops_mutating_after_terminal_state() {
    let h = harness();
    let id = ready_workflow(&h, "Single.").await;
    h.engine.generate_video(&id, 0).await.unwrap();
    complete_segment(&h, &id, 0).await;

    // Further polls of a completed segment never call the provider again.
    let polls_before = h.video.polls.load(Ordering::SeqCst);
    let wf = h.engine.poll_status(&id, 0).await.unwrap();
    assert_eq!(wf.segments[0].video_status, SegmentVideoStatus::Completed);
    assert_eq!(h.video.polls.load(Ordering::SeqCst), polls_before);
}

#[tokio::test]
async fn prompt_edit_does_not_invalidate_completed_video() {
    let h = harness();
    let id = ready_workflow(&h, "Single.").await;
    h.engine.generate_video(&id, 0).await.unwrap();
    complete_segment(&h, &id, 0).await;

    let wf = h
        .engine
        .update_prompt(&id, 0, "an entirely different scene".to_string())
        .await
        .unwrap();
    let seg = &wf.segments[0];
    assert_eq!(seg.prompt.as_deref(), Some("an entirely different scene"));
    assert_eq!(seg.video_status, SegmentVideoStatus::Completed);
    assert!(seg.video_reference.is_some());
}

#[tokio::test]
async fn merge_provider_failure_leaves_workflow_unmerged() {
    let h = harness();
    let id = ready_workflow(&h, "One. Two.").await;
    h.engine.generate_all(&id).await.unwrap();
    complete_segment(&h, &id, 0).await;
    complete_segment(&h, &id, 1).await;

    h.merger.fail.store(true, Ordering::SeqCst);
    let err = h.engine.merge(&id).await.unwrap_err();
    assert!(matches!(err, EngineError::Provider(_)));

    let wf = h.engine.get_workflow(&id).await.unwrap();
    assert!(wf.final_video_reference.is_none());
    assert_ne!(wf.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn concurrent_generation_on_distinct_segments_loses_no_updates() {
    let h = harness();
    let id = ready_workflow(&h, "One. Two. Three. Four.").await;

    let mut handles = Vec::new();
    for i in 0..4 {
        let engine = Arc::clone(&h.engine);
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            engine.generate_video(&id, i).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let wf = h.engine.get_workflow(&id).await.unwrap();
    assert!(wf.segments.iter().all(|s| {
        s.video_status == SegmentVideoStatus::Generating && s.video_job_id.is_some()
    }));
    assert_eq!(h.video.submits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn index_out_of_range_is_reported() {
    let h = harness();
    let id = ready_workflow(&h, "Only one.").await;

    let err = h.engine.poll_status(&id, 7).await.unwrap_err();
    match err {
        EngineError::IndexOutOfRange { index, len } => {
            assert_eq!(index, 7);
            assert_eq!(len, 1);
        }
        other => panic!("expected IndexOutOfRange, got {other:?}"),
    }
}

#[tokio::test]
async fn list_workflows_returns_summaries() {
    let h = harness();
    let a = h.engine.create_workflow(Some("first".to_string())).await.unwrap();
    let _b = h.engine.create_workflow(Some("second".to_string())).await.unwrap();

    let summaries = h.engine.list_workflows().await.unwrap();
    assert_eq!(summaries.len(), 2);

    h.engine.delete_workflow(&a.id).await.unwrap();
    let summaries = h.engine.list_workflows().await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].name, "second");
}
