//! Async job tracking: submit, poll, and stale-safe result application.

use std::sync::Arc;

use tracing::debug;

use reel_models::{Segment, VideoJobId};
use reel_providers::{ProviderResult, TaskState, VideoTaskStatus};

use crate::ports::VideoGenProvider;

/// How a poll result was applied to a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollApplication {
    /// The polled job is no longer the segment's current job; nothing changed.
    Stale,
    /// The job is still in flight; nothing changed.
    InFlight,
    /// The job succeeded; the caller must archive `video_url` and then call
    /// [`Segment::complete_generation`] with the archived reference.
    Succeeded { video_url: String },
    /// The job reached a terminal failure; the segment was marked failed.
    Failed,
    /// The provider reported success without an artifact; the segment was
    /// marked failed and the violation must be surfaced.
    InvariantViolation,
}

/// Uniform submit/poll contract over the video-generation provider.
pub struct JobTracker {
    provider: Arc<dyn VideoGenProvider>,
}

impl JobTracker {
    /// Create a tracker over a generation provider.
    pub fn new(provider: Arc<dyn VideoGenProvider>) -> Self {
        Self { provider }
    }

    /// Submit a generation job.
    ///
    /// The caller must already have verified the generate gate. A transport
    /// failure surfaces before any job id exists, so the call is safely
    /// retryable.
    pub async fn submit_video_job(
        &self,
        prompt: &str,
        image_url: &str,
    ) -> ProviderResult<VideoJobId> {
        let job_id = self.provider.submit(prompt, image_url).await?;
        Ok(VideoJobId::from(job_id))
    }

    /// Poll a generation job. Idempotent, non-blocking.
    pub async fn poll_video_job(&self, job_id: &VideoJobId) -> ProviderResult<VideoTaskStatus> {
        self.provider.poll(job_id.as_str()).await
    }

    /// Apply a poll result to a segment, honoring the stale-job rule.
    ///
    /// A result for a job other than the segment's current `video_job_id` is
    /// discarded silently: a slow poll of a superseded job must never clobber
    /// a newer generation's state.
    pub fn apply_poll(
        segment: &mut Segment,
        job_id: &VideoJobId,
        status: &VideoTaskStatus,
    ) -> PollApplication {
        if !segment.is_current_job(job_id) {
            debug!(
                segment = segment.index,
                job_id = %job_id,
                "Discarding stale poll result"
            );
            return PollApplication::Stale;
        }

        match status.state {
            TaskState::Pending | TaskState::Running | TaskState::Unknown => {
                PollApplication::InFlight
            }
            TaskState::Succeeded => match &status.video_url {
                Some(url) => PollApplication::Succeeded {
                    video_url: url.clone(),
                },
                None => {
                    segment.fail_generation(format!(
                        "generation job {job_id} reported success without an artifact"
                    ));
                    PollApplication::InvariantViolation
                }
            },
            TaskState::Failed | TaskState::Canceled => {
                let reason = status
                    .message
                    .clone()
                    .unwrap_or_else(|| "generation failed".to_string());
                segment.fail_generation(reason);
                PollApplication::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::SegmentVideoStatus;

    fn generating_segment(job: &str) -> Segment {
        let mut seg = Segment::new(0, "text");
        seg.begin_generation(VideoJobId::from(job));
        seg
    }

    fn status(state: TaskState, url: Option<&str>) -> VideoTaskStatus {
        VideoTaskStatus {
            state,
            video_url: url.map(String::from),
            message: None,
        }
    }

    #[test]
    fn test_stale_poll_never_mutates() {
        let mut seg = generating_segment("job-2");
        let before = seg.clone();

        let outcome = JobTracker::apply_poll(
            &mut seg,
            &VideoJobId::from("job-1"),
            &status(TaskState::Succeeded, Some("https://cdn/clip.mp4")),
        );

        assert_eq!(outcome, PollApplication::Stale);
        assert_eq!(seg.video_status, before.video_status);
        assert_eq!(seg.video_reference, before.video_reference);
        assert_eq!(seg.video_job_id, before.video_job_id);
    }

    #[test]
    fn test_running_is_in_flight() {
        let mut seg = generating_segment("job-1");
        let outcome = JobTracker::apply_poll(
            &mut seg,
            &VideoJobId::from("job-1"),
            &status(TaskState::Running, None),
        );
        assert_eq!(outcome, PollApplication::InFlight);
        assert_eq!(seg.video_status, SegmentVideoStatus::Generating);
    }

    #[test]
    fn test_succeeded_defers_completion_to_archival() {
        let mut seg = generating_segment("job-1");
        let outcome = JobTracker::apply_poll(
            &mut seg,
            &VideoJobId::from("job-1"),
            &status(TaskState::Succeeded, Some("https://cdn/clip.mp4")),
        );
        assert_eq!(
            outcome,
            PollApplication::Succeeded {
                video_url: "https://cdn/clip.mp4".to_string()
            }
        );
        // Completion happens only after archiving
        assert_eq!(seg.video_status, SegmentVideoStatus::Generating);
    }

    #[test]
    fn test_failed_marks_segment_with_reason() {
        let mut seg = generating_segment("job-1");
        let mut failed = status(TaskState::Failed, None);
        failed.message = Some("content policy".to_string());

        let outcome = JobTracker::apply_poll(&mut seg, &VideoJobId::from("job-1"), &failed);
        assert_eq!(outcome, PollApplication::Failed);
        assert_eq!(seg.video_status, SegmentVideoStatus::Failed);
        assert_eq!(seg.last_error.as_deref(), Some("content policy"));
    }

    #[test]
    fn test_success_without_artifact_is_invariant_violation() {
        let mut seg = generating_segment("job-1");
        let outcome = JobTracker::apply_poll(
            &mut seg,
            &VideoJobId::from("job-1"),
            &status(TaskState::Succeeded, None),
        );
        assert_eq!(outcome, PollApplication::InvariantViolation);
        assert_eq!(seg.video_status, SegmentVideoStatus::Failed);
    }
}
