//! Stage-gate predicates.
//!
//! Pure, side-effect-free functions over workflow snapshots. These are the
//! single source of truth for pipeline transitions: every caller that needs
//! "may this segment generate" or "is this workflow ready to merge" goes
//! through here rather than re-deriving the checks inline.

use crate::segment::{Segment, SegmentVideoStatus};
use crate::workflow::{Workflow, WorkflowStatus};

/// True when a segment is eligible for video generation.
///
/// Requires both an optimized prompt and an uploaded first-frame image.
pub fn can_generate(segment: &Segment) -> bool {
    segment.prompt.is_some() && segment.image_reference.is_some()
}

/// True when every segment's clip is generated and stored.
///
/// Merging an empty workflow is never legal.
pub fn can_merge(workflow: &Workflow) -> bool {
    !workflow.segments.is_empty() && workflow.segments.iter().all(|s| s.is_completed())
}

/// Number of segments that have not yet completed generation.
pub fn incomplete_segments(workflow: &Workflow) -> usize {
    workflow
        .segments
        .iter()
        .filter(|s| !s.is_completed())
        .count()
}

/// Derive the coarse workflow status from segment state.
///
/// - `Draft` while there are no segments.
/// - `Completed` once every segment completed and the merge artifact exists.
/// - `Failed` when at least one segment failed and none are still generating.
/// - `Processing` otherwise (work in flight or artifacts still missing).
pub fn derive_status(workflow: &Workflow) -> WorkflowStatus {
    if workflow.segments.is_empty() {
        return WorkflowStatus::Draft;
    }

    if can_merge(workflow) && workflow.final_video_reference.is_some() {
        return WorkflowStatus::Completed;
    }

    let any_failed = workflow
        .segments
        .iter()
        .any(|s| s.video_status == SegmentVideoStatus::Failed);
    let any_generating = workflow
        .segments
        .iter()
        .any(|s| s.video_status == SegmentVideoStatus::Generating);

    if any_failed && !any_generating {
        return WorkflowStatus::Failed;
    }

    WorkflowStatus::Processing
}
