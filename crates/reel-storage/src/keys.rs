//! Bucket key layout for workflow artifacts.
//!
//! Artifact references stored on workflow segments are exactly these keys;
//! delivery converts them to presigned URLs on demand.

/// Key for a segment's first-frame image.
pub fn segment_image_key(workflow_id: &str, index: usize, ext: &str) -> String {
    format!("images/{workflow_id}/segment_{index}.{ext}")
}

/// Key for a segment's generated clip.
pub fn segment_video_key(workflow_id: &str, index: usize) -> String {
    format!("segments/{workflow_id}/segment_{index}.mp4")
}

/// Key for the merged final video.
pub fn final_video_key(workflow_id: &str) -> String {
    format!("finals/{workflow_id}.mp4")
}
