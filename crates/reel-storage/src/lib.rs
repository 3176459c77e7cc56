//! S3-compatible artifact storage.
//!
//! This crate provides:
//! - A thin S3 client for uploading/fetching/presigning artifacts
//! - The bucket key layout for images, segment clips, and final videos
//! - Media-type sniffing for image uploads

pub mod client;
pub mod error;
pub mod keys;
pub mod media_type;

pub use client::{S3Client, S3Config};
pub use error::{StorageError, StorageResult};
pub use keys::{final_video_key, segment_image_key, segment_video_key};
pub use media_type::detect_image_media_type;
