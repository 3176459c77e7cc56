//! Workflow orchestration engine.
//!
//! The engine owns workflow/segment state transitions, enforces stage gates,
//! submits and tracks asynchronous generation jobs, and serializes mutations
//! per workflow id. External work (splitting, prompt optimization, image
//! storage, video generation, merging) is delegated through the provider
//! ports; the engine only ever holds its per-workflow lock around the state
//! mutation, never across a provider call.

pub mod adapters;
pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod poller;
pub mod ports;
pub mod tracker;

pub use adapters::{FfmpegMergeProvider, S3ArtifactStore};
pub use config::EngineConfig;
pub use engine::{Engine, GenerateAllOutcome, GenerateFailure};
pub use error::{EngineError, EngineResult};
pub use ports::{ArtifactStore, MergeProvider, PromptProvider, SplitProvider, VideoGenProvider};
pub use tracker::{JobTracker, PollApplication};
