//! Axum HTTP API for the ReelForge orchestration engine.
//!
//! The surface mirrors the engine operations 1:1; the API layer owns no
//! workflow state of its own and is safe to run behind any stateless
//! poller/renderer.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
