//! API routes.

use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::generation::{final_video, generate_all, generate_video, merge, poll_status};
use crate::handlers::segments::{
    optimize_prompt, remove_image, split_text, update_prompt, update_segment_text, upload_image,
};
use crate::handlers::workflows::{
    create_workflow, delete_workflow, get_workflow, list_workflows, rename_workflow,
};
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let workflow_routes = Router::new()
        .route("/workflows", post(create_workflow))
        .route("/workflows", get(list_workflows))
        .route("/workflows/:id", get(get_workflow))
        .route("/workflows/:id", patch(rename_workflow))
        .route("/workflows/:id", delete(delete_workflow));

    let segment_routes = Router::new()
        .route("/workflows/:id/split", post(split_text))
        .route("/workflows/:id/segments/:idx/text", patch(update_segment_text))
        .route("/workflows/:id/segments/:idx/prompt", patch(update_prompt))
        .route("/workflows/:id/segments/:idx/optimize", post(optimize_prompt))
        .route("/workflows/:id/segments/:idx/image", post(upload_image))
        .route("/workflows/:id/segments/:idx/image", delete(remove_image));

    let generation_routes = Router::new()
        .route("/workflows/:id/segments/:idx/generate", post(generate_video))
        .route("/workflows/:id/segments/:idx/status", get(poll_status))
        .route("/workflows/:id/generate-all", post(generate_all))
        .route("/workflows/:id/merge", post(merge))
        .route("/workflows/:id/final-video", get(final_video));

    // Per-IP rate limiting over the whole API surface
    let rate_limiter = std::sync::Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(workflow_routes)
        .merge(segment_routes)
        .merge(generation_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Bound upload sizes; images are the largest accepted payload
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
