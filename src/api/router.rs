//! Router assembly.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::app::AppState;

use super::handlers::{
    ApiDoc, create_ranking_airdrop_handler, enqueue_airdrop_handler, execute_airdrop_handler,
    health_check_handler, list_queue_handler, liveness_handler, queue_stats_handler,
    readiness_handler,
};

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/airdrops/queue",
            post(enqueue_airdrop_handler).get(list_queue_handler),
        )
        .route("/airdrops/ranking", post(create_ranking_airdrop_handler))
        .route("/airdrops/execute", post(execute_airdrop_handler))
        .route("/airdrops/stats", get(queue_stats_handler))
        .route("/health", get(health_check_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(120)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
