//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use utoipa::OpenApi;
use validator::Validate;

use crate::app::AppState;
use crate::domain::{
    AirdropQueueEntry, AppError, EnqueueRequest, ErrorDetail, ErrorResponse,
    ExecuteAirdropRequest, ExecutionResult, HealthResponse, HealthStatus, ListQueueParams,
    PaginatedResponse, QueueFilter, QueueStats, RankingAirdropRequest, RankingAirdropResult,
    ValidationError,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Airdrop Engine API",
        version = "0.1.0",
        description = "Queue and execution engine for token reward airdrops",
        license(
            name = "MIT"
        )
    ),
    paths(
        enqueue_airdrop_handler,
        create_ranking_airdrop_handler,
        execute_airdrop_handler,
        list_queue_handler,
        queue_stats_handler,
        health_check_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            AirdropQueueEntry,
            EnqueueRequest,
            RankingAirdropRequest,
            RankingAirdropResult,
            ExecuteAirdropRequest,
            ExecutionResult,
            crate::domain::RewardType,
            crate::domain::QueueStatus,
            crate::domain::RankingOutcome,
            crate::domain::TransactionOutcome,
            ListQueueParams,
            PaginatedResponse<AirdropQueueEntry>,
            QueueStats,
            crate::domain::StatusStats,
            crate::domain::RewardTypeStats,
            HealthResponse,
            HealthStatus,
            ErrorResponse,
            ErrorDetail,
        )
    ),
    tags(
        (name = "airdrops", description = "Airdrop queue and execution endpoints"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Enqueue a single airdrop
///
/// Records intent to transfer tokens to a registered wallet. No on-chain
/// call happens here; the entry stays `pending` until an execution batch
/// picks it up.
#[utoipa::path(
    post,
    path = "/airdrops/queue",
    tag = "airdrops",
    request_body = EnqueueRequest,
    responses(
        (status = 200, description = "Airdrop queued", body = AirdropQueueEntry),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "No registered user for the wallet", body = ErrorResponse),
        (status = 409, description = "A pending entry already exists for this user and reward type", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn enqueue_airdrop_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EnqueueRequest>,
) -> Result<Json<AirdropQueueEntry>, AppError> {
    let entry = state.queue.enqueue(&payload).await?;
    Ok(Json(entry))
}

/// Bulk-enqueue ranking rewards from the current leaderboard
#[utoipa::path(
    post,
    path = "/airdrops/ranking",
    tag = "airdrops",
    request_body = RankingAirdropRequest,
    responses(
        (status = 200, description = "Ranking airdrop seeded", body = RankingAirdropResult),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "No eligible users", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn create_ranking_airdrop_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RankingAirdropRequest>,
) -> Result<Json<RankingAirdropResult>, AppError> {
    let result = state.queue.create_ranking_airdrop(&payload).await?;
    Ok(Json(result))
}

/// Execute a batch of pending airdrops
///
/// Selects up to the configured batch size of pending entries (oldest first)
/// and drives each through the token ledger. Set `dry_run` to preview the
/// batch without transferring or mutating stored status.
#[utoipa::path(
    post,
    path = "/airdrops/execute",
    tag = "airdrops",
    request_body = ExecuteAirdropRequest,
    responses(
        (status = 200, description = "Batch result with per-entry outcomes", body = ExecutionResult),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Batch amount exceeds the requested ceiling", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
        (status = 503, description = "Token ledger unavailable", body = ErrorResponse)
    )
)]
pub async fn execute_airdrop_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExecuteAirdropRequest>,
) -> Result<Json<ExecutionResult>, AppError> {
    let result = state.executor.execute_airdrop(&payload).await?;
    Ok(Json(result))
}

/// List queue entries with filters and pagination
#[utoipa::path(
    get,
    path = "/airdrops/queue",
    tag = "airdrops",
    params(
        ("status" = Option<String>, Query, description = "Filter by status (pending, success, failed)"),
        ("reward_type" = Option<String>, Query, description = "Filter by reward type"),
        ("limit" = Option<i64>, Query, description = "Maximum number of entries to return (1-100, default: 20)"),
        ("cursor" = Option<String>, Query, description = "Cursor for pagination (entry id to start after)")
    ),
    responses(
        (status = 200, description = "Queue entries", body = PaginatedResponse<AirdropQueueEntry>),
        (status = 400, description = "Invalid filter or pagination parameters", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_queue_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQueueParams>,
) -> Result<Json<PaginatedResponse<AirdropQueueEntry>>, AppError> {
    params
        .validate()
        .map_err(|e| AppError::Validation(ValidationError::Multiple(e.to_string())))?;

    let filter = QueueFilter {
        status: params
            .status
            .as_deref()
            .map(|s| {
                s.parse().map_err(|_| {
                    ValidationError::InvalidField {
                        field: "status".to_string(),
                        message: format!("Invalid status: {s}"),
                    }
                })
            })
            .transpose()?,
        reward_type: params
            .reward_type
            .as_deref()
            .map(crate::domain::parse_reward_type)
            .transpose()?,
    };

    let page = state
        .reporting
        .queue(&filter, params.limit, params.cursor)
        .await?;
    Ok(Json(page))
}

/// Aggregate queue statistics
#[utoipa::path(
    get,
    path = "/airdrops/stats",
    tag = "airdrops",
    responses(
        (status = 200, description = "Counts and summed amounts by status and reward type", body = QueueStats),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn queue_stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<QueueStats>, AppError> {
    let stats = state.reporting.stats().await?;
    Ok(Json(stats))
}

/// Detailed health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.health_check().await;
    Json(health)
}

/// Kubernetes liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Application is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Application is ready to serve traffic"),
        (status = 503, description = "Application is not ready")
    )
)]
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    let health = state.health_check().await;
    match health.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    }
}
