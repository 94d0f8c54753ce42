//! Domain types for the airdrop queue.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Reward category a queue entry was granted under
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    /// Leaderboard position reward
    Ranking,
    /// Event participation reward
    Event,
    /// Referral reward
    Referral,
    /// Discretionary bonus
    Bonus,
    /// Manual grant by an operator
    Admin,
}

impl RewardType {
    pub const ALL: [RewardType; 5] = [
        Self::Ranking,
        Self::Event,
        Self::Referral,
        Self::Bonus,
        Self::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ranking => "ranking",
            Self::Event => "event",
            Self::Referral => "referral",
            Self::Bonus => "bonus",
            Self::Admin => "admin",
        }
    }

    /// Description used when the caller does not supply one
    pub fn default_description(&self) -> &'static str {
        match self {
            Self::Ranking => "Ranking reward airdrop",
            Self::Event => "Event reward airdrop",
            Self::Referral => "Referral reward airdrop",
            Self::Bonus => "Bonus reward airdrop",
            Self::Admin => "Admin grant airdrop",
        }
    }
}

impl std::str::FromStr for RewardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ranking" => Ok(Self::Ranking),
            "event" => Ok(Self::Event),
            "referral" => Ok(Self::Referral),
            "bonus" => Ok(Self::Bonus),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("Invalid reward type: {}", s)),
        }
    }
}

impl std::fmt::Display for RewardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a queue entry.
///
/// Transitions are one-way: `pending -> success` or `pending -> failed`.
/// An entry never re-enters `pending`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Recorded intent, transfer not yet attempted
    #[default]
    Pending,
    /// Transfer submitted on-chain
    Success,
    /// Transfer abandoned after exhausting retries
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Terminal statuses admit no further transitions
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid queue status: {}", s)),
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Application user, referenced read-only by the engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct User {
    pub id: Uuid,
    /// Wallet address in lower-case canonical form
    #[schema(example = "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be")]
    pub wallet_address: String,
    pub is_verified: bool,
    pub score: i64,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One pending-or-settled request to move tokens to one wallet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct AirdropQueueEntry {
    /// Unique identifier, assigned at creation
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Reward category
    pub reward_type: RewardType,
    /// Token quantity, exact decimal
    #[schema(example = "500")]
    pub amount: Decimal,
    /// Free-text annotation
    pub description: String,
    /// Open key/value bag kept for audit (rank, score, last error, ...)
    pub metadata: serde_json::Value,
    /// Lifecycle status
    pub status: QueueStatus,
    /// Transaction hash, present iff status is success
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set once, at the terminal transition
    pub processed_at: Option<DateTime<Utc>>,
}

impl AirdropQueueEntry {
    #[must_use]
    pub fn new(user_id: Uuid, reward_type: RewardType, amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            reward_type,
            amount,
            description: reward_type.default_description().to_string(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            status: QueueStatus::Pending,
            tx_hash: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }
}

/// Insert payload for a new queue entry
#[derive(Debug, Clone)]
pub struct NewQueueEntry {
    pub user_id: Uuid,
    pub reward_type: RewardType,
    pub amount: Decimal,
    pub description: String,
    pub metadata: serde_json::Value,
}

/// A pending entry joined with its resolved destination wallet
#[derive(Debug, Clone)]
pub struct PendingAirdrop {
    pub entry: AirdropQueueEntry,
    pub wallet_address: String,
}

/// Request to enqueue a single airdrop
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct EnqueueRequest {
    /// Destination wallet address
    #[validate(length(min = 1, message = "Wallet address is required"))]
    #[schema(example = "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be")]
    pub wallet_address: String,
    /// Reward category (ranking, event, referral, bonus, admin)
    #[validate(length(min = 1, message = "Reward type is required"))]
    #[schema(example = "bonus")]
    pub reward_type: String,
    /// Token quantity, exact decimal
    #[schema(example = "500")]
    pub amount: Decimal,
    /// Free-text annotation, defaulted from the reward type if omitted
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
    /// Audit metadata attached to the entry
    pub metadata: Option<serde_json::Value>,
}

/// Request to bulk-enqueue ranking rewards from the leaderboard
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RankingAirdropRequest {
    /// Restrict eligibility to one language tag
    #[schema(example = "en")]
    pub language: Option<String>,
    /// Per-rank reward overrides (1-indexed rank -> amount)
    pub custom_rewards: Option<HashMap<u32, Decimal>>,
    /// Description applied to every created entry
    pub description: Option<String>,
}

/// Per-rank outcome of a ranking bulk enqueue
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RankingOutcome {
    /// 1-indexed leaderboard position
    pub rank: u32,
    pub wallet_address: String,
    pub score: i64,
    /// Reward amount for this rank
    pub amount: Decimal,
    /// Created queue entry, absent when the rank was skipped
    pub queue_id: Option<Uuid>,
    /// Reason the rank produced no entry
    pub skipped: Option<String>,
}

/// Result of a ranking bulk enqueue
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RankingAirdropResult {
    /// Number of queue entries created
    pub created: usize,
    /// Sum of created entry amounts
    pub total_amount: Decimal,
    /// Per-rank detail, including skipped ranks
    pub rankings: Vec<RankingOutcome>,
}

/// Request to execute a batch of pending entries
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ExecuteAirdropRequest {
    /// Restrict the batch to these queue entry ids
    pub queue_ids: Option<Vec<Uuid>>,
    /// Restrict the batch to one reward category
    #[schema(example = "ranking")]
    pub reward_type: Option<String>,
    /// Abort the whole batch if the summed amount exceeds this ceiling
    pub max_amount: Option<Decimal>,
    /// Simulate without transferring or mutating stored status
    #[serde(default)]
    pub dry_run: bool,
}

/// Per-entry outcome of an execution batch
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionOutcome {
    pub queue_id: Uuid,
    pub wallet_address: String,
    pub amount: Decimal,
    pub status: QueueStatus,
    /// Present on success
    pub tx_hash: Option<String>,
    /// Present on failure
    pub error: Option<String>,
}

/// Aggregate result of one execution batch
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutionResult {
    /// Entries settled as success
    pub processed: usize,
    /// Entries settled as failed
    pub failed: usize,
    /// Summed amount over the selected batch
    pub total_amount: Decimal,
    /// True when no transfer was performed and no status was written
    pub dry_run: bool,
    pub transactions: Vec<TransactionOutcome>,
}

impl ExecutionResult {
    /// The "nothing to do" result for an empty batch
    #[must_use]
    pub fn empty(dry_run: bool) -> Self {
        Self {
            processed: 0,
            failed: 0,
            total_amount: Decimal::ZERO,
            dry_run,
            transactions: Vec::new(),
        }
    }
}

/// Filters for queue listing
#[derive(Debug, Clone, Default)]
pub struct QueueFilter {
    pub status: Option<QueueStatus>,
    pub reward_type: Option<RewardType>,
}

/// Query parameters for queue listing
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ListQueueParams {
    /// Filter by status (pending, success, failed)
    pub status: Option<String>,
    /// Filter by reward type
    pub reward_type: Option<String>,
    /// Maximum number of items to return (1-100, default: 20)
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    #[serde(default = "default_limit")]
    #[schema(example = 20)]
    pub limit: i64,
    /// Cursor for pagination (entry id to start after)
    pub cursor: Option<Uuid>,
}

fn default_limit() -> i64 {
    20
}

impl Default for ListQueueParams {
    fn default() -> Self {
        Self {
            status: None,
            reward_type: None,
            limit: default_limit(),
            cursor: None,
        }
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    /// List of items
    pub items: Vec<T>,
    /// Cursor for next page (null if no more items)
    pub next_cursor: Option<Uuid>,
    /// Whether more items exist
    pub has_more: bool,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<Uuid>, has_more: bool) -> Self {
        Self {
            items,
            next_cursor,
            has_more,
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }
}

/// Count and summed amount for one status bucket
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusStats {
    pub status: QueueStatus,
    pub count: i64,
    pub total_amount: Decimal,
}

/// Count and summed amount for one reward-type bucket
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RewardTypeStats {
    pub reward_type: RewardType,
    pub count: i64,
    pub total_amount: Decimal,
}

/// Aggregate view over the whole queue
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueueStats {
    pub total_count: i64,
    pub total_amount: Decimal,
    pub by_status: Vec<StatusStats>,
    pub by_reward_type: Vec<RewardTypeStats>,
}

/// Health status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Some systems degraded but functional
    Degraded,
    /// Critical systems unavailable
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall system status
    pub status: HealthStatus,
    /// Database health status
    pub database: HealthStatus,
    /// Token ledger client health status
    pub ledger: HealthStatus,
    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
    /// Application version
    #[schema(example = "0.1.0")]
    pub version: String,
}

impl HealthResponse {
    #[must_use]
    pub fn new(database: HealthStatus, ledger: HealthStatus) -> Self {
        let status = match (&database, &ledger) {
            (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            _ => HealthStatus::Degraded,
        };
        Self {
            status,
            database,
            ledger,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error response structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Error type identifier
    #[schema(example = "invalid_input")]
    pub r#type: String,
    /// Human-readable error message
    #[schema(example = "Amount 0 is below the minimum of 1")]
    pub message: String,
}
