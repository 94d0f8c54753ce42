//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;
pub mod validation;

pub use error::{AppError, DatabaseError, LedgerError, ValidationError};
pub use traits::{QueueStore, TokenLedgerClient};
pub use types::{
    AirdropQueueEntry, EnqueueRequest, ErrorDetail, ErrorResponse, ExecuteAirdropRequest,
    ExecutionResult, HealthResponse, HealthStatus, ListQueueParams, NewQueueEntry,
    PaginatedResponse, PendingAirdrop, QueueFilter, QueueStats, QueueStatus, RankingAirdropRequest,
    RankingAirdropResult, RankingOutcome, RewardType, RewardTypeStats, StatusStats,
    TransactionOutcome, User,
};
pub use validation::{normalize_address, parse_reward_type, validate_amount};
