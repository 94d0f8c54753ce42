//! Error taxonomy for the airdrop engine.
//!
//! Errors cross the public boundary as discriminated results, never as
//! panics. Each kind maps to a stable wire type and HTTP status.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::types::{ErrorDetail, ErrorResponse, RewardType};

/// Validation errors for caller-supplied input
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Invalid reward type '{0}', expected one of: ranking, event, referral, bonus, admin")]
    InvalidRewardType(String),

    #[error("Amount must be greater than 0, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("Amount {amount} is below the minimum of {min}")]
    BelowMinimum { amount: Decimal, min: Decimal },

    #[error("Amount {amount} is above the maximum of {max}")]
    AboveMaximum { amount: Decimal, max: Decimal },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Validation failed: {0}")]
    Multiple(String),
}

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database query error: {0}")]
    Query(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
}

/// Token ledger client errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger connection error: {0}")]
    Connection(String),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Insufficient funding balance: {0}")]
    InsufficientBalance(String),

    #[error("Invalid ledger response: {0}")]
    InvalidResponse(String),

    #[error("Ledger configuration error: {0}")]
    Configuration(String),
}

impl LedgerError {
    /// Insufficient balance will not succeed on retry without operator
    /// intervention; everything else is worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InsufficientBalance(_))
    }
}

/// Top-level application error
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No registered user for wallet {0}")]
    UserNotFound(String),

    #[error("A pending {reward_type} entry already exists for user {user_id}")]
    DuplicateQueue { user_id: Uuid, reward_type: RewardType },

    #[error("Batch amount {total} exceeds the limit of {limit}")]
    AmountLimitExceeded { total: Decimal, limit: Decimal },

    #[error("No eligible users for ranking airdrop")]
    NoEligibleUsers,

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl AppError {
    /// Stable wire identifier for this error kind
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid_input",
            Self::UserNotFound(_) => "user_not_found",
            Self::DuplicateQueue { .. } => "duplicate_queue",
            Self::AmountLimitExceeded { .. } => "amount_limit_exceeded",
            Self::NoEligibleUsers => "no_eligible_users",
            Self::Database(_) => "database_error",
            Self::Ledger(_) => "ledger_error",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UserNotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateQueue { .. } => StatusCode::CONFLICT,
            Self::AmountLimitExceeded { .. } => StatusCode::CONFLICT,
            Self::NoEligibleUsers => StatusCode::NOT_FOUND,
            Self::Database(DatabaseError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Ledger(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal detail stays in the logs; the wire message is generic for 5xx.
        let message = match &self {
            Self::Database(e) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %e, "Database error");
                "Internal server error".to_string()
            }
            Self::Ledger(e) => {
                tracing::error!(error = %e, "Ledger error");
                "Token ledger unavailable".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                r#type: self.error_type().to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_types_are_stable() {
        let user_id = Uuid::new_v4();
        let cases: Vec<(AppError, &str)> = vec![
            (
                AppError::Validation(ValidationError::NonPositiveAmount(Decimal::ZERO)),
                "invalid_input",
            ),
            (AppError::UserNotFound("0xabc".to_string()), "user_not_found"),
            (
                AppError::DuplicateQueue {
                    user_id,
                    reward_type: RewardType::Bonus,
                },
                "duplicate_queue",
            ),
            (
                AppError::AmountLimitExceeded {
                    total: Decimal::from(200),
                    limit: Decimal::from(100),
                },
                "amount_limit_exceeded",
            ),
            (AppError::NoEligibleUsers, "no_eligible_users"),
            (
                AppError::Database(DatabaseError::Query("boom".to_string())),
                "database_error",
            ),
            (
                AppError::Ledger(LedgerError::TransferFailed("revert".to_string())),
                "ledger_error",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.error_type(), expected);
        }
    }

    #[test]
    fn test_ledger_error_retryability() {
        assert!(LedgerError::Connection("timeout".to_string()).is_retryable());
        assert!(LedgerError::TransferFailed("revert".to_string()).is_retryable());
        assert!(!LedgerError::InsufficientBalance("balance 1 below 500".to_string()).is_retryable());
    }

    #[test]
    fn test_validation_error_names_violated_bound() {
        let below = ValidationError::BelowMinimum {
            amount: Decimal::ZERO,
            min: Decimal::ONE,
        };
        assert!(below.to_string().contains("minimum"));

        let above = ValidationError::AboveMaximum {
            amount: Decimal::from(2000),
            max: Decimal::from(1000),
        };
        assert!(above.to_string().contains("maximum"));
    }

    #[test]
    fn test_invalid_reward_type_lists_valid_set() {
        let err = ValidationError::InvalidRewardType("jackpot".to_string());
        let message = err.to_string();
        for valid in ["ranking", "event", "referral", "bonus", "admin"] {
            assert!(message.contains(valid), "missing {valid} in: {message}");
        }
    }
}
