//! Domain traits defining contracts for external systems.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::AppError;
use super::types::{
    AirdropQueueEntry, NewQueueEntry, PaginatedResponse, PendingAirdrop, QueueFilter, QueueStats,
    RewardType, User,
};

/// Persistence contract for users and the airdrop queue
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Check store connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Resolve a canonical (lower-case) wallet address to a user
    async fn find_user_by_wallet(&self, wallet: &str) -> Result<Option<User>, AppError>;

    /// Verified users with score >= 1, ordered by score descending then
    /// registration time ascending, optionally filtered by language
    async fn list_eligible_users(
        &self,
        language: Option<&str>,
        limit: i64,
    ) -> Result<Vec<User>, AppError>;

    /// Whether a pending entry already exists for this (user, reward type) pair
    async fn has_pending_entry(
        &self,
        user_id: Uuid,
        reward_type: RewardType,
    ) -> Result<bool, AppError>;

    /// Insert a new pending entry.
    ///
    /// A unique-constraint violation on the pending (user, reward type) pair
    /// surfaces as [`AppError::DuplicateQueue`].
    async fn insert_entry(&self, entry: NewQueueEntry) -> Result<AirdropQueueEntry, AppError>;

    /// Select up to `limit` pending entries, oldest first, optionally
    /// restricted to an explicit id list and/or one reward type
    async fn select_pending(
        &self,
        ids: Option<&[Uuid]>,
        reward_type: Option<RewardType>,
        limit: i64,
    ) -> Result<Vec<PendingAirdrop>, AppError>;

    /// Settle a pending entry as success, recording the transaction hash
    async fn mark_success(&self, id: Uuid, tx_hash: &str) -> Result<(), AppError>;

    /// Settle a pending entry as failed, merging the reason into
    /// `metadata.error` (prior audit fields are preserved)
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), AppError>;

    /// List entries with filters and cursor-based pagination
    async fn list_entries(
        &self,
        filter: &QueueFilter,
        limit: i64,
        cursor: Option<Uuid>,
    ) -> Result<PaginatedResponse<AirdropQueueEntry>, AppError>;

    /// Group-by count and sum over the queue
    async fn stats(&self) -> Result<QueueStats, AppError>;
}

/// Token ledger client contract for chain operations.
///
/// The implementation wraps the RPC connection and signing; this engine only
/// orchestrates calls and records outcomes.
#[async_trait]
pub trait TokenLedgerClient: Send + Sync {
    /// Check ledger connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Address of the funding account transfers are sent from
    fn funding_address(&self) -> &str;

    /// Token decimal places
    async fn decimals(&self) -> Result<u32, AppError>;

    /// Token balance of an address
    async fn balance_of(&self, address: &str) -> Result<Decimal, AppError>;

    /// Submit a token transfer and return the transaction hash.
    ///
    /// `reference` is a caller-generated idempotency key attached to the
    /// transaction. Must error on revert or insufficient funds; never a
    /// false-positive success.
    async fn transfer(
        &self,
        to: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<String, AppError>;

    /// Look up a previously submitted transfer by its idempotency reference.
    ///
    /// Lets a crashed-mid-batch run adopt the earlier transaction instead of
    /// paying twice. Ledgers without reference tracking return `None`.
    async fn find_transfer(&self, reference: &str) -> Result<Option<String>, AppError> {
        let _ = reference;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LedgerError;

    // Minimal implementation exercising the defaulted trait method
    struct MinimalLedgerClient;

    #[async_trait]
    impl TokenLedgerClient for MinimalLedgerClient {
        async fn health_check(&self) -> Result<(), AppError> {
            Ok(())
        }

        fn funding_address(&self) -> &str {
            "0x00000000000000000000000000000000000000aa"
        }

        async fn decimals(&self) -> Result<u32, AppError> {
            Ok(18)
        }

        async fn balance_of(&self, _address: &str) -> Result<Decimal, AppError> {
            Ok(Decimal::from(1000))
        }

        async fn transfer(
            &self,
            _to: &str,
            _amount: Decimal,
            _reference: &str,
        ) -> Result<String, AppError> {
            Err(AppError::Ledger(LedgerError::TransferFailed(
                "not implemented".to_string(),
            )))
        }
    }

    #[tokio::test]
    async fn test_find_transfer_defaults_to_none() {
        let client = MinimalLedgerClient;
        let result = client.find_transfer("ref").await.unwrap();
        assert!(result.is_none());
    }
}
