//! Execution engine: drains pending queue entries into ledger transfers.
//!
//! Entries within a batch are processed sequentially. One in-flight transfer
//! from the funding account at a time keeps its nonce ordering trivial, and
//! the fixed inter-item delay acts as a cooperative rate limit on the RPC
//! endpoint. Separate batch invocations are serialized behind a mutex held
//! across the select-transfer-update critical section.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::domain::{
    AppError, ExecuteAirdropRequest, ExecutionResult, LedgerError, PendingAirdrop, QueueStatus,
    QueueStore, TokenLedgerClient, TransactionOutcome, parse_reward_type,
};

use super::config::EngineConfig;

/// Drives pending entries through the token ledger client with bounded retry
pub struct ExecutionEngine {
    store: Arc<dyn QueueStore>,
    ledger: Arc<dyn TokenLedgerClient>,
    config: EngineConfig,
    run_lock: Mutex<()>,
}

impl ExecutionEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn QueueStore>,
        ledger: Arc<dyn TokenLedgerClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            config,
            run_lock: Mutex::new(()),
        }
    }

    /// Execute one batch of pending entries.
    ///
    /// Selection is oldest-first up to the configured batch size, optionally
    /// filtered by explicit ids and/or reward type. The `max_amount` ceiling
    /// is all-or-nothing: when exceeded, no transfer happens and no status is
    /// written. A dry run reports the would-be transactions without touching
    /// the ledger or the store.
    #[instrument(skip(self, request), fields(dry_run = request.dry_run))]
    pub async fn execute_airdrop(
        &self,
        request: &ExecuteAirdropRequest,
    ) -> Result<ExecutionResult, AppError> {
        let reward_type = request
            .reward_type
            .as_deref()
            .map(parse_reward_type)
            .transpose()?;

        // Dry runs are advisory reads and skip the execution lock.
        let _guard = if request.dry_run {
            None
        } else {
            Some(self.run_lock.lock().await)
        };

        let batch = self
            .store
            .select_pending(
                request.queue_ids.as_deref(),
                reward_type,
                self.config.batch_size,
            )
            .await?;

        if batch.is_empty() {
            return Ok(ExecutionResult::empty(request.dry_run));
        }

        let total_amount: Decimal = batch.iter().map(|p| p.entry.amount).sum();

        if let Some(limit) = request.max_amount {
            if total_amount > limit {
                warn!(total = %total_amount, limit = %limit, "Batch exceeds amount ceiling, aborting");
                return Err(AppError::AmountLimitExceeded {
                    total: total_amount,
                    limit,
                });
            }
        }

        if request.dry_run {
            let transactions: Vec<TransactionOutcome> = batch
                .iter()
                .map(|pending| TransactionOutcome {
                    queue_id: pending.entry.id,
                    wallet_address: pending.wallet_address.clone(),
                    amount: pending.entry.amount,
                    status: QueueStatus::Success,
                    tx_hash: None,
                    error: None,
                })
                .collect();
            info!(count = transactions.len(), total = %total_amount, "Dry run complete");
            return Ok(ExecutionResult {
                processed: transactions.len(),
                failed: 0,
                total_amount,
                dry_run: true,
                transactions,
            });
        }

        info!(count = batch.len(), total = %total_amount, "Executing airdrop batch");

        let mut transactions = Vec::with_capacity(batch.len());
        let mut processed = 0;
        let mut failed = 0;

        for pending in &batch {
            let outcome = self.process_entry(pending).await;
            match outcome.status {
                QueueStatus::Success => processed += 1,
                QueueStatus::Failed => failed += 1,
                QueueStatus::Pending => {}
            }
            transactions.push(outcome);

            // Cooperative rate limit toward the RPC endpoint
            sleep(self.config.inter_item_delay).await;
        }

        info!(processed, failed, "Airdrop batch complete");
        Ok(ExecutionResult {
            processed,
            failed,
            total_amount,
            dry_run: false,
            transactions,
        })
    }

    /// Settle one entry. Per-entry failures are recorded, never propagated,
    /// so a failing entry cannot abort its siblings.
    async fn process_entry(&self, pending: &PendingAirdrop) -> TransactionOutcome {
        let entry = &pending.entry;

        match self.transfer_with_retry(pending).await {
            Ok(tx_hash) => {
                if let Err(e) = self.store.mark_success(entry.id, &tx_hash).await {
                    // The transfer went through; leave the entry pending so a
                    // later run can adopt the hash via the reference lookup.
                    error!(id = %entry.id, tx_hash = %tx_hash, error = ?e, "Transfer succeeded but status update failed");
                }
                info!(id = %entry.id, tx_hash = %tx_hash, amount = %entry.amount, "Transfer successful");
                TransactionOutcome {
                    queue_id: entry.id,
                    wallet_address: pending.wallet_address.clone(),
                    amount: entry.amount,
                    status: QueueStatus::Success,
                    tx_hash: Some(tx_hash),
                    error: None,
                }
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(id = %entry.id, error = %reason, "Transfer failed terminally");
                if let Err(db_err) = self.store.mark_failed(entry.id, &reason).await {
                    error!(id = %entry.id, error = ?db_err, "Failed to record transfer failure");
                }
                TransactionOutcome {
                    queue_id: entry.id,
                    wallet_address: pending.wallet_address.clone(),
                    amount: entry.amount,
                    status: QueueStatus::Failed,
                    tx_hash: None,
                    error: Some(reason),
                }
            }
        }
    }

    /// One entry's transfer with bounded retry.
    ///
    /// Insufficient funding balance is terminal immediately; it will not
    /// succeed on retry without operator intervention. Every other ledger
    /// error is retried up to `max_retries` additional attempts with a fixed
    /// delay in between.
    async fn transfer_with_retry(&self, pending: &PendingAirdrop) -> Result<String, AppError> {
        let reference = pending.entry.id.to_string();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.attempt_transfer(pending, &reference).await {
                Ok(tx_hash) => return Ok(tx_hash),
                Err(e) => {
                    if !is_retryable(&e) || attempt > self.config.max_retries {
                        return Err(e);
                    }
                    warn!(
                        id = %pending.entry.id,
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %e,
                        "Transfer attempt failed, retrying"
                    );
                    sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    /// A single attempt: balance guard, prior-submission lookup, transfer.
    ///
    /// The balance is re-checked on every attempt because the funding account
    /// is shared across all entries in a run; a mid-batch depletion must fail
    /// later entries rather than corrupt earlier ones.
    async fn attempt_transfer(
        &self,
        pending: &PendingAirdrop,
        reference: &str,
    ) -> Result<String, AppError> {
        let entry = &pending.entry;

        let funding = self.ledger.funding_address();
        let available = self.ledger.balance_of(funding).await?;
        if available < entry.amount {
            return Err(AppError::Ledger(LedgerError::InsufficientBalance(format!(
                "funding balance {available} below required {}",
                entry.amount
            ))));
        }

        // A transfer carrying this entry's reference may already exist if a
        // previous run crashed between submission and the status update.
        if let Some(tx_hash) = self.ledger.find_transfer(reference).await? {
            info!(id = %entry.id, tx_hash = %tx_hash, "Adopting previously submitted transfer");
            return Ok(tx_hash);
        }

        self.ledger
            .transfer(&pending.wallet_address, entry.amount, reference)
            .await
    }
}

/// Any ledger failure is retryable unless it is an insufficient-balance
/// condition; infrastructure errors during an attempt are treated like a
/// ledger rejection.
fn is_retryable(error: &AppError) -> bool {
    match error {
        AppError::Ledger(e) => e.is_retryable(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use uuid::Uuid;

    use crate::domain::{NewQueueEntry, RewardType};
    use crate::test_utils::{MockLedgerClient, MockQueueStore};

    fn test_config() -> EngineConfig {
        EngineConfig {
            max_retries: 3,
            retry_delay: Duration::from_millis(0),
            inter_item_delay: Duration::from_millis(0),
            ..EngineConfig::default()
        }
    }

    fn engine(
        store: Arc<MockQueueStore>,
        ledger: Arc<MockLedgerClient>,
        config: EngineConfig,
    ) -> ExecutionEngine {
        ExecutionEngine::new(store, ledger, config)
    }

    async fn seed_entry(store: &MockQueueStore, wallet: &str, amount: u32) -> Uuid {
        let user = store.add_user(wallet, true, 10, None);
        let entry = store
            .insert_entry(NewQueueEntry {
                user_id: user.id,
                reward_type: RewardType::Bonus,
                amount: Decimal::from(amount),
                description: "Bonus reward airdrop".to_string(),
                metadata: json!({"rank": 1}),
            })
            .await
            .unwrap();
        entry.id
    }

    #[tokio::test]
    async fn test_empty_queue_is_nothing_to_do() {
        let store = Arc::new(MockQueueStore::new());
        let ledger = Arc::new(MockLedgerClient::new());
        let engine = engine(Arc::clone(&store), Arc::clone(&ledger), test_config());

        let result = engine
            .execute_airdrop(&ExecuteAirdropRequest::default())
            .await
            .unwrap();

        assert_eq!(result.processed, 0);
        assert_eq!(result.failed, 0);
        assert!(result.transactions.is_empty());
        assert_eq!(ledger.transfer_attempts(), 0);
    }

    #[tokio::test]
    async fn test_successful_batch_settles_entries() {
        let store = Arc::new(MockQueueStore::new());
        let ledger = Arc::new(MockLedgerClient::new());
        let id = seed_entry(&store, "0x1111111111111111111111111111111111111111", 500).await;
        let engine = engine(Arc::clone(&store), Arc::clone(&ledger), test_config());

        let result = engine
            .execute_airdrop(&ExecuteAirdropRequest::default())
            .await
            .unwrap();

        assert_eq!(result.processed, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(result.total_amount, Decimal::from(500));

        let entry = store.get_entry(id).unwrap();
        assert_eq!(entry.status, QueueStatus::Success);
        assert!(entry.tx_hash.is_some());
        assert!(entry.processed_at.is_some());
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let store = Arc::new(MockQueueStore::new());
        let ledger = Arc::new(MockLedgerClient::new());
        seed_entry(&store, "0x1111111111111111111111111111111111111111", 500).await;
        let engine = engine(Arc::clone(&store), Arc::clone(&ledger), test_config());

        let first = engine
            .execute_airdrop(&ExecuteAirdropRequest::default())
            .await
            .unwrap();
        assert_eq!(first.processed, 1);

        // A settled entry is never selected again.
        let second = engine
            .execute_airdrop(&ExecuteAirdropRequest::default())
            .await
            .unwrap();
        assert_eq!(second.processed, 0);
        assert_eq!(ledger.transfer_attempts(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_mutates_nothing() {
        let store = Arc::new(MockQueueStore::new());
        let ledger = Arc::new(MockLedgerClient::new());
        let id = seed_entry(&store, "0x1111111111111111111111111111111111111111", 500).await;
        let engine = engine(Arc::clone(&store), Arc::clone(&ledger), test_config());

        let result = engine
            .execute_airdrop(&ExecuteAirdropRequest {
                dry_run: true,
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(result.dry_run);
        assert_eq!(result.transactions.len(), 1);
        assert_eq!(result.transactions[0].status, QueueStatus::Success);
        assert!(result.transactions[0].tx_hash.is_none());

        // No ledger call, no status write
        assert_eq!(ledger.transfer_attempts(), 0);
        assert_eq!(store.get_entry(id).unwrap().status, QueueStatus::Pending);
    }

    #[tokio::test]
    async fn test_amount_ceiling_aborts_whole_batch() {
        let store = Arc::new(MockQueueStore::new());
        let ledger = Arc::new(MockLedgerClient::new());
        let first = seed_entry(&store, "0x1111111111111111111111111111111111111111", 600).await;
        let second = seed_entry(&store, "0x2222222222222222222222222222222222222222", 600).await;
        let engine = engine(Arc::clone(&store), Arc::clone(&ledger), test_config());

        let result = engine
            .execute_airdrop(&ExecuteAirdropRequest {
                max_amount: Some(Decimal::from(1000)),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(AppError::AmountLimitExceeded { .. })));
        // All-or-nothing: zero transfers, zero status writes
        assert_eq!(ledger.transfer_attempts(), 0);
        assert_eq!(store.get_entry(first).unwrap().status, QueueStatus::Pending);
        assert_eq!(store.get_entry(second).unwrap().status, QueueStatus::Pending);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_marks_failed_with_reason() {
        let store = Arc::new(MockQueueStore::new());
        let ledger = Arc::new(MockLedgerClient::new());
        ledger.fail_transfers_with("nonce too low", u32::MAX);
        let id = seed_entry(&store, "0x1111111111111111111111111111111111111111", 500).await;
        let engine = engine(Arc::clone(&store), Arc::clone(&ledger), test_config());

        let result = engine
            .execute_airdrop(&ExecuteAirdropRequest::default())
            .await
            .unwrap();

        assert_eq!(result.processed, 0);
        assert_eq!(result.failed, 1);

        // max_retries = 3 means exactly 4 attempts
        assert_eq!(ledger.transfer_attempts(), 4);

        let entry = store.get_entry(id).unwrap();
        assert_eq!(entry.status, QueueStatus::Failed);
        assert!(entry.processed_at.is_some());
        assert!(
            entry.metadata["error"]
                .as_str()
                .unwrap()
                .contains("nonce too low")
        );
        // Prior audit fields survive the merge
        assert_eq!(entry.metadata["rank"], 1);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_within_retries() {
        let store = Arc::new(MockQueueStore::new());
        let ledger = Arc::new(MockLedgerClient::new());
        ledger.fail_transfers_with("connection reset", 2);
        let id = seed_entry(&store, "0x1111111111111111111111111111111111111111", 500).await;
        let engine = engine(Arc::clone(&store), Arc::clone(&ledger), test_config());

        let result = engine
            .execute_airdrop(&ExecuteAirdropRequest::default())
            .await
            .unwrap();

        assert_eq!(result.processed, 1);
        assert_eq!(ledger.transfer_attempts(), 3);
        assert_eq!(store.get_entry(id).unwrap().status, QueueStatus::Success);
    }

    #[tokio::test]
    async fn test_insufficient_balance_fails_without_retry() {
        let store = Arc::new(MockQueueStore::new());
        let ledger = Arc::new(MockLedgerClient::new());
        ledger.set_balance(Decimal::from(100));
        let id = seed_entry(&store, "0x1111111111111111111111111111111111111111", 500).await;
        let engine = engine(Arc::clone(&store), Arc::clone(&ledger), test_config());

        let result = engine
            .execute_airdrop(&ExecuteAirdropRequest::default())
            .await
            .unwrap();

        assert_eq!(result.failed, 1);
        // Terminal before any transfer attempt, no retries consumed
        assert_eq!(ledger.transfer_attempts(), 0);

        let entry = store.get_entry(id).unwrap();
        assert_eq!(entry.status, QueueStatus::Failed);
        assert!(
            entry.metadata["error"]
                .as_str()
                .unwrap()
                .contains("balance")
        );
    }

    #[tokio::test]
    async fn test_mid_batch_depletion_fails_later_entries_only() {
        let store = Arc::new(MockQueueStore::new());
        let ledger = Arc::new(MockLedgerClient::new());
        // Enough for the first transfer only; the mock debits on success.
        ledger.set_balance(Decimal::from(700));
        let first = seed_entry(&store, "0x1111111111111111111111111111111111111111", 500).await;
        let second = seed_entry(&store, "0x2222222222222222222222222222222222222222", 500).await;
        let engine = engine(Arc::clone(&store), Arc::clone(&ledger), test_config());

        let result = engine
            .execute_airdrop(&ExecuteAirdropRequest::default())
            .await
            .unwrap();

        assert_eq!(result.processed, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(store.get_entry(first).unwrap().status, QueueStatus::Success);
        assert_eq!(store.get_entry(second).unwrap().status, QueueStatus::Failed);
    }

    #[tokio::test]
    async fn test_adopts_previously_submitted_transfer() {
        let store = Arc::new(MockQueueStore::new());
        let ledger = Arc::new(MockLedgerClient::new());
        let id = seed_entry(&store, "0x1111111111111111111111111111111111111111", 500).await;

        // A prior run already submitted this entry's transfer
        ledger.preload_transfer(&id.to_string(), "0xdeadbeef");

        let engine = engine(Arc::clone(&store), Arc::clone(&ledger), test_config());
        let result = engine
            .execute_airdrop(&ExecuteAirdropRequest::default())
            .await
            .unwrap();

        assert_eq!(result.processed, 1);
        assert_eq!(ledger.transfer_attempts(), 0);
        assert_eq!(
            store.get_entry(id).unwrap().tx_hash.as_deref(),
            Some("0xdeadbeef")
        );
    }

    #[tokio::test]
    async fn test_filters_restrict_the_batch() {
        let store = Arc::new(MockQueueStore::new());
        let ledger = Arc::new(MockLedgerClient::new());
        let bonus = seed_entry(&store, "0x1111111111111111111111111111111111111111", 100).await;

        let user = store.add_user("0x2222222222222222222222222222222222222222", true, 10, None);
        let ranking = store
            .insert_entry(NewQueueEntry {
                user_id: user.id,
                reward_type: RewardType::Ranking,
                amount: Decimal::from(50),
                description: "Ranking reward airdrop".to_string(),
                metadata: json!({}),
            })
            .await
            .unwrap();

        let engine = engine(Arc::clone(&store), Arc::clone(&ledger), test_config());
        let result = engine
            .execute_airdrop(&ExecuteAirdropRequest {
                reward_type: Some("ranking".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.processed, 1);
        assert_eq!(result.transactions[0].queue_id, ranking.id);
        assert_eq!(store.get_entry(bonus).unwrap().status, QueueStatus::Pending);
    }

    #[tokio::test]
    async fn test_batch_processes_oldest_first() {
        let store = Arc::new(MockQueueStore::new());
        let ledger = Arc::new(MockLedgerClient::new());
        let older = seed_entry(&store, "0x1111111111111111111111111111111111111111", 100).await;
        let newer = seed_entry(&store, "0x2222222222222222222222222222222222222222", 100).await;

        let engine = engine(Arc::clone(&store), Arc::clone(&ledger), test_config());
        let result = engine
            .execute_airdrop(&ExecuteAirdropRequest::default())
            .await
            .unwrap();

        let order: Vec<Uuid> = result.transactions.iter().map(|t| t.queue_id).collect();
        assert_eq!(order, vec![older, newer]);
    }

    #[tokio::test]
    async fn test_invalid_reward_type_filter_rejected() {
        let store = Arc::new(MockQueueStore::new());
        let ledger = Arc::new(MockLedgerClient::new());
        let engine = engine(store, ledger, test_config());

        let result = engine
            .execute_airdrop(&ExecuteAirdropRequest {
                reward_type: Some("jackpot".to_string()),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
