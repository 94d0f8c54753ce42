//! Mock implementations for testing.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use uuid::Uuid;

use crate::domain::{
    AirdropQueueEntry, AppError, DatabaseError, LedgerError, NewQueueEntry, PaginatedResponse,
    PendingAirdrop, QueueFilter, QueueStats, QueueStatus, QueueStore, RewardType, RewardTypeStats,
    StatusStats, TokenLedgerClient, User,
};

/// Configuration for mock behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub should_fail: bool,
    pub error_message: Option<String>,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }
}

/// In-memory queue store for testing.
///
/// Enforces the pending (user, reward type) uniqueness and the one-way status
/// transitions the way the real store's constraints do.
pub struct MockQueueStore {
    entries: Mutex<HashMap<Uuid, AirdropQueueEntry>>,
    users: Mutex<Vec<User>>,
    // Deterministic, strictly increasing created_at timestamps
    clock_seq: AtomicI64,
    config: MockConfig,
    is_healthy: AtomicBool,
}

impl MockQueueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            users: Mutex::new(Vec::new()),
            clock_seq: AtomicI64::new(0),
            config,
            is_healthy: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Register a user. `wallet` must already be in canonical lower-case form.
    pub fn add_user(
        &self,
        wallet: &str,
        is_verified: bool,
        score: i64,
        language: Option<&str>,
    ) -> User {
        let user = User {
            id: Uuid::new_v4(),
            wallet_address: wallet.to_string(),
            is_verified,
            score,
            language: language.map(|l| l.to_string()),
            created_at: self.next_timestamp(),
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    /// Get one stored entry (for assertions)
    pub fn get_entry(&self, id: Uuid) -> Option<AirdropQueueEntry> {
        self.entries.lock().unwrap().get(&id).cloned()
    }

    /// Get all stored entries (for assertions)
    pub fn all_entries(&self) -> Vec<AirdropQueueEntry> {
        self.entries.lock().unwrap().values().cloned().collect()
    }

    fn next_timestamp(&self) -> chrono::DateTime<Utc> {
        let seq = self.clock_seq.fetch_add(1, Ordering::SeqCst);
        Utc::now() + ChronoDuration::milliseconds(seq)
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock error".to_string());
            return Err(AppError::Database(DatabaseError::Query(msg)));
        }
        Ok(())
    }
}

impl Default for MockQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for MockQueueStore {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Unhealthy".to_string(),
            )));
        }
        self.check_should_fail()
    }

    async fn find_user_by_wallet(&self, wallet: &str) -> Result<Option<User>, AppError> {
        self.check_should_fail()?;
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.wallet_address == wallet).cloned())
    }

    async fn list_eligible_users(
        &self,
        language: Option<&str>,
        limit: i64,
    ) -> Result<Vec<User>, AppError> {
        self.check_should_fail()?;
        let users = self.users.lock().unwrap();
        let mut eligible: Vec<User> = users
            .iter()
            .filter(|u| u.is_verified && u.score >= 1)
            .filter(|u| language.is_none_or(|lang| u.language.as_deref() == Some(lang)))
            .cloned()
            .collect();
        eligible.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        eligible.truncate(limit.max(0) as usize);
        Ok(eligible)
    }

    async fn has_pending_entry(
        &self,
        user_id: Uuid,
        reward_type: RewardType,
    ) -> Result<bool, AppError> {
        self.check_should_fail()?;
        let entries = self.entries.lock().unwrap();
        Ok(entries.values().any(|e| {
            e.user_id == user_id
                && e.reward_type == reward_type
                && e.status == QueueStatus::Pending
        }))
    }

    async fn insert_entry(&self, entry: NewQueueEntry) -> Result<AirdropQueueEntry, AppError> {
        self.check_should_fail()?;
        let mut entries = self.entries.lock().unwrap();

        // Models the partial unique index on pending (user, reward type)
        if entries.values().any(|e| {
            e.user_id == entry.user_id
                && e.reward_type == entry.reward_type
                && e.status == QueueStatus::Pending
        }) {
            return Err(AppError::DuplicateQueue {
                user_id: entry.user_id,
                reward_type: entry.reward_type,
            });
        }

        let stored = AirdropQueueEntry {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            reward_type: entry.reward_type,
            amount: entry.amount,
            description: entry.description,
            metadata: entry.metadata,
            status: QueueStatus::Pending,
            tx_hash: None,
            created_at: self.next_timestamp(),
            processed_at: None,
        };
        entries.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn select_pending(
        &self,
        ids: Option<&[Uuid]>,
        reward_type: Option<RewardType>,
        limit: i64,
    ) -> Result<Vec<PendingAirdrop>, AppError> {
        self.check_should_fail()?;
        let entries = self.entries.lock().unwrap();
        let users = self.users.lock().unwrap();

        let mut pending: Vec<AirdropQueueEntry> = entries
            .values()
            .filter(|e| e.status == QueueStatus::Pending)
            .filter(|e| ids.is_none_or(|ids| ids.contains(&e.id)))
            .filter(|e| reward_type.is_none_or(|rt| e.reward_type == rt))
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        pending.truncate(limit.max(0) as usize);

        Ok(pending
            .into_iter()
            .filter_map(|entry| {
                let wallet = users
                    .iter()
                    .find(|u| u.id == entry.user_id)
                    .map(|u| u.wallet_address.clone())?;
                Some(PendingAirdrop {
                    entry,
                    wallet_address: wallet,
                })
            })
            .collect())
    }

    async fn mark_success(&self, id: Uuid, tx_hash: &str) -> Result<(), AppError> {
        self.check_should_fail()?;
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(&id) {
            // Terminal entries never transition again
            if entry.status == QueueStatus::Pending {
                entry.status = QueueStatus::Success;
                entry.tx_hash = Some(tx_hash.to_string());
                entry.processed_at = Some(Utc::now());
            }
            Ok(())
        } else {
            Err(AppError::Database(DatabaseError::NotFound(id.to_string())))
        }
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), AppError> {
        self.check_should_fail()?;
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(&id) {
            if entry.status == QueueStatus::Pending {
                entry.status = QueueStatus::Failed;
                entry.processed_at = Some(Utc::now());
                if let Some(map) = entry.metadata.as_object_mut() {
                    map.insert(
                        "error".to_string(),
                        serde_json::Value::String(error.to_string()),
                    );
                } else {
                    entry.metadata = serde_json::json!({ "error": error });
                }
            }
            Ok(())
        } else {
            Err(AppError::Database(DatabaseError::NotFound(id.to_string())))
        }
    }

    async fn list_entries(
        &self,
        filter: &QueueFilter,
        limit: i64,
        cursor: Option<Uuid>,
    ) -> Result<PaginatedResponse<AirdropQueueEntry>, AppError> {
        self.check_should_fail()?;
        let entries = self.entries.lock().unwrap();
        let mut items: Vec<AirdropQueueEntry> = entries
            .values()
            .filter(|e| filter.status.is_none_or(|s| e.status == s))
            .filter(|e| filter.reward_type.is_none_or(|rt| e.reward_type == rt))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let items = if let Some(cursor_id) = cursor {
            match items.iter().position(|i| i.id == cursor_id) {
                Some(pos) => items.into_iter().skip(pos + 1).collect(),
                None => {
                    return Err(AppError::Validation(
                        crate::domain::ValidationError::InvalidField {
                            field: "cursor".to_string(),
                            message: "Invalid cursor".to_string(),
                        },
                    ));
                }
            }
        } else {
            items
        };

        let limit = limit.clamp(1, 100) as usize;
        let has_more = items.len() > limit;
        let items: Vec<AirdropQueueEntry> = items.into_iter().take(limit).collect();
        let next_cursor = if has_more {
            items.last().map(|i| i.id)
        } else {
            None
        };

        Ok(PaginatedResponse::new(items, next_cursor, has_more))
    }

    async fn stats(&self) -> Result<QueueStats, AppError> {
        self.check_should_fail()?;
        let entries = self.entries.lock().unwrap();
        let all: Vec<&AirdropQueueEntry> = entries.values().collect();

        let total_count = all.len() as i64;
        let total_amount: Decimal = all.iter().map(|e| e.amount).sum();

        let by_status = [QueueStatus::Pending, QueueStatus::Success, QueueStatus::Failed]
            .into_iter()
            .filter_map(|status| {
                let bucket: Vec<_> = all.iter().filter(|e| e.status == status).collect();
                (!bucket.is_empty()).then(|| StatusStats {
                    status,
                    count: bucket.len() as i64,
                    total_amount: bucket.iter().map(|e| e.amount).sum(),
                })
            })
            .collect();

        let by_reward_type = RewardType::ALL
            .into_iter()
            .filter_map(|reward_type| {
                let bucket: Vec<_> = all.iter().filter(|e| e.reward_type == reward_type).collect();
                (!bucket.is_empty()).then(|| RewardTypeStats {
                    reward_type,
                    count: bucket.len() as i64,
                    total_amount: bucket.iter().map(|e| e.amount).sum(),
                })
            })
            .collect();

        Ok(QueueStats {
            total_count,
            total_amount,
            by_status,
            by_reward_type,
        })
    }
}

/// In-memory token ledger for testing.
///
/// Tracks a funding balance (debited on successful transfers), records every
/// transfer call, and can be told to fail a number of transfers in a row.
pub struct MockLedgerClient {
    funding_address: String,
    balance: Mutex<Decimal>,
    // reference -> tx hash, the mock's view of chain state
    transfers: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<(String, Decimal, String)>>,
    attempts: AtomicU32,
    failures_remaining: AtomicU32,
    failure_message: Mutex<String>,
    tx_counter: AtomicU64,
    is_healthy: AtomicBool,
}

impl MockLedgerClient {
    pub const FUNDING_ADDRESS: &'static str = "0x00000000000000000000000000000000000000aa";

    #[must_use]
    pub fn new() -> Self {
        Self {
            funding_address: Self::FUNDING_ADDRESS.to_string(),
            balance: Mutex::new(Decimal::from(1_000_000)),
            transfers: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            attempts: AtomicU32::new(0),
            failures_remaining: AtomicU32::new(0),
            failure_message: Mutex::new("Mock transfer error".to_string()),
            tx_counter: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Set the funding account balance
    pub fn set_balance(&self, balance: Decimal) {
        *self.balance.lock().unwrap() = balance;
    }

    /// Fail the next `times` transfer calls with the given message
    pub fn fail_transfers_with(&self, message: impl Into<String>, times: u32) {
        *self.failure_message.lock().unwrap() = message.into();
        self.failures_remaining.store(times, Ordering::SeqCst);
    }

    /// Pretend a transfer with this reference already exists on chain
    pub fn preload_transfer(&self, reference: &str, tx_hash: &str) {
        self.transfers
            .lock()
            .unwrap()
            .insert(reference.to_string(), tx_hash.to_string());
    }

    /// Number of `transfer` calls observed
    pub fn transfer_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// All recorded `transfer` calls as (to, amount, reference)
    pub fn transfer_calls(&self) -> Vec<(String, Decimal, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn next_tx_hash(&self) -> String {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("0x{:064x}", n)
    }
}

impl Default for MockLedgerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenLedgerClient for MockLedgerClient {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Ledger(LedgerError::Connection(
                "Unhealthy".to_string(),
            )));
        }
        Ok(())
    }

    fn funding_address(&self) -> &str {
        &self.funding_address
    }

    async fn decimals(&self) -> Result<u32, AppError> {
        Ok(18)
    }

    async fn balance_of(&self, address: &str) -> Result<Decimal, AppError> {
        if address == self.funding_address {
            Ok(*self.balance.lock().unwrap())
        } else {
            Ok(Decimal::ZERO)
        }
    }

    async fn transfer(
        &self,
        to: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<String, AppError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push((to.to_string(), amount, reference.to_string()));

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
            }
            let msg = self.failure_message.lock().unwrap().clone();
            return Err(AppError::Ledger(LedgerError::TransferFailed(msg)));
        }

        let mut balance = self.balance.lock().unwrap();
        if *balance < amount {
            return Err(AppError::Ledger(LedgerError::InsufficientBalance(format!(
                "balance {balance} below {amount}"
            ))));
        }
        *balance -= amount;

        let tx_hash = self.next_tx_hash();
        self.transfers
            .lock()
            .unwrap()
            .insert(reference.to_string(), tx_hash.clone());
        Ok(tx_hash)
    }

    async fn find_transfer(&self, reference: &str) -> Result<Option<String>, AppError> {
        Ok(self.transfers.lock().unwrap().get(reference).cloned())
    }
}
