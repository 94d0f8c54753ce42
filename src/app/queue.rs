//! Queue manager: admission of ad hoc and ranking-driven airdrops.
//!
//! Enqueueing only records intent; no ledger call happens here.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AirdropQueueEntry, AppError, EnqueueRequest, NewQueueEntry, QueueStore, RankingAirdropRequest,
    RankingAirdropResult, RankingOutcome, RewardType, User, ValidationError, normalize_address,
    parse_reward_type, validate_amount,
};

use super::config::EngineConfig;

/// Creates queue entries, enforcing validation, the duplicate-pending guard,
/// and amount bounds
pub struct QueueManager {
    store: Arc<dyn QueueStore>,
    config: EngineConfig,
}

impl QueueManager {
    #[must_use]
    pub fn new(store: Arc<dyn QueueStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Enqueue a single airdrop for a registered wallet.
    ///
    /// Fails fast on invalid input, unknown wallets, and duplicate pending
    /// (user, reward type) pairs. Unregistered wallets are rejected, never
    /// auto-created.
    #[instrument(skip(self, request), fields(wallet = %request.wallet_address, reward_type = %request.reward_type))]
    pub async fn enqueue(&self, request: &EnqueueRequest) -> Result<AirdropQueueEntry, AppError> {
        request.validate().map_err(|e| {
            warn!(error = %e, "Enqueue request failed shape validation");
            AppError::Validation(ValidationError::Multiple(e.to_string()))
        })?;

        let wallet = normalize_address(&request.wallet_address)?;
        let reward_type = parse_reward_type(&request.reward_type)?;
        validate_amount(request.amount, self.config.min_amount, self.config.max_amount)?;

        // metadata is a key/value bag; the failure path merges into it
        if let Some(metadata) = &request.metadata {
            if !metadata.is_object() {
                return Err(AppError::Validation(ValidationError::InvalidField {
                    field: "metadata".to_string(),
                    message: "Metadata must be a JSON object".to_string(),
                }));
            }
        }

        let user = self
            .store
            .find_user_by_wallet(&wallet)
            .await?
            .ok_or_else(|| AppError::UserNotFound(wallet.clone()))?;

        // Read-check for a friendly error; the store's unique constraint
        // closes the race.
        if self.store.has_pending_entry(user.id, reward_type).await? {
            return Err(AppError::DuplicateQueue {
                user_id: user.id,
                reward_type,
            });
        }

        let entry = self
            .store
            .insert_entry(NewQueueEntry {
                user_id: user.id,
                reward_type,
                amount: request.amount,
                description: request
                    .description
                    .clone()
                    .unwrap_or_else(|| reward_type.default_description().to_string()),
                metadata: request.metadata.clone().unwrap_or_else(|| json!({})),
            })
            .await?;

        info!(id = %entry.id, user = %user.id, amount = %entry.amount, "Airdrop queued");
        Ok(entry)
    }

    /// Bulk-enqueue ranking rewards for the current leaderboard top.
    ///
    /// Positions whose reward is zero or negative are skipped. A collision
    /// with an already-pending ranking entry skips that user without
    /// affecting the others.
    #[instrument(skip(self, request), fields(language = ?request.language))]
    pub async fn create_ranking_airdrop(
        &self,
        request: &RankingAirdropRequest,
    ) -> Result<RankingAirdropResult, AppError> {
        if let Some(custom) = &request.custom_rewards {
            for (rank, amount) in custom {
                if *amount > Decimal::ZERO {
                    validate_amount(*amount, self.config.min_amount, self.config.max_amount)
                        .map_err(|e| {
                            warn!(rank, amount = %amount, "Rejected custom reward");
                            e
                        })?;
                }
            }
        }

        let users = self
            .store
            .list_eligible_users(request.language.as_deref(), self.config.top_ranks_count)
            .await?;

        if users.is_empty() {
            return Err(AppError::NoEligibleUsers);
        }

        let mut rankings = Vec::with_capacity(users.len());
        let mut created = 0;
        let mut total_amount = Decimal::ZERO;

        for (index, user) in users.iter().enumerate() {
            let rank = (index + 1) as u32;
            let reward = request
                .custom_rewards
                .as_ref()
                .and_then(|custom| custom.get(&rank).copied())
                .unwrap_or_else(|| self.config.reward_for_rank(rank));

            if reward <= Decimal::ZERO {
                rankings.push(skipped_outcome(rank, user, reward, "no reward configured"));
                continue;
            }

            let metadata = json!({
                "rank": rank,
                "score": user.score,
                "language": user.language,
            });

            let description = request
                .description
                .clone()
                .unwrap_or_else(|| format!("Ranking reward for rank {rank}"));

            match self
                .store
                .insert_entry(NewQueueEntry {
                    user_id: user.id,
                    reward_type: RewardType::Ranking,
                    amount: reward,
                    description,
                    metadata,
                })
                .await
            {
                Ok(entry) => {
                    created += 1;
                    total_amount += reward;
                    rankings.push(RankingOutcome {
                        rank,
                        wallet_address: user.wallet_address.clone(),
                        score: user.score,
                        amount: reward,
                        queue_id: Some(entry.id),
                        skipped: None,
                    });
                }
                Err(AppError::DuplicateQueue { .. }) => {
                    warn!(rank, user = %user.id, "Pending ranking entry already exists, skipping");
                    rankings.push(skipped_outcome(
                        rank,
                        user,
                        reward,
                        "pending ranking entry already exists",
                    ));
                }
                Err(e) => return Err(e),
            }
        }

        info!(created, total = %total_amount, "Ranking airdrop seeded");
        Ok(RankingAirdropResult {
            created,
            total_amount,
            rankings,
        })
    }
}

fn skipped_outcome(rank: u32, user: &User, amount: Decimal, reason: &str) -> RankingOutcome {
    RankingOutcome {
        rank,
        wallet_address: user.wallet_address.clone(),
        score: user.score,
        amount,
        queue_id: None,
        skipped: Some(reason.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::str::FromStr;

    use crate::domain::QueueStatus;
    use crate::test_utils::MockQueueStore;

    fn manager(store: Arc<MockQueueStore>) -> QueueManager {
        QueueManager::new(store, EngineConfig::default())
    }

    fn enqueue_request(wallet: &str, amount: &str) -> EnqueueRequest {
        EnqueueRequest {
            wallet_address: wallet.to_string(),
            reward_type: "bonus".to_string(),
            amount: Decimal::from_str(amount).unwrap(),
            description: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_enqueue_creates_pending_entry() {
        let store = Arc::new(MockQueueStore::new());
        let user = store.add_user("0x1111111111111111111111111111111111111111", true, 10, None);
        let manager = manager(Arc::clone(&store));

        let entry = manager
            .enqueue(&enqueue_request(&user.wallet_address, "500"))
            .await
            .unwrap();

        assert_eq!(entry.user_id, user.id);
        assert_eq!(entry.status, QueueStatus::Pending);
        assert_eq!(entry.amount, Decimal::from(500));
        assert_eq!(entry.description, "Bonus reward airdrop");
        assert!(entry.tx_hash.is_none());
    }

    #[tokio::test]
    async fn test_enqueue_normalizes_wallet_case() {
        let store = Arc::new(MockQueueStore::new());
        store.add_user("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd", true, 10, None);
        let manager = manager(Arc::clone(&store));

        let entry = manager
            .enqueue(&enqueue_request(
                "0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD",
                "5",
            ))
            .await
            .unwrap();
        assert_eq!(entry.status, QueueStatus::Pending);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_zero_amount() {
        let store = Arc::new(MockQueueStore::new());
        let user = store.add_user("0x1111111111111111111111111111111111111111", true, 10, None);
        let manager = manager(store);

        let result = manager.enqueue(&enqueue_request(&user.wallet_address, "0")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_enqueue_rejects_out_of_bounds_amounts() {
        let store = Arc::new(MockQueueStore::new());
        let user = store.add_user("0x1111111111111111111111111111111111111111", true, 10, None);
        let manager = manager(store);

        let below = manager
            .enqueue(&enqueue_request(&user.wallet_address, "0.5"))
            .await;
        assert!(matches!(
            below,
            Err(AppError::Validation(ValidationError::BelowMinimum { .. }))
        ));

        let above = manager
            .enqueue(&enqueue_request(&user.wallet_address, "1001"))
            .await;
        assert!(matches!(
            above,
            Err(AppError::Validation(ValidationError::AboveMaximum { .. }))
        ));
    }

    #[tokio::test]
    async fn test_enqueue_rejects_non_object_metadata() {
        let store = Arc::new(MockQueueStore::new());
        let user = store.add_user("0x1111111111111111111111111111111111111111", true, 10, None);
        let manager = manager(store);

        let mut request = enqueue_request(&user.wallet_address, "10");
        request.metadata = Some(json!(["not", "an", "object"]));

        let result = manager.enqueue(&request).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_enqueue_unknown_wallet_rejected() {
        let store = Arc::new(MockQueueStore::new());
        let manager = manager(store);

        let result = manager
            .enqueue(&enqueue_request(
                "0x2222222222222222222222222222222222222222",
                "10",
            ))
            .await;
        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_enqueue_duplicate_pending_pair_rejected() {
        let store = Arc::new(MockQueueStore::new());
        let user = store.add_user("0x1111111111111111111111111111111111111111", true, 10, None);
        let manager = manager(store);

        manager
            .enqueue(&enqueue_request(&user.wallet_address, "10"))
            .await
            .unwrap();

        let second = manager
            .enqueue(&enqueue_request(&user.wallet_address, "20"))
            .await;
        assert!(matches!(second, Err(AppError::DuplicateQueue { .. })));

        // A different reward type for the same user is fine
        let mut other = enqueue_request(&user.wallet_address, "20");
        other.reward_type = "event".to_string();
        assert!(manager.enqueue(&other).await.is_ok());
    }

    #[tokio::test]
    async fn test_ranking_airdrop_three_eligible_users() {
        let store = Arc::new(MockQueueStore::new());
        store.add_user("0x1111111111111111111111111111111111111111", true, 300, None);
        store.add_user("0x2222222222222222222222222222222222222222", true, 200, None);
        store.add_user("0x3333333333333333333333333333333333333333", true, 100, None);
        // unverified and zero-score users are not eligible
        store.add_user("0x4444444444444444444444444444444444444444", false, 500, None);
        store.add_user("0x5555555555555555555555555555555555555555", true, 0, None);
        let manager = manager(store);

        let result = manager
            .create_ranking_airdrop(&RankingAirdropRequest::default())
            .await
            .unwrap();

        assert_eq!(result.created, 3);
        assert_eq!(result.total_amount, Decimal::from(100)); // 50 + 30 + 20
        let amounts: Vec<Decimal> = result.rankings.iter().map(|r| r.amount).collect();
        assert_eq!(
            amounts,
            vec![Decimal::from(50), Decimal::from(30), Decimal::from(20)]
        );
        assert!(result.rankings.iter().all(|r| r.queue_id.is_some()));
    }

    #[tokio::test]
    async fn test_ranking_ties_broken_by_registration_time() {
        let store = Arc::new(MockQueueStore::new());
        // Registered in this order; equal scores rank the earlier user first.
        let early = store.add_user("0x1111111111111111111111111111111111111111", true, 200, None);
        let late = store.add_user("0x2222222222222222222222222222222222222222", true, 200, None);
        let manager = manager(store);

        let result = manager
            .create_ranking_airdrop(&RankingAirdropRequest::default())
            .await
            .unwrap();

        assert_eq!(result.rankings[0].wallet_address, early.wallet_address);
        assert_eq!(result.rankings[1].wallet_address, late.wallet_address);
    }

    #[tokio::test]
    async fn test_ranking_no_eligible_users() {
        let store = Arc::new(MockQueueStore::new());
        store.add_user("0x1111111111111111111111111111111111111111", false, 500, None);
        let manager = manager(store);

        let result = manager
            .create_ranking_airdrop(&RankingAirdropRequest::default())
            .await;
        assert!(matches!(result, Err(AppError::NoEligibleUsers)));
    }

    #[tokio::test]
    async fn test_ranking_language_filter() {
        let store = Arc::new(MockQueueStore::new());
        store.add_user(
            "0x1111111111111111111111111111111111111111",
            true,
            300,
            Some("en"),
        );
        store.add_user(
            "0x2222222222222222222222222222222222222222",
            true,
            400,
            Some("ko"),
        );
        let manager = manager(store);

        let result = manager
            .create_ranking_airdrop(&RankingAirdropRequest {
                language: Some("en".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.created, 1);
        assert_eq!(
            result.rankings[0].wallet_address,
            "0x1111111111111111111111111111111111111111"
        );
    }

    #[tokio::test]
    async fn test_ranking_zero_reward_rank_skipped() {
        let store = Arc::new(MockQueueStore::new());
        store.add_user("0x1111111111111111111111111111111111111111", true, 300, None);
        store.add_user("0x2222222222222222222222222222222222222222", true, 200, None);
        let manager = manager(store);

        let custom: HashMap<u32, Decimal> = HashMap::from([(2, Decimal::ZERO)]);
        let result = manager
            .create_ranking_airdrop(&RankingAirdropRequest {
                custom_rewards: Some(custom),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.created, 1);
        assert_eq!(result.total_amount, Decimal::from(50));
        assert!(result.rankings[1].skipped.is_some());
        assert!(result.rankings[1].queue_id.is_none());
    }

    #[tokio::test]
    async fn test_ranking_silently_skips_pending_duplicate() {
        let store = Arc::new(MockQueueStore::new());
        let first = store.add_user("0x1111111111111111111111111111111111111111", true, 300, None);
        store.add_user("0x2222222222222222222222222222222222222222", true, 200, None);

        // Seed a pending ranking entry for the top user
        store
            .insert_entry(NewQueueEntry {
                user_id: first.id,
                reward_type: RewardType::Ranking,
                amount: Decimal::from(50),
                description: "Ranking reward airdrop".to_string(),
                metadata: json!({}),
            })
            .await
            .unwrap();

        let manager = manager(store);
        let result = manager
            .create_ranking_airdrop(&RankingAirdropRequest::default())
            .await
            .unwrap();

        // Rank 1 collides and is skipped; rank 2 still proceeds.
        assert_eq!(result.created, 1);
        assert_eq!(result.total_amount, Decimal::from(30));
        assert!(result.rankings[0].skipped.is_some());
        assert!(result.rankings[1].queue_id.is_some());
    }

    #[tokio::test]
    async fn test_ranking_metadata_records_rank_and_score() {
        let store = Arc::new(MockQueueStore::new());
        store.add_user(
            "0x1111111111111111111111111111111111111111",
            true,
            300,
            Some("en"),
        );
        let manager = manager(Arc::clone(&store));

        let result = manager
            .create_ranking_airdrop(&RankingAirdropRequest::default())
            .await
            .unwrap();

        let entry = store
            .get_entry(result.rankings[0].queue_id.unwrap())
            .unwrap();
        assert_eq!(entry.metadata["rank"], 1);
        assert_eq!(entry.metadata["score"], 300);
        assert_eq!(entry.metadata["language"], "en");
    }

    #[tokio::test]
    async fn test_ranking_rejects_out_of_bounds_custom_reward() {
        let store = Arc::new(MockQueueStore::new());
        store.add_user("0x1111111111111111111111111111111111111111", true, 300, None);
        let manager = manager(Arc::clone(&store));

        let custom: HashMap<u32, Decimal> = HashMap::from([(1, Decimal::from(5000))]);
        let result = manager
            .create_ranking_airdrop(&RankingAirdropRequest {
                custom_rewards: Some(custom),
                ..Default::default()
            })
            .await;

        assert!(matches!(
            result,
            Err(AppError::Validation(ValidationError::AboveMaximum { .. }))
        ));
        // Pre-flight rejection: nothing was created
        assert_eq!(store.all_entries().len(), 0);
    }
}
