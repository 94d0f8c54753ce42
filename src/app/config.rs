//! Engine configuration with environment overrides.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

/// Tunables of the queue manager and execution engine.
///
/// Every option has a default and can be overridden from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Smallest amount accepted at enqueue time
    pub min_amount: Decimal,
    /// Largest amount accepted at enqueue time
    pub max_amount: Decimal,
    /// Maximum pending entries selected per execution batch
    pub batch_size: i64,
    /// Additional transfer attempts after the first failure
    pub max_retries: u32,
    /// Fixed delay between retry attempts for one entry
    pub retry_delay: Duration,
    /// Cooperative rate limit between processed entries in a batch
    pub inter_item_delay: Duration,
    /// Leaderboard positions considered by a ranking airdrop
    pub top_ranks_count: i64,
    /// Default reward per 1-indexed leaderboard rank
    pub ranking_rewards: HashMap<u32, Decimal>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_amount: Decimal::from(1),
            max_amount: Decimal::from(1000),
            batch_size: 50,
            max_retries: 3,
            retry_delay: Duration::from_millis(2000),
            inter_item_delay: Duration::from_millis(1000),
            top_ranks_count: 5,
            ranking_rewards: default_ranking_rewards(),
        }
    }
}

fn default_ranking_rewards() -> HashMap<u32, Decimal> {
    HashMap::from([
        (1, Decimal::from(50)),
        (2, Decimal::from(30)),
        (3, Decimal::from(20)),
        (4, Decimal::from(15)),
        (5, Decimal::from(10)),
    ])
}

impl EngineConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            min_amount: env_decimal("MIN_AMOUNT").unwrap_or(defaults.min_amount),
            max_amount: env_decimal("MAX_AMOUNT").unwrap_or(defaults.max_amount),
            batch_size: env_parse("BATCH_SIZE").unwrap_or(defaults.batch_size),
            max_retries: env_parse("MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_delay: env_parse("RETRY_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_delay),
            inter_item_delay: env_parse("INTER_ITEM_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.inter_item_delay),
            top_ranks_count: env_parse("TOP_RANKS_COUNT").unwrap_or(defaults.top_ranks_count),
            ranking_rewards: env_ranking_rewards().unwrap_or(defaults.ranking_rewards),
        }
    }

    /// Default reward for a 1-indexed rank, zero when unconfigured
    #[must_use]
    pub fn reward_for_rank(&self, rank: u32) -> Decimal {
        self.ranking_rewards
            .get(&rank)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_decimal(key: &str) -> Option<Decimal> {
    env::var(key).ok().and_then(|v| Decimal::from_str(&v).ok())
}

/// `RANKING_REWARDS` is a JSON object of rank to amount,
/// e.g. `{"1": "50", "2": "30"}`.
fn env_ranking_rewards() -> Option<HashMap<u32, Decimal>> {
    let raw = env::var("RANKING_REWARDS").ok()?;
    let parsed: HashMap<String, Decimal> = serde_json::from_str(&raw).ok()?;
    let rewards: HashMap<u32, Decimal> = parsed
        .into_iter()
        .filter_map(|(rank, amount)| rank.parse().ok().map(|r| (r, amount)))
        .collect();
    (!rewards.is_empty()).then_some(rewards)
}
