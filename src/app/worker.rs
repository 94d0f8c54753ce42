//! Background execution worker.
//!
//! Runs the execution engine on a fixed poll interval. A single worker is the
//! intended scheduler: batch invocations against one funding account must be
//! serialized, and the engine's run lock backstops any extra caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use crate::domain::ExecuteAirdropRequest;

use super::executor::ExecutionEngine;

/// Background worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub enabled: bool,
    /// Time between execution passes
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(60),
        }
    }
}

/// Spawn the execution worker. Returns the task handle and a shutdown sender;
/// send `true` to stop the loop.
pub fn spawn_worker(
    executor: Arc<ExecutionEngine>,
    config: WorkerConfig,
) -> (JoinHandle<()>, watch::Sender<bool>) {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut ticker = interval(config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = config.poll_interval.as_secs(), "Execution worker started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match executor.execute_airdrop(&ExecuteAirdropRequest::default()).await {
                        Ok(result) if !result.transactions.is_empty() => {
                            info!(
                                processed = result.processed,
                                failed = result.failed,
                                total = %result.total_amount,
                                "Worker batch complete"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!(error = ?e, "Worker batch failed");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Execution worker shutting down");
                        break;
                    }
                }
            }
        }
    });

    (handle, shutdown_tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::app::EngineConfig;
    use crate::domain::{NewQueueEntry, QueueStatus, QueueStore, RewardType};
    use crate::test_utils::{MockLedgerClient, MockQueueStore};

    #[tokio::test]
    async fn test_worker_drains_queue_and_shuts_down() {
        let store = Arc::new(MockQueueStore::new());
        let ledger = Arc::new(MockLedgerClient::new());
        let user = store.add_user("0x1111111111111111111111111111111111111111", true, 10, None);
        let entry = store
            .insert_entry(NewQueueEntry {
                user_id: user.id,
                reward_type: RewardType::Bonus,
                amount: Decimal::from(10),
                description: "Bonus reward airdrop".to_string(),
                metadata: json!({}),
            })
            .await
            .unwrap();

        let config = EngineConfig {
            retry_delay: Duration::from_millis(0),
            inter_item_delay: Duration::from_millis(0),
            ..EngineConfig::default()
        };
        let executor = Arc::new(ExecutionEngine::new(
            Arc::clone(&store) as _,
            Arc::clone(&ledger) as _,
            config,
        ));

        let (handle, shutdown_tx) = spawn_worker(
            executor,
            WorkerConfig {
                enabled: true,
                poll_interval: Duration::from_millis(10),
            },
        );

        // First tick fires immediately; give it a moment to settle the entry.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.get_entry(entry.id).unwrap().status, QueueStatus::Success);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
