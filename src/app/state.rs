//! Application state management.

use std::sync::Arc;

use crate::domain::{HealthResponse, HealthStatus, QueueStore, TokenLedgerClient};

use super::config::EngineConfig;
use super::executor::ExecutionEngine;
use super::queue::QueueManager;
use super::reporting::ReportingService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<QueueManager>,
    pub executor: Arc<ExecutionEngine>,
    pub reporting: Arc<ReportingService>,
    pub store: Arc<dyn QueueStore>,
    pub ledger: Arc<dyn TokenLedgerClient>,
}

impl AppState {
    /// Wire the engine components around explicitly injected clients
    #[must_use]
    pub fn new(
        store: Arc<dyn QueueStore>,
        ledger: Arc<dyn TokenLedgerClient>,
        config: EngineConfig,
    ) -> Self {
        let queue = Arc::new(QueueManager::new(Arc::clone(&store), config.clone()));
        let executor = Arc::new(ExecutionEngine::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            config,
        ));
        let reporting = Arc::new(ReportingService::new(Arc::clone(&store)));
        Self {
            queue,
            executor,
            reporting,
            store,
            ledger,
        }
    }

    /// Perform health check on all dependencies
    pub async fn health_check(&self) -> HealthResponse {
        let database = match self.store.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Unhealthy,
        };
        let ledger = match self.ledger.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Unhealthy,
        };
        HealthResponse::new(database, ledger)
    }
}
