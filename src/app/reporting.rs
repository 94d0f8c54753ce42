//! Read-only queue visibility for operational dashboards.

use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::domain::{
    AirdropQueueEntry, AppError, PaginatedResponse, QueueFilter, QueueStats, QueueStore,
};

/// Aggregation and listing over the queue; never mutates state
pub struct ReportingService {
    store: Arc<dyn QueueStore>,
}

impl ReportingService {
    #[must_use]
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self { store }
    }

    /// List queue entries with filters and cursor pagination
    #[instrument(skip(self))]
    pub async fn queue(
        &self,
        filter: &QueueFilter,
        limit: i64,
        cursor: Option<Uuid>,
    ) -> Result<PaginatedResponse<AirdropQueueEntry>, AppError> {
        let limit = limit.clamp(1, 100);
        self.store.list_entries(filter, limit, cursor).await
    }

    /// Counts and summed amounts, total and broken down by status and
    /// reward type
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<QueueStats, AppError> {
        self.store.stats().await
    }
}
