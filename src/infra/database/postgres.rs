//! PostgreSQL queue store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{
    AirdropQueueEntry, AppError, DatabaseError, NewQueueEntry, PaginatedResponse, PendingAirdrop,
    QueueFilter, QueueStats, QueueStatus, QueueStore, RewardType, RewardTypeStats, StatusStats,
    User,
};

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// PostgreSQL queue store with connection pooling
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store with custom pool configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a new store with default pool configuration
    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run database migrations using sqlx migrate
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Migration(e.to_string())))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying connection pool (for testing)
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_user(row: &sqlx::postgres::PgRow) -> User {
        User {
            id: row.get("id"),
            wallet_address: row.get("wallet_address"),
            is_verified: row.get("is_verified"),
            score: row.get("score"),
            language: row.get("language"),
            created_at: row.get("created_at"),
        }
    }

    /// Parse a database row into an AirdropQueueEntry
    fn row_to_entry(row: &sqlx::postgres::PgRow) -> Result<AirdropQueueEntry, AppError> {
        let reward_type_str: String = row.get("reward_type");
        let status_str: String = row.get("status");

        Ok(AirdropQueueEntry {
            id: row.get("id"),
            user_id: row.get("user_id"),
            reward_type: reward_type_str.parse().map_err(DatabaseError::Query)?,
            amount: row.get("amount"),
            description: row.get("description"),
            metadata: row.get("metadata"),
            status: status_str.parse().unwrap_or(QueueStatus::Pending),
            tx_hash: row.get("tx_hash"),
            created_at: row.get("created_at"),
            processed_at: row.get("processed_at"),
        })
    }
}

const ENTRY_COLUMNS: &str = "id, user_id, reward_type, amount, description, metadata, \
                             status, tx_hash, created_at, processed_at";

#[async_trait]
impl QueueStore for PostgresStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_user_by_wallet(&self, wallet: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, wallet_address, is_verified, score, language, created_at
            FROM users
            WHERE wallet_address = $1
            "#,
        )
        .bind(wallet)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(row.as_ref().map(Self::row_to_user))
    }

    #[instrument(skip(self))]
    async fn list_eligible_users(
        &self,
        language: Option<&str>,
        limit: i64,
    ) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, wallet_address, is_verified, score, language, created_at
            FROM users
            WHERE is_verified
              AND score >= 1
              AND ($1::text IS NULL OR language = $1)
            ORDER BY score DESC, created_at ASC
            LIMIT $2
            "#,
        )
        .bind(language)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(rows.iter().map(Self::row_to_user).collect())
    }

    #[instrument(skip(self))]
    async fn has_pending_entry(
        &self,
        user_id: Uuid,
        reward_type: RewardType,
    ) -> Result<bool, AppError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM airdrop_queue
                WHERE user_id = $1 AND reward_type = $2 AND status = 'pending'
            ) AS "exists"
            "#,
        )
        .bind(user_id)
        .bind(reward_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(row.get("exists"))
    }

    #[instrument(skip(self, entry), fields(user = %entry.user_id, reward_type = %entry.reward_type, amount = %entry.amount))]
    async fn insert_entry(&self, entry: NewQueueEntry) -> Result<AirdropQueueEntry, AppError> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO airdrop_queue (
                id, user_id, reward_type, amount, description, metadata,
                status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(entry.user_id)
        .bind(entry.reward_type.as_str())
        .bind(entry.amount)
        .bind(&entry.description)
        .bind(&entry.metadata)
        .bind(QueueStatus::Pending.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            // The partial unique index on pending (user, reward type) closes
            // the enqueue race; surface it as the duplicate-queue error.
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::DuplicateQueue {
                user_id: entry.user_id,
                reward_type: entry.reward_type,
            },
            _ => AppError::Database(DatabaseError::Query(e.to_string())),
        })?;

        Ok(AirdropQueueEntry {
            id,
            user_id: entry.user_id,
            reward_type: entry.reward_type,
            amount: entry.amount,
            description: entry.description,
            metadata: entry.metadata,
            status: QueueStatus::Pending,
            tx_hash: None,
            created_at: now,
            processed_at: None,
        })
    }

    #[instrument(skip(self))]
    async fn select_pending(
        &self,
        ids: Option<&[Uuid]>,
        reward_type: Option<RewardType>,
        limit: i64,
    ) -> Result<Vec<PendingAirdrop>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT q.id, q.user_id, q.reward_type, q.amount, q.description,
                   q.metadata, q.status, q.tx_hash, q.created_at, q.processed_at,
                   u.wallet_address
            FROM airdrop_queue q
            JOIN users u ON u.id = q.user_id
            WHERE q.status = 'pending'
              AND ($1::uuid[] IS NULL OR q.id = ANY($1))
              AND ($2::text IS NULL OR q.reward_type = $2)
            ORDER BY q.created_at ASC, q.id ASC
            LIMIT $3
            "#,
        )
        .bind(ids)
        .bind(reward_type.map(|rt| rt.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        rows.iter()
            .map(|row| {
                Ok(PendingAirdrop {
                    entry: Self::row_to_entry(row)?,
                    wallet_address: row.get("wallet_address"),
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn mark_success(&self, id: Uuid, tx_hash: &str) -> Result<(), AppError> {
        // Conditional on pending status: terminal entries never transition
        sqlx::query(
            r#"
            UPDATE airdrop_queue
            SET status = 'success',
                tx_hash = $2,
                processed_at = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(tx_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), AppError> {
        // metadata is merged, not replaced, preserving prior audit fields
        sqlx::query(
            r#"
            UPDATE airdrop_queue
            SET status = 'failed',
                metadata = metadata || jsonb_build_object('error', $2::text),
                processed_at = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_entries(
        &self,
        filter: &QueueFilter,
        limit: i64,
        cursor: Option<Uuid>,
    ) -> Result<PaginatedResponse<AirdropQueueEntry>, AppError> {
        let limit = limit.clamp(1, 100);
        // Fetch one extra to determine if there are more items
        let fetch_limit = limit + 1;

        let status = filter.status.map(|s| s.as_str());
        let reward_type = filter.reward_type.map(|rt| rt.as_str());

        let rows = match cursor {
            Some(cursor_id) => {
                let cursor_row =
                    sqlx::query("SELECT created_at FROM airdrop_queue WHERE id = $1")
                        .bind(cursor_id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

                let cursor_created_at: DateTime<Utc> = match cursor_row {
                    Some(row) => row.get("created_at"),
                    None => {
                        return Err(AppError::Validation(
                            crate::domain::ValidationError::InvalidField {
                                field: "cursor".to_string(),
                                message: "Invalid cursor".to_string(),
                            },
                        ));
                    }
                };

                sqlx::query(&format!(
                    r#"
                    SELECT {ENTRY_COLUMNS}
                    FROM airdrop_queue
                    WHERE (created_at, id) < ($1, $2)
                      AND ($3::text IS NULL OR status = $3)
                      AND ($4::text IS NULL OR reward_type = $4)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $5
                    "#
                ))
                .bind(cursor_created_at)
                .bind(cursor_id)
                .bind(status)
                .bind(reward_type)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?
            }
            None => sqlx::query(&format!(
                r#"
                SELECT {ENTRY_COLUMNS}
                FROM airdrop_queue
                WHERE ($1::text IS NULL OR status = $1)
                  AND ($2::text IS NULL OR reward_type = $2)
                ORDER BY created_at DESC, id DESC
                LIMIT $3
                "#
            ))
            .bind(status)
            .bind(reward_type)
            .bind(fetch_limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?,
        };

        let has_more = rows.len() > limit as usize;
        let entries: Vec<AirdropQueueEntry> = rows
            .iter()
            .take(limit as usize)
            .map(Self::row_to_entry)
            .collect::<Result<Vec<_>, _>>()?;

        let next_cursor = if has_more {
            entries.last().map(|e| e.id)
        } else {
            None
        };

        Ok(PaginatedResponse::new(entries, next_cursor, has_more))
    }

    #[instrument(skip(self))]
    async fn stats(&self) -> Result<QueueStats, AppError> {
        let totals = sqlx::query(
            r#"
            SELECT COUNT(*) AS "count", COALESCE(SUM(amount), 0) AS "total"
            FROM airdrop_queue
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        let total_count: i64 = totals.get("count");
        let total_amount: Decimal = totals.get("total");

        let status_rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS "count", COALESCE(SUM(amount), 0) AS "total"
            FROM airdrop_queue
            GROUP BY status
            ORDER BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        let by_status = status_rows
            .iter()
            .filter_map(|row| {
                let status: String = row.get("status");
                status.parse().ok().map(|status| StatusStats {
                    status,
                    count: row.get("count"),
                    total_amount: row.get("total"),
                })
            })
            .collect();

        let reward_rows = sqlx::query(
            r#"
            SELECT reward_type, COUNT(*) AS "count", COALESCE(SUM(amount), 0) AS "total"
            FROM airdrop_queue
            GROUP BY reward_type
            ORDER BY reward_type
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        let by_reward_type = reward_rows
            .iter()
            .filter_map(|row| {
                let reward_type: String = row.get("reward_type");
                reward_type.parse().ok().map(|reward_type| RewardTypeStats {
                    reward_type,
                    count: row.get("count"),
                    total_amount: row.get("total"),
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
