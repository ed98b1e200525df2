use async_trait::async_trait;
use chrono::Utc;
use mastodon_client::{Status, StatusId};
use sqlx::PgPool;

use crate::storage::{StatusStore, StoreError};

/// Postgres-backed sink. One row per status id; the payload is stored
/// verbatim as JSONB and refreshed on every re-fetch along with `run_id`
/// and `crawled_at`.
pub struct PostgresStatusStore {
    pool: PgPool,
    table: String,
}

impl PostgresStatusStore {
    /// `table` must already be validated as a plain identifier (the config
    /// layer enforces this); it is interpolated, not bound.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Create the destination table and run index if they don't exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{t}" (
                status_id  BIGINT PRIMARY KEY,
                payload    JSONB NOT NULL,
                run_id     TEXT NOT NULL,
                crawled_at TIMESTAMPTZ NOT NULL
            )
            "#,
            t = self.table
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"CREATE INDEX IF NOT EXISTS "{t}_run_idx" ON "{t}" (run_id, status_id)"#,
            t = self.table
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl StatusStore for PostgresStatusStore {
    async fn upsert_page(&self, statuses: &[Status], run_id: &str) -> Result<u64, StoreError> {
        let insert_sql = format!(
            r#"
            INSERT INTO "{t}" (status_id, payload, run_id, crawled_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (status_id) DO UPDATE
            SET payload = EXCLUDED.payload,
                run_id = EXCLUDED.run_id,
                crawled_at = EXCLUDED.crawled_at
            "#,
            t = self.table
        );

        // Single transaction: either the whole page lands or none of it.
        let mut tx = self.pool.begin().await?;
        let crawled_at = Utc::now();
        for status in statuses {
            sqlx::query(&insert_sql)
                .bind(status.id.0)
                .bind(&status.payload)
                .bind(run_id)
                .bind(crawled_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(statuses.len() as u64)
    }

    async fn latest_status_id(&self, run_id: &str) -> Result<Option<StatusId>, StoreError> {
        let max: Option<i64> = sqlx::query_scalar(&format!(
            r#"SELECT MAX(status_id) FROM "{t}" WHERE run_id = $1"#,
            t = self.table
        ))
        .bind(run_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(max.map(StatusId))
    }
}
