//! Postgres Store Adapter
//!
//! Append-only tables for raw source events and decisions. The schema is
//! created on connect; decisions are deduplicated on their window id.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;

use crate::domain::Decision;
use crate::ports::store::{InsertOutcome, RawEvent, SignalStore, StoreError};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS new_tokens (
        id BIGSERIAL PRIMARY KEY,
        token_mint TEXT NOT NULL,
        raw_data JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS new_pools (
        id BIGSERIAL PRIMARY KEY,
        pool_id TEXT NOT NULL,
        pool_data JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS social_metrics (
        id BIGSERIAL PRIMARY KEY,
        keyword TEXT NOT NULL,
        metrics JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS signals_decoded (
        id BIGSERIAL PRIMARY KEY,
        window_id TEXT,
        decision JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    // Tables left by the earlier collector lack the identity and window columns
    "ALTER TABLE new_pools ADD COLUMN IF NOT EXISTS pool_id TEXT",
    "ALTER TABLE social_metrics ADD COLUMN IF NOT EXISTS keyword TEXT",
    "ALTER TABLE signals_decoded ADD COLUMN IF NOT EXISTS window_id TEXT",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_signals_decoded_window_id \
     ON signals_decoded(window_id)",
    "CREATE INDEX IF NOT EXISTS idx_new_tokens_mint ON new_tokens(token_mint)",
];

/// Postgres connection settings
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/signal_brain".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

/// Store backed by a shared Postgres pool
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and ensure the schema exists. Failure here is fatal to startup.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        info!(max_connections = config.max_connections, "Connected to Postgres");
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::ConnectionFailed(format!("schema: {}", e)))?;
        }
        Ok(())
    }
}

fn query_failed(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolClosed => StoreError::Closed,
        other => StoreError::QueryFailed(other.to_string()),
    }
}

#[async_trait]
impl SignalStore for PostgresStore {
    async fn insert_raw(&self, event: &RawEvent) -> Result<(), StoreError> {
        let sql = match event {
            RawEvent::Token { .. } => {
                "INSERT INTO new_tokens (token_mint, raw_data) VALUES ($1, $2)"
            }
            RawEvent::Pool { .. } => "INSERT INTO new_pools (pool_id, pool_data) VALUES ($1, $2)",
            RawEvent::SocialMetric { .. } => {
                "INSERT INTO social_metrics (keyword, metrics) VALUES ($1, $2)"
            }
        };

        sqlx::query(sql)
            .bind(event.identity())
            .bind(Json(event.raw()))
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        Ok(())
    }

    async fn insert_decision(&self, decision: &Decision) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(
            "INSERT INTO signals_decoded (window_id, decision) VALUES ($1, $2) \
             ON CONFLICT (window_id) DO NOTHING",
        )
        .bind(decision.window_id.as_deref())
        .bind(Json(decision))
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            info!("Postgres pool closed");
        }
    }
}
