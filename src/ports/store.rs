//! Persistence Store Port
//!
//! Append-only sink for raw source events and decisions.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::Decision;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Store closed")]
    Closed,
}

/// A raw per-source event, keyed by the adapter's identity field
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    /// pump.fun token launch
    Token { token_mint: String, raw: Value },
    /// Raydium pool listing entry
    Pool { pool_id: String, raw: Value },
    /// Aggregated social metric for one keyword
    SocialMetric { keyword: String, raw: Value },
}

impl RawEvent {
    pub fn table(&self) -> &'static str {
        match self {
            RawEvent::Token { .. } => "new_tokens",
            RawEvent::Pool { .. } => "new_pools",
            RawEvent::SocialMetric { .. } => "social_metrics",
        }
    }

    pub fn identity(&self) -> &str {
        match self {
            RawEvent::Token { token_mint, .. } => token_mint,
            RawEvent::Pool { pool_id, .. } => pool_id,
            RawEvent::SocialMetric { keyword, .. } => keyword,
        }
    }

    pub fn raw(&self) -> &Value {
        match self {
            RawEvent::Token { raw, .. }
            | RawEvent::Pool { raw, .. }
            | RawEvent::SocialMetric { raw, .. } => raw,
        }
    }
}

/// Result of a decision insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A decision with the same window id already exists
    Duplicate,
}

/// Persistence port trait
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Append a raw source event
    async fn insert_raw(&self, event: &RawEvent) -> Result<(), StoreError>;

    /// Append a decision, deduplicated on its window id when present
    async fn insert_decision(&self, decision: &Decision) -> Result<InsertOutcome, StoreError>;

    /// Release the connection pool. Idempotent.
    async fn close(&self);
}
