//! Decision Sink
//!
//! Records each decision in the store and republishes it on the decoded
//! topic. The two writes are independent; a failure in one is logged and
//! does not stop the other.
//!
//! Publishing is at-least-once. A redelivered window publishes again even
//! when the store reports it as a duplicate, since the first attempt may
//! have stored it without publishing. Consumers of the decoded topic dedupe
//! on `window_id`.

use std::sync::Arc;

use tracing::{error, info};

use crate::domain::Decision;
use crate::ports::channel::{publish_decision, SignalChannel};
use crate::ports::store::{InsertOutcome, SignalStore};

/// What happened to one decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReport {
    /// `None` when the store write failed
    pub stored: Option<InsertOutcome>,
    pub published: bool,
}

#[derive(Clone)]
pub struct DecisionSink {
    channel: Arc<dyn SignalChannel>,
    store: Arc<dyn SignalStore>,
}

impl DecisionSink {
    pub fn new(channel: Arc<dyn SignalChannel>, store: Arc<dyn SignalStore>) -> Self {
        Self { channel, store }
    }

    pub async fn deliver(&self, decision: &Decision) -> SinkReport {
        let window_id = decision.window_id.as_deref().unwrap_or("");

        let (stored, published) = tokio::join!(
            self.store.insert_decision(decision),
            publish_decision(self.channel.as_ref(), decision),
        );

        let stored = match stored {
            Ok(InsertOutcome::Duplicate) => {
                info!(window_id, "Decision already recorded for window, skipping insert");
                Some(InsertOutcome::Duplicate)
            }
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(window_id, "Failed to persist decision: {}", e);
                None
            }
        };

        let published = match published {
            Ok(()) => true,
            Err(e) => {
                error!(window_id, "Failed to publish decision: {}", e);
                false
            }
        };

        SinkReport { stored, published }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryChannel, MemoryStore};
    use crate::ports::channel::Topic;
    use serde_json::Value;

    fn sink() -> (DecisionSink, MemoryChannel, MemoryStore) {
        let channel = MemoryChannel::new();
        let store = MemoryStore::new();
        (
            DecisionSink::new(Arc::new(channel.clone()), Arc::new(store.clone())),
            channel,
            store,
        )
    }

    #[tokio::test]
    async fn test_persists_and_publishes() {
        let (sink, channel, store) = sink();
        let decision = Decision::hold("quiet window").with_window_id("w1");

        let report = sink.deliver(&decision).await;
        assert_eq!(report.stored, Some(InsertOutcome::Inserted));
        assert!(report.published);

        assert_eq!(store.decisions(), vec![decision]);
        let body: Value = serde_json::from_slice(&channel.published(Topic::Decoded)[0]).unwrap();
        assert_eq!(body["action"], "HOLD");
        assert_eq!(body["window_id"], "w1");
    }

    #[tokio::test]
    async fn test_duplicate_window_still_published() {
        let (sink, channel, store) = sink();
        let decision = Decision::hold("again").with_window_id("w1");

        sink.deliver(&decision).await;
        let report = sink.deliver(&decision).await;

        assert_eq!(report.stored, Some(InsertOutcome::Duplicate));
        assert!(report.published);
        assert_eq!(store.decisions().len(), 1);

        // Same window id on both copies so consumers can dedupe
        let bodies = channel.published(Topic::Decoded);
        assert_eq!(bodies.len(), 2);
        for body in &bodies {
            let doc: Value = serde_json::from_slice(body).unwrap();
            assert_eq!(doc["window_id"], "w1");
        }
    }

    #[tokio::test]
    async fn test_store_failure_does_not_block_publish() {
        let (sink, channel, store) = sink();
        store.set_fail_writes(true);

        let report = sink.deliver(&Decision::hold("x").with_window_id("w")).await;
        assert_eq!(report.stored, None);
        assert!(report.published);
        assert_eq!(channel.published(Topic::Decoded).len(), 1);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_block_store() {
        let (sink, channel, store) = sink();
        channel.set_fail_publish(Topic::Decoded, true);

        let report = sink.deliver(&Decision::hold("x").with_window_id("w")).await;
        assert!(!report.published);
        assert_eq!(store.decisions().len(), 1);
    }
}
