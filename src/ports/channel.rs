//! Durable Channel Port
//!
//! At-least-once, FIFO-per-queue message transport between the source
//! adapters, the window aggregator and downstream consumers.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::{Decision, NormalizedSignal};

/// Channel error type
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Consume failed: {0}")]
    ConsumeFailed(String),

    #[error("Ack failed: {0}")]
    AckFailed(String),

    #[error("Encode error: {0}")]
    EncodeError(String),

    #[error("Channel closed")]
    Closed,
}

/// The two durable topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Normalized signals from the source adapters
    Raw,
    /// Decisions for execution / auditing
    Decoded,
}

impl Topic {
    pub fn queue_name(&self) -> &'static str {
        match self {
            Topic::Raw => "signals.raw",
            Topic::Decoded => "signals.decoded",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.queue_name())
    }
}

/// Broker-specific acknowledgement handle
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), ChannelError>;
}

/// One message pulled off a topic. Must be acked once processed.
pub struct Delivery {
    pub body: Vec<u8>,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(body: Vec<u8>, acker: Box<dyn Acknowledger>) -> Self {
        Self { body, acker }
    }

    pub async fn ack(self) -> Result<(), ChannelError> {
        self.acker.ack().await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("len", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// Durable channel port trait
#[async_trait]
pub trait SignalChannel: Send + Sync {
    /// Publish a message body to a topic
    async fn publish(&self, topic: Topic, body: Vec<u8>) -> Result<(), ChannelError>;

    /// Start consuming a topic.
    /// Returns a receiver that yields deliveries in queue order.
    async fn consume(&self, topic: Topic) -> Result<mpsc::Receiver<Delivery>, ChannelError>;

    /// Close the underlying connection. Idempotent.
    async fn close(&self) -> Result<(), ChannelError>;
}

/// Encode and publish a signal on the raw topic
pub async fn publish_signal(
    channel: &dyn SignalChannel,
    signal: &NormalizedSignal,
) -> Result<(), ChannelError> {
    let body = signal
        .to_wire()
        .map_err(|e| ChannelError::EncodeError(e.to_string()))?;
    channel.publish(Topic::Raw, body).await
}

/// Encode and publish a decision on the decoded topic
pub async fn publish_decision(
    channel: &dyn SignalChannel,
    decision: &Decision,
) -> Result<(), ChannelError> {
    let body =
        serde_json::to_vec(decision).map_err(|e| ChannelError::EncodeError(e.to_string()))?;
    channel.publish(Topic::Decoded, body).await
}
