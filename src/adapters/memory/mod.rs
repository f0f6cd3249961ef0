//! In-Memory Adapters
//!
//! Process-local channel and store used for dry runs and tests. The channel
//! keeps FIFO order per topic and records every publish and ack so callers
//! can inspect delivery behaviour.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::Decision;
use crate::ports::channel::{Acknowledger, ChannelError, Delivery, SignalChannel, Topic};
use crate::ports::store::{InsertOutcome, RawEvent, SignalStore, StoreError};

const CONSUMER_BUFFER: usize = 1024;

#[derive(Default)]
struct TopicState {
    backlog: VecDeque<Vec<u8>>,
    consumer: Option<mpsc::Sender<Delivery>>,
    published: Vec<Vec<u8>>,
    acked: usize,
    fail_publish: bool,
}

#[derive(Default)]
struct ChannelInner {
    topics: HashMap<Topic, TopicState>,
    closed: bool,
}

/// In-process durable channel
#[derive(Clone, Default)]
pub struct MemoryChannel {
    inner: Arc<Mutex<ChannelInner>>,
}

struct MemoryAcker {
    topic: Topic,
    inner: Arc<Mutex<ChannelInner>>,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock().map_err(|_| ChannelError::Closed)?;
        inner.topics.entry(self.topic).or_default().acked += 1;
        Ok(())
    }
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bodies published to `topic`, in order
    pub fn published(&self, topic: Topic) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .topics
                    .get(&topic)
                    .map(|t| t.published.clone())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Number of deliveries acknowledged on `topic`
    pub fn acked(&self, topic: Topic) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.topics.get(&topic).map(|t| t.acked).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Make publishes to `topic` fail until reset
    pub fn set_fail_publish(&self, topic: Topic, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.topics.entry(topic).or_default().fail_publish = fail;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().map(|i| i.closed).unwrap_or(true)
    }

    fn delivery(&self, topic: Topic, body: Vec<u8>) -> Delivery {
        Delivery::new(
            body,
            Box::new(MemoryAcker {
                topic,
                inner: Arc::clone(&self.inner),
            }),
        )
    }
}

#[async_trait]
impl SignalChannel for MemoryChannel {
    async fn publish(&self, topic: Topic, body: Vec<u8>) -> Result<(), ChannelError> {
        let consumer = {
            let mut inner = self.inner.lock().map_err(|_| ChannelError::Closed)?;
            if inner.closed {
                return Err(ChannelError::Closed);
            }
            let state = inner.topics.entry(topic).or_default();
            if state.fail_publish {
                return Err(ChannelError::PublishFailed(format!(
                    "publish to {} rejected",
                    topic
                )));
            }
            state.published.push(body.clone());
            match &state.consumer {
                Some(tx) => Some(tx.clone()),
                None => {
                    state.backlog.push_back(body.clone());
                    None
                }
            }
        };

        if let Some(tx) = consumer {
            if let Err(mpsc::error::SendError(delivery)) = tx.send(self.delivery(topic, body)).await
            {
                // Consumer went away; hold the message for the next one
                let mut inner = self.inner.lock().map_err(|_| ChannelError::Closed)?;
                let state = inner.topics.entry(topic).or_default();
                state.consumer = None;
                state.backlog.push_back(delivery.body);
            }
        }
        debug!(%topic, "memory publish");
        Ok(())
    }

    async fn consume(&self, topic: Topic) -> Result<mpsc::Receiver<Delivery>, ChannelError> {
        let (tx, rx) = mpsc::channel(CONSUMER_BUFFER);

        let backlog: Vec<Vec<u8>> = {
            let mut inner = self.inner.lock().map_err(|_| ChannelError::Closed)?;
            if inner.closed {
                return Err(ChannelError::Closed);
            }
            let state = inner.topics.entry(topic).or_default();
            state.consumer = Some(tx.clone());
            state.backlog.drain(..).collect()
        };

        for body in backlog {
            tx.send(self.delivery(topic, body))
                .await
                .map_err(|_| ChannelError::Closed)?;
        }

        Ok(rx)
    }

    async fn close(&self) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock().map_err(|_| ChannelError::Closed)?;
        inner.closed = true;
        for state in inner.topics.values_mut() {
            state.consumer = None;
        }
        Ok(())
    }
}

#[derive(Default)]
struct StoreInner {
    raw: Vec<RawEvent>,
    decisions: Vec<Decision>,
    window_ids: HashSet<String>,
    fail_writes: bool,
    closed: bool,
}

/// In-process append-only store
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_events(&self) -> Vec<RawEvent> {
        self.inner.lock().map(|i| i.raw.clone()).unwrap_or_default()
    }

    pub fn decisions(&self) -> Vec<Decision> {
        self.inner
            .lock()
            .map(|i| i.decisions.clone())
            .unwrap_or_default()
    }

    /// Make every write fail until reset
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_writes = fail;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().map(|i| i.closed).unwrap_or(true)
    }

    fn writable(inner: &StoreInner) -> Result<(), StoreError> {
        if inner.closed {
            return Err(StoreError::Closed);
        }
        if inner.fail_writes {
            return Err(StoreError::QueryFailed("write rejected".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn insert_raw(&self, event: &RawEvent) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Closed)?;
        Self::writable(&inner)?;
        inner.raw.push(event.clone());
        Ok(())
    }

    async fn insert_decision(&self, decision: &Decision) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Closed)?;
        Self::writable(&inner)?;

        if let Some(id) = &decision.window_id {
            if !inner.window_ids.insert(id.clone()) {
                return Ok(InsertOutcome::Duplicate);
            }
        }
        inner.decisions.push(decision.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.closed = true;
        }
    }
}
