//! Source adapter plumbing shared by every feed: the error type and the
//! emitter that publishes signals and persists raw events.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::domain::NormalizedSignal;
use crate::ports::channel::{publish_signal, ChannelError, SignalChannel};
use crate::ports::store::{RawEvent, SignalStore};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Failed to parse message: {0}")]
    Parse(String),

    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Publish failed: {0}")]
    Publish(#[from] ChannelError),
}

/// Raw writes allowed in flight when no pool size is given
pub const DEFAULT_RAW_WRITES: usize = 4;

/// Publishes normalized signals and records raw events.
///
/// Raw persistence runs in the background and only logs on failure. At most
/// `capacity` writes are in flight; once they are all taken `emit` waits for
/// one to finish. [`SignalEmitter::drain`] waits out the stragglers at
/// shutdown.
#[derive(Clone)]
pub struct SignalEmitter {
    channel: Arc<dyn SignalChannel>,
    store: Arc<dyn SignalStore>,
    writes: Arc<Semaphore>,
    capacity: usize,
}

impl SignalEmitter {
    pub fn new(channel: Arc<dyn SignalChannel>, store: Arc<dyn SignalStore>) -> Self {
        Self::with_capacity(channel, store, DEFAULT_RAW_WRITES)
    }

    /// Emitter allowing `capacity` concurrent raw writes, usually the store's
    /// pool size
    pub fn with_capacity(
        channel: Arc<dyn SignalChannel>,
        store: Arc<dyn SignalStore>,
        capacity: usize,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            channel,
            store,
            writes: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Raw writes currently running
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.writes.available_permits())
    }

    /// Wait for every raw write in flight, then refuse new ones.
    /// Later emits still publish but skip persistence.
    pub async fn drain(&self) {
        let permits = u32::try_from(self.capacity).unwrap_or(u32::MAX);
        if let Ok(all) = self.writes.acquire_many(permits).await {
            drop(all);
            self.writes.close();
            debug!("Raw writes drained");
        }
    }

    /// Persist `raw` in the background, then publish `signal`
    pub async fn emit(
        &self,
        signal: &NormalizedSignal,
        raw: Option<RawEvent>,
    ) -> Result<(), SourceError> {
        if let Some(event) = raw {
            self.persist_detached(event).await;
        }

        publish_signal(self.channel.as_ref(), signal).await?;
        debug!(kind = %signal.kind, "signal published");
        Ok(())
    }

    async fn persist_detached(&self, event: RawEvent) {
        let permit = match Arc::clone(&self.writes).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    table = event.table(),
                    identity = event.identity(),
                    "Raw writer drained, event not persisted"
                );
                return;
            }
        };
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = store.insert_raw(&event).await {
                error!(
                    table = event.table(),
                    identity = event.identity(),
                    "Failed to persist raw event: {}",
                    e
                );
            }
        });
    }
}
