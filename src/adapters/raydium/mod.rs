//! Raydium Pool Poller
//!
//! Periodically fetches the Raydium pool listing and publishes every pool as a
//! `liquidity_event` signal, recording the raw pool in `new_pools`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::adapters::source::{SignalEmitter, SourceError};
use crate::domain::{NormalizedSignal, SignalKind, SignalSource};
use crate::ports::store::RawEvent;

pub const DEFAULT_POOLS_URL: &str = "https://api.raydium.io/v2/main/pairs";
const DEFAULT_POLL_SECS: u64 = 90;

#[derive(Debug, Clone)]
pub struct RaydiumConfig {
    pub pools_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for RaydiumConfig {
    fn default() -> Self {
        Self {
            pools_url: DEFAULT_POOLS_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct RaydiumPoller {
    config: RaydiumConfig,
    http: Client,
    emitter: SignalEmitter,
}

impl RaydiumPoller {
    pub fn new(config: RaydiumConfig, emitter: SignalEmitter) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SourceError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            emitter,
        })
    }

    /// Poll on a fixed interval until shutdown. The first poll runs immediately.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "RaydiumPoller starting, polling {} every {:?}",
            self.config.pools_url, self.config.poll_interval
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(count) => debug!(pools = count, "Raydium poll complete"),
                        Err(e) => error!("Raydium poll failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("RaydiumPoller stopped");
    }

    /// Fetch once and publish every pool. Returns how many were published.
    pub async fn poll_once(&self) -> Result<usize, SourceError> {
        let response = self
            .http
            .get(&self.config.pools_url)
            .send()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http(format!("status {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        self.publish_pools(body).await
    }

    /// Publish each element of a pool listing. Anything but a JSON array is rejected.
    pub async fn publish_pools(&self, body: Value) -> Result<usize, SourceError> {
        let Value::Array(pools) = body else {
            return Err(SourceError::InvalidMessageFormat(
                "pool listing is not a list".into(),
            ));
        };

        let mut published = 0;
        for pool in pools {
            let raw = RawEvent::Pool {
                pool_id: pool_id(&pool).to_string(),
                raw: pool.clone(),
            };
            let signal =
                NormalizedSignal::new(SignalKind::LiquidityEvent, SignalSource::Raydium, pool);

            match self.emitter.emit(&signal, Some(raw)).await {
                Ok(()) => published += 1,
                Err(e) => warn!("Failed to publish pool: {}", e),
            }
        }

        Ok(published)
    }
}

/// `id`, falling back to `address`, empty when neither is present
pub fn pool_id(pool: &Value) -> &str {
    ["id", "address"]
        .iter()
        .filter_map(|k| pool.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or("")
}
