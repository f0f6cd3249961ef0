//! Social Metrics Poller
//!
//! Each tick scans `[previous tick, now)` per keyword, scores the posts on the
//! worker pool and publishes one `social_metric` signal per keyword.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::adapters::source::{SignalEmitter, SourceError};
use crate::application::worker_pool::WorkerPool;
use crate::domain::{NormalizedSignal, SentimentScorer, SignalKind, SignalSource};
use crate::ports::social::SocialSearchPort;
use crate::ports::store::RawEvent;

const DEFAULT_POLL_SECS: u64 = 60;
const DEFAULT_MAX_POSTS: usize = 100;

#[derive(Debug, Clone)]
pub struct SocialMetricsConfig {
    pub keywords: Vec<String>,
    pub poll_interval: Duration,
    /// Posts scored per keyword per tick
    pub max_posts: usize,
}

impl Default for SocialMetricsConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            max_posts: DEFAULT_MAX_POSTS,
        }
    }
}

pub struct SocialMetricsPoller {
    config: SocialMetricsConfig,
    search: Arc<dyn SocialSearchPort>,
    scorer: Arc<SentimentScorer>,
    workers: WorkerPool,
    emitter: SignalEmitter,
}

impl SocialMetricsPoller {
    pub fn new(
        config: SocialMetricsConfig,
        search: Arc<dyn SocialSearchPort>,
        workers: WorkerPool,
        emitter: SignalEmitter,
    ) -> Self {
        Self {
            config,
            search,
            scorer: Arc::new(SentimentScorer::new()),
            workers,
            emitter,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.config.keywords
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            keywords = ?self.config.keywords,
            "SocialMetricsPoller starting, every {:?}", self.config.poll_interval
        );

        let lookback = chrono::Duration::from_std(self.config.poll_interval)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_POLL_SECS as i64));
        let mut since = Utc::now() - lookback;

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Utc::now();
                    self.poll_tick(since, now).await;
                    since = now;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("SocialMetricsPoller stopped");
    }

    /// Poll every keyword over `[since, until)`; a failing keyword does not
    /// stop the others
    pub async fn poll_tick(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> usize {
        let mut published = 0;
        for keyword in &self.config.keywords {
            match self.poll_keyword(keyword, since, until).await {
                Ok(payload) => {
                    debug!(%keyword, metrics = %payload, "social metric published");
                    published += 1;
                }
                Err(e) => error!(%keyword, "Social poll failed: {}", e),
            }
        }
        published
    }

    /// Search, score and publish one keyword. Returns the published payload.
    pub async fn poll_keyword(
        &self,
        keyword: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Value, SourceError> {
        let posts = self
            .search
            .search(keyword, since, until, self.config.max_posts)
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        let texts: Vec<String> = posts.into_iter().map(|p| p.text).collect();
        let scorer = Arc::clone(&self.scorer);
        let (avg_sentiment, count) = self
            .workers
            .run(move || scorer.mean_compound(texts.iter().map(String::as_str)))
            .await
            .map_err(|e| SourceError::Worker(e.to_string()))?;

        let payload = json!({
            "keyword": keyword,
            "count": count,
            "avg_sentiment": avg_sentiment,
            "since": since.to_rfc3339_opts(SecondsFormat::Secs, true),
            "until": until.to_rfc3339_opts(SecondsFormat::Secs, true),
        });

        let raw = RawEvent::SocialMetric {
            keyword: keyword.to_string(),
            raw: payload.clone(),
        };
        let signal =
            NormalizedSignal::new(SignalKind::SocialMetric, SignalSource::Social, payload.clone());

        self.emitter.emit(&signal, Some(raw)).await?;
        Ok(payload)
    }
}
