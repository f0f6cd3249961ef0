//! Window Aggregator
//!
//! Consumes `signals.raw`, buffers signals into a time window and, when the
//! window closes, asks the oracle for a decision and hands it to the sink.
//!
//! Window closure is checked on every arriving signal. With `idle_flush`
//! enabled an expired window is also closed once its deadline passes with no
//! traffic. Deliveries are not pulled while a window is being closed.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::context::PipelineContext;
use super::sink::{DecisionSink, SinkReport};
use crate::domain::{
    ClosedWindow, Decision, DecisionRequest, NormalizedSignal, SignalKind, Window,
    DEFAULT_WINDOW_SECS,
};
use crate::ports::channel::{Delivery, Topic};

/// When consumed deliveries are acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// After the message has been buffered or skipped
    #[default]
    Immediate,
    /// After the decision for the message's window is persisted and published
    OnFlush,
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub window: Duration,
    pub idle_flush: bool,
    pub ack_mode: AckMode,
    /// Wait before re-subscribing after the consumer stream ends
    pub resubscribe_backoff: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(DEFAULT_WINDOW_SECS),
            idle_flush: false,
            ack_mode: AckMode::Immediate,
            resubscribe_backoff: Duration::from_secs(5),
        }
    }
}

/// Counters reported when the aggregator stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    pub received: u64,
    pub malformed: u64,
    pub windows_closed: u64,
    pub fallbacks: u64,
}

enum StreamEnd {
    Shutdown,
    Closed,
}

pub struct WindowAggregator {
    config: AggregatorConfig,
    ctx: Arc<PipelineContext>,
    sink: DecisionSink,
    window: Window,
    unacked: Vec<Delivery>,
    stats: AggregatorStats,
}

impl WindowAggregator {
    pub fn new(config: AggregatorConfig, ctx: Arc<PipelineContext>) -> Self {
        let sink = DecisionSink::new(ctx.channel(), ctx.store());
        Self {
            window: Window::new(config.window),
            config,
            ctx,
            sink,
            unacked: Vec::new(),
            stats: AggregatorStats::default(),
        }
    }

    pub fn stats(&self) -> &AggregatorStats {
        &self.stats
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Consume until `shutdown` flips to true. A window still open at shutdown
    /// is dropped; in `on_flush` mode its deliveries stay unacknowledged.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> AggregatorStats {
        info!(
            window = ?self.config.window,
            idle_flush = self.config.idle_flush,
            ack_mode = ?self.config.ack_mode,
            "Window aggregator starting"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let end = match self.ctx.channel().consume(Topic::Raw).await {
                Ok(mut rx) => self.consume(&mut rx, &mut shutdown).await,
                Err(e) => {
                    error!("Failed to consume {}: {}", Topic::Raw, e);
                    StreamEnd::Closed
                }
            };

            if let StreamEnd::Shutdown = end {
                break;
            }
            self.discard_unacked_window();

            warn!(
                "Consumer stream ended, re-subscribing in {:?}",
                self.config.resubscribe_backoff
            );
            tokio::select! {
                _ = tokio::time::sleep(self.config.resubscribe_backoff) => {}
                _ = shutdown.changed() => {}
            }
        }

        if !self.window.is_empty() {
            info!(
                pending = self.window.len(),
                "Dropping open window at shutdown"
            );
        }
        info!(stats = ?self.stats, "Window aggregator stopped");
        self.stats
    }

    async fn consume(
        &mut self,
        rx: &mut mpsc::Receiver<Delivery>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> StreamEnd {
        loop {
            let idle_deadline = if self.config.idle_flush {
                self.window.deadline()
            } else {
                None
            };

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return StreamEnd::Shutdown;
                    }
                }
                _ = sleep_until(idle_deadline) => {
                    if let Some(closed) = self.window.flush_expired(Instant::now()) {
                        debug!("Idle deadline reached");
                        self.close_window(closed).await;
                        self.ack_unacked().await;
                    }
                }
                delivery = rx.recv() => match delivery {
                    Some(delivery) => {
                        self.handle_delivery(delivery).await;
                    }
                    None => return StreamEnd::Closed,
                },
            }
        }
    }

    /// Process one delivery: buffer it, or skip it when malformed.
    /// Returns the decision if this delivery closed the window.
    pub async fn handle_delivery(&mut self, delivery: Delivery) -> Option<Decision> {
        self.stats.received += 1;

        let signal = match NormalizedSignal::from_wire(&delivery.body) {
            Ok(signal) => signal,
            Err(e) => {
                self.stats.malformed += 1;
                warn!("Skipping malformed signal: {}", e);
                ack(delivery).await;
                return None;
            }
        };

        debug!(kind = %signal.kind, buffered = self.window.len() + 1, "Signal buffered");
        let closed = self.window.push(signal, Instant::now());

        match self.config.ack_mode {
            AckMode::Immediate => {
                let decision = match closed {
                    Some(closed) => Some(self.close_window(closed).await),
                    None => None,
                };
                ack(delivery).await;
                decision
            }
            AckMode::OnFlush => {
                self.unacked.push(delivery);
                let closed = closed?;
                let decision = self.close_window(closed).await;
                self.ack_unacked().await;
                Some(decision)
            }
        }
    }

    /// Close the window now if it is due
    pub async fn flush_if_expired(&mut self) -> Option<Decision> {
        let closed = self.window.flush_expired(Instant::now())?;
        let decision = self.close_window(closed).await;
        self.ack_unacked().await;
        Some(decision)
    }

    async fn close_window(&mut self, closed: ClosedWindow) -> Decision {
        let window_id = closed.window_id.clone();
        let request = DecisionRequest::new(
            closed.window_id,
            closed.signals,
            self.ctx.portfolio().await,
            self.ctx.constraints().await,
        );

        info!(
            window_id = %window_id,
            elapsed = ?closed.elapsed,
            price_events = request.grouped_signals.count(SignalKind::PriceEvent),
            liquidity_events = request.grouped_signals.count(SignalKind::LiquidityEvent),
            social_metrics = request.grouped_signals.count(SignalKind::SocialMetric),
            "Window closed"
        );

        let decision = match self.ctx.oracle().decide(&request).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(window_id = %window_id, "Oracle failed, holding: {}", e);
                self.stats.fallbacks += 1;
                Decision::fallback(e)
            }
        }
        .with_window_id(window_id.as_str());

        let SinkReport { stored, published } = self.sink.deliver(&decision).await;
        self.stats.windows_closed += 1;

        info!(
            window_id = %window_id,
            action = %decision.action,
            token_mint = %decision.token_mint,
            amount_sol = decision.amount_sol,
            stored = stored.is_some(),
            published,
            "Decision emitted"
        );
        decision
    }

    /// In `on_flush` mode the broker requeues everything still unacked when
    /// the consumer stream dies, so the open window would see it twice.
    fn discard_unacked_window(&mut self) {
        if self.config.ack_mode != AckMode::OnFlush || self.window.is_empty() {
            return;
        }
        let dropped = self.window.discard();
        self.unacked.clear();
        warn!(
            dropped,
            "Consumer stream lost, dropping open window pending redelivery"
        );
    }

    async fn ack_unacked(&mut self) {
        for delivery in std::mem::take(&mut self.unacked) {
            ack(delivery).await;
        }
    }
}

async fn ack(delivery: Delivery) {
    if let Err(e) = delivery.ack().await {
        error!("Failed to ack delivery: {}", e);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
