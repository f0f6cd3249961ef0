//! Pipeline
//!
//! Owns the running tasks: the source adapters and the window aggregator.
//! Start and stop are idempotent. `stop` is terminal: it signals shutdown,
//! joins every task and closes the shared channel and store.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use super::aggregator::{AggregatorConfig, AggregatorStats, WindowAggregator};
use super::context::{PipelineContext, PipelineStatus};
use crate::adapters::pump_fun::PumpFunStream;
use crate::adapters::raydium::RaydiumPoller;
use crate::adapters::social::SocialMetricsPoller;
use crate::adapters::source::SignalEmitter;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline already stopped")]
    Stopped,
}

/// Which halves of the pipeline to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// Sources and aggregator
    Full,
    /// Sources only
    Collect,
    /// Aggregator only
    Consume,
}

impl PipelineMode {
    pub fn runs_sources(&self) -> bool {
        matches!(self, PipelineMode::Full | PipelineMode::Collect)
    }

    pub fn runs_consumer(&self) -> bool {
        matches!(self, PipelineMode::Full | PipelineMode::Consume)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

impl StartOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartOutcome::Started => "started",
            StartOutcome::AlreadyRunning => "already running",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

impl StopOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopOutcome::Stopped => "stopped",
            StopOutcome::NotRunning => "not running",
        }
    }
}

/// Source adapters to run; absent ones are skipped
#[derive(Default)]
pub struct Sources {
    pub pump_fun: Option<Arc<PumpFunStream>>,
    pub raydium: Option<Arc<RaydiumPoller>>,
    pub social: Option<Arc<SocialMetricsPoller>>,
    /// Emitter shared by the sources; its raw writes are drained at stop
    pub emitter: Option<SignalEmitter>,
}

impl Sources {
    pub fn is_empty(&self) -> bool {
        self.pump_fun.is_none() && self.raydium.is_none() && self.social.is_none()
    }
}

struct ConsumerTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<AggregatorStats>,
}

pub struct Pipeline {
    ctx: Arc<PipelineContext>,
    aggregator: AggregatorConfig,
    sources: Sources,
    consumer: Mutex<Option<ConsumerTask>>,
    source_tasks: Mutex<JoinSet<()>>,
}

impl Pipeline {
    pub fn new(ctx: Arc<PipelineContext>, aggregator: AggregatorConfig, sources: Sources) -> Self {
        Self {
            ctx,
            aggregator,
            sources,
            consumer: Mutex::new(None),
            source_tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.ctx
    }

    pub async fn status(&self) -> PipelineStatus {
        self.ctx.status().await
    }

    /// Start the parts selected by `mode`
    pub async fn start(&self, mode: PipelineMode) -> Result<(), PipelineError> {
        if mode.runs_sources() {
            self.start_sources().await?;
        }
        if mode.runs_consumer() {
            self.start_consumer().await?;
        }
        Ok(())
    }

    pub async fn start_consumer(&self) -> Result<StartOutcome, PipelineError> {
        if self.ctx.lifecycle().is_stopped() {
            return Err(PipelineError::Stopped);
        }

        let mut consumer = self.consumer.lock().await;
        if let Some(task) = consumer.as_ref() {
            if !task.handle.is_finished() {
                return Ok(StartOutcome::AlreadyRunning);
            }
        }

        let (stop, stop_rx) = watch::channel(false);
        let aggregator = WindowAggregator::new(self.aggregator.clone(), Arc::clone(&self.ctx));
        let handle = tokio::spawn(aggregator.run(stop_rx));

        *consumer = Some(ConsumerTask { stop, handle });
        self.ctx.lifecycle().set_consumer_running(true);
        info!("Consumer started");
        Ok(StartOutcome::Started)
    }

    pub async fn stop_consumer(&self) -> StopOutcome {
        let Some(task) = self.consumer.lock().await.take() else {
            return StopOutcome::NotRunning;
        };

        task.stop.send_replace(true);
        match task.handle.await {
            Ok(stats) => info!(?stats, "Consumer stopped"),
            Err(e) => error!("Consumer task failed: {}", e),
        }
        self.ctx.lifecycle().set_consumer_running(false);
        StopOutcome::Stopped
    }

    pub async fn start_sources(&self) -> Result<StartOutcome, PipelineError> {
        if self.ctx.lifecycle().is_stopped() {
            return Err(PipelineError::Stopped);
        }
        if self.ctx.lifecycle().sources_running() {
            return Ok(StartOutcome::AlreadyRunning);
        }
        if self.sources.is_empty() {
            warn!("No source adapters enabled");
        }

        let mut tasks = self.source_tasks.lock().await;
        if let Some(stream) = &self.sources.pump_fun {
            tasks.spawn(Arc::clone(stream).run(self.ctx.shutdown_receiver()));
        }
        if let Some(poller) = &self.sources.raydium {
            tasks.spawn(Arc::clone(poller).run(self.ctx.shutdown_receiver()));
        }
        if let Some(poller) = &self.sources.social {
            tasks.spawn(Arc::clone(poller).run(self.ctx.shutdown_receiver()));
        }

        self.ctx.lifecycle().set_sources_running(true);
        info!(tasks = tasks.len(), "Sources started");
        Ok(StartOutcome::Started)
    }

    /// Stop everything and release the shared connections
    pub async fn stop(&self) -> StopOutcome {
        if !self.ctx.lifecycle().mark_stopped() {
            return StopOutcome::NotRunning;
        }
        info!("Stopping pipeline");

        self.stop_consumer().await;
        self.ctx.signal_shutdown();

        let mut tasks = self.source_tasks.lock().await;
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Source task failed: {}", e);
            }
        }
        self.ctx.lifecycle().set_sources_running(false);
        drop(tasks);

        if let Some(emitter) = &self.sources.emitter {
            emitter.drain().await;
        }

        if let Err(e) = self.ctx.channel().close().await {
            warn!("Error closing channel: {}", e);
        }
        self.ctx.store().close().await;

        info!("Pipeline stopped");
        StopOutcome::Stopped
    }
}
