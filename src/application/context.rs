//! Pipeline Context
//!
//! Shared handles and mutable state for every pipeline task: the channel and
//! store connections, the oracle, the live risk constraints, the portfolio
//! snapshot and the shutdown signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tracing::info;

use crate::domain::{ConstraintsError, ConstraintsUpdate, PortfolioState, RiskConstraints};
use crate::ports::channel::SignalChannel;
use crate::ports::oracle::DecisionOracle;
use crate::ports::store::SignalStore;

/// Lifecycle flags read by status reporting
#[derive(Debug, Default)]
pub struct Lifecycle {
    consumer_running: AtomicBool,
    sources_running: AtomicBool,
    stopped: AtomicBool,
}

impl Lifecycle {
    pub fn consumer_running(&self) -> bool {
        self.consumer_running.load(Ordering::SeqCst)
    }

    pub fn sources_running(&self) -> bool {
        self.sources_running.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(crate) fn set_consumer_running(&self, running: bool) {
        self.consumer_running.store(running, Ordering::SeqCst);
    }

    pub(crate) fn set_sources_running(&self, running: bool) {
        self.sources_running.store(running, Ordering::SeqCst);
    }

    /// Mark stopped; returns false if it already was
    pub(crate) fn mark_stopped(&self) -> bool {
        !self.stopped.swap(true, Ordering::SeqCst)
    }
}

/// Point-in-time view of the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub consumer_running: bool,
    pub sources_running: bool,
    pub stopped: bool,
    pub constraints: RiskConstraints,
    pub portfolio: PortfolioState,
}

pub struct PipelineContext {
    channel: Arc<dyn SignalChannel>,
    store: Arc<dyn SignalStore>,
    oracle: Arc<dyn DecisionOracle>,
    constraints: RwLock<RiskConstraints>,
    portfolio: RwLock<PortfolioState>,
    shutdown: watch::Sender<bool>,
    lifecycle: Lifecycle,
}

impl PipelineContext {
    pub fn new(
        channel: Arc<dyn SignalChannel>,
        store: Arc<dyn SignalStore>,
        oracle: Arc<dyn DecisionOracle>,
        constraints: RiskConstraints,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            channel,
            store,
            oracle,
            constraints: RwLock::new(constraints),
            portfolio: RwLock::new(PortfolioState::default()),
            shutdown,
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn channel(&self) -> Arc<dyn SignalChannel> {
        Arc::clone(&self.channel)
    }

    pub fn store(&self) -> Arc<dyn SignalStore> {
        Arc::clone(&self.store)
    }

    pub fn oracle(&self) -> Arc<dyn DecisionOracle> {
        Arc::clone(&self.oracle)
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Current constraints, copied so the lock is not held across I/O
    pub async fn constraints(&self) -> RiskConstraints {
        self.constraints.read().await.clone()
    }

    /// Apply the provided fields. Either every field applies or none does.
    pub async fn update_constraints(
        &self,
        update: ConstraintsUpdate,
    ) -> Result<RiskConstraints, ConstraintsError> {
        let mut constraints = self.constraints.write().await;
        constraints.apply(update)?;
        info!(constraints = ?*constraints, "Risk constraints updated");
        Ok(constraints.clone())
    }

    pub async fn portfolio(&self) -> PortfolioState {
        self.portfolio.read().await.clone()
    }

    pub async fn set_portfolio(&self, portfolio: PortfolioState) {
        *self.portfolio.write().await = portfolio;
    }

    /// Receiver that observes the shutdown signal
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn signal_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub async fn status(&self) -> PipelineStatus {
        PipelineStatus {
            consumer_running: self.lifecycle.consumer_running(),
            sources_running: self.lifecycle.sources_running(),
            stopped: self.lifecycle.is_stopped(),
            constraints: self.constraints().await,
            portfolio: self.portfolio().await,
        }
    }
}
