//! Domain Layer - Core types for the signal pipeline
//!
//! Pure data and state-machine logic with no I/O. All external interactions
//! happen through the ports layer.
//!
//! - `signal`: normalized signal envelope and kind validation
//! - `window`: time window buffering and closure
//! - `decision`: decision request / decision types
//! - `risk`: tunable risk constraints
//! - `portfolio`: portfolio snapshot forwarded to the oracle
//! - `sentiment`: lexicon polarity scoring for social posts

pub mod signal;
pub mod window;
pub mod decision;
pub mod risk;
pub mod portfolio;
pub mod sentiment;

pub use signal::{NormalizedSignal, SignalError, SignalKind, SignalSource};
pub use window::{window_id, ClosedWindow, Window, DEFAULT_WINDOW_SECS};
pub use decision::{
    Decision, DecisionError, DecisionRequest, GroupedSignals, TradeAction, NO_ACTION_REASON,
};
pub use risk::{parse_blacklist, ConstraintsError, ConstraintsUpdate, RiskConstraints};
pub use portfolio::{Holding, PortfolioState};
pub use sentiment::SentimentScorer;
