//! Decision Oracle Port
//!
//! Black-box mapping from a window's decision request to a trade decision.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Decision, DecisionError, DecisionRequest};

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid decision: {0}")]
    InvalidDecision(#[from] DecisionError),

    #[error("Oracle not configured: {0}")]
    NotConfigured(String),
}

/// Decision oracle port trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Ask for a decision.
    ///
    /// A reply without a structured call is an implicit HOLD and must be
    /// returned as `Ok`; only transport / parse / validation failures are errors.
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, OracleError>;
}
