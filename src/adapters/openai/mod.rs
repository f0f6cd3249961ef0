//! OpenAI Adapter
//!
//! Decision oracle backed by an OpenAI compatible chat completions API.

mod client;
mod types;

pub use client::{parse_decision, OpenAiOracle, OracleConfig};
pub use types::{ChatRequest, ChatResponse, MakeTradeArgs, MAKE_TRADE};
