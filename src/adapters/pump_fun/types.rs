//! Pump.fun Types
//!
//! Subscription request and the fields we read from token launch events.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Stream carrying new token launches
pub const NEW_TOKENS_STREAM: &str = "GetPumpFunNewTokensStream";

/// JSON-RPC subscription sent right after connecting
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: Value,
}

impl SubscribeRequest {
    pub fn new_tokens() -> Self {
        Self {
            jsonrpc: "2.0",
            id: 1,
            method: "subscribe",
            params: json!([NEW_TOKENS_STREAM, {}]),
        }
    }
}

/// Fields of a launch event used for logging and persistence keys
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LaunchSummary {
    #[serde(default)]
    pub mint: Option<String>,
    #[serde(rename = "tokenMint", default)]
    pub token_mint: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

impl LaunchSummary {
    pub fn from_event(event: &Value) -> Self {
        serde_json::from_value(event.clone()).unwrap_or_default()
    }

    /// `mint`, falling back to `tokenMint`, empty when neither is present
    pub fn mint(&self) -> &str {
        self.mint
            .as_deref()
            .filter(|m| !m.is_empty())
            .or(self.token_mint.as_deref())
            .unwrap_or("")
    }
}

/// Unwrap the JSON-RPC notification envelope (`params.result`) if present
pub fn extract_event(raw: Value) -> Value {
    match raw.pointer("/params/result") {
        Some(result) => result.clone(),
        None => raw,
    }
}
