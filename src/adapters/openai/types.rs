//! OpenAI Chat Completion Types
//!
//! Wire types for the chat completions endpoint with a single pinned
//! `make_trade` tool.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::TradeAction;

/// Name of the pinned function the oracle must call
pub const MAKE_TRADE: &str = "make_trade";

pub const SYSTEM_PROMPT: &str = "You are an AI trading agent on Solana.";

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<Tool>,
    pub tool_choice: ToolChoice,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Forces the model to answer through `make_trade`
#[derive(Debug, Clone, Serialize)]
pub struct ToolChoice {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: ToolChoiceFunction,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolChoiceFunction {
    pub name: &'static str,
}

impl Tool {
    pub fn make_trade() -> Self {
        Self {
            kind: "function",
            function: FunctionSpec {
                name: MAKE_TRADE,
                description: "Execute trade decision",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "action": { "type": "string", "enum": ["BUY", "SELL", "HOLD"] },
                        "token_mint": { "type": "string" },
                        "amount_sol": { "type": "number" },
                        "reason": { "type": "string" }
                    },
                    "required": ["action", "token_mint", "amount_sol", "reason"]
                }),
            },
        }
    }
}

impl ToolChoice {
    pub fn make_trade() -> Self {
        Self {
            kind: "function",
            function: ToolChoiceFunction { name: MAKE_TRADE },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Legacy single function call field
    #[serde(default)]
    pub function_call: Option<FunctionCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

impl ResponseMessage {
    /// The `make_trade` call, from `tool_calls` or the legacy field
    pub fn make_trade_call(&self) -> Option<&FunctionCall> {
        self.tool_calls
            .iter()
            .flatten()
            .map(|c| &c.function)
            .chain(self.function_call.iter())
            .find(|f| f.name == MAKE_TRADE)
    }
}

/// Arguments of a `make_trade` call
#[derive(Debug, Clone, Deserialize)]
pub struct MakeTradeArgs {
    pub action: TradeAction,
    #[serde(default)]
    pub token_mint: String,
    #[serde(default)]
    pub amount_sol: f64,
    #[serde(default)]
    pub reason: String,
}
