//! OpenAI Decision Oracle
//!
//! Sends the window's decision request as a chat completion with the pinned
//! `make_trade` tool and turns the structured call into a `Decision`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use super::types::{
    ChatMessage, ChatRequest, ChatResponse, MakeTradeArgs, Tool, ToolChoice, SYSTEM_PROMPT,
};
use crate::domain::{Decision, DecisionRequest, NO_ACTION_REASON};
use crate::ports::oracle::{DecisionOracle, OracleError};

/// Oracle client configuration
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Base URL of an OpenAI compatible API
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub temperature: Option<f32>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            timeout: Duration::from_secs(30),
            temperature: None,
        }
    }
}

/// Chat-completions backed decision oracle
#[derive(Debug, Clone)]
pub struct OpenAiOracle {
    config: OracleConfig,
    http: Client,
}

impl OpenAiOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    /// Build the chat request for a decision request
    pub fn build_request(&self, request: &DecisionRequest) -> Result<ChatRequest, OracleError> {
        let prompt = serde_json::to_string(request)
            .map_err(|e| OracleError::MalformedResponse(format!("encode request: {}", e)))?;

        Ok(ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
            tools: vec![Tool::make_trade()],
            tool_choice: ToolChoice::make_trade(),
            temperature: self.config.temperature,
        })
    }
}

/// Turn a chat response into a decision.
///
/// No `make_trade` call is an implicit HOLD; a call with bad arguments is an error.
pub fn parse_decision(response: &ChatResponse) -> Result<Decision, OracleError> {
    let choice = response
        .choices
        .first()
        .ok_or_else(|| OracleError::MalformedResponse("response has no choices".into()))?;

    let Some(call) = choice.message.make_trade_call() else {
        debug!("Oracle answered without a make_trade call");
        return Ok(Decision::hold(NO_ACTION_REASON));
    };

    let args: MakeTradeArgs = serde_json::from_str(&call.arguments)
        .map_err(|e| OracleError::MalformedResponse(format!("make_trade arguments: {}", e)))?;

    Ok(Decision::new(
        args.action,
        args.token_mint,
        args.amount_sol,
        args.reason,
    )?)
}

fn transport_error(e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout
    } else {
        OracleError::Transport(e.to_string())
    }
}

#[async_trait]
impl DecisionOracle for OpenAiOracle {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, OracleError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| OracleError::NotConfigured("OPENAI_API_KEY not set".into()))?;

        let body = self.build_request(request)?;
        let url = format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OracleError::Http {
                status: status.as_u16(),
                body: text.chars().take(500).collect(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;

        let decision = parse_decision(&parsed)?;
        info!(
            action = %decision.action,
            token_mint = %decision.token_mint,
            amount_sol = decision.amount_sol,
            "Oracle decision"
        );
        Ok(decision)
    }
}
