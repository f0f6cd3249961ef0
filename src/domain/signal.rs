//! Normalized Signal
//!
//! The uniform representation every source adapter produces and the window
//! aggregator consumes. Kinds are a closed set validated at the channel boundary.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while decoding a signal off the channel
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Unknown signal kind: {0}")]
    UnknownKind(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),
}

/// Category of a normalized signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Token launch / price activity (pump.fun stream)
    PriceEvent,
    /// New pool or liquidity change (Raydium listing)
    LiquidityEvent,
    /// Aggregated social sentiment for a keyword
    SocialMetric,
}

impl SignalKind {
    pub const ALL: [SignalKind; 3] = [
        SignalKind::PriceEvent,
        SignalKind::LiquidityEvent,
        SignalKind::SocialMetric,
    ];

    /// Wire name used in the `kind` field
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::PriceEvent => "price_event",
            SignalKind::LiquidityEvent => "liquidity_event",
            SignalKind::SocialMetric => "social_metric",
        }
    }

    /// Parse a wire kind name
    pub fn parse(name: &str) -> Result<Self, SignalError> {
        match name {
            "price_event" => Ok(SignalKind::PriceEvent),
            "liquidity_event" => Ok(SignalKind::LiquidityEvent),
            "social_metric" => Ok(SignalKind::SocialMetric),
            other => Err(SignalError::UnknownKind(other.to_string())),
        }
    }

    /// Map the collector's legacy `type` tag onto a kind
    fn from_legacy_type(tag: &str) -> Result<(Self, SignalSource), SignalError> {
        match tag {
            "pumpfun" => Ok((SignalKind::PriceEvent, SignalSource::PumpFun)),
            "raydium" => Ok((SignalKind::LiquidityEvent, SignalSource::Raydium)),
            "twitter" => Ok((SignalKind::SocialMetric, SignalSource::Social)),
            other => Err(SignalError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adapter that produced a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    PumpFun,
    Raydium,
    Social,
    /// Source not recorded on the wire
    Unknown,
}

impl Default for SignalSource {
    fn default() -> Self {
        SignalSource::Unknown
    }
}

/// A signal as it travels on `signals.raw`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSignal {
    pub kind: SignalKind,
    #[serde(default)]
    pub source: SignalSource,
    pub payload: Value,
    /// Ingestion time at the adapter, not the source's own timestamp
    pub received_at: DateTime<Utc>,
}

/// Legacy collector envelope: `{"type": "pumpfun", "data": {...}}`, with an
/// optional `received_at`
#[derive(Debug, Deserialize)]
struct LegacyEnvelope {
    #[serde(rename = "type")]
    tag: String,
    data: Value,
    #[serde(default)]
    received_at: Option<DateTime<Utc>>,
}

impl NormalizedSignal {
    /// Create a signal stamped with the current time
    pub fn new(kind: SignalKind, source: SignalSource, payload: Value) -> Self {
        Self::at(kind, source, payload, Utc::now())
    }

    /// Create a signal with an explicit ingestion time
    pub fn at(
        kind: SignalKind,
        source: SignalSource,
        payload: Value,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            source,
            payload,
            received_at,
        }
    }

    /// Encode for publishing on the raw topic
    pub fn to_wire(&self) -> Result<Vec<u8>, SignalError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a raw-topic message body.
    ///
    /// Accepts the `{kind, payload, received_at}` envelope and the legacy
    /// `{type, data}` one. Unknown kinds are rejected rather than passed on.
    ///
    /// A legacy body without `received_at` is stamped at decode time, so a
    /// redelivery of it lands at a different time and in a different window
    /// id. Legacy publishers that need stable ids must send `received_at`.
    pub fn from_wire(body: &[u8]) -> Result<Self, SignalError> {
        let doc: Value = serde_json::from_slice(body)?;

        if let Some(kind) = doc.get("kind") {
            let name = kind.as_str().ok_or(SignalError::MissingField("kind"))?;
            SignalKind::parse(name)?;
            return Ok(serde_json::from_value(doc)?);
        }

        if doc.get("type").is_some() {
            let legacy: LegacyEnvelope = serde_json::from_value(doc)?;
            let (kind, source) = SignalKind::from_legacy_type(&legacy.tag)?;
            let received_at = legacy.received_at.unwrap_or_else(Utc::now);
            return Ok(Self::at(kind, source, legacy.data, received_at));
        }

        Err(SignalError::MissingField("kind"))
    }
}
