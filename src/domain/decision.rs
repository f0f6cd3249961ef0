//! Decision Types
//!
//! The request sent to the decision oracle for a closed window and the
//! structured decision that comes back.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::portfolio::PortfolioState;
use super::risk::RiskConstraints;
use super::signal::{NormalizedSignal, SignalKind};

/// Reason recorded when the oracle answers without a structured call
pub const NO_ACTION_REASON: &str = "No action";

#[derive(Debug, Error, PartialEq)]
pub enum DecisionError {
    #[error("amount_sol must be a finite value >= 0, got {0}")]
    InvalidAmount(f64),

    #[error("{0} requires a token_mint")]
    MissingMint(TradeAction),
}

/// Trade action chosen by the oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
            TradeAction::Hold => write!(f, "HOLD"),
        }
    }
}

/// Decision published on `signals.decoded`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: TradeAction,
    pub token_mint: String,
    pub amount_sol: f64,
    pub reason: String,
    /// Idempotency key of the window this decision was made for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
}

impl Decision {
    /// Validated decision. HOLD always carries an empty mint and zero amount.
    pub fn new(
        action: TradeAction,
        token_mint: impl Into<String>,
        amount_sol: f64,
        reason: impl Into<String>,
    ) -> Result<Self, DecisionError> {
        if action == TradeAction::Hold {
            return Ok(Self::hold(reason));
        }

        if !amount_sol.is_finite() || amount_sol < 0.0 {
            return Err(DecisionError::InvalidAmount(amount_sol));
        }

        let token_mint = token_mint.into();
        if token_mint.trim().is_empty() {
            return Err(DecisionError::MissingMint(action));
        }

        Ok(Self {
            action,
            token_mint,
            amount_sol,
            reason: reason.into(),
            window_id: None,
        })
    }

    pub fn hold(reason: impl Into<String>) -> Self {
        Self {
            action: TradeAction::Hold,
            token_mint: String::new(),
            amount_sol: 0.0,
            reason: reason.into(),
            window_id: None,
        }
    }

    /// HOLD produced when the oracle could not be consulted
    pub fn fallback(cause: impl fmt::Display) -> Self {
        Self::hold(format!("Error: {}", cause))
    }

    pub fn with_window_id(mut self, window_id: impl Into<String>) -> Self {
        self.window_id = Some(window_id.into());
        self
    }

    pub fn is_hold(&self) -> bool {
        self.action == TradeAction::Hold
    }
}

/// Window buffer partitioned by kind.
///
/// Every kind is present (possibly empty) and each group keeps arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupedSignals(BTreeMap<SignalKind, Vec<NormalizedSignal>>);

impl GroupedSignals {
    pub fn from_signals(signals: impl IntoIterator<Item = NormalizedSignal>) -> Self {
        let mut groups: BTreeMap<SignalKind, Vec<NormalizedSignal>> = SignalKind::ALL
            .iter()
            .map(|kind| (*kind, Vec::new()))
            .collect();

        for signal in signals {
            groups.entry(signal.kind).or_default().push(signal);
        }

        Self(groups)
    }

    pub fn get(&self, kind: SignalKind) -> &[NormalizedSignal] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, kind: SignalKind) -> usize {
        self.get(kind).len()
    }

    pub fn total(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SignalKind, &Vec<NormalizedSignal>)> {
        self.0.iter()
    }
}

/// Everything the oracle sees for one closed window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub window_id: String,
    pub portfolio_state: PortfolioState,
    pub grouped_signals: GroupedSignals,
    pub constraints: RiskConstraints,
}

impl DecisionRequest {
    pub fn new(
        window_id: impl Into<String>,
        signals: Vec<NormalizedSignal>,
        portfolio_state: PortfolioState,
        constraints: RiskConstraints,
    ) -> Self {
        Self {
            window_id: window_id.into(),
            portfolio_state,
            grouped_signals: GroupedSignals::from_signals(signals),
            constraints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::SignalSource;
    use serde_json::json;

    fn signal(kind: SignalKind, n: u32) -> NormalizedSignal {
        NormalizedSignal::new(kind, SignalSource::Unknown, json!({ "n": n }))
    }

    #[test]
    fn test_action_wire_format() {
        assert_eq!(serde_json::to_value(TradeAction::Buy).unwrap(), json!("BUY"));
        let parsed: TradeAction = serde_json::from_value(json!("HOLD")).unwrap();
        assert_eq!(parsed, TradeAction::Hold);
        assert!(serde_json::from_value::<TradeAction>(json!("buy")).is_err());
    }

    #[test]
    fn test_hold_is_normalized() {
        let d = Decision::new(TradeAction::Hold, "SomeMint", 3.0, "wait").unwrap();
        assert_eq!(d.token_mint, "");
        assert_eq!(d.amount_sol, 0.0);
        assert_eq!(d.reason, "wait");
    }

    #[test]
    fn test_invalid_trades_rejected() {
        assert_eq!(
            Decision::new(TradeAction::Buy, "Mint", -1.0, "x"),
            Err(DecisionError::InvalidAmount(-1.0))
        );
        assert!(matches!(
            Decision::new(TradeAction::Buy, "Mint", f64::NAN, "x"),
            Err(DecisionError::InvalidAmount(_))
        ));
        assert_eq!(
            Decision::new(TradeAction::Sell, " ", 1.0, "x"),
            Err(DecisionError::MissingMint(TradeAction::Sell))
        );
    }

    #[test]
    fn test_fallback_reason() {
        let d = Decision::fallback("connection refused");
        assert!(d.is_hold());
        assert_eq!(d.reason, "Error: connection refused");
    }

    #[test]
    fn test_decoded_wire_shape() {
        let d = Decision::new(TradeAction::Buy, "Mint111", 0.5, "momentum")
            .unwrap()
            .with_window_id("00ff");
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(
            v,
            json!({
                "action": "BUY",
                "token_mint": "Mint111",
                "amount_sol": 0.5,
                "reason": "momentum",
                "window_id": "00ff"
            })
        );

        let plain = serde_json::to_value(Decision::hold("idle")).unwrap();
        assert!(plain.get("window_id").is_none());
    }

    #[test]
    fn test_grouping_partitions_buffer() {
        let buffer = vec![
            signal(SignalKind::PriceEvent, 0),
            signal(SignalKind::SocialMetric, 1),
            signal(SignalKind::PriceEvent, 2),
            signal(SignalKind::LiquidityEvent, 3),
            signal(SignalKind::PriceEvent, 4),
        ];
        let grouped = GroupedSignals::from_signals(buffer.clone());

        assert_eq!(grouped.total(), buffer.len());
        for (kind, group) in grouped.iter() {
            assert!(group.iter().all(|s| s.kind == *kind));
        }
        let order: Vec<_> = grouped
            .get(SignalKind::PriceEvent)
            .iter()
            .map(|s| s.payload["n"].as_u64().unwrap())
            .collect();
        assert_eq!(order, vec![0, 2, 4]);

        // Every buffered signal appears in exactly one group
        for s in &buffer {
            let hits: usize = grouped
                .iter()
                .map(|(_, g)| g.iter().filter(|x| *x == s).count())
                .sum();
            assert_eq!(hits, 1);
        }
    }

    #[test]
    fn test_grouping_keeps_empty_kinds() {
        let grouped = GroupedSignals::from_signals(vec![signal(SignalKind::PriceEvent, 0)]);
        let v = serde_json::to_value(&grouped).unwrap();
        assert_eq!(v["liquidity_event"], json!([]));
        assert_eq!(v["social_metric"], json!([]));
        assert_eq!(v["price_event"].as_array().unwrap().len(), 1);
    }
}
