//! Risk Constraints
//!
//! Tunable limits forwarded to the decision oracle with every request.
//! Read at startup and mutable afterwards through partial updates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConstraintsError {
    #[error("No valid config fields provided")]
    NoFields,

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Current risk configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConstraints {
    /// Stop trading after this much realized loss in a day
    pub max_daily_loss_sol: f64,
    /// Mints the agent must never touch
    pub token_blacklist: Vec<String>,
    /// Ignore pools shallower than this
    pub min_liquidity_sol: f64,
    /// Cap on a single trade
    pub max_trade_amount_sol: f64,
    /// Slippage tolerance in basis points
    pub slippage_bps: u16,
}

impl Default for RiskConstraints {
    fn default() -> Self {
        Self {
            max_daily_loss_sol: 5.0,
            token_blacklist: Vec::new(),
            min_liquidity_sol: 0.1,
            max_trade_amount_sol: 1.0,
            slippage_bps: 50,
        }
    }
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintsUpdate {
    pub max_daily_loss_sol: Option<f64>,
    pub token_blacklist: Option<Vec<String>>,
    pub min_liquidity_sol: Option<f64>,
    pub max_trade_amount_sol: Option<f64>,
    pub slippage_bps: Option<u16>,
}

impl ConstraintsUpdate {
    pub fn is_empty(&self) -> bool {
        self.max_daily_loss_sol.is_none()
            && self.token_blacklist.is_none()
            && self.min_liquidity_sol.is_none()
            && self.max_trade_amount_sol.is_none()
            && self.slippage_bps.is_none()
    }
}

impl RiskConstraints {
    pub fn validate(&self) -> Result<(), ConstraintsError> {
        let non_negative = [
            ("max_daily_loss_sol", self.max_daily_loss_sol),
            ("min_liquidity_sol", self.min_liquidity_sol),
            ("max_trade_amount_sol", self.max_trade_amount_sol),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConstraintsError::InvalidValue {
                    field,
                    reason: format!("must be a finite value >= 0, got {}", value),
                });
            }
        }

        if self.slippage_bps > 10_000 {
            return Err(ConstraintsError::InvalidValue {
                field: "slippage_bps",
                reason: format!("must be <= 10000, got {}", self.slippage_bps),
            });
        }

        Ok(())
    }

    /// Apply a partial update. The update is all-or-nothing: an invalid
    /// result leaves `self` untouched.
    pub fn apply(&mut self, update: ConstraintsUpdate) -> Result<(), ConstraintsError> {
        if update.is_empty() {
            return Err(ConstraintsError::NoFields);
        }

        let mut next = self.clone();
        if let Some(v) = update.max_daily_loss_sol {
            next.max_daily_loss_sol = v;
        }
        if let Some(v) = update.token_blacklist {
            next.token_blacklist = v;
        }
        if let Some(v) = update.min_liquidity_sol {
            next.min_liquidity_sol = v;
        }
        if let Some(v) = update.max_trade_amount_sol {
            next.max_trade_amount_sol = v;
        }
        if let Some(v) = update.slippage_bps {
            next.slippage_bps = v;
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn is_blacklisted(&self, mint: &str) -> bool {
        self.token_blacklist.iter().any(|m| m == mint)
    }
}

/// Split a comma separated blacklist, dropping blanks
pub fn parse_blacklist(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_env_defaults() {
        let c = RiskConstraints::default();
        assert_eq!(c.max_daily_loss_sol, 5.0);
        assert_eq!(c.min_liquidity_sol, 0.1);
        assert_eq!(c.max_trade_amount_sol, 1.0);
        assert_eq!(c.slippage_bps, 50);
        assert!(c.token_blacklist.is_empty());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_update() {
        let mut c = RiskConstraints::default();
        c.apply(ConstraintsUpdate {
            max_trade_amount_sol: Some(0.25),
            token_blacklist: Some(vec!["BadMint".into()]),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(c.max_trade_amount_sol, 0.25);
        assert!(c.is_blacklisted("BadMint"));
        assert_eq!(c.max_daily_loss_sol, 5.0);
    }

    #[test]
    fn test_empty_update_rejected() {
        let mut c = RiskConstraints::default();
        assert_eq!(
            c.apply(ConstraintsUpdate::default()),
            Err(ConstraintsError::NoFields)
        );
    }

    #[test]
    fn test_invalid_update_leaves_state_untouched() {
        let mut c = RiskConstraints::default();
        let result = c.apply(ConstraintsUpdate {
            max_trade_amount_sol: Some(0.5),
            min_liquidity_sol: Some(-1.0),
            ..Default::default()
        });

        assert!(matches!(
            result,
            Err(ConstraintsError::InvalidValue { field: "min_liquidity_sol", .. })
        ));
        assert_eq!(c, RiskConstraints::default());
    }

    #[test]
    fn test_parse_blacklist() {
        assert_eq!(parse_blacklist("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_blacklist("").is_empty());
    }
}
