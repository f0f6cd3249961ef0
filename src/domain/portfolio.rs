use serde::{Deserialize, Serialize};

/// A single open position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub token_mint: String,
    pub amount_sol: f64,
}

/// Positions and PnL as seen by the decision step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub positions: Vec<Holding>,
    pub pnl_sol: f64,
}

impl PortfolioState {
    pub fn exposure_sol(&self) -> f64 {
        self.positions.iter().map(|h| h.amount_sol).sum()
    }

    pub fn holds(&self, mint: &str) -> bool {
        self.positions.iter().any(|h| h.token_mint == mint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exposure() {
        let state = PortfolioState {
            positions: vec![
                Holding { token_mint: "A".into(), amount_sol: 0.5 },
                Holding { token_mint: "B".into(), amount_sol: 0.25 },
            ],
            pnl_sol: -0.1,
        };
        assert_eq!(state.exposure_sol(), 0.75);
        assert!(state.holds("B"));
        assert!(!state.holds("C"));
        assert_eq!(PortfolioState::default().exposure_sol(), 0.0);
    }
}
