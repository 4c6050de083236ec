//! Cost model: slippage plus commission.
//!
//! Commission is proportional to traded notional and charged on both sides.

use super::book::BookSnapshot;
use super::slippage::SlippageModel;
use crate::domain::{Bar, OrderSide};
use serde::{Deserialize, Serialize};

/// Execution friction for a single run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostModel {
    /// Fraction of notional charged per fill, in `[0, 1)`.
    pub commission_rate: f64,
    #[serde(default)]
    pub slippage: SlippageModel,
}

impl CostModel {
    pub fn new(commission_rate: f64, slippage: SlippageModel) -> Self {
        Self {
            commission_rate,
            slippage,
        }
    }

    pub fn frictionless() -> Self {
        Self::default()
    }

    /// `quantity × price × commission_rate`.
    pub fn commission(&self, quantity: f64, price: f64) -> f64 {
        quantity * price * self.commission_rate
    }

    /// Market execution price after slippage.
    pub fn market_price(
        &self,
        side: OrderSide,
        quantity: f64,
        bar: &Bar,
        book: Option<&BookSnapshot>,
    ) -> f64 {
        self.slippage.market_price(side, quantity, bar, book)
    }

    pub fn commission_rate_is_valid(&self) -> bool {
        (0.0..1.0).contains(&self.commission_rate)
    }
}
