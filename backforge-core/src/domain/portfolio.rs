//! Portfolio: aggregate state of cash and all open positions.

use super::position::Position;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate portfolio state for one run.
///
/// Positions and marks live in ordered maps so that equity sums are computed
/// in the same order on every run. The accounting identity
/// `equity == cash + Σ(quantity × mark)` holds after every [`mark`](Self::mark)
/// and [`revalue`](Self::revalue).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: BTreeMap<String, Position>,
    /// Last mark price per symbol.
    pub marks: BTreeMap<String, f64>,
    pub equity: f64,
    /// Gross exposure at mark. Spot accounting: no leverage.
    pub margin_used: f64,
    pub margin_available: f64,
    pub total_commission: f64,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            marks: BTreeMap::new(),
            equity: initial_capital,
            margin_used: 0.0,
            margin_available: initial_capital,
            total_commission: 0.0,
        }
    }

    /// Record a mark price for `symbol` and recompute equity.
    pub fn mark(&mut self, symbol: &str, price: f64) {
        self.marks.insert(symbol.to_string(), price);
        self.revalue();
    }

    /// Recompute equity and margin from current cash, positions and marks.
    ///
    /// A position without a mark is valued at its average price.
    pub fn revalue(&mut self) {
        let position_value: f64 = self
            .positions
            .iter()
            .map(|(sym, pos)| {
                let price = self.marks.get(sym).copied().unwrap_or(pos.average_price);
                pos.market_value(price)
            })
            .sum();
        self.equity = self.cash + position_value;
        self.margin_used = position_value.abs();
        self.margin_available = self.equity - self.margin_used;
    }

    /// Quantity held in `symbol` (zero when flat or unknown).
    pub fn quantity(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.quantity)
    }

    /// Whether a symbol has an open position.
    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.get(symbol).is_some_and(|p| !p.is_flat())
    }

    /// Get a position by symbol (if exists and not flat).
    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol).filter(|p| !p.is_flat())
    }

    /// Position for `symbol`, created flat if missing.
    pub fn position_entry(&mut self, symbol: &str) -> &mut Position {
        self.positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position::flat(symbol))
    }

    /// Drop flat positions so that the map only holds open exposure.
    pub fn prune_flat(&mut self) {
        self.positions.retain(|_, p| !p.is_flat());
    }
}
