use serde::{Deserialize, Serialize};

/// Quantities at or below this are treated as flat.
pub const QTY_EPSILON: f64 = 1e-10;

/// Long-only position in one symbol.
///
/// `average_price` is the weighted average execution price of the open
/// quantity. `cost_basis` is what the open quantity cost including buy
/// commissions; sells release it pro rata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub average_price: f64,
    pub cost_basis: f64,
}

impl Position {
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            quantity: 0.0,
            average_price: 0.0,
            cost_basis: 0.0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity <= QTY_EPSILON
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.quantity * current_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.market_value(current_price) - self.cost_basis
    }

    /// Add a buy fill, recomputing the weighted average price.
    pub fn apply_buy(&mut self, quantity: f64, price: f64, commission: f64) {
        let total_qty = self.quantity + quantity;
        self.average_price = (self.average_price * self.quantity + price * quantity) / total_qty;
        self.quantity = total_qty;
        self.cost_basis += quantity * price + commission;
    }

    /// Remove a sell fill and return the realized P&L net of both sides'
    /// commissions. The caller guarantees `quantity <= self.quantity`.
    pub fn apply_sell(&mut self, quantity: f64, price: f64, commission: f64) -> f64 {
        let released_basis = if self.quantity > QTY_EPSILON {
            self.cost_basis * (quantity / self.quantity)
        } else {
            0.0
        };
        let realized = quantity * price - commission - released_basis;

        self.quantity -= quantity;
        self.cost_basis -= released_basis;
        if self.quantity <= QTY_EPSILON {
            self.quantity = 0.0;
            self.average_price = 0.0;
            self.cost_basis = 0.0;
        }
        realized
    }
}
