//! Trade: one execution event against an order.

use super::ids::{OrderId, TradeId};
use super::order::OrderSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single fill. Created exactly once per partial or full execution and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub order_id: OrderId,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub execution_price: f64,
    pub commission: f64,
    /// Realized P&L net of this fill's commission. Present only for sells
    /// that reduce a position.
    pub realized_pnl: Option<f64>,
}

impl Trade {
    /// Gross notional: `quantity * execution_price`.
    pub fn notional(&self) -> f64 {
        self.quantity * self.execution_price
    }

    /// Whether this fill closed (part of) a position.
    pub fn is_closing(&self) -> bool {
        self.realized_pnl.is_some()
    }

    pub fn is_winner(&self) -> bool {
        self.realized_pnl.is_some_and(|pnl| pnl > 0.0)
    }
}
