//! Order types and the order lifecycle.

use super::ids::OrderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells. Multiplying a price offset by this moves the
    /// price against the trader.
    pub fn adverse_sign(&self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// What kind of order and its price parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderType {
    /// Fill at the bar's close, adjusted by the slippage model.
    Market,
    /// Fill at the limit price once the bar's range crosses it.
    Limit { limit_price: f64 },
    /// Accepted at validation, rejected by the simulator (unsupported).
    Stop { stop_price: f64 },
    /// Accepted at validation, rejected by the simulator (unsupported).
    StopLimit { stop_price: f64, limit_price: f64 },
}

impl OrderType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Limit { .. } => "limit",
            Self::Stop { .. } => "stop",
            Self::StopLimit { .. } => "stop_limit",
        }
    }
}

/// Order lifecycle states.
///
/// `Created → Open → PartiallyFilled* → Filled | Canceled`. `Rejected` is
/// terminal and reached only from `Open` when the simulator cannot execute the
/// order type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Open,
    PartiallyFilled,
    Filled,
    Canceled { reason: String },
    Rejected { reason: String },
}

impl OrderStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Open => "open",
            Self::PartiallyFilled => "partially_filled",
            Self::Filled => "filled",
            Self::Canceled { .. } => "canceled",
            Self::Rejected { .. } => "rejected",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single order owned by the simulator for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub requested_quantity: f64,
    pub filled_quantity: f64,
    pub remaining_quantity: f64,
    /// Sum of `quantity * execution_price` over all fills.
    pub accumulated_cost: f64,
    /// Sum of commissions over all fills.
    pub accumulated_fee: f64,
    pub status: OrderStatus,
}

impl Order {
    pub fn new(
        id: OrderId,
        created_at: DateTime<Utc>,
        symbol: impl Into<String>,
        side: OrderSide,
        order_type: OrderType,
        quantity: f64,
    ) -> Self {
        Self {
            id,
            created_at,
            symbol: symbol.into(),
            side,
            order_type,
            requested_quantity: quantity,
            filled_quantity: 0.0,
            remaining_quantity: quantity,
            accumulated_cost: 0.0,
            accumulated_fee: 0.0,
            status: OrderStatus::Created,
        }
    }

    /// Open or partially filled: still eligible for execution.
    pub fn is_active(&self) -> bool {
        matches!(self.status, OrderStatus::Open | OrderStatus::PartiallyFilled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Filled | OrderStatus::Canceled { .. } | OrderStatus::Rejected { .. }
        )
    }

    /// Volume-weighted execution price over all fills so far.
    pub fn average_fill_price(&self) -> Option<f64> {
        if self.filled_quantity > 0.0 {
            Some(self.accumulated_cost / self.filled_quantity)
        } else {
            None
        }
    }
}

/// Audit trail entry for an order state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAuditEntry {
    pub order_id: OrderId,
    pub bar_index: usize,
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub reason: String,
}
