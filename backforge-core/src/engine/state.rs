//! Simulator configuration, errors and run output.

use super::diagnostics::Diagnostic;
use super::order_book::OrderBookError;
use crate::domain::{BarError, EquityPoint, Order, OrderAuditEntry, Portfolio, Trade};
use crate::execution::{ExecutionConfig, ExecutionConfigError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("initial capital must be positive and finite, got {0}")]
    InvalidCapital(f64),

    #[error("invalid execution config: {0}")]
    Execution(#[from] ExecutionConfigError),

    #[error("invalid bar: {0}")]
    Bar(#[from] BarError),

    #[error("deadline exceeded after {bars_processed} bars")]
    DeadlineExceeded { bars_processed: usize },

    #[error("order book: {0}")]
    OrderBook(#[from] OrderBookError),
}

/// Configuration for a single simulator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub initial_capital: f64,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl SimulationConfig {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            execution: ExecutionConfig::frictionless(),
        }
    }

    pub fn with_execution(initial_capital: f64, execution: ExecutionConfig) -> Self {
        Self {
            initial_capital,
            execution,
        }
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(SimulationError::InvalidCapital(self.initial_capital));
        }
        self.execution.validate()?;
        Ok(())
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    /// Every fill, in execution order.
    pub trades: Vec<Trade>,
    /// One point per bar, taken at the bar's close before its fills.
    pub equity_curve: Vec<EquityPoint>,
    /// Every order in creation order with its final status.
    pub orders: Vec<Order>,
    pub audit: Vec<OrderAuditEntry>,
    pub diagnostics: Vec<Diagnostic>,
    /// Portfolio after the last bar's fills, marked at the last close.
    pub final_portfolio: Portfolio,
    pub bar_count: usize,
}

impl SimulationOutput {
    pub fn final_equity(&self) -> f64 {
        self.final_portfolio.equity
    }

    /// Sum of realized P&L over all closing trades.
    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().filter_map(|t| t.realized_pnl).sum()
    }

    /// Orders still open or partially filled when the run ended.
    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.is_active())
    }
}
