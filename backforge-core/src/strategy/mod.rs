//! Strategy interface.
//!
//! A strategy sees one bar at a time plus a read-only view of the portfolio
//! and answers with zero or more [`RawSignal`]s. It never touches orders or
//! cash directly; the simulator owns both.

pub mod buy_and_hold;
pub mod ma_cross;
pub mod params;
pub mod registry;
pub mod scripted;

pub use buy_and_hold::BuyAndHold;
pub use ma_cross::MovingAverageCross;
pub use params::{format_params, ParamSet, ParamValue};
pub use registry::{RegistryError, StrategyFactory, StrategyRegistry};
pub use scripted::ScriptedStrategy;

use crate::domain::{Bar, Portfolio, Position, RawSignal};
use chrono::{DateTime, Utc};

/// Bar-driven trading logic.
///
/// Implementations are `Send` so that each optimizer worker can own one.
pub trait Strategy: Send {
    fn name(&self) -> &str;

    /// Called once per bar, after the portfolio has been marked at the bar's
    /// close and before any order is evaluated against it.
    fn on_bar(
        &mut self,
        timestamp: DateTime<Utc>,
        bar: &Bar,
        portfolio: &PortfolioView<'_>,
    ) -> Vec<RawSignal>;
}

/// Read-only snapshot of the portfolio handed to [`Strategy::on_bar`].
#[derive(Debug, Clone, Copy)]
pub struct PortfolioView<'a> {
    portfolio: &'a Portfolio,
    open_orders: usize,
}

impl<'a> PortfolioView<'a> {
    pub fn new(portfolio: &'a Portfolio, open_orders: usize) -> Self {
        Self {
            portfolio,
            open_orders,
        }
    }

    pub fn cash(&self) -> f64 {
        self.portfolio.cash
    }

    pub fn equity(&self) -> f64 {
        self.portfolio.equity
    }

    pub fn initial_capital(&self) -> f64 {
        self.portfolio.initial_capital
    }

    pub fn quantity(&self, symbol: &str) -> f64 {
        self.portfolio.quantity(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.portfolio.has_position(symbol)
    }

    pub fn position(&self, symbol: &str) -> Option<&'a Position> {
        self.portfolio.get_position(symbol)
    }

    /// Number of orders still open or partially filled.
    pub fn open_orders(&self) -> usize {
        self.open_orders
    }
}
