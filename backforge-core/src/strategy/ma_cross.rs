//! Moving Average Crossover strategy
//!
//! Classic long-only trend follower:
//! - Buy when the fast SMA crosses above the slow SMA while flat
//! - Sell the whole position when the fast SMA crosses below the slow SMA

use super::params::ParamSet;
use super::registry::{param_f64, param_usize, RegistryError};
use super::{PortfolioView, Strategy};
use crate::domain::{Bar, RawSignal};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

const NAME: &str = "ma_cross";

/// Moving Average Crossover strategy
///
/// # Parameters
/// - `fast_period`: short SMA period (default 10)
/// - `slow_period`: long SMA period, must exceed `fast_period` (default 30)
/// - `allocation`: fraction of cash committed on entry (default 0.95)
#[derive(Debug, Clone)]
pub struct MovingAverageCross {
    fast_period: usize,
    slow_period: usize,
    allocation: f64,
    closes: VecDeque<f64>,
}

impl MovingAverageCross {
    pub fn new(fast_period: usize, slow_period: usize, allocation: f64) -> Result<Self, RegistryError> {
        if fast_period == 0 {
            return Err(RegistryError::invalid(NAME, "fast_period", "must be > 0"));
        }
        if slow_period <= fast_period {
            return Err(RegistryError::invalid(
                NAME,
                "slow_period",
                format!("must be > fast_period ({fast_period}), got {slow_period}"),
            ));
        }
        if !(allocation > 0.0 && allocation <= 1.0) {
            return Err(RegistryError::invalid(
                NAME,
                "allocation",
                format!("must be in (0, 1], got {allocation}"),
            ));
        }
        Ok(Self {
            fast_period,
            slow_period,
            allocation,
            closes: VecDeque::with_capacity(slow_period + 1),
        })
    }

    pub fn from_params(params: &ParamSet) -> Result<Self, RegistryError> {
        Self::new(
            param_usize(NAME, params, "fast_period", 10)?,
            param_usize(NAME, params, "slow_period", 30)?,
            param_f64(NAME, params, "allocation", 0.95)?,
        )
    }

    /// Simple moving average over the last `period` closes, skipping the
    /// newest `offset` of them.
    fn sma(&self, period: usize, offset: usize) -> Option<f64> {
        let len = self.closes.len();
        if len < period + offset {
            return None;
        }
        let end = len - offset;
        let sum: f64 = self.closes.range(end - period..end).sum();
        Some(sum / period as f64)
    }

    /// Returns:
    /// - Some(true): bullish cross
    /// - Some(false): bearish cross
    /// - None: no cross (or not enough data)
    fn detect_cross(&self) -> Option<bool> {
        let fast_now = self.sma(self.fast_period, 0)?;
        let slow_now = self.sma(self.slow_period, 0)?;
        let fast_prev = self.sma(self.fast_period, 1)?;
        let slow_prev = self.sma(self.slow_period, 1)?;

        if fast_prev <= slow_prev && fast_now > slow_now {
            Some(true)
        } else if fast_prev >= slow_prev && fast_now < slow_now {
            Some(false)
        } else {
            None
        }
    }
}

impl Strategy for MovingAverageCross {
    fn name(&self) -> &str {
        NAME
    }

    fn on_bar(
        &mut self,
        _timestamp: DateTime<Utc>,
        bar: &Bar,
        portfolio: &PortfolioView<'_>,
    ) -> Vec<RawSignal> {
        self.closes.push_back(bar.close);
        if self.closes.len() > self.slow_period + 1 {
            self.closes.pop_front();
        }
        if portfolio.open_orders() > 0 {
            return Vec::new();
        }

        match self.detect_cross() {
            Some(true) if !portfolio.has_position(&bar.symbol) => {
                let amount = portfolio.cash() * self.allocation;
                if amount > 0.0 {
                    vec![RawSignal::market_buy_amount(&bar.symbol, amount)]
                } else {
                    Vec::new()
                }
            }
            Some(false) if portfolio.has_position(&bar.symbol) => {
                vec![RawSignal::market_sell(
                    &bar.symbol,
                    portfolio.quantity(&bar.symbol),
                )]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Portfolio;
    use chrono::{Duration, TimeZone};

    fn bar(i: i64, close: f64) -> Bar {
        Bar {
            symbol: "TEST".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000.0,
        }
    }

    fn feed(strategy: &mut MovingAverageCross, closes: &[f64], portfolio: &Portfolio) -> Vec<Vec<RawSignal>> {
        let view = PortfolioView::new(portfolio, 0);
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let b = bar(i as i64, c);
                strategy.on_bar(b.timestamp, &b, &view)
            })
            .collect()
    }

    #[test]
    fn rejects_bad_periods() {
        assert!(MovingAverageCross::new(0, 5, 1.0).is_err());
        assert!(MovingAverageCross::new(5, 5, 1.0).is_err());
        assert!(MovingAverageCross::new(2, 5, 0.0).is_err());
    }

    #[test]
    fn no_signal_before_enough_history() {
        let mut s = MovingAverageCross::new(2, 3, 1.0).unwrap();
        let out = feed(&mut s, &[10.0, 10.0, 10.0], &Portfolio::new(1_000.0));
        assert!(out.iter().all(Vec::is_empty));
    }

    #[test]
    fn bullish_cross_buys_when_flat() {
        let mut s = MovingAverageCross::new(2, 3, 0.5).unwrap();
        // prev: fast 9.5 <= slow ~9.67; now: fast 11.5 > slow 11
        let out = feed(&mut s, &[10.0, 10.0, 9.0, 14.0], &Portfolio::new(1_000.0));
        let last = out.last().unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].direction.as_deref(), Some("buy"));
        assert_eq!(last[0].amount, Some(500.0));
    }

    #[test]
    fn bearish_cross_sells_position() {
        let mut s = MovingAverageCross::new(2, 3, 1.0).unwrap();
        let mut portfolio = Portfolio::new(1_000.0);
        portfolio.cash = 900.0;
        portfolio.position_entry("TEST").apply_buy(10.0, 10.0, 0.0);
        let out = feed(&mut s, &[10.0, 10.0, 11.0, 6.0], &portfolio);
        let last = out.last().unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].direction.as_deref(), Some("sell"));
        assert_eq!(last[0].quantity, Some(10.0));
    }

    #[test]
    fn bearish_cross_when_flat_is_silent() {
        let mut s = MovingAverageCross::new(2, 3, 1.0).unwrap();
        let out = feed(&mut s, &[10.0, 10.0, 11.0, 6.0], &Portfolio::new(1_000.0));
        assert!(out.last().unwrap().is_empty());
    }
}
