//! Bar: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single symbol over one timeframe step.
///
/// Bars are produced by a [`BarSource`](crate::data::BarSource) and are never
/// mutated afterwards. A series handed to the simulator is strictly ordered by
/// `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Reasons a bar or bar series is unusable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar at {timestamp} is malformed (OHLC out of range or non-finite)")]
    Malformed { timestamp: DateTime<Utc> },

    #[error("bar at index {index} ({timestamp}) is not after its predecessor")]
    OutOfOrder {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("bar at index {index} belongs to '{found}', expected '{expected}'")]
    SymbolMismatch {
        index: usize,
        expected: String,
        found: String,
    },
}

impl Bar {
    /// Returns true if any OHLCV field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Basic OHLCV sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
    }

    /// High minus low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Whether `price` lies within `[low, high]`.
    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}

/// Check that a series is sane, single-symbol and strictly increasing in time.
pub fn validate_series(bars: &[Bar]) -> Result<(), BarError> {
    let Some(first) = bars.first() else {
        return Ok(());
    };
    for (index, bar) in bars.iter().enumerate() {
        if !bar.is_sane() {
            return Err(BarError::Malformed {
                timestamp: bar.timestamp,
            });
        }
        if bar.symbol != first.symbol {
            return Err(BarError::SymbolMismatch {
                index,
                expected: first.symbol.clone(),
                found: bar.symbol.clone(),
            });
        }
        if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
            return Err(BarError::OutOfOrder {
                index,
                timestamp: bar.timestamp,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_bar() -> Bar {
        Bar {
            symbol: "BTC-USD".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.open = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar();
        bar.high = 97.0;
        assert!(!bar.is_sane());
    }

    #[test]
    fn range_and_contains() {
        let bar = sample_bar();
        assert_eq!(bar.range(), 7.0);
        assert!(bar.contains(98.0));
        assert!(bar.contains(105.0));
        assert!(!bar.contains(105.01));
    }

    #[test]
    fn series_rejects_out_of_order() {
        let a = sample_bar();
        let mut b = sample_bar();
        b.timestamp = a.timestamp;
        let err = validate_series(&[a, b]).unwrap_err();
        assert!(matches!(err, BarError::OutOfOrder { index: 1, .. }));
    }

    #[test]
    fn series_rejects_mixed_symbols() {
        let a = sample_bar();
        let mut b = sample_bar();
        b.symbol = "ETH-USD".into();
        b.timestamp = a.timestamp + chrono::Duration::days(1);
        assert!(matches!(
            validate_series(&[a, b]),
            Err(BarError::SymbolMismatch { .. })
        ));
    }

    #[test]
    fn empty_series_is_valid() {
        assert!(validate_series(&[]).is_ok());
    }
}
