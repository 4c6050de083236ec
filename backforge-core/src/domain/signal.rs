//! Raw trading signals as emitted by a strategy.
//!
//! Fields are loosely typed on purpose: direction and order type arrive as
//! strings and may be missing. The simulator validates each signal before it
//! becomes an order and drops the ones it cannot use.

use serde::{Deserialize, Serialize};

/// One signal record produced by [`Strategy::on_bar`](crate::strategy::Strategy::on_bar).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSignal {
    /// Target symbol. Defaults to the bar's symbol when absent.
    #[serde(default)]
    pub symbol: Option<String>,
    /// `"buy"` or `"sell"`.
    #[serde(default)]
    pub direction: Option<String>,
    /// `"market"`, `"limit"`, `"stop"` or `"stop_limit"`.
    #[serde(default, rename = "type")]
    pub order_type: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    /// Notional to convert into a quantity when `quantity` is absent.
    #[serde(default)]
    pub amount: Option<f64>,
    /// Limit price.
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub stop_price: Option<f64>,
    /// Cancel every open order for the symbol; other fields are ignored.
    #[serde(default)]
    pub cancel_open: bool,
}

impl RawSignal {
    fn order(symbol: &str, direction: &str, order_type: &str) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            direction: Some(direction.to_string()),
            order_type: Some(order_type.to_string()),
            ..Self::default()
        }
    }

    pub fn market_buy(symbol: &str, quantity: f64) -> Self {
        Self {
            quantity: Some(quantity),
            ..Self::order(symbol, "buy", "market")
        }
    }

    pub fn market_sell(symbol: &str, quantity: f64) -> Self {
        Self {
            quantity: Some(quantity),
            ..Self::order(symbol, "sell", "market")
        }
    }

    /// Market buy sized by notional instead of quantity.
    pub fn market_buy_amount(symbol: &str, amount: f64) -> Self {
        Self {
            amount: Some(amount),
            ..Self::order(symbol, "buy", "market")
        }
    }

    pub fn limit_buy(symbol: &str, quantity: f64, limit_price: f64) -> Self {
        Self {
            quantity: Some(quantity),
            price: Some(limit_price),
            ..Self::order(symbol, "buy", "limit")
        }
    }

    pub fn limit_sell(symbol: &str, quantity: f64, limit_price: f64) -> Self {
        Self {
            quantity: Some(quantity),
            price: Some(limit_price),
            ..Self::order(symbol, "sell", "limit")
        }
    }

    pub fn cancel_all(symbol: &str) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            cancel_open: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_fill_expected_fields() {
        let s = RawSignal::limit_sell("BTC-USD", 2.0, 110.0);
        assert_eq!(s.direction.as_deref(), Some("sell"));
        assert_eq!(s.order_type.as_deref(), Some("limit"));
        assert_eq!(s.quantity, Some(2.0));
        assert_eq!(s.price, Some(110.0));
        assert!(!s.cancel_open);
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let s: RawSignal = serde_json::from_str(r#"{"direction":"buy","type":"market"}"#).unwrap();
        assert_eq!(s.order_type.as_deref(), Some("market"));
        assert_eq!(s.quantity, None);
        assert_eq!(s.symbol, None);
    }
}
