//! Signal validation: raw strategy output → typed order intent.
//!
//! Validation never fails the run. A rejected signal is dropped and the
//! caller records a diagnostic.

use crate::domain::{Bar, OrderSide, OrderType, RawSignal};
use thiserror::Error;

/// Why a signal was dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalRejection {
    #[error("missing direction")]
    MissingDirection,

    #[error("unknown direction '{0}'")]
    UnknownDirection(String),

    #[error("missing order type")]
    MissingType,

    #[error("unknown order type '{0}'")]
    UnknownType(String),

    #[error("signal has neither quantity nor amount")]
    MissingQuantity,

    #[error("quantity must be finite and positive, got {0}")]
    InvalidQuantity(f64),

    #[error("{order_type} order requires {field}")]
    MissingPrice {
        order_type: &'static str,
        field: &'static str,
    },

    #[error("{field} must be finite and positive, got {value}")]
    InvalidPrice { field: &'static str, value: f64 },

    #[error("signal for '{found}' on a '{expected}' bar stream")]
    SymbolMismatch { expected: String, found: String },
}

/// A validated order request.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSignal {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: f64,
}

/// What a valid signal asks the simulator to do.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalIntent {
    Place(ValidSignal),
    CancelAll { symbol: String },
}

pub fn parse_side(direction: &str) -> Result<OrderSide, SignalRejection> {
    match direction.trim().to_ascii_lowercase().as_str() {
        "buy" | "long" => Ok(OrderSide::Buy),
        "sell" | "short" => Ok(OrderSide::Sell),
        other => Err(SignalRejection::UnknownDirection(other.to_string())),
    }
}

/// Validate `signal` against the current `bar`.
///
/// A quantity given directly wins over `amount`. Otherwise quantity is
/// `amount / reference_price`, where the reference price is the signal's
/// limit price if present, else the bar's close.
pub fn validate_signal(signal: &RawSignal, bar: &Bar) -> Result<SignalIntent, SignalRejection> {
    let symbol = signal.symbol.clone().unwrap_or_else(|| bar.symbol.clone());
    if symbol != bar.symbol {
        return Err(SignalRejection::SymbolMismatch {
            expected: bar.symbol.clone(),
            found: symbol,
        });
    }
    if signal.cancel_open {
        return Ok(SignalIntent::CancelAll { symbol });
    }

    let side = parse_side(
        signal
            .direction
            .as_deref()
            .ok_or(SignalRejection::MissingDirection)?,
    )?;
    let type_name = signal
        .order_type
        .as_deref()
        .ok_or(SignalRejection::MissingType)?
        .trim()
        .to_ascii_lowercase();

    let limit = || positive_price(signal.price, "limit price");
    let stop = || positive_price(signal.stop_price, "stop_price");
    let order_type = match type_name.as_str() {
        "market" => OrderType::Market,
        "limit" => OrderType::Limit {
            limit_price: limit().map_err(|e| e.for_type("limit"))?,
        },
        "stop" => OrderType::Stop {
            stop_price: stop().map_err(|e| e.for_type("stop"))?,
        },
        "stop_limit" | "stoplimit" => OrderType::StopLimit {
            stop_price: stop().map_err(|e| e.for_type("stop_limit"))?,
            limit_price: limit().map_err(|e| e.for_type("stop_limit"))?,
        },
        _ => return Err(SignalRejection::UnknownType(type_name)),
    };

    let quantity = match (signal.quantity, signal.amount) {
        (Some(q), _) => q,
        (None, Some(amount)) => {
            let reference = match &order_type {
                OrderType::Limit { limit_price } | OrderType::StopLimit { limit_price, .. } => {
                    *limit_price
                }
                _ => bar.close,
            };
            if !(reference.is_finite() && reference > 0.0) {
                return Err(SignalRejection::InvalidPrice {
                    field: "reference price",
                    value: reference,
                });
            }
            amount / reference
        }
        (None, None) => return Err(SignalRejection::MissingQuantity),
    };
    if !(quantity.is_finite() && quantity > 0.0) {
        return Err(SignalRejection::InvalidQuantity(quantity));
    }

    Ok(SignalIntent::Place(ValidSignal {
        symbol,
        side,
        order_type,
        quantity,
    }))
}

fn positive_price(value: Option<f64>, field: &'static str) -> Result<f64, SignalRejection> {
    match value {
        None => Err(SignalRejection::MissingPrice {
            order_type: "",
            field,
        }),
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(v) => Err(SignalRejection::InvalidPrice { field, value: v }),
    }
}

impl SignalRejection {
    fn for_type(self, name: &'static str) -> Self {
        match self {
            Self::MissingPrice { field, .. } => Self::MissingPrice {
                order_type: name,
                field,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar() -> Bar {
        Bar {
            symbol: "BTC-USD".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            open: 100.0,
            high: 105.0,
            low: 99.0,
            close: 102.0,
            volume: 1_000.0,
        }
    }

    fn place(intent: SignalIntent) -> ValidSignal {
        match intent {
            SignalIntent::Place(v) => v,
            other => panic!("expected Place, got {other:?}"),
        }
    }

    #[test]
    fn market_buy_is_valid() {
        let v = place(validate_signal(&RawSignal::market_buy("BTC-USD", 1.5), &bar()).unwrap());
        assert_eq!(v.side, OrderSide::Buy);
        assert_eq!(v.order_type, OrderType::Market);
        assert_eq!(v.quantity, 1.5);
    }

    #[test]
    fn symbol_defaults_to_bar() {
        let signal = RawSignal {
            symbol: None,
            ..RawSignal::market_sell("x", 1.0)
        };
        let v = place(validate_signal(&signal, &bar()).unwrap());
        assert_eq!(v.symbol, "BTC-USD");
    }

    #[test]
    fn amount_uses_close_for_market() {
        let v = place(
            validate_signal(&RawSignal::market_buy_amount("BTC-USD", 204.0), &bar()).unwrap(),
        );
        assert!((v.quantity - 2.0).abs() < 1e-12);
    }

    #[test]
    fn amount_uses_limit_price_when_present() {
        let signal = RawSignal {
            quantity: None,
            amount: Some(500.0),
            ..RawSignal::limit_buy("BTC-USD", 0.0, 100.0)
        };
        let v = place(validate_signal(&signal, &bar()).unwrap());
        assert!((v.quantity - 5.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_direction_and_type_rejected() {
        let mut s = RawSignal::market_buy("BTC-USD", 1.0);
        s.direction = Some("hold".into());
        assert_eq!(
            validate_signal(&s, &bar()),
            Err(SignalRejection::UnknownDirection("hold".into()))
        );

        let mut s = RawSignal::market_buy("BTC-USD", 1.0);
        s.order_type = Some("iceberg".into());
        assert_eq!(
            validate_signal(&s, &bar()),
            Err(SignalRejection::UnknownType("iceberg".into()))
        );
    }

    #[test]
    fn missing_fields_rejected() {
        let mut s = RawSignal::market_buy("BTC-USD", 1.0);
        s.direction = None;
        assert_eq!(validate_signal(&s, &bar()), Err(SignalRejection::MissingDirection));

        let mut s = RawSignal::market_buy("BTC-USD", 1.0);
        s.order_type = None;
        assert_eq!(validate_signal(&s, &bar()), Err(SignalRejection::MissingType));

        let mut s = RawSignal::market_buy("BTC-USD", 1.0);
        s.quantity = None;
        assert_eq!(validate_signal(&s, &bar()), Err(SignalRejection::MissingQuantity));

        let mut s = RawSignal::limit_buy("BTC-USD", 1.0, 100.0);
        s.price = None;
        assert_eq!(
            validate_signal(&s, &bar()),
            Err(SignalRejection::MissingPrice {
                order_type: "limit",
                field: "limit price"
            })
        );
    }

    #[test]
    fn non_positive_quantity_rejected() {
        assert_eq!(
            validate_signal(&RawSignal::market_buy("BTC-USD", 0.0), &bar()),
            Err(SignalRejection::InvalidQuantity(0.0))
        );
        assert!(matches!(
            validate_signal(&RawSignal::market_buy("BTC-USD", f64::NAN), &bar()),
            Err(SignalRejection::InvalidQuantity(_))
        ));
    }

    #[test]
    fn stop_types_validate_but_are_typed() {
        let s = RawSignal {
            order_type: Some("stop".into()),
            stop_price: Some(98.0),
            ..RawSignal::market_sell("BTC-USD", 1.0)
        };
        let v = place(validate_signal(&s, &bar()).unwrap());
        assert_eq!(v.order_type, OrderType::Stop { stop_price: 98.0 });
    }

    #[test]
    fn cancel_and_symbol_mismatch() {
        assert_eq!(
            validate_signal(&RawSignal::cancel_all("BTC-USD"), &bar()),
            Ok(SignalIntent::CancelAll {
                symbol: "BTC-USD".into()
            })
        );
        assert!(matches!(
            validate_signal(&RawSignal::market_buy("ETH-USD", 1.0), &bar()),
            Err(SignalRejection::SymbolMismatch { .. })
        ));
    }

    #[test]
    fn direction_is_case_insensitive() {
        assert_eq!(parse_side("SELL"), Ok(OrderSide::Sell));
        assert_eq!(parse_side(" Buy "), Ok(OrderSide::Buy));
    }
}
