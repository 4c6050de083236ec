//! Slippage models: the price a market order actually executes at.
//!
//! Slippage is directional. Buyers pay more, sellers receive less. Limit
//! orders never go through a slippage model; they fill at their limit.

use super::book::BookSnapshot;
use crate::domain::{Bar, OrderSide};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SlippageError {
    #[error("unknown slippage model '{0}' (expected fixed, variable or orderbook)")]
    UnknownModel(String),

    #[error("slippage model '{model}': parameter '{param}' must be finite and >= 0, got {value}")]
    InvalidParameter {
        model: &'static str,
        param: &'static str,
        value: f64,
    },

    #[error("slippage model '{model}': '{param}' must be below 10000 bps, got {value}")]
    BpsOutOfRange {
        model: &'static str,
        param: &'static str,
        value: f64,
    },
}

/// Exclusive upper bound for basis-point slippage. At 10 000 bps a sell
/// would fill at zero.
pub const MAX_BPS: f64 = 10_000.0;

/// Market-order execution price model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum SlippageModel {
    /// `close × (1 ± bps / 10_000)`.
    Fixed { bps: f64 },
    /// `close ± (high − low) × volatility_factor`.
    Variable { volatility_factor: f64 },
    /// Sweep a supplied book; fixed `fallback_bps` when no book is available
    /// or the book is too thin.
    #[serde(rename = "orderbook")]
    OrderBook { fallback_bps: f64 },
}

impl Default for SlippageModel {
    fn default() -> Self {
        Self::Fixed { bps: 0.0 }
    }
}

impl SlippageModel {
    /// Build a model from its configuration name and a bag of numeric
    /// parameters. Missing parameters default to zero.
    ///
    /// Recognized parameters: `fixed_bps` (fixed and orderbook) and
    /// `volatility_factor` (variable).
    pub fn from_name(name: &str, params: &BTreeMap<String, f64>) -> Result<Self, SlippageError> {
        let get = |key: &str| params.get(key).copied().unwrap_or(0.0);
        let model = match name.trim().to_ascii_lowercase().as_str() {
            "fixed" => Self::Fixed {
                bps: get("fixed_bps"),
            },
            "variable" => Self::Variable {
                volatility_factor: get("volatility_factor"),
            },
            "orderbook" | "order_book" => Self::OrderBook {
                fallback_bps: get("fixed_bps"),
            },
            other => return Err(SlippageError::UnknownModel(other.to_string())),
        };
        model.validate()?;
        Ok(model)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Fixed { .. } => "fixed",
            Self::Variable { .. } => "variable",
            Self::OrderBook { .. } => "orderbook",
        }
    }

    pub fn validate(&self) -> Result<(), SlippageError> {
        let (param, value, is_bps) = match self {
            Self::Fixed { bps } => ("fixed_bps", *bps, true),
            Self::Variable { volatility_factor } => ("volatility_factor", *volatility_factor, false),
            Self::OrderBook { fallback_bps } => ("fixed_bps", *fallback_bps, true),
        };
        if !(value.is_finite() && value >= 0.0) {
            return Err(SlippageError::InvalidParameter {
                model: self.name(),
                param,
                value,
            });
        }
        if is_bps && value >= MAX_BPS {
            return Err(SlippageError::BpsOutOfRange {
                model: self.name(),
                param,
                value,
            });
        }
        Ok(())
    }

    /// Execution price for a market order of `quantity` on `bar`.
    ///
    /// `book` is only consulted by the orderbook model.
    pub fn market_price(
        &self,
        side: OrderSide,
        quantity: f64,
        bar: &Bar,
        book: Option<&BookSnapshot>,
    ) -> f64 {
        match self {
            Self::Fixed { bps } => fixed_price(bar.close, side, *bps),
            Self::Variable { volatility_factor } => {
                let offset = bar.range() * volatility_factor;
                (bar.close + side.adverse_sign() * offset).max(0.0)
            }
            Self::OrderBook { fallback_bps } => book
                .and_then(|b| b.sweep(side, quantity))
                .unwrap_or_else(|| fixed_price(bar.close, side, *fallback_bps)),
        }
    }
}

fn fixed_price(close: f64, side: OrderSide, bps: f64) -> f64 {
    close * (1.0 + side.adverse_sign() * bps / 10_000.0)
}
