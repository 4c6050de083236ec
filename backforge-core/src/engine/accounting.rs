//! Portfolio update: applies one fill to cash and positions.
//!
//! Affordability is checked before anything is mutated, so a rejected fill
//! leaves the portfolio untouched.

use crate::domain::position::QTY_EPSILON;
use crate::domain::{OrderSide, Portfolio};
use thiserror::Error;

/// Tolerance for cash comparisons, absorbing float noise on exact buys.
const CASH_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FillError {
    #[error("insufficient cash: need {required:.6}, have {available:.6}")]
    InsufficientCash { required: f64, available: f64 },

    #[error("insufficient position in {symbol}: sell {requested}, hold {held}")]
    InsufficientPosition {
        symbol: String,
        requested: f64,
        held: f64,
    },
}

/// What a successful fill actually did to the portfolio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedFill {
    /// Quantity moved. A sell within `QTY_EPSILON` of the holding is clamped
    /// to the holding.
    pub quantity: f64,
    /// Realized P&L, sells only.
    pub realized_pnl: Option<f64>,
}

/// Apply a fill to the portfolio.
///
/// Buys deduct `quantity × price + commission` from cash and grow the
/// position. Sells add `quantity × price − commission` to cash and shrink it;
/// sells return the realized P&L. Equity is not recomputed here; the caller
/// marks the portfolio once per bar.
pub fn apply_fill(
    portfolio: &mut Portfolio,
    symbol: &str,
    side: OrderSide,
    quantity: f64,
    price: f64,
    commission: f64,
) -> Result<AppliedFill, FillError> {
    match side {
        OrderSide::Buy => {
            let required = quantity * price + commission;
            if required > portfolio.cash + CASH_EPSILON {
                return Err(FillError::InsufficientCash {
                    required,
                    available: portfolio.cash,
                });
            }
            portfolio.cash = (portfolio.cash - required).max(0.0);
            portfolio
                .position_entry(symbol)
                .apply_buy(quantity, price, commission);
            portfolio.total_commission += commission;
            Ok(AppliedFill {
                quantity,
                realized_pnl: None,
            })
        }
        OrderSide::Sell => {
            let held = portfolio.quantity(symbol);
            if quantity > held + QTY_EPSILON {
                return Err(FillError::InsufficientPosition {
                    symbol: symbol.to_string(),
                    requested: quantity,
                    held,
                });
            }
            let quantity = quantity.min(held);
            portfolio.cash += quantity * price - commission;
            let realized = portfolio
                .position_entry(symbol)
                .apply_sell(quantity, price, commission);
            portfolio.total_commission += commission;
            portfolio.prune_flat();
            Ok(AppliedFill {
                quantity,
                realized_pnl: Some(realized),
            })
        }
    }
}
