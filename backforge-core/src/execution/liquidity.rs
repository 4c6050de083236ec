//! Liquidity constraints: participation limits and remainder policies.
//!
//! Optional feature. When enabled, limits each fill to a fraction of the
//! bar's volume. The unfilled remainder either stays on the order for the
//! next bar or is canceled.

use serde::{Deserialize, Serialize};

/// Policy for handling unfilled remainder when the liquidity limit is hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Leave the remainder open for the next bar.
    Carry,
    /// Cancel the remainder immediately.
    Cancel,
}

/// Liquidity constraint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityPolicy {
    /// Maximum participation rate as a fraction of bar volume (0.0 to 1.0).
    /// Example: 0.10 means fill at most 10% of the bar's volume.
    pub max_participation: f64,
    pub remainder: RemainderPolicy,
}

impl LiquidityPolicy {
    pub fn new(max_participation: f64, remainder: RemainderPolicy) -> Self {
        Self {
            max_participation,
            remainder,
        }
    }

    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.max_participation)
    }

    /// Maximum fillable quantity given bar volume.
    pub fn max_fill_qty(&self, bar_volume: f64) -> f64 {
        bar_volume.max(0.0) * self.max_participation
    }

    /// Apply the constraint to a desired fill quantity.
    ///
    /// Returns `(fill_qty, remainder_qty)`. If no constraint binds,
    /// `remainder_qty` is zero.
    pub fn constrain(&self, desired_qty: f64, bar_volume: f64) -> (f64, f64) {
        let max_qty = self.max_fill_qty(bar_volume);
        if desired_qty <= max_qty {
            (desired_qty, 0.0)
        } else {
            (max_qty, desired_qty - max_qty)
        }
    }
}
