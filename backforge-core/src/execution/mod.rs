//! Execution cost models: slippage, commission, liquidity and partial fills.
//!
//! Everything here is configuration plus pure price arithmetic. The
//! simulator owns the mutable state (orders, portfolio, RNG) and asks these
//! types what a fill should look like.

pub mod book;
pub mod cost_model;
pub mod liquidity;
pub mod partial;
pub mod slippage;

pub use book::{BookLevel, BookSnapshot, OrderBookFeed};
pub use cost_model::CostModel;
pub use liquidity::{LiquidityPolicy, RemainderPolicy};
pub use partial::{PartialFillConfig, PartialFiller};
pub use slippage::{SlippageError, SlippageModel, MAX_BPS};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionConfigError {
    #[error("commission_rate must be in [0, 1), got {0}")]
    CommissionRate(f64),

    #[error("max_participation must be in [0, 1], got {0}")]
    Participation(f64),

    #[error("partial fills need probability in [0, 1] and min_fill_ratio in (0, 1]")]
    PartialFills,

    #[error(transparent)]
    Slippage(#[from] SlippageError),
}

/// Full execution configuration for one simulator run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub cost: CostModel,
    #[serde(default)]
    pub liquidity: Option<LiquidityPolicy>,
    #[serde(default)]
    pub partial_fills: Option<PartialFillConfig>,
}

impl ExecutionConfig {
    pub fn new(cost: CostModel) -> Self {
        Self {
            cost,
            liquidity: None,
            partial_fills: None,
        }
    }

    pub fn frictionless() -> Self {
        Self::default()
    }

    pub fn with_liquidity(mut self, policy: LiquidityPolicy) -> Self {
        self.liquidity = Some(policy);
        self
    }

    pub fn with_partial_fills(mut self, config: PartialFillConfig) -> Self {
        self.partial_fills = Some(config);
        self
    }

    pub fn validate(&self) -> Result<(), ExecutionConfigError> {
        if !self.cost.commission_rate_is_valid() {
            return Err(ExecutionConfigError::CommissionRate(self.cost.commission_rate));
        }
        self.cost.slippage.validate()?;
        if let Some(policy) = &self.liquidity {
            if !policy.is_valid() {
                return Err(ExecutionConfigError::Participation(policy.max_participation));
            }
        }
        if let Some(partial) = &self.partial_fills {
            if !partial.is_valid() {
                return Err(ExecutionConfigError::PartialFills);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_frictionless_and_valid() {
        let config = ExecutionConfig::frictionless();
        assert_eq!(config.cost.commission_rate, 0.0);
        assert_eq!(config.cost.slippage, SlippageModel::Fixed { bps: 0.0 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_catches_each_field() {
        let bad_commission = ExecutionConfig::new(CostModel::new(1.0, SlippageModel::default()));
        assert_eq!(
            bad_commission.validate(),
            Err(ExecutionConfigError::CommissionRate(1.0))
        );

        let bad_liquidity = ExecutionConfig::frictionless()
            .with_liquidity(LiquidityPolicy::new(2.0, RemainderPolicy::Carry));
        assert_eq!(
            bad_liquidity.validate(),
            Err(ExecutionConfigError::Participation(2.0))
        );

        let bad_partial =
            ExecutionConfig::frictionless().with_partial_fills(PartialFillConfig::new(0.5, 0.0, 1));
        assert_eq!(bad_partial.validate(), Err(ExecutionConfigError::PartialFills));

        let bad_slippage =
            ExecutionConfig::new(CostModel::new(0.0, SlippageModel::Fixed { bps: f64::NAN }));
        assert!(matches!(
            bad_slippage.validate(),
            Err(ExecutionConfigError::Slippage(_))
        ));
    }
}
