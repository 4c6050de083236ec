use super::params::ParamSet;
use super::registry::{param_f64, RegistryError};
use super::{PortfolioView, Strategy};
use crate::domain::{Bar, RawSignal};
use chrono::{DateTime, Utc};

const NAME: &str = "buy_and_hold";

/// Buys once on the first bar with `allocation` of cash and never sells.
#[derive(Debug, Clone)]
pub struct BuyAndHold {
    allocation: f64,
    entered: bool,
}

impl BuyAndHold {
    pub fn new(allocation: f64) -> Result<Self, RegistryError> {
        if !(allocation > 0.0 && allocation <= 1.0) {
            return Err(RegistryError::invalid(
                NAME,
                "allocation",
                format!("must be in (0, 1], got {allocation}"),
            ));
        }
        Ok(Self {
            allocation,
            entered: false,
        })
    }

    pub fn from_params(params: &ParamSet) -> Result<Self, RegistryError> {
        Self::new(param_f64(NAME, params, "allocation", 0.95)?)
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        NAME
    }

    fn on_bar(
        &mut self,
        _timestamp: DateTime<Utc>,
        bar: &Bar,
        portfolio: &PortfolioView<'_>,
    ) -> Vec<RawSignal> {
        if self.entered {
            return Vec::new();
        }
        self.entered = true;
        vec![RawSignal::market_buy_amount(
            &bar.symbol,
            portfolio.cash() * self.allocation,
        )]
    }
}
