//! Strategy registry: name → factory taking a [`ParamSet`].
//!
//! Each optimizer candidate gets a freshly built strategy, so factories must
//! be cheap and thread-safe.

use super::params::{ParamSet, ParamValue};
use super::{BuyAndHold, MovingAverageCross, Strategy};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error("strategy '{strategy}': parameter '{param}' {reason}")]
    InvalidParam {
        strategy: String,
        param: String,
        reason: String,
    },
}

impl RegistryError {
    pub fn invalid(strategy: &str, param: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            strategy: strategy.to_string(),
            param: param.to_string(),
            reason: reason.into(),
        }
    }
}

pub type StrategyFactory =
    Arc<dyn Fn(&ParamSet) -> Result<Box<dyn Strategy>, RegistryError> + Send + Sync>;

// ─── Registry ────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with `ma_cross` and `buy_and_hold`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("ma_cross", |params| {
            Ok(Box::new(MovingAverageCross::from_params(params)?) as Box<dyn Strategy>)
        });
        registry.register("buy_and_hold", |params| {
            Ok(Box::new(BuyAndHold::from_params(params)?) as Box<dyn Strategy>)
        });
        registry
    }

    /// Register (or replace) a factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&ParamSet) -> Result<Box<dyn Strategy>, RegistryError> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn create(&self, name: &str, params: &ParamSet) -> Result<Box<dyn Strategy>, RegistryError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| RegistryError::UnknownStrategy(name.to_string()))?;
        factory(params)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

// ─── Parameter helpers ───────────────────────────────────────────────

/// Positive integer parameter, `default` when absent.
pub fn param_usize(
    strategy: &str,
    params: &ParamSet,
    name: &str,
    default: usize,
) -> Result<usize, RegistryError> {
    match params.get(name) {
        None => Ok(default),
        Some(value) => value
            .as_i64()
            .filter(|v| *v > 0)
            .map(|v| v as usize)
            .ok_or_else(|| RegistryError::invalid(strategy, name, format!("must be a positive integer, got {value}"))),
    }
}

/// Finite float parameter, `default` when absent.
pub fn param_f64(
    strategy: &str,
    params: &ParamSet,
    name: &str,
    default: f64,
) -> Result<f64, RegistryError> {
    match params.get(name) {
        None => Ok(default),
        Some(value) => value
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| RegistryError::invalid(strategy, name, format!("must be a number, got {value}"))),
    }
}

/// Choice parameter, `default` when absent.
pub fn param_choice<'a>(
    strategy: &str,
    params: &'a ParamSet,
    name: &str,
    default: &'a str,
) -> Result<&'a str, RegistryError> {
    match params.get(name) {
        None => Ok(default),
        Some(ParamValue::Choice(s)) => Ok(s),
        Some(other) => Err(RegistryError::invalid(
            strategy,
            name,
            format!("must be a choice, got {other}"),
        )),
    }
}
