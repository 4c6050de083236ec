//! TOML backtest configuration.
//!
//! ```toml
//! [backtest]
//! symbol = "SPY"
//! initial_capital = 100000.0
//! strategy = "ma_cross"
//!
//! [backtest.params]
//! fast = 10
//! slow = 30
//!
//! [execution]
//! commission_rate = 0.001
//! slippage = "fixed"
//! fixed_bps = 5.0
//!
//! [analyzer]
//! periods_per_year = 252
//!
//! [optimizer]
//! objective = "sharpe_ratio"
//! threads = 4
//! timeout_ms = 5000
//! seed = 42
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use backforge_core::engine::SimulationConfig;
use backforge_core::execution::{
    CostModel, ExecutionConfig, ExecutionConfigError, LiquidityPolicy, PartialFillConfig,
    SlippageError, SlippageModel,
};
use backforge_core::ParamSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::AnalyzerConfig;
use crate::objective::{Direction, ObjectiveMetric, UnknownMetric};
use crate::optimizer::{ParamSpace, SearchMethod, SearchSettings, SpaceError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("backtest.symbol must not be empty")]
    EmptySymbol,

    #[error("backtest.initial_capital must be positive and finite, got {0}")]
    InvalidCapital(f64),

    #[error("backtest.start ({start}) is after backtest.end ({end})")]
    InvertedRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error(transparent)]
    Slippage(#[from] SlippageError),

    #[error("execution: {0}")]
    Execution(#[from] ExecutionConfigError),

    #[error("analyzer.{field} must be {expected}, got {value}")]
    Analyzer {
        field: &'static str,
        expected: &'static str,
        value: f64,
    },

    #[error(transparent)]
    Objective(#[from] UnknownMetric),

    #[error("optimizer.threads must be at least 1")]
    ZeroThreads,

    #[error("optimizer.space: {0}")]
    Space(#[from] SpaceError),
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    #[serde(default)]
    pub execution: ExecutionSection,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub optimizer: OptimizerSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub symbol: String,
    pub initial_capital: f64,
    /// Registry name of the strategy to run.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default)]
    pub params: ParamSet,
    /// Inclusive bounds, RFC 3339.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

fn default_strategy() -> String {
    "buy_and_hold".into()
}

/// Flat, hand-editable view of [`ExecutionConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    pub commission_rate: f64,
    /// `fixed`, `variable` or `orderbook`.
    pub slippage: String,
    pub fixed_bps: f64,
    pub volatility_factor: f64,
    pub liquidity: Option<LiquidityPolicy>,
    pub partial_fills: Option<PartialFillConfig>,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            commission_rate: 0.0,
            slippage: "fixed".into(),
            fixed_bps: 0.0,
            volatility_factor: 0.0,
            liquidity: None,
            partial_fills: None,
        }
    }
}

impl ExecutionSection {
    pub fn slippage_model(&self) -> Result<SlippageModel, SlippageError> {
        let params = BTreeMap::from([
            ("fixed_bps".to_string(), self.fixed_bps),
            ("volatility_factor".to_string(), self.volatility_factor),
        ]);
        SlippageModel::from_name(&self.slippage, &params)
    }

    pub fn to_execution_config(&self) -> Result<ExecutionConfig, ConfigError> {
        let config = ExecutionConfig {
            cost: CostModel::new(self.commission_rate, self.slippage_model()?),
            liquidity: self.liquidity.clone(),
            partial_fills: self.partial_fills.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSection {
    /// Report field name, e.g. `total_return` or `sharpe_ratio`.
    pub objective: String,
    /// Defaults to the metric's natural direction.
    pub direction: Option<Direction>,
    /// Worker threads; `None` uses available parallelism.
    pub threads: Option<usize>,
    /// Per-candidate wall-clock budget.
    pub timeout_ms: Option<u64>,
    pub seed: u64,
    pub method: SearchMethod,
    /// Searched parameters. Fixed values from `backtest.params` fill in any
    /// parameter not listed here.
    pub space: ParamSpace,
}

impl Default for OptimizerSection {
    fn default() -> Self {
        Self {
            objective: ObjectiveMetric::default().name().into(),
            direction: None,
            threads: None,
            timeout_ms: None,
            seed: 42,
            method: SearchMethod::default(),
            space: ParamSpace::default(),
        }
    }
}

impl OptimizerSection {
    pub fn metric(&self) -> Result<ObjectiveMetric, UnknownMetric> {
        self.objective.parse()
    }

    pub fn search_settings(&self) -> Result<SearchSettings, ConfigError> {
        let metric = self.metric()?;
        if self.threads == Some(0) {
            return Err(ConfigError::ZeroThreads);
        }
        Ok(SearchSettings {
            direction: self.direction.unwrap_or_else(|| metric.natural_direction()),
            threads: self.threads,
            timeout: self.timeout_ms.map(Duration::from_millis),
            seed: self.seed,
        })
    }
}

impl BacktestConfig {
    /// Parse and validate.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Fail fast on anything that would otherwise surface mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bt = &self.backtest;
        if bt.symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        if !(bt.initial_capital.is_finite() && bt.initial_capital > 0.0) {
            return Err(ConfigError::InvalidCapital(bt.initial_capital));
        }
        if let (Some(start), Some(end)) = (bt.start, bt.end) {
            if start > end {
                return Err(ConfigError::InvertedRange { start, end });
            }
        }
        self.execution.to_execution_config()?;

        let ppy = self.analyzer.periods_per_year;
        if !(ppy.is_finite() && ppy > 0.0) {
            return Err(ConfigError::Analyzer {
                field: "periods_per_year",
                expected: "positive",
                value: ppy,
            });
        }
        if !self.analyzer.risk_free_rate.is_finite() {
            return Err(ConfigError::Analyzer {
                field: "risk_free_rate",
                expected: "finite",
                value: self.analyzer.risk_free_rate,
            });
        }
        self.optimizer.search_settings()?;
        if !self.optimizer.space.is_empty() {
            self.optimizer.space.validate()?;
        }
        Ok(())
    }

    pub fn simulation_config(&self) -> Result<SimulationConfig, ConfigError> {
        Ok(SimulationConfig::with_execution(
            self.backtest.initial_capital,
            self.execution.to_execution_config()?,
        ))
    }
}
