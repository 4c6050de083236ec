//! Backforge Runner: backtest orchestration, performance analysis and
//! parameter search.
//!
//! This crate builds on `backforge-core` to provide:
//! - Single-backtest runner that wires data, strategy, simulator and analyzer
//! - Performance analyzer (returns, risk ratios, drawdown, trade statistics)
//! - Objective metric selection with explicit optimization direction
//! - Grid, random, genetic and surrogate-model (TPE) search over a parameter
//!   space, evaluated on a bounded worker pool with per-candidate timeouts
//! - TOML configuration and structured logging setup

pub mod config;
pub mod metrics;
pub mod objective;
pub mod optimizer;
pub mod runner;
pub mod telemetry;

pub use config::{BacktestConfig, ConfigError};
pub use metrics::{AnalyzerConfig, PerformanceReport};
pub use objective::{Direction, ObjectiveMetric};
pub use optimizer::{
    EvalContext, GeneticConfig, Objective, Optimizer, ParamDomain, ParamSpace, SearchError,
    SearchMethod, SearchOutcome, SearchSettings, SearchTrace,
};
pub use runner::{optimize, BacktestObjective, Backtester, OptimizationReport, RunError, RunResult};
pub use telemetry::{init_logging, LogFormat};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn performance_report_is_send_sync() {
        assert_send::<PerformanceReport>();
        assert_sync::<PerformanceReport>();
    }

    #[test]
    fn run_result_is_send_sync() {
        assert_send::<RunResult>();
        assert_sync::<RunResult>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
        assert_send::<AnalyzerConfig>();
        assert_sync::<AnalyzerConfig>();
    }

    #[test]
    fn objective_metric_is_send_sync() {
        assert_send::<ObjectiveMetric>();
        assert_sync::<ObjectiveMetric>();
    }

    // ── Search types ──

    #[test]
    fn search_settings_is_send_sync() {
        assert_send::<SearchSettings>();
        assert_sync::<SearchSettings>();
    }

    #[test]
    fn search_trace_is_send_sync() {
        assert_send::<SearchTrace>();
        assert_sync::<SearchTrace>();
    }

    #[test]
    fn param_space_is_send_sync() {
        assert_send::<ParamSpace>();
        assert_sync::<ParamSpace>();
    }

    #[test]
    fn genetic_config_is_send_sync() {
        assert_send::<GeneticConfig>();
        assert_sync::<GeneticConfig>();
    }

    #[test]
    fn backtester_is_send_sync() {
        assert_send::<Backtester>();
        assert_sync::<Backtester>();
    }

    #[test]
    fn backtest_objective_is_send_sync() {
        assert_send::<BacktestObjective>();
        assert_sync::<BacktestObjective>();
    }
}
