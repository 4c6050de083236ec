//! Backtest orchestrator: wires a bar source, a strategy, the simulator and
//! the analyzer into one run.
//!
//! Two entry points:
//! - [`Backtester::run`]: loads bars, builds the strategy from the registry,
//!   runs. Failures come back inside the `RunResult`.
//! - [`BacktestObjective`]: loads bars once and scores parameter sets for
//!   the optimizer.

use std::sync::Arc;

use backforge_core::data::{BarSource, DataError};
use backforge_core::domain::{Bar, EquityPoint, Order, Portfolio, Trade};
use backforge_core::engine::{Deadline, Diagnostic, SimulationConfig, SimulationError};
use backforge_core::execution::OrderBookFeed;
use backforge_core::strategy::{format_params, RegistryError};
use backforge_core::{MarketSimulator, ParamSet, Strategy, StrategyRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{BacktestConfig, ConfigError};
use crate::metrics::{AnalyzerConfig, PerformanceReport};
use crate::objective::ObjectiveMetric;
use crate::optimizer::{EvalContext, Objective, SearchError, SearchOutcome};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("no bars for '{symbol}' in the requested range")]
    EmptySeries { symbol: String },
    #[error("strategy error: {0}")]
    Strategy(#[from] RegistryError),
    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
    #[error("search error: {0}")]
    Search(#[from] SearchError),
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub error: Option<String>,
    pub symbol: String,
    pub strategy: String,
    pub params: ParamSet,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub performance_report: PerformanceReport,
    /// `None` when the run failed before the simulator finished.
    pub final_portfolio: Option<Portfolio>,
    pub diagnostics: Vec<Diagnostic>,
    pub orders: Vec<Order>,
    pub bar_count: usize,
}

impl RunResult {
    fn failure(symbol: &str, strategy: &str, params: &ParamSet, error: &RunError) -> Self {
        warn!(symbol, strategy, error = %error, "backtest failed");
        Self {
            success: false,
            error: Some(error.to_string()),
            symbol: symbol.to_string(),
            strategy: strategy.to_string(),
            params: params.clone(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            performance_report: PerformanceReport::default(),
            final_portfolio: None,
            diagnostics: Vec::new(),
            orders: Vec::new(),
            bar_count: 0,
        }
    }
}

/// One symbol, one date range, one execution setup. Cheap to clone: the bar
/// source and registry are shared.
#[derive(Clone)]
pub struct Backtester {
    source: Arc<dyn BarSource>,
    registry: StrategyRegistry,
    symbol: String,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    simulation: SimulationConfig,
    analyzer: AnalyzerConfig,
    order_books: Option<Arc<OrderBookFeed>>,
}

impl std::fmt::Debug for Backtester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backtester")
            .field("symbol", &self.symbol)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("simulation", &self.simulation)
            .field("analyzer", &self.analyzer)
            .finish_non_exhaustive()
    }
}

impl Backtester {
    pub fn new(source: Arc<dyn BarSource>, symbol: &str, simulation: SimulationConfig) -> Self {
        Self {
            source,
            registry: StrategyRegistry::with_builtins(),
            symbol: symbol.to_string(),
            start: None,
            end: None,
            simulation,
            analyzer: AnalyzerConfig::default(),
            order_books: None,
        }
    }

    pub fn from_config(config: &BacktestConfig, source: Arc<dyn BarSource>) -> Result<Self, RunError> {
        config.validate()?;
        Ok(Self::new(source, &config.backtest.symbol, config.simulation_config()?)
            .with_range(config.backtest.start, config.backtest.end)
            .with_analyzer(config.analyzer.clone()))
    }

    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_analyzer(mut self, analyzer: AnalyzerConfig) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_range(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_order_books(mut self, books: Arc<OrderBookFeed>) -> Self {
        self.order_books = Some(books);
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Load the configured range. An empty series is an error.
    pub fn load_bars(&self) -> Result<Vec<Bar>, RunError> {
        let bars = self.source.load(&self.symbol, self.start, self.end)?;
        if bars.is_empty() {
            return Err(RunError::EmptySeries {
                symbol: self.symbol.clone(),
            });
        }
        Ok(bars)
    }

    /// Load bars, build `strategy` from the registry with `params`, and run.
    pub fn run(&self, strategy: &str, params: &ParamSet) -> RunResult {
        let bars = match self.load_bars() {
            Ok(bars) => bars,
            Err(e) => return RunResult::failure(&self.symbol, strategy, params, &e),
        };
        self.run_on(&bars, strategy, params, Deadline::none())
    }

    /// Run a registry strategy over already-loaded bars.
    pub fn run_on(&self, bars: &[Bar], strategy: &str, params: &ParamSet, deadline: Deadline) -> RunResult {
        match self.registry.create(strategy, params) {
            Ok(mut instance) => self.run_strategy(bars, instance.as_mut(), params, deadline),
            Err(e) => RunResult::failure(&self.symbol, strategy, params, &e.into()),
        }
    }

    /// Run a caller-built strategy over already-loaded bars.
    pub fn run_strategy(
        &self,
        bars: &[Bar],
        strategy: &mut dyn Strategy,
        params: &ParamSet,
        deadline: Deadline,
    ) -> RunResult {
        let name = strategy.name().to_string();
        match self.simulate(bars, strategy, deadline) {
            Ok(result) => RunResult {
                params: params.clone(),
                ..result
            },
            Err(e) => RunResult::failure(&self.symbol, &name, params, &e),
        }
    }

    fn simulate(
        &self,
        bars: &[Bar],
        strategy: &mut dyn Strategy,
        deadline: Deadline,
    ) -> Result<RunResult, RunError> {
        if bars.is_empty() {
            return Err(RunError::EmptySeries {
                symbol: self.symbol.clone(),
            });
        }
        info!(
            symbol = %self.symbol,
            strategy = strategy.name(),
            bars = bars.len(),
            "backtest started"
        );

        let mut simulator = MarketSimulator::new(self.simulation.clone())?.with_deadline(deadline);
        if let Some(books) = &self.order_books {
            simulator = simulator.with_order_books(Arc::clone(books));
        }
        let output = simulator.run(bars, strategy)?;
        let report = PerformanceReport::compute_settled(
            &output.trades,
            &output.equity_curve,
            self.simulation.initial_capital,
            output.final_equity(),
            &self.analyzer,
        );
        info!(
            symbol = %self.symbol,
            trades = output.trades.len(),
            final_equity = report.final_equity,
            total_return = report.total_return,
            "backtest complete"
        );

        Ok(RunResult {
            success: true,
            error: None,
            symbol: self.symbol.clone(),
            strategy: strategy.name().to_string(),
            params: ParamSet::new(),
            trades: output.trades,
            equity_curve: output.equity_curve,
            performance_report: report,
            final_portfolio: Some(output.final_portfolio),
            diagnostics: output.diagnostics,
            orders: output.orders,
            bar_count: output.bar_count,
        })
    }
}

/// Adapts the orchestrator into an optimizer objective: each evaluation
/// builds a fresh strategy from the candidate parameters and reads
/// `metric` from the report. Bars are loaded once up front.
#[derive(Debug, Clone)]
pub struct BacktestObjective {
    backtester: Backtester,
    strategy: String,
    metric: ObjectiveMetric,
    bars: Arc<Vec<Bar>>,
    base_params: ParamSet,
}

impl BacktestObjective {
    pub fn new(backtester: Backtester, strategy: &str, metric: ObjectiveMetric) -> Result<Self, RunError> {
        if !backtester.registry().contains(strategy) {
            return Err(RegistryError::UnknownStrategy(strategy.to_string()).into());
        }
        let bars = Arc::new(backtester.load_bars()?);
        Ok(Self {
            backtester,
            strategy: strategy.to_string(),
            metric,
            bars,
            base_params: ParamSet::new(),
        })
    }

    /// Fixed parameters applied under every candidate. Candidate values win.
    pub fn with_base_params(mut self, params: ParamSet) -> Self {
        self.base_params = params;
        self
    }

    fn merged(&self, params: &ParamSet) -> ParamSet {
        let mut merged = self.base_params.clone();
        merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    pub fn metric(&self) -> ObjectiveMetric {
        self.metric
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    /// Full result for one parameter set, e.g. to re-run the winner.
    pub fn run(&self, params: &ParamSet) -> RunResult {
        self.backtester
            .run_on(&self.bars, &self.strategy, &self.merged(params), Deadline::none())
    }
}

impl Objective for BacktestObjective {
    fn evaluate(&self, params: &ParamSet, ctx: &EvalContext) -> anyhow::Result<f64> {
        let result = self
            .backtester
            .run_on(&self.bars, &self.strategy, &self.merged(params), ctx.deadline);
        if !result.success {
            anyhow::bail!(
                "{} [{}]: {}",
                self.strategy,
                format_params(params),
                result.error.unwrap_or_default()
            );
        }
        Ok(self.metric.extract(&result.performance_report))
    }
}

/// Outcome of a configuration-driven search plus the full re-run of the
/// winning parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub method: String,
    pub metric: ObjectiveMetric,
    pub outcome: SearchOutcome,
    /// `None` when every candidate failed.
    pub best_run: Option<RunResult>,
}

/// Run the search described by `config.optimizer` over `config.backtest`.
pub fn optimize(
    config: &BacktestConfig,
    source: Arc<dyn BarSource>,
) -> Result<OptimizationReport, RunError> {
    let backtester = Backtester::from_config(config, source)?;
    let metric = config.optimizer.metric().map_err(ConfigError::from)?;
    let settings = config.optimizer.search_settings()?;
    let objective = Arc::new(
        BacktestObjective::new(backtester, &config.backtest.strategy, metric)?
            .with_base_params(config.backtest.params.clone()),
    );

    let optimizer = config.optimizer.method.build();
    info!(
        method = optimizer.name(),
        metric = %metric,
        strategy = %config.backtest.strategy,
        bars = objective.bar_count(),
        "optimization started"
    );
    let outcome = optimizer.search(&config.optimizer.space, objective.clone(), &settings)?;
    let best_run = outcome.best_params.as_ref().map(|p| objective.run(p));
    Ok(OptimizationReport {
        method: optimizer.name().to_string(),
        metric,
        outcome,
        best_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use backforge_core::data::InMemoryBarSource;
    use backforge_core::ParamValue;
    use chrono::{Duration, TimeZone};

    fn bars(n: usize) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                Bar {
                    symbol: "SPY".into(),
                    timestamp: start + Duration::days(i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect()
    }

    fn backtester(n: usize) -> Backtester {
        let source = InMemoryBarSource::new().with_series("SPY", bars(n)).unwrap();
        Backtester::new(Arc::new(source), "SPY", SimulationConfig::new(10_000.0))
    }

    #[test]
    fn buy_and_hold_on_rising_series_succeeds() {
        let result = backtester(20).run("buy_and_hold", &ParamSet::new());
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.bar_count, 20);
        assert_eq!(result.equity_curve.len(), 20);
        assert!(result.performance_report.total_return > 0.0);
        assert!(result.final_portfolio.is_some());
    }

    #[test]
    fn missing_symbol_is_unsuccessful_run() {
        let source = InMemoryBarSource::new();
        let bt = Backtester::new(Arc::new(source), "NOPE", SimulationConfig::new(1.0));
        let result = bt.run("buy_and_hold", &ParamSet::new());
        assert!(!result.success);
        assert!(result.error.unwrap().contains("NOPE"));
        assert!(result.equity_curve.is_empty());
        assert!(result.final_portfolio.is_none());
    }

    #[test]
    fn empty_range_is_unsuccessful_run() {
        let far = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let result = backtester(5)
            .with_range(Some(far), None)
            .run("buy_and_hold", &ParamSet::new());
        assert!(!result.success);
        assert!(result.equity_curve.is_empty());
    }

    #[test]
    fn unknown_strategy_is_unsuccessful_run() {
        let result = backtester(5).run("moon", &ParamSet::new());
        assert!(!result.success);
        assert!(result.error.unwrap().contains("moon"));
    }

    #[test]
    fn objective_reads_configured_metric() {
        let objective =
            BacktestObjective::new(backtester(30), "buy_and_hold", ObjectiveMetric::TotalReturn).unwrap();
        let ctx = EvalContext {
            candidate: 0,
            deadline: Deadline::none(),
        };
        let score = objective.evaluate(&ParamSet::new(), &ctx).unwrap();
        let full = objective.run(&ParamSet::new());
        assert_eq!(score, full.performance_report.total_return);
    }

    #[test]
    fn expired_deadline_fails_candidate() {
        let objective =
            BacktestObjective::new(backtester(30), "buy_and_hold", ObjectiveMetric::TotalReturn).unwrap();
        let ctx = EvalContext {
            candidate: 0,
            deadline: Deadline::at(std::time::Instant::now()),
        };
        std::thread::sleep(std::time::Duration::from_millis(1));
        let err = objective.evaluate(&ParamSet::new(), &ctx).unwrap_err();
        assert!(err.to_string().contains("deadline"));
    }

    #[test]
    fn objective_rejects_unknown_strategy_up_front() {
        let err = BacktestObjective::new(backtester(5), "moon", ObjectiveMetric::SharpeRatio).unwrap_err();
        assert!(matches!(err, RunError::Strategy(RegistryError::UnknownStrategy(_))));
    }
    #[test]
    fn base_params_fill_unlisted_candidates() {
        let objective = BacktestObjective::new(backtester(40), "ma_cross", ObjectiveMetric::TotalReturn)
            .unwrap()
            .with_base_params(ParamSet::from([("slow_period".to_string(), ParamValue::Int(12))]));
        let candidate = ParamSet::from([("fast_period".to_string(), ParamValue::Int(3))]);
        let result = objective.run(&candidate);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.params["slow_period"], ParamValue::Int(12));
        assert_eq!(result.params["fast_period"], ParamValue::Int(3));
    }

    #[test]
    fn optimize_from_config_reruns_best() {
        let config = BacktestConfig::from_toml_str(
            r#"
            [backtest]
            symbol = "SPY"
            initial_capital = 10000.0
            strategy = "ma_cross"
            params = { slow_period = 10 }

            [optimizer]
            objective = "total_return"
            threads = 2

            [optimizer.method]
            kind = "grid"

            [optimizer.space]
            fast_period = { kind = "int_range", min = 2, max = 5 }
            "#,
        )
        .unwrap();
        let source = InMemoryBarSource::new().with_series("SPY", bars(40)).unwrap();
        let report = optimize(&config, Arc::new(source)).unwrap();
        assert_eq!(report.method, "grid");
        assert_eq!(report.metric, ObjectiveMetric::TotalReturn);
        assert_eq!(report.outcome.trace.len(), 4);
        let best = report.best_run.unwrap();
        assert!(best.success);
        assert_eq!(best.performance_report.total_return, report.outcome.best_score);
        assert_eq!(best.params["slow_period"], ParamValue::Int(10));
    }
}
