//! Performance analyzer: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity values and/or trades in, scalar
//! out. Any division by zero or empty input yields 0.0, so a run without
//! trades and with flat equity reports 0.0 for every ratio.

use backforge_core::domain::{EquityPoint, Trade};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cap for profit factor when there are no losing trades.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

/// Annualization and risk-free settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Bars per year: 252 for daily equities, 365 for daily crypto, etc.
    pub periods_per_year: f64,
    /// Annual risk-free rate as a fraction.
    pub risk_free_rate: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 252.0,
            risk_free_rate: 0.0,
        }
    }
}

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub total_return: f64,
    pub cagr: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    /// Largest peak-to-trough decline as a positive fraction.
    pub max_drawdown: f64,
    /// Longest run of consecutive bars below a prior peak.
    pub max_drawdown_duration: usize,
    pub max_drawdown_start: Option<DateTime<Utc>>,
    pub max_drawdown_end: Option<DateTime<Utc>>,
    pub win_rate: f64,
    /// Number of closing trades.
    pub trade_count: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub profit_factor: f64,
    pub total_commission: f64,
    pub final_equity: f64,
}

impl PerformanceReport {
    /// Compute the report with the last equity point as the closing value.
    /// Inputs are never modified.
    pub fn compute(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        config: &AnalyzerConfig,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map_or(initial_capital, |p| p.equity);
        Self::compute_settled(trades, equity_curve, initial_capital, final_equity, config)
    }

    /// Compute the report against an explicit closing equity.
    ///
    /// Equity points are marked before a bar's orders execute, so fills and
    /// commission on the final bar only show up in the settled portfolio.
    /// `final_equity` drives total return and CAGR; the curve drives the
    /// per-period statistics and drawdown.
    pub fn compute_settled(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        final_equity: f64,
        config: &AnalyzerConfig,
    ) -> Self {
        let equity: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        let returns = period_returns(&equity);
        let dd = drawdown_stats(equity_curve);
        let cagr = cagr(initial_capital, final_equity, returns.len(), config.periods_per_year);

        let closing: Vec<f64> = trades.iter().filter_map(|t| t.realized_pnl).collect();
        let winning_trades = closing.iter().filter(|&&pnl| pnl > 0.0).count();

        Self {
            total_return: total_return(initial_capital, final_equity),
            cagr,
            annualized_volatility: annualized_volatility(&returns, config.periods_per_year),
            sharpe_ratio: sharpe_ratio(&returns, config),
            sortino_ratio: sortino_ratio(&returns, config),
            calmar_ratio: calmar_ratio(cagr, dd.max_drawdown),
            max_drawdown: dd.max_drawdown,
            max_drawdown_duration: dd.max_duration,
            max_drawdown_start: dd.peak_at,
            max_drawdown_end: dd.trough_at,
            win_rate: win_rate(&closing),
            trade_count: closing.len(),
            winning_trades,
            losing_trades: closing.len() - winning_trades,
            profit_factor: profit_factor(&closing),
            total_commission: trades.iter().map(|t| t.commission).sum(),
            final_equity,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: `(final - initial) / initial`.
pub fn total_return(initial: f64, final_equity: f64) -> f64 {
    if initial <= 0.0 {
        return 0.0;
    }
    (final_equity - initial) / initial
}

/// Compound annual growth rate over `periods` return periods.
///
/// Returns 0.0 for zero periods or non-positive equity at either end.
pub fn cagr(initial: f64, final_equity: f64, periods: usize, periods_per_year: f64) -> f64 {
    if periods == 0 || initial <= 0.0 || final_equity <= 0.0 || periods_per_year <= 0.0 {
        return 0.0;
    }
    let value = (final_equity / initial).powf(periods_per_year / periods as f64) - 1.0;
    finite_or_zero(value)
}

/// `stdev(returns) × sqrt(periods_per_year)`.
pub fn annualized_volatility(returns: &[f64], periods_per_year: f64) -> f64 {
    finite_or_zero(std_dev(returns) * periods_per_year.max(0.0).sqrt())
}

/// Annualized Sharpe ratio.
///
/// Sharpe = mean(r - rf/ppy) / std(r) × sqrt(ppy).
/// Returns 0.0 if the standard deviation is zero.
pub fn sharpe_ratio(returns: &[f64], config: &AnalyzerConfig) -> f64 {
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    let mean = mean_f64(&excess_returns(returns, config));
    finite_or_zero(mean / std * config.periods_per_year.max(0.0).sqrt())
}

/// Annualized Sortino ratio (downside deviation only).
///
/// The denominator is the root-mean-square of the negative excess returns.
/// Returns 0.0 when there are none.
pub fn sortino_ratio(returns: &[f64], config: &AnalyzerConfig) -> f64 {
    let excess = excess_returns(returns, config);
    let downside: Vec<f64> = excess.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.is_empty() {
        return 0.0;
    }
    let downside_dev = (downside.iter().map(|r| r * r).sum::<f64>() / downside.len() as f64).sqrt();
    if downside_dev < 1e-15 {
        return 0.0;
    }
    finite_or_zero(mean_f64(&excess) / downside_dev * config.periods_per_year.max(0.0).sqrt())
}

/// Calmar ratio: `CAGR / |max_drawdown|`. Returns 0.0 if drawdown is zero.
pub fn calmar_ratio(cagr: f64, max_drawdown: f64) -> f64 {
    if max_drawdown.abs() < 1e-15 {
        return 0.0;
    }
    finite_or_zero(cagr / max_drawdown.abs())
}

/// Drawdown summary of an equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DrawdownStats {
    /// Largest decline from a running peak, as a positive fraction.
    pub max_drawdown: f64,
    /// Timestamp of the peak preceding the largest decline.
    pub peak_at: Option<DateTime<Utc>>,
    /// Timestamp of the trough of the largest decline.
    pub trough_at: Option<DateTime<Utc>>,
    /// Longest run of consecutive points strictly below the running peak.
    pub max_duration: usize,
}

pub fn drawdown_stats(equity_curve: &[EquityPoint]) -> DrawdownStats {
    let mut stats = DrawdownStats::default();
    let Some(first) = equity_curve.first() else {
        return stats;
    };
    let mut peak = first.equity;
    let mut peak_at = first.timestamp;
    let mut underwater = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            peak_at = point.timestamp;
            underwater = 0;
            continue;
        }
        underwater += 1;
        stats.max_duration = stats.max_duration.max(underwater);
        if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            if dd > stats.max_drawdown {
                stats.max_drawdown = dd;
                stats.peak_at = Some(peak_at);
                stats.trough_at = Some(point.timestamp);
            }
        }
    }
    stats
}

/// Fraction of closing trades with positive P&L.
pub fn win_rate(closing_pnls: &[f64]) -> f64 {
    if closing_pnls.is_empty() {
        return 0.0;
    }
    let winners = closing_pnls.iter().filter(|&&p| p > 0.0).count();
    winners as f64 / closing_pnls.len() as f64
}

/// Gross profit / gross loss, capped at [`PROFIT_FACTOR_CAP`].
pub fn profit_factor(closing_pnls: &[f64]) -> f64 {
    if closing_pnls.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = closing_pnls.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = closing_pnls
        .iter()
        .filter(|&&p| p < 0.0)
        .map(|p| p.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { PROFIT_FACTOR_CAP } else { 0.0 };
    }
    (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Percentage change between consecutive equity values. A non-positive
/// base contributes a 0.0 return.
pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    if equity.len() < 2 {
        return Vec::new();
    }
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn excess_returns(returns: &[f64], config: &AnalyzerConfig) -> Vec<f64> {
    let rf = if config.periods_per_year > 0.0 {
        config.risk_free_rate / config.periods_per_year
    } else {
        0.0
    };
    returns.iter().map(|r| r - rf).collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}
