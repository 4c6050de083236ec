//! Objective metric: configurable selector for the report field an
//! optimizer scores candidates by.

use std::fmt;
use std::str::FromStr;

use crate::metrics::PerformanceReport;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown objective metric '{0}'")]
pub struct UnknownMetric(pub String);

/// Which report field to optimize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveMetric {
    TotalReturn,
    Cagr,
    AnnualizedVolatility,
    #[default]
    SharpeRatio,
    SortinoRatio,
    CalmarRatio,
    MaxDrawdown,
    WinRate,
    ProfitFactor,
    FinalEquity,
}

impl ObjectiveMetric {
    pub const ALL: [ObjectiveMetric; 10] = [
        Self::TotalReturn,
        Self::Cagr,
        Self::AnnualizedVolatility,
        Self::SharpeRatio,
        Self::SortinoRatio,
        Self::CalmarRatio,
        Self::MaxDrawdown,
        Self::WinRate,
        Self::ProfitFactor,
        Self::FinalEquity,
    ];

    /// Extract the relevant value from a report.
    pub fn extract(&self, report: &PerformanceReport) -> f64 {
        match self {
            Self::TotalReturn => report.total_return,
            Self::Cagr => report.cagr,
            Self::AnnualizedVolatility => report.annualized_volatility,
            Self::SharpeRatio => report.sharpe_ratio,
            Self::SortinoRatio => report.sortino_ratio,
            Self::CalmarRatio => report.calmar_ratio,
            Self::MaxDrawdown => report.max_drawdown,
            Self::WinRate => report.win_rate,
            Self::ProfitFactor => report.profit_factor,
            Self::FinalEquity => report.final_equity,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TotalReturn => "total_return",
            Self::Cagr => "cagr",
            Self::AnnualizedVolatility => "annualized_volatility",
            Self::SharpeRatio => "sharpe_ratio",
            Self::SortinoRatio => "sortino_ratio",
            Self::CalmarRatio => "calmar_ratio",
            Self::MaxDrawdown => "max_drawdown",
            Self::WinRate => "win_rate",
            Self::ProfitFactor => "profit_factor",
            Self::FinalEquity => "final_equity",
        }
    }

    /// The direction a caller would normally optimize this metric in.
    /// Drawdown and volatility are positive magnitudes, so smaller is better.
    pub fn natural_direction(&self) -> Direction {
        match self {
            Self::MaxDrawdown | Self::AnnualizedVolatility => Direction::Minimize,
            _ => Direction::Maximize,
        }
    }
}

impl fmt::Display for ObjectiveMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObjectiveMetric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let metric = match key.as_str() {
            "sharpe" => Self::SharpeRatio,
            "sortino" => Self::SortinoRatio,
            "calmar" => Self::CalmarRatio,
            "volatility" => Self::AnnualizedVolatility,
            other => Self::ALL
                .into_iter()
                .find(|m| m.name() == other)
                .ok_or_else(|| UnknownMetric(s.to_string()))?,
        };
        Ok(metric)
    }
}

/// Whether the optimizer seeks the largest or the smallest score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Maximize,
    Minimize,
}

impl Direction {
    /// Score assigned to failed candidates: never better than any finite score.
    pub fn worst(&self) -> f64 {
        match self {
            Self::Maximize => f64::NEG_INFINITY,
            Self::Minimize => f64::INFINITY,
        }
    }

    /// Returns true if `a` is strictly better than `b`.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        match self {
            Self::Maximize => a > b,
            Self::Minimize => a < b,
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "maximize" | "max" => Ok(Self::Maximize),
            "minimize" | "min" => Ok(Self::Minimize),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}
