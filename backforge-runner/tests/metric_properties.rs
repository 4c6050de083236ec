//! Property tests for the analyzer and the grid enumeration.

use backforge_core::domain::EquityPoint;
use backforge_runner::metrics::{AnalyzerConfig, PerformanceReport, PROFIT_FACTOR_CAP};
use backforge_runner::{ParamDomain, ParamSpace};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

fn curve(values: &[f64]) -> Vec<EquityPoint> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, &equity)| EquityPoint {
            timestamp: start + Duration::days(i as i64),
            equity,
            cash: equity,
        })
        .collect()
}

// ── Degenerate inputs ────────────────────────────────────────────────

proptest! {
    /// A flat curve with no trades reports zero for every ratio.
    #[test]
    fn trade_less_run_has_zero_ratios(capital in 1.0..1e7_f64, n in 0usize..300) {
        let report = PerformanceReport::compute(
            &[],
            &curve(&vec![capital; n]),
            capital,
            &AnalyzerConfig::default(),
        );
        prop_assert_eq!(report.total_return, 0.0);
        prop_assert_eq!(report.cagr, 0.0);
        prop_assert_eq!(report.annualized_volatility, 0.0);
        prop_assert_eq!(report.sharpe_ratio, 0.0);
        prop_assert_eq!(report.sortino_ratio, 0.0);
        prop_assert_eq!(report.calmar_ratio, 0.0);
        prop_assert_eq!(report.max_drawdown, 0.0);
        prop_assert_eq!(report.win_rate, 0.0);
        prop_assert_eq!(report.profit_factor, 0.0);
        prop_assert_eq!(report.trade_count, 0);
        prop_assert_eq!(report.final_equity, capital);
    }
}

proptest! {
    /// Any positive curve produces finite, bounded metrics.
    #[test]
    fn metrics_are_finite_and_bounded(
        values in prop::collection::vec(0.01..1e6_f64, 1..200),
        ppy in 1.0..400.0_f64,
        rf in -0.05..0.1_f64,
    ) {
        let config = AnalyzerConfig { periods_per_year: ppy, risk_free_rate: rf };
        let report = PerformanceReport::compute(&[], &curve(&values), values[0], &config);
        for v in [
            report.total_return,
            report.cagr,
            report.annualized_volatility,
            report.sharpe_ratio,
            report.sortino_ratio,
            report.calmar_ratio,
        ] {
            prop_assert!(v.is_finite());
        }
        prop_assert!((0.0..=1.0).contains(&report.max_drawdown));
        prop_assert!(report.max_drawdown_duration < values.len());
        prop_assert!(report.profit_factor <= PROFIT_FACTOR_CAP);
        prop_assert_eq!(report.final_equity, *values.last().unwrap());
    }
}

// ── Grid enumeration ─────────────────────────────────────────────────

proptest! {
    /// The grid holds exactly the product of per-parameter option counts,
    /// with no duplicates.
    #[test]
    fn grid_size_is_product_of_options(
        a in 1i64..6,
        b in 1usize..5,
        c in 0i64..4,
    ) {
        let labels: Vec<String> = (0..b).map(|i| format!("v{i}")).collect();
        let space = ParamSpace::new()
            .with("a", ParamDomain::int_range(0, a - 1))
            .with("b", ParamDomain::discrete(labels.iter().map(String::as_str)))
            .with("c", ParamDomain::int_range(10, 10 + c));
        let grid = space.grid().unwrap();
        let expected = a as usize * b * (c as usize + 1);
        prop_assert_eq!(grid.len(), expected);
        prop_assert_eq!(space.grid_size().unwrap(), expected);
        let mut unique = grid.clone();
        unique.sort_by_key(|p| format!("{p:?}"));
        unique.dedup();
        prop_assert_eq!(unique.len(), expected);
    }
}
