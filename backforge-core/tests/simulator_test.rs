//! Integration tests for the market simulator: fills, pricing, order
//! lifecycle and the optional execution features.

use backforge_core::domain::{Bar, OrderSide, OrderStatus, RawSignal};
use backforge_core::engine::{
    DiagnosticKind, MarketSimulator, SimulationConfig, SimulationError, SimulationOutput,
};
use backforge_core::execution::{
    BookLevel, BookSnapshot, CostModel, ExecutionConfig, LiquidityPolicy, OrderBookFeed,
    ExecutionConfigError, PartialFillConfig, RemainderPolicy, SlippageError, SlippageModel,
};
use backforge_core::strategy::ScriptedStrategy;
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

// ── Helpers ──────────────────────────────────────────────────────────

const SYM: &str = "BTC-USD";

fn make_bars(ohlc: &[(f64, f64, f64, f64)], volume: f64) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    ohlc.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            symbol: SYM.into(),
            timestamp: start + Duration::days(i as i64),
            open,
            high,
            low,
            close,
            volume,
        })
        .collect()
}

fn three_bars() -> Vec<Bar> {
    make_bars(
        &[
            (100.0, 105.0, 99.0, 102.0),
            (102.0, 104.0, 100.0, 103.0),
            (103.0, 106.0, 101.0, 105.0),
        ],
        1_000.0,
    )
}

fn flat_bars(n: usize, price: f64, volume: f64) -> Vec<Bar> {
    make_bars(&vec![(price, price, price, price); n], volume)
}

fn run_with(config: SimulationConfig, bars: &[Bar], mut strategy: ScriptedStrategy) -> SimulationOutput {
    MarketSimulator::new(config)
        .unwrap()
        .run(bars, &mut strategy)
        .unwrap()
}

fn run(bars: &[Bar], strategy: ScriptedStrategy) -> SimulationOutput {
    run_with(SimulationConfig::new(1_000.0), bars, strategy)
}

fn diagnostics_of(out: &SimulationOutput, kind: DiagnosticKind) -> usize {
    out.diagnostics.iter().filter(|d| d.kind == kind).count()
}

// ── Reference scenario ───────────────────────────────────────────────

#[test]
fn buy_then_sell_realizes_three() {
    let strategy = ScriptedStrategy::new()
        .at(0, RawSignal::market_buy(SYM, 1.0))
        .at(2, RawSignal::market_sell(SYM, 1.0));
    let out = run(&three_bars(), strategy);

    assert_eq!(out.trades.len(), 2);
    assert_eq!(out.trades[0].side, OrderSide::Buy);
    assert_eq!(out.trades[0].execution_price, 102.0);
    assert_eq!(out.trades[0].realized_pnl, None);
    assert_eq!(out.trades[1].execution_price, 105.0);
    assert!((out.trades[1].realized_pnl.unwrap() - 3.0).abs() < 1e-12);

    assert_eq!(out.equity_curve.len(), 3);
    assert_eq!(out.equity_curve[0].equity, 1_000.0);
    assert_eq!(out.equity_curve[1].equity, 1_001.0);
    assert_eq!(out.equity_curve[1].cash, 898.0);
    assert_eq!(out.final_portfolio.cash, 1_003.0);
    assert_eq!(out.final_equity(), 1_003.0);
    assert!(out.final_portfolio.positions.is_empty());
    assert!(out.orders.iter().all(|o| o.status == OrderStatus::Filled));
}

#[test]
fn fixed_slippage_and_commission() {
    let execution = ExecutionConfig::new(CostModel::new(0.001, SlippageModel::Fixed { bps: 10.0 }));
    let strategy = ScriptedStrategy::new().at(0, RawSignal::market_buy(SYM, 2.0));
    let out = run_with(
        SimulationConfig::with_execution(1_000.0, execution),
        &three_bars(),
        strategy,
    );

    let t = &out.trades[0];
    let price = 102.0 * 1.001;
    assert!((t.execution_price - price).abs() < 1e-9);
    assert!((t.commission - 2.0 * price * 0.001).abs() < 1e-9);
    let order = &out.orders[0];
    assert!((order.accumulated_fee - t.commission).abs() < 1e-12);
    assert!((order.average_fill_price().unwrap() - price).abs() < 1e-9);
    assert!((out.final_portfolio.cash - (1_000.0 - 2.0 * price - t.commission)).abs() < 1e-9);
}

#[test]
fn slippage_that_would_zero_a_sell_is_refused() {
    let execution = ExecutionConfig::new(CostModel::new(0.0, SlippageModel::Fixed { bps: 20_000.0 }));
    let err = MarketSimulator::new(SimulationConfig::with_execution(1_000.0, execution)).err();
    assert!(matches!(
        err,
        Some(SimulationError::Execution(ExecutionConfigError::Slippage(SlippageError::BpsOutOfRange { .. })))
    ));
}

#[test]
fn variable_slippage_uses_bar_range() {
    let execution = ExecutionConfig::new(CostModel::new(
        0.0,
        SlippageModel::Variable {
            volatility_factor: 0.1,
        },
    ));
    let strategy = ScriptedStrategy::new().at(0, RawSignal::market_buy(SYM, 1.0));
    let out = run_with(
        SimulationConfig::with_execution(1_000.0, execution),
        &three_bars(),
        strategy,
    );
    // range 6 × 0.1 = 0.6
    assert!((out.trades[0].execution_price - 102.6).abs() < 1e-9);
}

#[test]
fn orderbook_slippage_walks_levels() {
    let bars = three_bars();
    let book = BookSnapshot::new(
        SYM,
        bars[0].timestamp,
        vec![],
        vec![BookLevel::new(102.0, 1.0), BookLevel::new(104.0, 1.0)],
    );
    let feed: OrderBookFeed = vec![book].into_iter().collect();
    let execution = ExecutionConfig::new(CostModel::new(
        0.0,
        SlippageModel::OrderBook { fallback_bps: 50.0 },
    ));
    let mut strategy = ScriptedStrategy::new()
        .at(0, RawSignal::market_buy(SYM, 2.0))
        .at(1, RawSignal::market_sell(SYM, 1.0));
    let out = MarketSimulator::new(SimulationConfig::with_execution(1_000.0, execution))
        .unwrap()
        .with_order_books(Arc::new(feed))
        .run(&bars, &mut strategy)
        .unwrap();

    assert_eq!(out.trades[0].execution_price, 103.0);
    // no book on bar 1 → fixed fallback
    assert!((out.trades[1].execution_price - 103.0 * 0.995).abs() < 1e-9);
}

// ── Order types ──────────────────────────────────────────────────────

#[test]
fn limit_sell_fills_at_limit_when_high_reaches() {
    let strategy = ScriptedStrategy::new()
        .at(0, RawSignal::market_buy(SYM, 1.0))
        .at(0, RawSignal::limit_sell(SYM, 1.0, 105.5));
    let out = run(&three_bars(), strategy);

    assert_eq!(out.trades.len(), 2);
    let sell = &out.trades[1];
    assert_eq!(sell.execution_price, 105.5);
    assert_eq!(sell.timestamp, three_bars()[2].timestamp);
}

#[test]
fn unfilled_limit_stays_open_at_end() {
    let strategy = ScriptedStrategy::new().at(0, RawSignal::limit_buy(SYM, 1.0, 50.0));
    let out = run(&three_bars(), strategy);
    assert!(out.trades.is_empty());
    assert_eq!(out.orders[0].status, OrderStatus::Open);
    assert_eq!(out.open_orders().count(), 1);
}

#[test]
fn stop_orders_are_rejected_without_failing_the_run() {
    let stop = RawSignal {
        order_type: Some("stop".into()),
        stop_price: Some(101.0),
        ..RawSignal::market_sell(SYM, 1.0)
    };
    let strategy = ScriptedStrategy::new()
        .at(0, stop)
        .at(1, RawSignal::market_buy(SYM, 1.0));
    let out = run(&three_bars(), strategy);

    assert!(matches!(out.orders[0].status, OrderStatus::Rejected { .. }));
    assert_eq!(diagnostics_of(&out, DiagnosticKind::OrderRejected), 1);
    assert_eq!(out.trades.len(), 1);
}

#[test]
fn invalid_signals_dropped_with_diagnostic() {
    let bad_direction = RawSignal {
        direction: Some("flat".into()),
        ..RawSignal::market_buy(SYM, 1.0)
    };
    let no_quantity = RawSignal {
        quantity: None,
        ..RawSignal::market_buy(SYM, 1.0)
    };
    let strategy = ScriptedStrategy::new().at(0, bad_direction).at(0, no_quantity);
    let out = run(&three_bars(), strategy);

    assert!(out.orders.is_empty());
    assert_eq!(diagnostics_of(&out, DiagnosticKind::SignalDropped), 2);
}

#[test]
fn amount_sizes_quantity_from_close() {
    let strategy = ScriptedStrategy::new().at(0, RawSignal::market_buy_amount(SYM, 510.0));
    let out = run(&three_bars(), strategy);
    assert!((out.trades[0].quantity - 5.0).abs() < 1e-12);
}

#[test]
fn cancel_signal_cancels_open_orders() {
    let strategy = ScriptedStrategy::new()
        .at(0, RawSignal::limit_buy(SYM, 1.0, 50.0))
        .at(1, RawSignal::cancel_all(SYM));
    let out = run(&three_bars(), strategy);
    assert!(matches!(out.orders[0].status, OrderStatus::Canceled { .. }));
    assert_eq!(diagnostics_of(&out, DiagnosticKind::OrderCanceled), 1);
    // accepted + canceled
    assert_eq!(out.audit.len(), 2);
}

// ── Affordability ────────────────────────────────────────────────────

#[test]
fn unaffordable_buy_is_skipped_and_stays_open() {
    let strategy = ScriptedStrategy::new().at(0, RawSignal::market_buy(SYM, 100.0));
    let out = run(&three_bars(), strategy);

    assert!(out.trades.is_empty());
    assert_eq!(out.orders[0].status, OrderStatus::Open);
    // retried every bar
    assert_eq!(diagnostics_of(&out, DiagnosticKind::FillSkipped), 3);
    assert_eq!(out.final_portfolio.cash, 1_000.0);
}

#[test]
fn oversell_is_skipped() {
    let strategy = ScriptedStrategy::new().at(0, RawSignal::market_sell(SYM, 1.0));
    let out = run(&three_bars(), strategy);
    assert!(out.trades.is_empty());
    assert!(diagnostics_of(&out, DiagnosticKind::FillSkipped) >= 1);
    assert!(out.final_portfolio.positions.is_empty());
}

#[test]
fn sell_rounding_over_holding_records_the_holding() {
    let strategy = ScriptedStrategy::new()
        .at(0, RawSignal::market_buy(SYM, 1.0))
        .at(1, RawSignal::market_sell(SYM, 1.0 + 5e-11));
    let out = run(&three_bars(), strategy);

    assert_eq!(out.trades.len(), 2);
    assert_eq!(out.trades[1].quantity, 1.0);
    let sell = &out.orders[1];
    assert_eq!(sell.status, OrderStatus::Filled);
    assert_eq!(sell.filled_quantity, 1.0);
    assert_eq!(out.final_portfolio.cash, 1_001.0);
    assert!(out.final_portfolio.positions.is_empty());
}

// ── Liquidity and partial fills ──────────────────────────────────────

#[test]
fn liquidity_cap_carries_remainder() {
    let execution = ExecutionConfig::frictionless()
        .with_liquidity(LiquidityPolicy::new(0.1, RemainderPolicy::Carry));
    let strategy = ScriptedStrategy::new().at(0, RawSignal::market_buy(SYM, 250.0));
    let out = run_with(
        SimulationConfig::with_execution(10_000.0, execution),
        &flat_bars(4, 1.0, 1_000.0),
        strategy,
    );

    let quantities: Vec<f64> = out.trades.iter().map(|t| t.quantity).collect();
    assert_eq!(quantities, vec![100.0, 100.0, 50.0]);
    assert_eq!(out.orders[0].status, OrderStatus::Filled);
    assert!(out.trades.iter().all(|t| t.order_id == out.orders[0].id));
}

#[test]
fn liquidity_cap_cancels_remainder() {
    let execution = ExecutionConfig::frictionless()
        .with_liquidity(LiquidityPolicy::new(0.1, RemainderPolicy::Cancel));
    let strategy = ScriptedStrategy::new().at(0, RawSignal::market_buy(SYM, 250.0));
    let out = run_with(
        SimulationConfig::with_execution(10_000.0, execution),
        &flat_bars(3, 1.0, 1_000.0),
        strategy,
    );

    assert_eq!(out.trades.len(), 1);
    assert_eq!(out.trades[0].quantity, 100.0);
    let order = &out.orders[0];
    assert!(matches!(order.status, OrderStatus::Canceled { .. }));
    assert_eq!(order.filled_quantity, 100.0);
    assert_eq!(order.remaining_quantity, 150.0);
}

#[test]
fn seeded_partial_fills_are_reproducible() {
    let execution = ExecutionConfig::frictionless()
        .with_partial_fills(PartialFillConfig::new(1.0, 0.3, 11));
    let config = SimulationConfig::with_execution(10_000.0, execution);
    let bars = flat_bars(6, 10.0, 1_000.0);
    let script = || ScriptedStrategy::new().at(0, RawSignal::market_buy(SYM, 100.0));

    let a = run_with(config.clone(), &bars, script());
    let b = run_with(config, &bars, script());
    assert_eq!(a, b);

    assert!(!a.trades.is_empty());
    let filled: f64 = a.trades.iter().map(|t| t.quantity).sum();
    assert!(filled <= 100.0 + 1e-9);
    assert!(a.trades[0].quantity >= 30.0 - 1e-9);
    assert!((a.orders[0].filled_quantity - filled).abs() < 1e-9);
}

// ── Failure modes ────────────────────────────────────────────────────

#[test]
fn invalid_config_rejected_up_front() {
    let execution = ExecutionConfig::new(CostModel::new(1.5, SlippageModel::default()));
    assert!(MarketSimulator::new(SimulationConfig::with_execution(1_000.0, execution)).is_err());
    assert!(MarketSimulator::new(SimulationConfig::new(-5.0)).is_err());
}

#[test]
fn empty_bar_stream_produces_empty_output() {
    let out = run(&[], ScriptedStrategy::new());
    assert_eq!(out.bar_count, 0);
    assert!(out.equity_curve.is_empty());
    assert_eq!(out.final_equity(), 1_000.0);
}
