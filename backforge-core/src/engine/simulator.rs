//! Bar-by-bar market simulator: the heart of a backtest run.
//!
//! Per bar, in order:
//! 1. Mark the portfolio at the close and append an equity point
//! 2. Ask the strategy for signals
//! 3. Validate signals, dropping invalid ones with a diagnostic
//! 4. Turn valid signals into open orders
//! 5. Evaluate every active order in creation order (market, limit; other
//!    types are rejected)
//! 6. Fill, charge commission, update the order and the portfolio
//!
//! Orders that are not eligible stay open for later bars. Nothing is force
//! closed at the end of the run.

use super::accounting::apply_fill;
use super::deadline::Deadline;
use super::diagnostics::{Diagnostic, DiagnosticKind};
use super::order_book::OrderBook;
use super::state::{SimulationConfig, SimulationError, SimulationOutput};
use super::validation::{validate_signal, SignalIntent};
use crate::domain::position::QTY_EPSILON;
use crate::domain::{
    Bar, BarError, EquityPoint, IdGen, Order, OrderId, OrderSide, OrderType, Portfolio, Trade,
};
use crate::execution::{OrderBookFeed, PartialFiller, RemainderPolicy};
use crate::strategy::{PortfolioView, Strategy};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Event-driven simulator for one run over one symbol's bar stream.
///
/// Owns all mutable run state. A simulator is single-use: build one, feed it
/// bars (via [`run`](Self::run) or [`process_bar`](Self::process_bar)), then
/// [`finish`](Self::finish) it.
pub struct MarketSimulator {
    config: SimulationConfig,
    books: Option<Arc<OrderBookFeed>>,
    deadline: Deadline,
    partial: Option<PartialFiller>,

    portfolio: Portfolio,
    order_book: OrderBook,
    id_gen: IdGen,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    diagnostics: Vec<Diagnostic>,
    bar_index: usize,
    last_bar: Option<(String, DateTime<Utc>)>,
}

impl MarketSimulator {
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let partial = config.execution.partial_fills.clone().map(PartialFiller::new);
        Ok(Self {
            portfolio: Portfolio::new(config.initial_capital),
            config,
            books: None,
            deadline: Deadline::none(),
            partial,
            order_book: OrderBook::new(),
            id_gen: IdGen::default(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            diagnostics: Vec::new(),
            bar_index: 0,
            last_bar: None,
        })
    }

    /// Supply order-book snapshots for the `orderbook` slippage model.
    pub fn with_order_books(mut self, books: Arc<OrderBookFeed>) -> Self {
        self.books = Some(books);
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn bars_processed(&self) -> usize {
        self.bar_index
    }

    /// Replay `bars` through `strategy` and return the run output.
    ///
    /// The deadline is checked before every bar.
    pub fn run(
        mut self,
        bars: &[Bar],
        strategy: &mut dyn Strategy,
    ) -> Result<SimulationOutput, SimulationError> {
        for bar in bars {
            if self.deadline.is_expired() {
                return Err(SimulationError::DeadlineExceeded {
                    bars_processed: self.bar_index,
                });
            }
            self.process_bar(bar, strategy)?;
        }
        Ok(self.finish())
    }

    /// Advance the simulation by one bar.
    pub fn process_bar(
        &mut self,
        bar: &Bar,
        strategy: &mut dyn Strategy,
    ) -> Result<(), SimulationError> {
        self.check_bar(bar)?;

        // ─── 1. Mark to market ───
        self.portfolio.mark(&bar.symbol, bar.close);
        self.equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: self.portfolio.equity,
            cash: self.portfolio.cash,
        });

        // ─── 2. Strategy ───
        let view = PortfolioView::new(&self.portfolio, self.order_book.active_count());
        let signals = strategy.on_bar(bar.timestamp, bar, &view);

        // ─── 3–4. Validate and place ───
        for signal in &signals {
            match validate_signal(signal, bar) {
                Ok(SignalIntent::Place(valid)) => {
                    let order = Order::new(
                        self.id_gen.next_order_id(),
                        bar.timestamp,
                        valid.symbol,
                        valid.side,
                        valid.order_type,
                        valid.quantity,
                    );
                    self.order_book.open(order, self.bar_index)?;
                }
                Ok(SignalIntent::CancelAll { symbol }) => {
                    for id in self.order_book.active_ids_for(&symbol) {
                        self.cancel(id, bar, "canceled by strategy")?;
                    }
                }
                Err(rejection) => {
                    warn!(
                        symbol = %bar.symbol,
                        bar_index = self.bar_index,
                        reason = %rejection,
                        "signal dropped"
                    );
                    self.diagnose(bar, DiagnosticKind::SignalDropped, None, rejection.to_string());
                }
            }
        }

        // ─── 5–6. Execute ───
        for id in self.order_book.active_ids() {
            self.execute(id, bar)?;
        }

        self.portfolio.revalue();
        self.bar_index += 1;
        Ok(())
    }

    /// Consume the simulator and return everything it recorded.
    pub fn finish(mut self) -> SimulationOutput {
        self.portfolio.revalue();
        let (orders, audit) = self.order_book.into_parts();
        SimulationOutput {
            trades: self.trades,
            equity_curve: self.equity_curve,
            orders,
            audit,
            diagnostics: self.diagnostics,
            final_portfolio: self.portfolio,
            bar_count: self.bar_index,
        }
    }

    // ── Internal ───────────────────────────────────────────────────────

    fn check_bar(&mut self, bar: &Bar) -> Result<(), SimulationError> {
        if !bar.is_sane() {
            return Err(BarError::Malformed {
                timestamp: bar.timestamp,
            }
            .into());
        }
        if let Some((symbol, timestamp)) = &self.last_bar {
            if *symbol != bar.symbol {
                return Err(BarError::SymbolMismatch {
                    index: self.bar_index,
                    expected: symbol.clone(),
                    found: bar.symbol.clone(),
                }
                .into());
            }
            if bar.timestamp <= *timestamp {
                return Err(BarError::OutOfOrder {
                    index: self.bar_index,
                    timestamp: bar.timestamp,
                }
                .into());
            }
        }
        self.last_bar = Some((bar.symbol.clone(), bar.timestamp));
        Ok(())
    }

    fn execute(&mut self, id: OrderId, bar: &Bar) -> Result<(), SimulationError> {
        let Some(order) = self.order_book.get(id) else {
            return Ok(());
        };
        if order.symbol != bar.symbol {
            return Ok(());
        }
        let side = order.side;
        let order_type = order.order_type.clone();
        let remaining = order.remaining_quantity;

        let limit_price = match order_type {
            OrderType::Market => None,
            OrderType::Limit { limit_price } => {
                let crosses = match side {
                    OrderSide::Buy => bar.low <= limit_price,
                    OrderSide::Sell => bar.high >= limit_price,
                };
                if !crosses {
                    return Ok(());
                }
                Some(limit_price)
            }
            OrderType::Stop { .. } | OrderType::StopLimit { .. } => {
                let reason = format!("unsupported order type '{}'", order_type.name());
                warn!(order_id = %id, symbol = %bar.symbol, reason = %reason, "order rejected");
                self.order_book.reject(id, self.bar_index, &reason)?;
                self.diagnose(bar, DiagnosticKind::OrderRejected, Some(id), reason);
                return Ok(());
            }
        };

        // Liquidity cap, then probabilistic partial fill.
        let (mut quantity, capped) = match &self.config.execution.liquidity {
            Some(policy) => {
                let (fill, remainder) = policy.constrain(remaining, bar.volume);
                (fill, remainder > QTY_EPSILON)
            }
            None => (remaining, false),
        };
        if let Some(filler) = self.partial.as_mut() {
            if quantity > QTY_EPSILON {
                quantity *= filler.fill_ratio();
            }
        }

        if quantity > QTY_EPSILON {
            let cost = &self.config.execution.cost;
            let price = match limit_price {
                Some(limit) => limit,
                None => {
                    let book = self
                        .books
                        .as_deref()
                        .and_then(|feed| feed.get(&bar.symbol, bar.timestamp));
                    cost.market_price(side, quantity, bar, book)
                }
            };
            let commission = cost.commission(quantity, price);

            match apply_fill(&mut self.portfolio, &bar.symbol, side, quantity, price, commission) {
                Ok(applied) => {
                    let quantity = applied.quantity;
                    let trade = Trade {
                        id: self.id_gen.next_trade_id(),
                        order_id: id,
                        timestamp: bar.timestamp,
                        symbol: bar.symbol.clone(),
                        side,
                        quantity,
                        execution_price: price,
                        commission,
                        realized_pnl: applied.realized_pnl,
                    };
                    debug!(
                        order_id = %id,
                        trade_id = %trade.id,
                        symbol = %bar.symbol,
                        side = %side,
                        quantity,
                        price,
                        commission,
                        "fill"
                    );
                    self.order_book
                        .record_fill(id, quantity, price, commission, self.bar_index)?;
                    self.trades.push(trade);
                }
                Err(err) => {
                    warn!(order_id = %id, symbol = %bar.symbol, reason = %err, "fill skipped");
                    self.diagnose(bar, DiagnosticKind::FillSkipped, Some(id), err.to_string());
                    return Ok(());
                }
            }
        }

        if capped {
            if let Some(policy) = &self.config.execution.liquidity {
                if policy.remainder == RemainderPolicy::Cancel {
                    let still_active = self.order_book.get(id).is_some_and(Order::is_active);
                    if still_active {
                        self.cancel(id, bar, "liquidity remainder canceled")?;
                    }
                }
            }
        }
        Ok(())
    }

    fn cancel(&mut self, id: OrderId, bar: &Bar, reason: &str) -> Result<(), SimulationError> {
        self.order_book.cancel(id, self.bar_index, reason)?;
        self.diagnose(bar, DiagnosticKind::OrderCanceled, Some(id), reason.to_string());
        Ok(())
    }

    fn diagnose(&mut self, bar: &Bar, kind: DiagnosticKind, order_id: Option<OrderId>, message: String) {
        self.diagnostics.push(Diagnostic {
            timestamp: bar.timestamp,
            bar_index: self.bar_index,
            kind,
            order_id,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderStatus, RawSignal};
    use crate::strategy::ScriptedStrategy;
    use chrono::{Duration, TimeZone};

    fn bars(ohlc: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ohlc.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                symbol: "BTC-USD".into(),
                timestamp: start + Duration::days(i as i64),
                open,
                high,
                low,
                close,
                volume: 1_000.0,
            })
            .collect()
    }

    fn run(bars: &[Bar], mut strategy: ScriptedStrategy) -> SimulationOutput {
        MarketSimulator::new(SimulationConfig::new(1_000.0))
            .unwrap()
            .run(bars, &mut strategy)
            .unwrap()
    }

    #[test]
    fn equity_point_per_bar() {
        let b = bars(&[(1.0, 1.0, 1.0, 1.0), (1.0, 1.0, 1.0, 1.0)]);
        let out = run(&b, ScriptedStrategy::new());
        assert_eq!(out.equity_curve.len(), 2);
        assert_eq!(out.bar_count, 2);
        assert!(out.equity_curve.iter().all(|p| p.equity == 1_000.0));
    }

    #[test]
    fn market_order_fills_on_creation_bar() {
        let b = bars(&[(100.0, 105.0, 99.0, 102.0)]);
        let out = run(&b, ScriptedStrategy::new().at(0, RawSignal::market_buy("BTC-USD", 1.0)));
        assert_eq!(out.trades.len(), 1);
        assert_eq!(out.trades[0].execution_price, 102.0);
        assert_eq!(out.orders[0].status, OrderStatus::Filled);
        assert_eq!(out.final_portfolio.cash, 898.0);
        assert_eq!(out.final_equity(), 1_000.0);
    }

    #[test]
    fn limit_waits_for_range() {
        let b = bars(&[
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 96.0, 97.0),
        ]);
        let out = run(&b, ScriptedStrategy::new().at(0, RawSignal::limit_buy("BTC-USD", 1.0, 97.5)));
        assert_eq!(out.trades.len(), 1);
        assert_eq!(out.trades[0].execution_price, 97.5);
        assert_eq!(out.trades[0].timestamp, b[1].timestamp);
    }

    #[test]
    fn out_of_order_bars_fail() {
        let mut b = bars(&[(1.0, 1.0, 1.0, 1.0), (1.0, 1.0, 1.0, 1.0)]);
        b.swap(0, 1);
        let err = MarketSimulator::new(SimulationConfig::new(1.0))
            .unwrap()
            .run(&b, &mut ScriptedStrategy::new())
            .unwrap_err();
        assert!(matches!(err, SimulationError::Bar(BarError::OutOfOrder { .. })));
    }

    #[test]
    fn expired_deadline_aborts() {
        let b = bars(&[(1.0, 1.0, 1.0, 1.0)]);
        let err = MarketSimulator::new(SimulationConfig::new(1.0))
            .unwrap()
            .with_deadline(Deadline::at(std::time::Instant::now()))
            .run(&b, &mut ScriptedStrategy::new())
            .unwrap_err();
        assert_eq!(err, SimulationError::DeadlineExceeded { bars_processed: 0 });
    }
}
