//! Order-book snapshots used by the `orderbook` slippage model.
//!
//! A snapshot is a point-in-time view of resting liquidity for one symbol.
//! Market fills walk the opposite side of the book (asks for buys, bids for
//! sells) level by level until the requested quantity is absorbed.

use crate::domain::OrderSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One price level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: f64,
}

impl BookLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }
}

/// Resting liquidity for one symbol at one timestamp.
///
/// Bids are kept best-first (descending price), asks best-first (ascending
/// price). Levels with non-positive or non-finite quantity are dropped on
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl BookSnapshot {
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        bids: Vec<BookLevel>,
        asks: Vec<BookLevel>,
    ) -> Self {
        let usable = |l: &BookLevel| l.quantity.is_finite() && l.quantity > 0.0 && l.price.is_finite();
        let mut bids: Vec<BookLevel> = bids.into_iter().filter(usable).collect();
        let mut asks: Vec<BookLevel> = asks.into_iter().filter(usable).collect();
        bids.sort_by(|a, b| b.price.total_cmp(&a.price));
        asks.sort_by(|a, b| a.price.total_cmp(&b.price));
        Self {
            symbol: symbol.into(),
            timestamp,
            bids,
            asks,
        }
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    /// Total quantity resting on the side a `side` order would consume.
    pub fn depth(&self, side: OrderSide) -> f64 {
        self.levels_for(side).iter().map(|l| l.quantity).sum()
    }

    fn levels_for(&self, side: OrderSide) -> &[BookLevel] {
        match side {
            OrderSide::Buy => &self.asks,
            OrderSide::Sell => &self.bids,
        }
    }

    /// Volume-weighted price of sweeping `quantity` through the book.
    ///
    /// Returns `None` when the book cannot absorb the full quantity or the
    /// quantity is not positive.
    pub fn sweep(&self, side: OrderSide, quantity: f64) -> Option<f64> {
        if quantity.is_nan() || quantity <= 0.0 {
            return None;
        }
        let mut remaining = quantity;
        let mut notional = 0.0;
        for level in self.levels_for(side) {
            let take = remaining.min(level.quantity);
            notional += take * level.price;
            remaining -= take;
            if remaining <= 0.0 {
                return Some(notional / quantity);
            }
        }
        None
    }
}

/// Snapshots indexed by `(symbol, timestamp)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBookFeed {
    books: BTreeMap<(String, DateTime<Utc>), BookSnapshot>,
}

impl OrderBookFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a snapshot, replacing any existing one at the same key.
    pub fn insert(&mut self, snapshot: BookSnapshot) {
        self.books
            .insert((snapshot.symbol.clone(), snapshot.timestamp), snapshot);
    }

    pub fn get(&self, symbol: &str, timestamp: DateTime<Utc>) -> Option<&BookSnapshot> {
        self.books.get(&(symbol.to_string(), timestamp))
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

impl FromIterator<BookSnapshot> for OrderBookFeed {
    fn from_iter<I: IntoIterator<Item = BookSnapshot>>(iter: I) -> Self {
        let mut feed = Self::new();
        for snapshot in iter {
            feed.insert(snapshot);
        }
        feed
    }
}
