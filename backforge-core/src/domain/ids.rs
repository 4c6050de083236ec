use serde::{Deserialize, Serialize};
use std::fmt;

/// Order ID, unique within one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{}", self.0)
    }
}

/// Trade (fill) ID, unique within one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TradeId(pub u64);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Monotonic ID generator. IDs start at 1 and are never reused within a run,
/// so creation order and ID order coincide.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    next_order: u64,
    next_trade: u64,
}

impl IdGen {
    pub fn next_order_id(&mut self) -> OrderId {
        self.next_order += 1;
        OrderId(self.next_order)
    }

    pub fn next_trade_id(&mut self) -> TradeId {
        self.next_trade += 1;
        TradeId(self.next_trade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut ids = IdGen::default();
        assert_eq!(ids.next_order_id(), OrderId(1));
        assert_eq!(ids.next_order_id(), OrderId(2));
        assert_eq!(ids.next_trade_id(), TradeId(1));
        assert!(OrderId(1) < OrderId(2));
    }

    #[test]
    fn display_prefixes() {
        assert_eq!(OrderId(7).to_string(), "O7");
        assert_eq!(TradeId(3).to_string(), "T3");
    }
}
