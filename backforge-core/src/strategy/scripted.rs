use super::{PortfolioView, Strategy};
use crate::domain::{Bar, RawSignal};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Replays a fixed script of signals keyed by bar index.
///
/// Used to drive the simulator through exact scenarios.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStrategy {
    script: BTreeMap<usize, Vec<RawSignal>>,
    bar_index: usize,
}

impl ScriptedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `signal` on bar `index` (0-based). Several signals on the same
    /// bar are emitted in insertion order.
    pub fn at(mut self, index: usize, signal: RawSignal) -> Self {
        self.script.entry(index).or_default().push(signal);
        self
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn on_bar(
        &mut self,
        _timestamp: DateTime<Utc>,
        _bar: &Bar,
        _portfolio: &PortfolioView<'_>,
    ) -> Vec<RawSignal> {
        let signals = self.script.remove(&self.bar_index).unwrap_or_default();
        self.bar_index += 1;
        signals
    }
}
