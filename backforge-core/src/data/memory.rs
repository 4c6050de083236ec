use super::source::{within, BarSource, DataError};
use crate::domain::{validate_series, Bar, BarError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Bars held in memory, keyed by symbol. Series are validated on insert.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBarSource {
    series: BTreeMap<String, Vec<Bar>>,
}

impl InMemoryBarSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) the series for the symbol carried by `bars`.
    ///
    /// An empty series is stored under `symbol` as-is.
    pub fn insert(&mut self, symbol: &str, bars: Vec<Bar>) -> Result<(), BarError> {
        validate_series(&bars)?;
        if let Some(found) = bars.iter().find(|b| b.symbol != symbol) {
            return Err(BarError::SymbolMismatch {
                index: 0,
                expected: symbol.to_string(),
                found: found.symbol.clone(),
            });
        }
        self.series.insert(symbol.to_string(), bars);
        Ok(())
    }

    pub fn with_series(mut self, symbol: &str, bars: Vec<Bar>) -> Result<Self, BarError> {
        self.insert(symbol, bars)?;
        Ok(self)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }
}

impl BarSource for InMemoryBarSource {
    fn load(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, DataError> {
        let bars = self
            .series
            .get(symbol)
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;
        Ok(bars
            .iter()
            .filter(|b| within(b, start, end))
            .cloned()
            .collect())
    }
}
