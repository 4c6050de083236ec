//! Bar source trait and structured error types.
//!
//! The `BarSource` trait abstracts over where bars come from (memory, CSV
//! files) so the orchestrator can swap implementations and mock for tests.

use crate::domain::{Bar, BarError};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: {message}")]
    Parse { row: usize, message: String },

    #[error("invalid bar series: {0}")]
    InvalidSeries(#[from] BarError),
}

/// Ordered, replayable bars for one symbol.
///
/// `start` and `end` are inclusive; `None` means unbounded. Returned bars are
/// strictly increasing in time and pass [`Bar::is_sane`]. An empty vector is
/// a valid answer; callers decide whether that is fatal.
pub trait BarSource: Send + Sync {
    fn load(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, DataError>;
}

/// Keep bars whose timestamp lies in `[start, end]`.
pub(crate) fn within(bar: &Bar, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    start.map_or(true, |s| bar.timestamp >= s) && end.map_or(true, |e| bar.timestamp <= e)
}
