//! CSV bar files, one file per symbol.
//!
//! Expected header: `timestamp,open,high,low,close,volume`. Timestamps are
//! RFC 3339 (`2024-01-02T00:00:00Z`) or plain dates (`2024-01-02`, taken as
//! midnight UTC).

use super::source::{within, BarSource, DataError};
use crate::domain::{validate_series, Bar};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Reads `<dir>/<symbol>.csv` on every `load`.
#[derive(Debug, Clone)]
pub struct CsvBarSource {
    dir: PathBuf,
}

impl CsvBarSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }
}

impl BarSource for CsvBarSource {
    fn load(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, DataError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        let mut bars = read_csv_file(&path, symbol)?;
        bars.retain(|b| within(b, start, end));
        Ok(bars)
    }
}

/// Parse a whole CSV file into a validated series for `symbol`.
pub fn read_csv_file(path: &Path, symbol: &str) -> Result<Vec<Bar>, DataError> {
    let file = std::fs::File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv(file, symbol)
}

/// Parse CSV from any reader into a validated series for `symbol`.
pub fn read_csv<R: Read>(reader: R, symbol: &str) -> Result<Vec<Bar>, DataError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| DataError::Parse {
            row: i + 1,
            message: format!("unrecognized timestamp '{}'", row.timestamp),
        })?;
        bars.push(Bar {
            symbol: symbol.to_string(),
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    validate_series(&bars)?;
    Ok(bars)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}
