//! Search trace: one row per evaluated candidate, in evaluation order.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use backforge_core::ParamSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::objective::Direction;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One evaluated candidate.
///
/// A failed candidate has `score == None` and an `error`; it ranks as
/// [`Direction::worst`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub index: usize,
    /// GA generation or surrogate step; 0 for one-shot searches.
    pub batch: usize,
    pub params: ParamSet,
    pub score: Option<f64>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl TraceEntry {
    pub fn is_failure(&self) -> bool {
        self.score.is_none()
    }

    /// Score used for ranking.
    pub fn effective_score(&self, direction: Direction) -> f64 {
        self.score.unwrap_or_else(|| direction.worst())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchTrace {
    pub direction: Direction,
    pub entries: Vec<TraceEntry>,
}

impl SearchTrace {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|e| e.is_failure()).count()
    }

    /// First entry with the best score; failed candidates never qualify.
    pub fn best(&self) -> Option<&TraceEntry> {
        let mut best: Option<&TraceEntry> = None;
        for entry in &self.entries {
            let Some(score) = entry.score else { continue };
            match best {
                Some(b) if !self.direction.is_better(score, b.effective_score(self.direction)) => {}
                _ => best = Some(entry),
            }
        }
        best
    }

    pub fn write_json(&self, path: &Path) -> Result<(), TraceError> {
        let file = create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush().map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read_json(path: &Path) -> Result<Self, TraceError> {
        let file = File::open(path).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    /// One row per candidate: `index,batch,score,error,elapsed_ms` followed by
    /// one column per parameter name (union across rows, sorted).
    pub fn write_csv(&self, path: &Path) -> Result<(), TraceError> {
        let names: BTreeSet<&str> = self
            .entries
            .iter()
            .flat_map(|e| e.params.keys().map(String::as_str))
            .collect();

        let mut writer = csv::Writer::from_writer(create(path)?);
        let mut header = vec!["index", "batch", "score", "error", "elapsed_ms"];
        header.extend(names.iter().copied());
        writer.write_record(&header)?;

        for entry in &self.entries {
            let mut row = vec![
                entry.index.to_string(),
                entry.batch.to_string(),
                entry.score.map(|s| s.to_string()).unwrap_or_default(),
                entry.error.clone().unwrap_or_default(),
                entry.elapsed_ms.to_string(),
            ];
            row.extend(
                names
                    .iter()
                    .map(|n| entry.params.get(*n).map(|v| v.to_string()).unwrap_or_default()),
            );
            writer.write_record(&row)?;
        }
        writer.flush().map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn create(path: &Path) -> Result<File, TraceError> {
    File::create(path).map_err(|source| TraceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use backforge_core::ParamValue;

    fn entry(index: usize, x: i64, score: Option<f64>) -> TraceEntry {
        TraceEntry {
            index,
            batch: 0,
            params: ParamSet::from([("x".to_string(), ParamValue::Int(x))]),
            score,
            error: score.is_none().then(|| "boom".to_string()),
            elapsed_ms: 1,
        }
    }

    fn trace(direction: Direction) -> SearchTrace {
        let mut t = SearchTrace::new(direction);
        t.push(entry(0, 1, Some(0.5)));
        t.push(entry(1, 2, None));
        t.push(entry(2, 3, Some(2.0)));
        t.push(entry(3, 4, Some(2.0)));
        t
    }

    #[test]
    fn best_skips_failures_and_keeps_first_tie() {
        let t = trace(Direction::Maximize);
        assert_eq!(t.best().map(|e| e.index), Some(2));
        assert_eq!(t.failures(), 1);

        let t = trace(Direction::Minimize);
        assert_eq!(t.best().map(|e| e.index), Some(0));
    }

    #[test]
    fn all_failed_has_no_best() {
        let mut t = SearchTrace::new(Direction::Maximize);
        t.push(entry(0, 1, None));
        assert!(t.best().is_none());
        assert_eq!(t.entries[0].effective_score(t.direction), f64::NEG_INFINITY);
    }

    #[test]
    fn json_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.json");
        let t = trace(Direction::Maximize);
        t.write_json(&path).unwrap();
        assert_eq!(SearchTrace::read_json(&path).unwrap(), t);
    }

    #[test]
    fn csv_has_header_and_one_row_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.csv");
        trace(Direction::Maximize).write_csv(&path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(header, ["index", "batch", "score", "error", "elapsed_ms", "x"]);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(&rows[1][2], "");
        assert_eq!(&rows[1][3], "boom");
        assert_eq!(&rows[2][5], "3");
    }
}
