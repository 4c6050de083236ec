//! Bar sources: where a run's price history comes from.

pub mod csv_source;
pub mod memory;
pub mod source;

pub use csv_source::{read_csv, read_csv_file, CsvBarSource};
pub use memory::InMemoryBarSource;
pub use source::{BarSource, DataError};
