use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Portfolio value at one bar close. The ordered sequence across a run is the
/// equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub cash: f64,
}
