//! Non-fatal events recorded during a run.

use crate::domain::OrderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A strategy signal failed validation and never became an order.
    SignalDropped,
    /// An order type the simulator cannot execute.
    OrderRejected,
    /// An eligible fill was skipped (insufficient cash or position).
    FillSkipped,
    /// An order or its remainder was canceled.
    OrderCanceled,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SignalDropped => "signal_dropped",
            Self::OrderRejected => "order_rejected",
            Self::FillSkipped => "fill_skipped",
            Self::OrderCanceled => "order_canceled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub timestamp: DateTime<Utc>,
    pub bar_index: usize,
    pub kind: DiagnosticKind,
    pub order_id: Option<OrderId>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[bar {} {}] {}", self.bar_index, self.kind, self.message)?;
        if let Some(id) = self.order_id {
            write!(f, " ({id})")?;
        }
        Ok(())
    }
}
