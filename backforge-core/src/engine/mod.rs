//! Market simulator and its supporting pieces.
//!
//! The simulator consumes one symbol's bars plus a strategy's signals and
//! produces fills, an order history with audit trail, diagnostics and an
//! equity curve. See [`simulator`] for the per-bar algorithm.

pub mod accounting;
pub mod deadline;
pub mod diagnostics;
pub mod order_book;
pub mod simulator;
pub mod state;
pub mod validation;

pub use accounting::{apply_fill, AppliedFill, FillError};
pub use deadline::Deadline;
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use order_book::{OrderBook, OrderBookError};
pub use simulator::MarketSimulator;
pub use state::{SimulationConfig, SimulationError, SimulationOutput};
pub use validation::{validate_signal, SignalIntent, SignalRejection, ValidSignal};
