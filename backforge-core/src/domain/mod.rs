//! Domain types for Backforge

pub mod bar;
pub mod equity;
pub mod ids;
pub mod order;
pub mod portfolio;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::{validate_series, Bar, BarError};
pub use equity::EquityPoint;
pub use ids::{IdGen, OrderId, TradeId};
pub use order::{Order, OrderAuditEntry, OrderSide, OrderStatus, OrderType};
pub use portfolio::Portfolio;
pub use position::Position;
pub use signal::RawSignal;
pub use trade::Trade;

/// Symbol type alias
pub type Symbol = String;
