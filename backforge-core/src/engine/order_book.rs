//! Order book state machine: order lifecycle and audit trail.
//!
//! The order book is the registry for every order of one run. It manages:
//! - Order storage and lookup in creation order
//! - State transitions (Created → Open → PartiallyFilled → Filled / Canceled / Rejected)
//! - Fill bookkeeping (filled/remaining quantity, accumulated cost and fee)
//! - Audit trail for every state transition
//!
//! The order book does NOT compute fill prices or touch the portfolio; the
//! simulator does that and reports the outcome here.

use crate::domain::position::QTY_EPSILON;
use crate::domain::{Order, OrderAuditEntry, OrderId, OrderStatus};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from order book operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderBookError {
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order {0} is not active (status: {1})")]
    OrderNotActive(OrderId, String),

    #[error("invalid transition for order {0}: {1} → {2}")]
    InvalidTransition(OrderId, String, String),

    #[error("fill of {quantity} exceeds remaining {remaining} on order {id}")]
    Overfill {
        id: OrderId,
        quantity: f64,
        remaining: f64,
    },
}

/// All orders of one run, keyed by id. Ids are allocated monotonically so
/// map order equals creation order.
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: BTreeMap<OrderId, Order>,
    audit_trail: Vec<OrderAuditEntry>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Public API ─────────────────────────────────────────────────────

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Accept a freshly created order and open it.
    pub fn open(&mut self, mut order: Order, bar_index: usize) -> Result<OrderId, OrderBookError> {
        if order.status != OrderStatus::Created {
            return Err(OrderBookError::InvalidTransition(
                order.id,
                order.status.to_string(),
                OrderStatus::Open.to_string(),
            ));
        }
        let id = order.id;
        order.status = OrderStatus::Open;
        self.orders.insert(id, order);
        self.record_audit(id, OrderStatus::Created, OrderStatus::Open, bar_index, "accepted");
        Ok(id)
    }

    /// Ids of all active orders, in creation order.
    pub fn active_ids(&self) -> Vec<OrderId> {
        self.orders
            .values()
            .filter(|o| o.is_active())
            .map(|o| o.id)
            .collect()
    }

    /// Ids of active orders for one symbol, in creation order.
    pub fn active_ids_for(&self, symbol: &str) -> Vec<OrderId> {
        self.orders
            .values()
            .filter(|o| o.is_active() && o.symbol == symbol)
            .map(|o| o.id)
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.orders.values().filter(|o| o.is_active()).count()
    }

    /// Record a fill of `quantity` at `price` with `fee`.
    ///
    /// Returns `Ok(true)` if the order is now fully filled, `Ok(false)` if
    /// quantity remains.
    pub fn record_fill(
        &mut self,
        order_id: OrderId,
        quantity: f64,
        price: f64,
        fee: f64,
        bar_index: usize,
    ) -> Result<bool, OrderBookError> {
        let order = self.active_mut(order_id)?;
        if quantity > order.remaining_quantity + QTY_EPSILON {
            return Err(OrderBookError::Overfill {
                id: order_id,
                quantity,
                remaining: order.remaining_quantity,
            });
        }

        order.filled_quantity += quantity;
        order.remaining_quantity -= quantity;
        order.accumulated_cost += quantity * price;
        order.accumulated_fee += fee;

        let fully_filled = order.remaining_quantity <= QTY_EPSILON;
        let from = order.status.clone();
        let to = if fully_filled {
            order.remaining_quantity = 0.0;
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        if from != to {
            order.status = to.clone();
            let reason = if fully_filled { "filled" } else { "partial fill" };
            self.record_audit(order_id, from, to, bar_index, reason);
        }
        Ok(fully_filled)
    }

    /// Cancel an active order. Any unfilled remainder is abandoned.
    pub fn cancel(
        &mut self,
        order_id: OrderId,
        bar_index: usize,
        reason: &str,
    ) -> Result<(), OrderBookError> {
        self.terminate(
            order_id,
            OrderStatus::Canceled {
                reason: reason.to_string(),
            },
            bar_index,
            reason,
        )
    }

    /// Reject an active order that the simulator cannot execute.
    pub fn reject(
        &mut self,
        order_id: OrderId,
        bar_index: usize,
        reason: &str,
    ) -> Result<(), OrderBookError> {
        self.terminate(
            order_id,
            OrderStatus::Rejected {
                reason: reason.to_string(),
            },
            bar_index,
            reason,
        )
    }

    /// Complete audit trail.
    pub fn audit_trail(&self) -> &[OrderAuditEntry] {
        &self.audit_trail
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Consume the book, returning orders in creation order and the audit trail.
    pub fn into_parts(self) -> (Vec<Order>, Vec<OrderAuditEntry>) {
        (self.orders.into_values().collect(), self.audit_trail)
    }

    // ── Internal ───────────────────────────────────────────────────────

    fn active_mut(&mut self, order_id: OrderId) -> Result<&mut Order, OrderBookError> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(OrderBookError::OrderNotFound(order_id))?;
        if !order.is_active() {
            return Err(OrderBookError::OrderNotActive(
                order_id,
                order.status.to_string(),
            ));
        }
        Ok(order)
    }

    fn terminate(
        &mut self,
        order_id: OrderId,
        to: OrderStatus,
        bar_index: usize,
        reason: &str,
    ) -> Result<(), OrderBookError> {
        let order = self.active_mut(order_id)?;
        let from = std::mem::replace(&mut order.status, to.clone());
        self.record_audit(order_id, from, to, bar_index, reason);
        Ok(())
    }

    fn record_audit(
        &mut self,
        order_id: OrderId,
        from_status: OrderStatus,
        to_status: OrderStatus,
        bar_index: usize,
        reason: &str,
    ) {
        self.audit_trail.push(OrderAuditEntry {
            order_id,
            bar_index,
            from_status,
            to_status,
            reason: reason.to_string(),
        });
    }
}
