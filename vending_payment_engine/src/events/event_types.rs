use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType};

/// Fired every time an order traverses a lifecycle edge. One event per edge, so a successful
/// dispense produces three of these (`Paid`, `Dispensing`, `Completed`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdateEvent {
    pub order: Order,
    pub previous_status: OrderStatusType,
}

impl OrderUpdateEvent {
    pub fn new(order: Order, previous_status: OrderStatusType) -> Self {
        Self { order, previous_status }
    }
}

/// Fired when an order lands in `Failed`, i.e. the customer has paid but received nothing. These
/// are the orders that need a human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFailedEvent {
    pub order: Order,
    pub reason: String,
}

impl OrderFailedEvent {
    pub fn new(order: Order, reason: impl Into<String>) -> Self {
        Self { order, reason: reason.into() }
    }
}
