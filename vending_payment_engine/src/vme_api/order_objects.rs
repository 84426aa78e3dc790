use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderCode, OrderStatusType};

/// The view of an order that goes over the wire to machines and the storefront. Internal
/// bookkeeping fields (row id, stock flag) stay behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_code: OrderCode,
    pub machine_id: i64,
    pub product_id: i64,
    pub amount: i64,
    pub status: OrderStatusType,
    pub payment_url: Option<String>,
    pub qr_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            order_code: order.order_code,
            machine_id: order.machine_id,
            product_id: order.product_id,
            amount: order.amount.value(),
            status: order.status,
            payment_url: order.payment_url.clone(),
            qr_code: order.qr_code.clone(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

impl From<Order> for OrderSummary {
    fn from(order: Order) -> Self {
        Self::from(&order)
    }
}
