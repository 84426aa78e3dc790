use thiserror::Error;

use crate::db_types::{NewOrder, NewPaymentTransaction, Order, OrderCode, OrderStatusType};

/// This trait defines the highest level of behaviour for backends supporting the vending payment
/// engine's order ledger.
///
/// The ledger is the single source of truth for order state. Every status change goes through
/// [`VendingDatabase::advance_order_status`], which performs the transition as a single guarded
/// update so that concurrent triggers cannot traverse the same edge twice.
#[allow(async_fn_in_trait)]
pub trait VendingDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Takes a new order and stores it in the database. This call is idempotent: if an order with
    /// the same order code already exists, the existing record is returned and the second tuple
    /// element is `false`.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError>;

    /// Fetches the order with the given order code, if it exists.
    async fn fetch_order_by_code(&self, code: &OrderCode) -> Result<Option<Order>, PaymentGatewayError>;

    /// Fetches all orders for the given machine that are currently in `status`, oldest first.
    async fn fetch_orders_in_status(
        &self,
        machine_id: i64,
        status: OrderStatusType,
    ) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Moves the order onto `target` if, and only if, its current status is one of the states
    /// `target` may legally be entered from. The check and the update happen in a single
    /// statement, so of any number of concurrent callers racing on the same edge, exactly one
    /// receives `Some(order)`; the rest receive `None`.
    ///
    /// `None` is *not* an error. The caller re-reads the order and decides whether the loss was a
    /// benign duplicate or a genuine conflict.
    async fn advance_order_status(
        &self,
        code: &OrderCode,
        target: OrderStatusType,
    ) -> Result<Option<Order>, PaymentGatewayError>;

    /// Atomically claims the right to perform the stock decrement for this order. Returns `true`
    /// for exactly one caller over the lifetime of the order.
    async fn try_mark_stock_adjusted(&self, code: &OrderCode) -> Result<bool, PaymentGatewayError>;

    /// Records a settled gateway payment against the order. Idempotent: returns `false` if a
    /// transaction for this order code has already been recorded.
    async fn record_gateway_transaction(&self, tx: NewPaymentTransaction) -> Result<bool, PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderCode),
    #[error("Order {order} cannot move from {from} to {to}")]
    InvalidStateChange { order: OrderCode, from: OrderStatusType, to: OrderStatusType },
    #[error("{0} is not supported")]
    UnsupportedAction(String),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
