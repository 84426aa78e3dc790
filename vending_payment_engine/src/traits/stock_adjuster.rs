use crate::{
    db_types::Slot,
    traits::PaymentGatewayError,
};

/// Inventory operations for machine slots.
///
/// [`StockAdjuster::reduce_stock`] is the side effect guarded by the order ledger's
/// `stock_adjusted` flag; it is only ever called once per order.
#[allow(async_fn_in_trait)]
pub trait StockAdjuster: Clone {
    /// Decrements stock by one for the slot holding `product_id` in the machine. Returns the
    /// updated slot, or `None` if no slot with remaining stock matched.
    async fn reduce_stock(&self, machine_id: i64, product_id: i64) -> Result<Option<Slot>, PaymentGatewayError>;

    /// Overwrites the stock level a machine reports for one of its slots.
    async fn set_slot_stock(
        &self,
        machine_id: i64,
        slot_code: &str,
        stock: i64,
    ) -> Result<Option<Slot>, PaymentGatewayError>;

    /// All slots for the machine, in slot-code order.
    async fn fetch_slots(&self, machine_id: i64) -> Result<Vec<Slot>, PaymentGatewayError>;

    /// Creates or replaces a slot definition.
    async fn upsert_slot(
        &self,
        machine_id: i64,
        slot_code: &str,
        product_id: i64,
        stock: i64,
    ) -> Result<Slot, PaymentGatewayError>;
}
