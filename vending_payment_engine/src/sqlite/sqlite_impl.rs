//! `SqliteDatabase` is the bundled concrete backend for the vending payment engine.
//!
//! Unsurprisingly, it uses SQLite as the store and implements all the traits defined in the
//! [`crate::traits`] module.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{audit, db_url, devices, new_pool, orders, slots};
use crate::{
    db_types::{
        DeviceIdentity,
        DeviceSession,
        NewAuditEntry,
        NewDeviceIdentity,
        NewOrder,
        NewPaymentTransaction,
        Order,
        OrderCode,
        OrderStatusType,
        Slot,
    },
    traits::{DeviceAuthApiError, DeviceRegistry, PaymentGatewayError, StockAdjuster, VendingDatabase},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database instance using the URL from the `VPG_DATABASE_URL` environment
    /// variable, or the default if it is not set.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        debug!("🗃️ Connected to database at {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl VendingDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let (order, created) = orders::idempotent_insert(order, &mut conn).await?;
        if created {
            debug!("🗃️ Order [{}] has been saved in the DB with id {}", order.order_code, order.id);
        }
        Ok((order, created))
    }

    async fn fetch_order_by_code(&self, code: &OrderCode) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_code(code, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_in_status(
        &self,
        machine_id: i64,
        status: OrderStatusType,
    ) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_in_status(machine_id, status, &mut conn).await?;
        Ok(orders)
    }

    async fn advance_order_status(
        &self,
        code: &OrderCode,
        target: OrderStatusType,
    ) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::advance_order_status(code, target, &mut conn).await?;
        Ok(order)
    }

    async fn try_mark_stock_adjusted(&self, code: &OrderCode) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let claimed = orders::try_mark_stock_adjusted(code, &mut conn).await?;
        Ok(claimed)
    }

    async fn record_gateway_transaction(&self, tx: NewPaymentTransaction) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let recorded = orders::insert_payment_transaction(tx, &mut conn).await?;
        Ok(recorded)
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl DeviceRegistry for SqliteDatabase {
    async fn fetch_device(&self, machine_id: i64) -> Result<Option<DeviceIdentity>, DeviceAuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let device = devices::fetch_device(machine_id, &mut conn).await?;
        Ok(device)
    }

    async fn upsert_device(&self, device: NewDeviceIdentity) -> Result<DeviceIdentity, DeviceAuthApiError> {
        let mut conn = self.pool.acquire().await?;
        devices::upsert_device(device, &mut conn).await
    }

    async fn revoke_device(&self, machine_id: i64) -> Result<DeviceIdentity, DeviceAuthApiError> {
        let mut conn = self.pool.acquire().await?;
        devices::revoke_device(machine_id, &mut conn).await
    }

    async fn fetch_session(
        &self,
        machine_id: i64,
        session_id: &str,
    ) -> Result<Option<DeviceSession>, DeviceAuthApiError> {
        let mut conn = self.pool.acquire().await?;
        let session = devices::fetch_session(machine_id, session_id, &mut conn).await?;
        Ok(session)
    }

    async fn touch_session(&self, machine_id: i64, ttl_seconds: i64) -> Result<DeviceSession, DeviceAuthApiError> {
        let mut conn = self.pool.acquire().await?;
        devices::touch_session(machine_id, ttl_seconds, &mut conn).await
    }

    async fn record_gate_event(&self, entry: NewAuditEntry) -> Result<(), DeviceAuthApiError> {
        let mut conn = self.pool.acquire().await?;
        audit::insert_entry(entry, &mut conn).await?;
        Ok(())
    }
}

impl StockAdjuster for SqliteDatabase {
    async fn reduce_stock(&self, machine_id: i64, product_id: i64) -> Result<Option<Slot>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let slot = slots::reduce_stock(machine_id, product_id, &mut conn).await?;
        Ok(slot)
    }

    async fn set_slot_stock(
        &self,
        machine_id: i64,
        slot_code: &str,
        stock: i64,
    ) -> Result<Option<Slot>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let slot = slots::set_slot_stock(machine_id, slot_code, stock, &mut conn).await?;
        Ok(slot)
    }

    async fn fetch_slots(&self, machine_id: i64) -> Result<Vec<Slot>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let slots = slots::fetch_slots(machine_id, &mut conn).await?;
        Ok(slots)
    }

    async fn upsert_slot(
        &self,
        machine_id: i64,
        slot_code: &str,
        product_id: i64,
        stock: i64,
    ) -> Result<Slot, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let slot = slots::upsert_slot(machine_id, slot_code, product_id, stock, &mut conn).await?;
        Ok(slot)
    }
}
