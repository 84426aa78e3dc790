use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::{Duration, Utc};
use mockall::mock;
use vending_payment_engine::{
    db_types::{
        DeviceIdentity,
        DeviceSession,
        DeviceStatus,
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

mock! {
    pub OrderStore {}
    impl Clone for OrderStore {
        fn clone(&self) -> Self;
    }
    impl VendingDatabase for OrderStore {
        fn url(&self) -> &'static str;
        async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError>;
        async fn fetch_order_by_code(&self, code: &OrderCode) -> Result<Option<Order>, PaymentGatewayError>;
        async fn fetch_orders_in_status(&self, machine_id: i64, status: OrderStatusType) -> Result<Vec<Order>, PaymentGatewayError>;
        async fn advance_order_status(&self, code: &OrderCode, target: OrderStatusType) -> Result<Option<Order>, PaymentGatewayError>;
        async fn try_mark_stock_adjusted(&self, code: &OrderCode) -> Result<bool, PaymentGatewayError>;
        async fn record_gateway_transaction(&self, tx: NewPaymentTransaction) -> Result<bool, PaymentGatewayError>;
    }
    impl StockAdjuster for OrderStore {
        async fn reduce_stock(&self, machine_id: i64, product_id: i64) -> Result<Option<Slot>, PaymentGatewayError>;
        async fn set_slot_stock(&self, machine_id: i64, slot_code: &str, stock: i64) -> Result<Option<Slot>, PaymentGatewayError>;
        async fn fetch_slots(&self, machine_id: i64) -> Result<Vec<Slot>, PaymentGatewayError>;
        async fn upsert_slot(&self, machine_id: i64, slot_code: &str, product_id: i64, stock: i64) -> Result<Slot, PaymentGatewayError>;
    }
}

/// A cheaply cloneable registry for gate middleware tests. The gate clones its registry per
/// request, which rules out expectation-based mocks here.
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    devices: Arc<Mutex<HashMap<i64, DeviceIdentity>>>,
    sessions: Arc<Mutex<HashMap<i64, DeviceSession>>>,
    next_session_id: Arc<Mutex<i64>>,
}

impl InMemoryRegistry {
    pub fn with_active_device(self, machine_id: i64, secret: &str) -> Self {
        let now = Utc::now();
        let device = DeviceIdentity {
            machine_id,
            shared_secret: secret.to_string(),
            status: DeviceStatus::Active,
            firmware_version: None,
            location: None,
            revoked_at: None,
            created_at: now,
            updated_at: now,
        };
        self.devices.lock().unwrap().insert(machine_id, device);
        self
    }
}

impl DeviceRegistry for InMemoryRegistry {
    async fn fetch_device(&self, machine_id: i64) -> Result<Option<DeviceIdentity>, DeviceAuthApiError> {
        Ok(self.devices.lock().unwrap().get(&machine_id).cloned())
    }

    async fn upsert_device(&self, device: NewDeviceIdentity) -> Result<DeviceIdentity, DeviceAuthApiError> {
        let now = Utc::now();
        let stored = DeviceIdentity {
            machine_id: device.machine_id,
            shared_secret: device.shared_secret,
            status: DeviceStatus::Active,
            firmware_version: device.firmware_version,
            location: device.location,
            revoked_at: None,
            created_at: now,
            updated_at: now,
        };
        self.devices.lock().unwrap().insert(stored.machine_id, stored.clone());
        Ok(stored)
    }

    async fn revoke_device(&self, machine_id: i64) -> Result<DeviceIdentity, DeviceAuthApiError> {
        let mut devices = self.devices.lock().unwrap();
        let device = devices.get_mut(&machine_id).ok_or(DeviceAuthApiError::DeviceNotFound(machine_id))?;
        device.status = DeviceStatus::Revoked;
        device.revoked_at = Some(Utc::now());
        Ok(device.clone())
    }

    async fn fetch_session(
        &self,
        machine_id: i64,
        session_id: &str,
    ) -> Result<Option<DeviceSession>, DeviceAuthApiError> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions.get(&machine_id).filter(|s| s.session_id == session_id).cloned())
    }

    async fn touch_session(&self, machine_id: i64, ttl_seconds: i64) -> Result<DeviceSession, DeviceAuthApiError> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.get_mut(&machine_id) {
            if !session.revoked && session.expires_at > now {
                session.expires_at = now + Duration::seconds(ttl_seconds);
                session.updated_at = now;
                return Ok(session.clone());
            }
        }
        let mut next_id = self.next_session_id.lock().unwrap();
        *next_id += 1;
        let session = DeviceSession {
            id: *next_id,
            machine_id,
            session_id: format!("session-{next_id}"),
            revoked: false,
            expires_at: now + Duration::seconds(ttl_seconds),
            created_at: now,
            updated_at: now,
        };
        sessions.insert(machine_id, session.clone());
        Ok(session)
    }

    async fn record_gate_event(&self, _entry: NewAuditEntry) -> Result<(), DeviceAuthApiError> {
        Ok(())
    }
}
