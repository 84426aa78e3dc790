use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
use vpg_common::Vnd;

//--------------------------------------      OrderCode      ---------------------------------------------------------

/// The numeric order code shared between the kiosk, the gateway and the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderCode(pub i64);

impl From<i64> for OrderCode {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for OrderCode {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self).map_err(|_| ConversionError(format!("Invalid order code: {s}")))
    }
}

impl Display for OrderCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderCode {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been created and is waiting for payment.
    Pending,
    /// Payment has been confirmed in full.
    Paid,
    /// The machine has been told to dispense and has not reported back yet.
    Dispensing,
    /// The product was dispensed successfully.
    Completed,
    /// The machine reported a dispense failure after payment.
    Failed,
    /// The order was cancelled before payment.
    Cancelled,
}

impl OrderStatusType {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Completed | OrderStatusType::Failed | OrderStatusType::Cancelled)
    }

    /// The set of states an order must be in for a transition into `self` to be legal.
    pub fn entered_from(&self) -> &'static [OrderStatusType] {
        use OrderStatusType::*;
        match self {
            Pending => &[],
            Paid => &[Pending],
            Dispensing => &[Paid],
            Completed => &[Dispensing],
            Failed => &[Paid, Dispensing],
            Cancelled => &[Pending],
        }
    }

    /// True if `self` is strictly reachable from `other` by following forward edges. Used to
    /// classify late-arriving triggers as benign duplicates rather than conflicts.
    pub fn is_downstream_of(&self, other: OrderStatusType) -> bool {
        use OrderStatusType::*;
        match other {
            Pending => *self != Pending,
            Paid => matches!(self, Dispensing | Completed | Failed),
            Dispensing => matches!(self, Completed | Failed),
            Completed | Failed | Cancelled => false,
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Dispensing => write!(f, "Dispensing"),
            OrderStatusType::Completed => write!(f, "Completed"),
            OrderStatusType::Failed => write!(f, "Failed"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Dispensing" => Ok(Self::Dispensing),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------        Order        ---------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_code: OrderCode,
    pub machine_id: i64,
    pub product_id: i64,
    pub amount: Vnd,
    pub status: OrderStatusType,
    pub payment_url: Option<String>,
    pub qr_code: Option<String>,
    /// Set exactly once, when the stock decrement for this order has been performed.
    pub stock_adjusted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewOrder      ---------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_code: OrderCode,
    pub machine_id: i64,
    pub product_id: i64,
    pub amount: Vnd,
    /// The hosted checkout URL, if one has been created already.
    pub payment_url: Option<String>,
    /// The QR code payload for the checkout link.
    pub qr_code: Option<String>,
}

impl NewOrder {
    pub fn new(order_code: OrderCode, machine_id: i64, product_id: i64, amount: Vnd) -> Self {
        Self { order_code, machine_id, product_id, amount, payment_url: None, qr_code: None }
    }

    pub fn is_equivalent(&self, order: &Order) -> bool {
        self.order_code == order.order_code
            && self.machine_id == order.machine_id
            && self.product_id == order.product_id
            && self.amount == order.amount
    }
}

//--------------------------------------    PaymentSource    ---------------------------------------------------------

/// Which trigger settled the payment. Stored alongside the transaction for reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type)]
pub enum PaymentSource {
    Poll,
    Webhook,
    Manual,
}

impl Display for PaymentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentSource::Poll => write!(f, "Poll"),
            PaymentSource::Webhook => write!(f, "Webhook"),
            PaymentSource::Manual => write!(f, "Manual"),
        }
    }
}

impl From<String> for PaymentSource {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Poll" => Self::Poll,
            "Webhook" => Self::Webhook,
            "Manual" => Self::Manual,
            _ => {
                error!("Invalid payment source: {value}. Defaulting to Manual");
                Self::Manual
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPaymentTransaction {
    pub order_code: OrderCode,
    pub amount: Vnd,
    pub source: PaymentSource,
    /// The gateway's transaction reference, when it supplies one.
    pub reference: Option<String>,
}

//--------------------------------------    DeviceStatus     ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum DeviceStatus {
    Active,
    Revoked,
}

impl Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatus::Active => write!(f, "Active"),
            DeviceStatus::Revoked => write!(f, "Revoked"),
        }
    }
}

impl From<String> for DeviceStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Active" => Self::Active,
            "Revoked" => Self::Revoked,
            _ => {
                error!("Invalid device status: {value}. Defaulting to Revoked");
                Self::Revoked
            },
        }
    }
}

//--------------------------------------   DeviceIdentity    ---------------------------------------------------------

/// The provisioning record for a vending machine controller. The shared secret is the HMAC key
/// for every request the device signs.
#[derive(Clone, FromRow)]
pub struct DeviceIdentity {
    pub machine_id: i64,
    pub shared_secret: String,
    pub status: DeviceStatus,
    pub firmware_version: Option<String>,
    pub location: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceIdentity {
    pub fn is_active(&self) -> bool {
        self.status == DeviceStatus::Active
    }
}

// Hand-rolled so the shared secret never lands in a log line.
impl std::fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("machine_id", &self.machine_id)
            .field("shared_secret", &"****")
            .field("status", &self.status)
            .field("firmware_version", &self.firmware_version)
            .field("location", &self.location)
            .field("revoked_at", &self.revoked_at)
            .finish()
    }
}

#[derive(Clone)]
pub struct NewDeviceIdentity {
    pub machine_id: i64,
    pub shared_secret: String,
    pub firmware_version: Option<String>,
    pub location: Option<String>,
}

impl std::fmt::Debug for NewDeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewDeviceIdentity")
            .field("machine_id", &self.machine_id)
            .field("shared_secret", &"****")
            .field("firmware_version", &self.firmware_version)
            .field("location", &self.location)
            .finish()
    }
}

//--------------------------------------    DeviceSession    ---------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeviceSession {
    pub id: i64,
    pub machine_id: i64,
    pub session_id: String,
    pub revoked: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceSession {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

//--------------------------------------        Slot         ---------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Slot {
    pub id: i64,
    pub machine_id: i64,
    pub slot_code: String,
    pub product_id: i64,
    pub stock: i64,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    NewAuditEntry    ---------------------------------------------------------

/// A single row in the IoT request audit trail. Raw payloads are never stored here.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub machine_id: Option<i64>,
    pub endpoint: String,
    pub outcome: String,
    pub detail: Option<String>,
    pub remote_ip: Option<String>,
}

impl NewAuditEntry {
    pub fn accepted(machine_id: i64, endpoint: &str) -> Self {
        Self {
            machine_id: Some(machine_id),
            endpoint: endpoint.to_string(),
            outcome: "Accepted".to_string(),
            detail: None,
            remote_ip: None,
        }
    }

    pub fn rejected(machine_id: Option<i64>, endpoint: &str, detail: String) -> Self {
        Self { machine_id, endpoint: endpoint.to_string(), outcome: "Rejected".to_string(), detail: Some(detail), remote_ip: None }
    }

    pub fn with_remote_ip(mut self, ip: Option<String>) -> Self {
        self.remote_ip = ip;
        self
    }
}
