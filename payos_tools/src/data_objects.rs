use serde::{Deserialize, Serialize};
use serde_json::Value;
use vpg_common::Vnd;

pub const PAYOS_STATUS_PAID: &str = "PAID";

// PayOS truncates long descriptions server-side with an error, so we clip them client-side.
const MAX_DESCRIPTION_LEN: usize = 25;
const MAX_ITEM_NAME_LEN: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct PaymentItem {
    pub name: String,
    pub quantity: i64,
    pub price: Vnd,
}

#[derive(Debug, Clone)]
pub struct NewPaymentRequest {
    pub order_code: i64,
    pub amount: Vnd,
    pub description: String,
    pub items: Vec<PaymentItem>,
    pub return_url: String,
    pub cancel_url: String,
    pub buyer_name: Option<String>,
    pub buyer_email: Option<String>,
    pub buyer_phone: Option<String>,
}

impl NewPaymentRequest {
    pub fn new(order_code: i64, amount: Vnd, description: impl Into<String>) -> Self {
        let description: String = description.into();
        let description = clip(&description, MAX_DESCRIPTION_LEN);
        let item = PaymentItem { name: clip(&description, MAX_ITEM_NAME_LEN), quantity: 1, price: amount };
        Self {
            order_code,
            amount,
            description,
            items: vec![item],
            return_url: "/payment/success".to_string(),
            cancel_url: "/payment/cancel".to_string(),
            buyer_name: None,
            buyer_email: None,
            buyer_phone: None,
        }
    }
}

fn clip(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLink {
    pub order_code: i64,
    pub checkout_url: String,
    pub qr_code: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatus {
    pub order_code: i64,
    pub status: String,
    pub amount: Vnd,
    #[serde(default)]
    pub amount_paid: Option<Vnd>,
    #[serde(default)]
    pub amount_remaining: Option<Vnd>,
    #[serde(default)]
    pub transactions: Vec<Value>,
}

impl PaymentStatus {
    pub fn is_paid(&self) -> bool {
        self.status == PAYOS_STATUS_PAID
    }
}

/// The standard PayOS response envelope. `code` is `"00"` on success.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct PayOsResponse<T> {
    pub code: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> PayOsResponse<T> {
    pub fn is_success(&self) -> bool {
        self.code == "00"
    }
}
