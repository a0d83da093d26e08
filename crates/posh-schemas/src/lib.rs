use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub category: String,
    pub image_url: Option<String>,
}

/// Price and name are snapshots taken at placement time; later catalog edits
/// do not rewrite existing orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Delivery {
    Pickup,
    Delivery { location: String },
}

/// Admin-driven fulfilment lifecycle, independent of payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    /// `Paid` is the only state no transition leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Gateway,
    Manual,
}

/// Payment sub-record of an order. Mutated only by the payment orchestrator.
///
/// `checkout_ref` is the join key between an initiation and its asynchronous
/// callback; it is unique per initiation attempt and re-issued on retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub status: PaymentStatus,
    pub method: Option<PaymentMethod>,
    pub checkout_ref: Option<String>,
    pub gateway_phone: Option<String>,
    pub receipt_ref: Option<String>,
    pub error: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentRecord {
    pub fn unpaid() -> Self {
        Self {
            status: PaymentStatus::Unpaid,
            method: None,
            checkout_ref: None,
            gateway_phone: None,
            receipt_ref: None,
            error: None,
            paid_at: None,
        }
    }
}

impl Default for PaymentRecord {
    fn default() -> Self {
        Self::unpaid()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Store-assigned, strictly increasing; gives creation order without
    /// relying on Uuid comparability.
    pub seq: u64,
    /// Bumped on every mutation; the CAS guard for concurrent writers.
    pub version: u64,
    pub user_id: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub items: Vec<LineItem>,
    pub total: Decimal,
    pub delivery: Delivery,
    pub status: OrderStatus,
    pub payment: PaymentRecord,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub currency: String,
    pub currency_symbol: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            currency: "KES".to_string(),
            currency_symbol: "KSh".to_string(),
        }
    }
}
