use std::fmt::Display;

use chrono::{DateTime, Utc};
use payment_providers::InitiateOutcome;
use serde::{Deserialize, Serialize};
use tup_common::{Money, PaymentMethod};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

/// The order submission. The order id is assigned server side; clients achieve idempotent resubmission with
/// the `idempotency_key` field. No charge happens at this point; payment is a follow-up call against the
/// created order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub email: String,
    pub player_id: String,
    #[serde(default)]
    pub player_nickname: Option<String>,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedResponse {
    pub order_id: String,
    pub total: Money,
    pub duplicate: bool,
}

/// A charge initiation against an existing pending order. The rail is named in the URL path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_id: String,
    /// Payment instrument token collected client side (Stripe payment method id). Redirect rails ignore it.
    #[serde(default)]
    pub instrument: Option<String>,
    #[serde(default)]
    pub return_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub order_id: String,
    pub total: Money,
    pub method: PaymentMethod,
    #[serde(flatten)]
    pub outcome: InitiateOutcome,
}

/// Pays an order from a gift voucher instead of a provider rail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherPaymentRequest {
    pub order_id: String,
    pub voucher_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherRedeemRequest {
    pub code: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherCreateRequest {
    /// Leave empty to have the server generate a code.
    #[serde(default)]
    pub code: Option<String>,
    pub balance: Money,
    #[serde(default)]
    pub max_uses: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_reusable: bool,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub store_id: String,
    pub amount: Money,
}
