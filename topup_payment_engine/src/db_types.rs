use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
use tup_common::{Money, PaymentMethod};

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid status: {0}")]
pub struct ConversionError(String);

//--------------------------------------     OrderStatus       -------------------------------------------------------
/// The order lifecycle. Transitions are forward-only: an order never returns to an earlier state, and replayed
/// webhooks for a state the order has already passed through are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// The order has been created and no payment has been confirmed yet.
    Pending,
    /// A payment for the full order total has been confirmed. The order is waiting on fulfillment.
    PaymentConfirmed,
    /// The upstream supplier has acknowledged delivery of the goods.
    Delivered,
    /// The payment failed or the buyer abandoned the order.
    Failed,
    /// A confirmed payment was refunded back to the buyer.
    Refunded,
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::PaymentConfirmed => "payment_confirmed",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Failed => "failed",
            OrderStatus::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "payment_confirmed" => Ok(Self::PaymentConfirmed),
            "delivered" => Ok(Self::Delivered),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to pending");
            OrderStatus::Pending
        })
    }
}

//--------------------------------------   TransactionStatus   -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    /// The provider needs the buyer to complete an extra step (3DS and friends).
    RequiresAction,
    Completed,
    Failed,
    Refunded,
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::RequiresAction => "requires_action",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "requires_action" => Ok(Self::RequiresAction),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid transaction status: {value}. But this conversion cannot fail. Defaulting to pending");
            TransactionStatus::Pending
        })
    }
}

//--------------------------------------     PayoutStatus      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    /// A transfer has been submitted to the provider and we are waiting for the webhook confirmation.
    Processing,
    Completed,
    Failed,
    /// The provider clawed the transfer back after it completed.
    Reversed,
}

impl Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Failed => "failed",
            PayoutStatus::Reversed => "reversed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PayoutStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "reversed" => Ok(Self::Reversed),
            s => Err(ConversionError(format!("Invalid payout status: {s}"))),
        }
    }
}

impl From<String> for PayoutStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payout status: {value}. But this conversion cannot fail. Defaulting to pending");
            PayoutStatus::Pending
        })
    }
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub email: String,
    /// The game account that receives the top-up.
    pub player_id: String,
    pub player_nickname: Option<String>,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub currency: String,
    pub status: OrderStatus,
    /// Client-supplied key that makes checkout submission idempotent.
    pub idempotency_key: Option<String>,
    /// Reference returned by the upstream supplier once delivery succeeds.
    pub delivery_ref: Option<String>,
    pub delivery_error: Option<String>,
    pub delivery_attempts: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_delivered(&self) -> bool {
        self.status == OrderStatus::Delivered
    }
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub email: String,
    pub player_id: String,
    pub player_nickname: Option<String>,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub currency: String,
    pub idempotency_key: Option<String>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, email: String, player_id: String, total: Money) -> Self {
        Self {
            order_id,
            email,
            player_id,
            player_nickname: None,
            subtotal: total,
            tax: Money::from_cents(0),
            total,
            currency: tup_common::STORE_CURRENCY.to_string(),
            idempotency_key: None,
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: Vec<NewOrderItem>) -> Self {
        self.items = items;
        self
    }

    pub fn with_idempotency_key(mut self, key: String) -> Self {
        self.idempotency_key = Some(key);
        self
    }
}

//--------------------------------------      OrderItem        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

//--------------------------------------     Transaction       -------------------------------------------------------
/// A single payment attempt against an order. An order can accumulate several failed attempts, but the reconciler
/// guarantees at most one transaction ever reaches `completed`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub order_id: OrderId,
    /// The provider's reference for this charge (intent id, capture id, prepay id, charge code). Unique when set.
    pub txid: Option<String>,
    pub method: PaymentMethod,
    pub amount: Money,
    pub currency: String,
    pub status: TransactionStatus,
    /// Provider-specific JSON blob (decline codes, client secrets, delivery flags).
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub order_id: OrderId,
    pub txid: Option<String>,
    pub method: PaymentMethod,
    pub amount: Money,
    pub currency: String,
    pub status: TransactionStatus,
    pub metadata: Option<String>,
}

impl NewTransaction {
    pub fn new(order_id: OrderId, method: PaymentMethod, amount: Money) -> Self {
        Self {
            order_id,
            txid: None,
            method,
            amount,
            currency: tup_common::STORE_CURRENCY.to_string(),
            status: TransactionStatus::Pending,
            metadata: None,
        }
    }

    pub fn with_txid(mut self, txid: String) -> Self {
        self.txid = Some(txid);
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_metadata(mut self, metadata: String) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

//--------------------------------------       Voucher         -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Voucher {
    pub id: i64,
    pub code: String,
    /// The remaining balance on the voucher.
    pub balance: Money,
    pub used_count: i64,
    pub max_uses: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Reusable vouchers keep their remainder after a partial redemption; single-use vouchers burn in full.
    pub is_reusable: bool,
    /// Where the voucher came from. Externally sourced vouchers always go through manual verification.
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Voucher {
    pub fn has_uses_remaining(&self) -> bool {
        self.max_uses.map(|max| self.used_count < max).unwrap_or(true)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct NewVoucher {
    pub code: String,
    pub balance: Money,
    pub max_uses: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_reusable: bool,
    pub source: String,
}

impl NewVoucher {
    pub fn new(code: String, balance: Money) -> Self {
        Self { code, balance, max_uses: None, expires_at: None, is_reusable: false, source: "internal".to_string() }
    }
}

//--------------------------------------     WebhookEvent      -------------------------------------------------------
/// An audit record of a received webhook. Every delivery is logged, including ones that fail signature
/// verification.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: i64,
    pub provider: String,
    pub event_type: String,
    pub payload: String,
    pub signature_valid: bool,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub provider: String,
    pub event_type: String,
    pub payload: String,
    pub signature_valid: bool,
}

//--------------------------------------        Payout         -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payout {
    pub id: i64,
    /// The connected account receiving the transfer.
    pub store_id: String,
    pub amount: Money,
    pub currency: String,
    pub transfer_id: Option<String>,
    pub status: PayoutStatus,
    pub error_message: Option<String>,
    pub retry_count: i64,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayout {
    pub store_id: String,
    pub amount: Money,
    pub currency: String,
}

impl NewPayout {
    pub fn new(store_id: String, amount: Money) -> Self {
        Self { store_id, amount, currency: tup_common::STORE_CURRENCY.to_string() }
    }
}
