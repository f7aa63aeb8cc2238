use serde::{Deserialize, Serialize};
use tup_common::Money;

/// The provider-neutral charge request. The order id travels in provider metadata so that the webhook channel can
/// hand it straight back without any parsing of provider references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub order_id: String,
    pub amount: Money,
    pub currency: String,
    pub email: String,
    /// Opaque payment instrument token collected client side (Stripe payment method id, etc). Redirect rails
    /// ignore it.
    pub instrument: Option<String>,
    pub return_url: Option<String>,
    pub cancel_url: Option<String>,
}

/// The normalized result of initiating a charge. Every provider response collapses into one of these variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InitiateOutcome {
    /// The charge completed synchronously. The webhook confirmation is still authoritative for reconciliation.
    Completed { reference: String },
    /// The buyer must complete an extra step in the client (3DS and friends).
    RequiresAction { reference: String, client_secret: String },
    /// The buyer was handed a redirect and the outcome arrives exclusively via webhook.
    Pending { reference: String, redirect_url: String },
    /// The provider gave a definitive no. Not retryable.
    Declined { code: String, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundOutcome {
    pub reference: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryItem {
    pub sku: String,
    pub name: String,
    pub quantity: i64,
}

/// The payload posted to the upstream top-up supplier when an order is fulfilled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub order_id: String,
    pub player_id: String,
    pub items: Vec<DeliveryItem>,
}

/// Acknowledgement from the supplier. The reference is stored on the order as proof of delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub reference: String,
    pub status: String,
}
