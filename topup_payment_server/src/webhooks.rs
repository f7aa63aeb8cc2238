//! Webhook ingestion for the payment rails and the delivery supplier.
//!
//! Every handler follows the same discipline:
//! 1. Verify the signature on the raw bytes.
//! 2. Log the delivery to the audit table, valid signature or not.
//! 3. Reject invalid signatures with a 403, after logging.
//! 4. Apply the event through the engine APIs and answer 200, even when the event is a duplicate or cannot be
//!    processed. Providers retry anything outside the 200 range, and a replayed event resolves as a no-op anyway.
use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::*;
use serde::Deserialize;
use topup_payment_engine::{
    db_types::{NewWebhookEvent, OrderId},
    traits::{PaymentConfirmation, PaymentGatewayError},
    DeliveryProvider,
    FulfillmentApi,
    OrderFlowApi,
    PaymentGatewayDatabase,
    PayoutApi,
    PayoutStore,
    TransferProvider,
};
use tup_common::{Money, PaymentMethod};

use crate::{
    data_objects::JsonResponse,
    errors::ServerError,
    route,
    signature::{
        verify_binance_signature,
        verify_coinbase_signature,
        verify_delivery_signature,
        verify_paypal_signature,
        verify_stripe_signature,
    },
};

/// The webhook verification secrets, extracted from the provider configuration at startup.
#[derive(Clone, Default)]
pub struct WebhookSecrets {
    pub stripe_webhook_secret: String,
    pub paypal_client_secret: String,
    pub paypal_webhook_id: String,
    pub binance_api_secret: String,
    pub coinbase_webhook_secret: String,
    pub delivery_shared_secret: String,
}

impl WebhookSecrets {
    pub fn from_provider_config(config: &payment_providers::ProvidersConfig) -> Self {
        Self {
            stripe_webhook_secret: config.stripe.webhook_secret.reveal().clone(),
            paypal_client_secret: config.paypal.client_secret.reveal().clone(),
            paypal_webhook_id: config.paypal.webhook_id.clone(),
            binance_api_secret: config.binance.api_secret.reveal().clone(),
            coinbase_webhook_secret: config.coinbase.webhook_secret.reveal().clone(),
            delivery_shared_secret: config.delivery.shared_secret.reveal().clone(),
        }
    }
}

fn header<'a>(req: &'a HttpRequest, name: &str) -> &'a str {
    req.headers().get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}

fn event_type_of(payload: &str, pointer: &str) -> String {
    serde_json::from_str::<serde_json::Value>(payload)
        .ok()
        .and_then(|v| v.pointer(pointer).and_then(|t| t.as_str().map(String::from)))
        .unwrap_or_else(|| "unknown".to_string())
}

async fn audit<B: PaymentGatewayDatabase>(
    api: &OrderFlowApi<B>,
    provider: &str,
    event_type: &str,
    payload: &str,
    signature_valid: bool,
) -> Result<(), ServerError> {
    api.log_webhook_event(NewWebhookEvent {
        provider: provider.to_string(),
        event_type: event_type.to_string(),
        payload: payload.to_string(),
        signature_valid,
    })
    .await?;
    Ok(())
}

/// Collapses an engine result into the always-200 webhook response. No-ops are duplicates and count as success.
fn ack<T>(provider: &str, event_type: &str, result: Result<T, PaymentGatewayError>) -> HttpResponse {
    let response = match result {
        Ok(_) => JsonResponse::success("ok"),
        Err(e) if e.is_noop() => {
            debug!("📨️ Duplicate {provider} {event_type} event: {e}");
            JsonResponse::success("Event already applied.")
        },
        Err(e) => {
            warn!("📨️ Could not process {provider} {event_type} event: {e}");
            JsonResponse::failure(e)
        },
    };
    HttpResponse::Ok().json(response)
}

//----------------------------------------------    Stripe   ----------------------------------------------------

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: StripeObject,
}

#[derive(Debug, Default, Deserialize)]
struct StripeObject {
    #[serde(default)]
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    amount_received: Option<i64>,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    last_payment_error: Option<StripePaymentError>,
}

#[derive(Debug, Default, Deserialize)]
struct StripePaymentError {
    #[serde(default)]
    message: Option<String>,
}

route!(stripe_webhook => Post "/stripe" impl PaymentGatewayDatabase, PayoutStore, TransferProvider);
pub async fn stripe_webhook<BPay, BPayout, T>(
    req: HttpRequest,
    body: web::Bytes,
    orders: web::Data<OrderFlowApi<BPay>>,
    payouts: web::Data<PayoutApi<BPayout, T>>,
    secrets: web::Data<WebhookSecrets>,
) -> Result<HttpResponse, ServerError>
where
    BPay: PaymentGatewayDatabase,
    BPayout: PayoutStore,
    T: TransferProvider,
{
    let valid = verify_stripe_signature(
        &secrets.stripe_webhook_secret,
        header(&req, "Stripe-Signature"),
        &body,
        Utc::now().timestamp(),
    )?;
    let payload = String::from_utf8_lossy(&body).into_owned();
    let event_type = event_type_of(&payload, "/type");
    audit(&orders, "stripe", &event_type, &payload, valid).await?;
    if !valid {
        warn!("📨️ Rejecting stripe webhook with an invalid signature");
        return Err(ServerError::InvalidSignature);
    }
    let event: StripeEvent = match serde_json::from_str(&payload) {
        Ok(ev) => ev,
        Err(e) => {
            warn!("📨️ Could not parse stripe webhook payload: {e}");
            return Ok(HttpResponse::Ok().json(JsonResponse::failure("Unrecognized payload")));
        },
    };
    let object = event.data.object;
    let result = match event.event_type.as_str() {
        "payment_intent.succeeded" => match object.metadata.get("order_id") {
            Some(order_id) => {
                let confirmation = PaymentConfirmation {
                    order_id: OrderId::from(order_id.clone()),
                    txid: object.id,
                    method: PaymentMethod::Stripe,
                    amount: Money::from_cents(object.amount_received.unwrap_or_default()),
                };
                orders.confirm_payment(confirmation).await.map(|_| ())
            },
            None => {
                warn!("📨️ Stripe payment intent {} carries no order_id metadata", object.id);
                Ok(())
            },
        },
        "payment_intent.payment_failed" => {
            let reason = object
                .last_payment_error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "payment_failed".to_string());
            orders.fail_payment_attempt(&object.id, &reason).await.map(|_| ())
        },
        "charge.refunded" => {
            let txid = object.payment_intent.unwrap_or(object.id);
            match order_for_txid(&orders, &txid).await? {
                Some(order_id) => orders.refund_order(&order_id, &txid).await.map(|_| ()),
                None => Err(PaymentGatewayError::TransactionNotFound(txid)),
            }
        },
        "transfer.created" => payouts.transfer_completed(&object.id).await.map(|_| ()),
        "transfer.failed" => payouts.transfer_failed(&object.id, "Provider reported failure").await.map(|_| ()),
        "transfer.reversed" => payouts.transfer_reversed(&object.id).await.map(|_| ()),
        other => {
            trace!("📨️ Ignoring stripe event {other}");
            Ok(())
        },
    };
    Ok(ack("stripe", &event_type, result))
}

async fn order_for_txid<B: PaymentGatewayDatabase>(
    api: &OrderFlowApi<B>,
    txid: &str,
) -> Result<Option<OrderId>, ServerError> {
    let tx = api.db().fetch_transaction_by_txid(txid).await?;
    Ok(tx.map(|t| t.order_id))
}

//----------------------------------------------    PayPal   ----------------------------------------------------

#[derive(Debug, Deserialize)]
struct PayPalEvent {
    event_type: String,
    resource: PayPalResource,
}

#[derive(Debug, Default, Deserialize)]
struct PayPalResource {
    #[serde(default)]
    id: String,
    #[serde(default)]
    purchase_units: Vec<PayPalPurchaseUnit>,
    #[serde(default)]
    amount: Option<PayPalAmount>,
}

#[derive(Debug, Default, Deserialize)]
struct PayPalPurchaseUnit {
    #[serde(default)]
    reference_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct PayPalAmount {
    #[serde(default)]
    value: String,
}

route!(paypal_webhook => Post "/paypal" impl PaymentGatewayDatabase);
pub async fn paypal_webhook<B: PaymentGatewayDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    orders: web::Data<OrderFlowApi<B>>,
    secrets: web::Data<WebhookSecrets>,
) -> Result<HttpResponse, ServerError> {
    let valid = verify_paypal_signature(
        &secrets.paypal_client_secret,
        &secrets.paypal_webhook_id,
        header(&req, "Paypal-Transmission-Id"),
        header(&req, "Paypal-Transmission-Time"),
        header(&req, "Paypal-Transmission-Sig"),
        &body,
    )?;
    let payload = String::from_utf8_lossy(&body).into_owned();
    let event_type = event_type_of(&payload, "/event_type");
    audit(&orders, "paypal", &event_type, &payload, valid).await?;
    if !valid {
        warn!("📨️ Rejecting paypal webhook with an invalid signature");
        return Err(ServerError::InvalidSignature);
    }
    let event: PayPalEvent = match serde_json::from_str(&payload) {
        Ok(ev) => ev,
        Err(e) => {
            warn!("📨️ Could not parse paypal webhook payload: {e}");
            return Ok(HttpResponse::Ok().json(JsonResponse::failure("Unrecognized payload")));
        },
    };
    let order_id = event.resource.purchase_units.first().map(|u| OrderId::from(u.reference_id.clone()));
    let result = match event.event_type.as_str() {
        "PAYMENT.CAPTURE.COMPLETED" => match order_id {
            Some(order_id) => {
                let amount = event
                    .resource
                    .amount
                    .and_then(|a| a.value.parse::<Money>().ok())
                    .unwrap_or_default();
                let confirmation = PaymentConfirmation {
                    order_id,
                    txid: event.resource.id,
                    method: PaymentMethod::Paypal,
                    amount,
                };
                orders.confirm_payment(confirmation).await.map(|_| ())
            },
            None => {
                warn!("📨️ PayPal capture {} carries no reference_id", event.resource.id);
                Ok(())
            },
        },
        "PAYMENT.CAPTURE.REFUNDED" => match order_id {
            Some(order_id) => refund_completed_transaction(&orders, &order_id).await,
            None => {
                warn!("📨️ PayPal refund {} carries no reference_id", event.resource.id);
                Ok(())
            },
        },
        other => {
            trace!("📨️ Ignoring paypal event {other}");
            Ok(())
        },
    };
    Ok(ack("paypal", &event_type, result))
}

/// Refund events reference the refund object, not the original capture, so find the completed transaction on
/// the order and refund against it.
async fn refund_completed_transaction<B: PaymentGatewayDatabase>(
    api: &OrderFlowApi<B>,
    order_id: &OrderId,
) -> Result<(), PaymentGatewayError> {
    use topup_payment_engine::db_types::TransactionStatus;
    let txs = api.fetch_transactions_for_order(order_id).await?;
    let completed = txs
        .into_iter()
        .find(|t| t.status == TransactionStatus::Completed)
        .and_then(|t| t.txid)
        .ok_or_else(|| {
            PaymentGatewayError::ReconciliationNoop(format!("Order [{order_id}] has no completed transaction"))
        })?;
    api.refund_order(order_id, &completed).await.map(|_| ())
}

//----------------------------------------------  Binance Pay ---------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceEvent {
    #[serde(default)]
    biz_type: String,
    #[serde(default)]
    data: BinanceEventData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceEventData {
    #[serde(default)]
    merchant_trade_no: String,
    #[serde(default)]
    prepay_id: String,
    #[serde(default)]
    status: String,
}

route!(binance_webhook => Post "/binance" impl PaymentGatewayDatabase);
pub async fn binance_webhook<B: PaymentGatewayDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    orders: web::Data<OrderFlowApi<B>>,
    secrets: web::Data<WebhookSecrets>,
) -> Result<HttpResponse, ServerError> {
    let valid = verify_binance_signature(
        &secrets.binance_api_secret,
        header(&req, "BinancePay-Nonce"),
        header(&req, "BinancePay-Timestamp"),
        header(&req, "BinancePay-Signature"),
        &body,
    )?;
    let payload = String::from_utf8_lossy(&body).into_owned();
    let event_type = event_type_of(&payload, "/bizType");
    audit(&orders, "binance_pay", &event_type, &payload, valid).await?;
    if !valid {
        warn!("📨️ Rejecting binance webhook with an invalid signature");
        return Err(ServerError::InvalidSignature);
    }
    let event: BinanceEvent = match serde_json::from_str(&payload) {
        Ok(ev) => ev,
        Err(e) => {
            warn!("📨️ Could not parse binance webhook payload: {e}");
            return Ok(HttpResponse::Ok().json(JsonResponse::failure("Unrecognized payload")));
        },
    };
    if event.biz_type != "PAY" {
        trace!("📨️ Ignoring binance event {}", event.biz_type);
        return Ok(HttpResponse::Ok().json(JsonResponse::success("ok")));
    }
    let order_id = OrderId::from(event.data.merchant_trade_no.clone());
    let result = match event.data.status.as_str() {
        "SUCCESS" => {
            // The settlement amount arrives in crypto units; the order's own total is the ledger amount.
            let amount = orders
                .fetch_order(&order_id)
                .await?
                .map(|o| o.total)
                .unwrap_or_default();
            let confirmation = PaymentConfirmation {
                order_id,
                txid: event.data.prepay_id,
                method: PaymentMethod::BinancePay,
                amount,
            };
            orders.confirm_payment(confirmation).await.map(|_| ())
        },
        "CANCELED" | "EXPIRED" => {
            let reason = format!("Binance Pay reported {}", event.data.status);
            orders.fail_order(&order_id, Some(&event.data.prepay_id), &reason).await.map(|_| ())
        },
        other => {
            trace!("📨️ Ignoring binance pay status {other}");
            Ok(())
        },
    };
    Ok(ack("binance_pay", &event_type, result))
}

//----------------------------------------------   Coinbase  ----------------------------------------------------

#[derive(Debug, Deserialize)]
struct CoinbaseEnvelope {
    event: CoinbaseEvent,
}

#[derive(Debug, Deserialize)]
struct CoinbaseEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: CoinbaseCharge,
}

#[derive(Debug, Default, Deserialize)]
struct CoinbaseCharge {
    #[serde(default)]
    code: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    pricing: Option<CoinbasePricing>,
}

#[derive(Debug, Default, Deserialize)]
struct CoinbasePricing {
    #[serde(default)]
    local: Option<PayPalAmount>,
}

route!(coinbase_webhook => Post "/coinbase" impl PaymentGatewayDatabase);
pub async fn coinbase_webhook<B: PaymentGatewayDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    orders: web::Data<OrderFlowApi<B>>,
    secrets: web::Data<WebhookSecrets>,
) -> Result<HttpResponse, ServerError> {
    let valid =
        verify_coinbase_signature(&secrets.coinbase_webhook_secret, header(&req, "X-CC-Webhook-Signature"), &body)?;
    let payload = String::from_utf8_lossy(&body).into_owned();
    let event_type = event_type_of(&payload, "/event/type");
    audit(&orders, "coinbase", &event_type, &payload, valid).await?;
    if !valid {
        warn!("📨️ Rejecting coinbase webhook with an invalid signature");
        return Err(ServerError::InvalidSignature);
    }
    let envelope: CoinbaseEnvelope = match serde_json::from_str(&payload) {
        Ok(ev) => ev,
        Err(e) => {
            warn!("📨️ Could not parse coinbase webhook payload: {e}");
            return Ok(HttpResponse::Ok().json(JsonResponse::failure("Unrecognized payload")));
        },
    };
    let charge = envelope.event.data;
    let Some(order_id) = charge.metadata.get("order_id").map(|s| OrderId::from(s.clone())) else {
        warn!("📨️ Coinbase charge {} carries no order_id metadata", charge.code);
        return Ok(HttpResponse::Ok().json(JsonResponse::failure("Charge has no order_id")));
    };
    let result = match envelope.event.event_type.as_str() {
        "charge:confirmed" => {
            let amount = charge
                .pricing
                .and_then(|p| p.local)
                .and_then(|l| l.value.parse::<Money>().ok())
                .unwrap_or_default();
            let confirmation = PaymentConfirmation {
                order_id,
                txid: charge.code,
                method: PaymentMethod::Coinbase,
                amount,
            };
            orders.confirm_payment(confirmation).await.map(|_| ())
        },
        "charge:failed" => {
            orders.fail_order(&order_id, Some(&charge.code), "Coinbase charge failed or expired").await.map(|_| ())
        },
        other => {
            trace!("📨️ Ignoring coinbase event {other}");
            Ok(())
        },
    };
    Ok(ack("coinbase", &event_type, result))
}

//---------------------------------------------- Delivery callback ----------------------------------------------

#[derive(Debug, Deserialize)]
struct DeliveryCallback {
    order_id: String,
    #[serde(default)]
    reference: String,
    status: String,
}

route!(delivery_callback => Post "/delivery" impl PaymentGatewayDatabase, DeliveryProvider);
/// Status callbacks from the upstream supplier, signed with the delivery shared secret.
pub async fn delivery_callback<B, D>(
    req: HttpRequest,
    body: web::Bytes,
    orders: web::Data<OrderFlowApi<B>>,
    fulfillment: web::Data<FulfillmentApi<B, D>>,
    secrets: web::Data<WebhookSecrets>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    D: DeliveryProvider,
{
    let valid = verify_delivery_signature(
        &secrets.delivery_shared_secret,
        header(&req, "X-Topup-Signature"),
        header(&req, "X-Topup-Timestamp"),
        &body,
        Utc::now().timestamp(),
    )?;
    let payload = String::from_utf8_lossy(&body).into_owned();
    let event_type = event_type_of(&payload, "/status");
    audit(&orders, "delivery", &event_type, &payload, valid).await?;
    if !valid {
        warn!("📨️ Rejecting delivery callback with an invalid signature");
        return Err(ServerError::InvalidSignature);
    }
    let callback: DeliveryCallback = match serde_json::from_str(&payload) {
        Ok(cb) => cb,
        Err(e) => {
            warn!("📨️ Could not parse delivery callback payload: {e}");
            return Ok(HttpResponse::Ok().json(JsonResponse::failure("Unrecognized payload")));
        },
    };
    let order_id = OrderId::from(callback.order_id);
    let result = match callback.status.as_str() {
        "delivered" => fulfillment.confirm_delivery(&order_id, &callback.reference).await.map(|_| ()),
        "failed" => {
            let error = format!("Supplier reported delivery failure for {}", callback.reference);
            orders.db().record_delivery_failure(&order_id, &error).await.map(|_| ())
        },
        other => {
            trace!("📨️ Ignoring delivery callback status {other}");
            Ok(())
        },
    };
    Ok(ack("delivery", &event_type, result))
}
