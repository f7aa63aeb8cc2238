//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will
//! cause that worker to stop processing new requests. All I/O in these handlers is therefore async.
use actix_web::{get, web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use log::*;
use payment_providers::{ChargeRequest, InitiateOutcome, ProviderError};
use serde::Deserialize;
use serde_json::json;
use topup_payment_engine::{
    db_types::{NewOrder, NewOrderItem, NewTransaction, NewVoucher, OrderId, OrderStatus, TransactionStatus},
    helpers::new_order_id,
    traits::{OrderQueryFilter, PaymentConfirmation, RedeemOutcome},
    DeliveryProvider,
    FulfillmentApi,
    OrderFlowApi,
    PaymentGatewayDatabase,
    PayoutApi,
    PayoutStore,
    TransferProvider,
    VoucherApi,
    VoucherStore,
};
use tup_common::{Money, PaymentMethod};

use crate::{
    data_objects::{
        JsonResponse,
        OrderCreatedResponse,
        OrderRequest,
        PaymentRequest,
        PaymentResponse,
        PayoutRequest,
        VoucherCreateRequest,
        VoucherPaymentRequest,
    },
    errors::ServerError,
    integrations::PaymentAdapters,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name);
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------    Orders   ----------------------------------------------------

pub const MIN_ORDER_TOTAL: Money = Money::from_cents(50);
pub const MAX_ORDER_TOTAL: Money = Money::from_dollars(10_000);
pub const MAX_ITEM_QUANTITY: i64 = 1_000;

pub fn validate_order(req: &OrderRequest) -> Result<Money, ServerError> {
    let bad = |msg: &str| ServerError::InvalidRequestBody(msg.to_string());
    let email = req.email.trim();
    if email.len() < 3 || !email.contains('@') {
        return Err(bad("A valid email address is required"));
    }
    let player_len = req.player_id.trim().len();
    if !(3..=50).contains(&player_len) {
        return Err(bad("playerId must be between 3 and 50 characters"));
    }
    if req.country.len() != 2 || !req.country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(bad("country must be a 2-letter ISO code"));
    }
    if req.items.is_empty() {
        return Err(bad("The cart is empty"));
    }
    if req.items.iter().any(|i| i.quantity <= 0 || !i.unit_price.is_positive()) {
        return Err(bad("Cart items must have positive quantities and prices"));
    }
    if req.items.iter().any(|i| i.quantity > MAX_ITEM_QUANTITY) {
        return Err(bad("Item quantities are limited to 1000 per line"));
    }
    // The quantities and prices are client-controlled i64s, so the total is built with checked arithmetic.
    let mut total = Money::default();
    for item in &req.items {
        total = item
            .unit_price
            .checked_mul(item.quantity)
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| bad("Order total is out of range"))?;
    }
    if total < MIN_ORDER_TOTAL || total > MAX_ORDER_TOTAL {
        return Err(bad("Order total must be between $0.50 and $10000.00"));
    }
    Ok(total)
}

route!(create_order => Post "/orders" impl PaymentGatewayDatabase);
/// Creates a pending order from the submitted cart. No money moves here; the client follows up with
/// `/payments/{provider}` or `/payments/voucher`.
///
/// Resubmissions carrying an `idempotency_key` that the server has seen before return the existing order
/// with `duplicate: true` instead of creating a second one.
pub async fn create_order<B: PaymentGatewayDatabase>(
    body: web::Json<OrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    let total = validate_order(&request)?;

    if let Some(key) = &request.idempotency_key {
        if let Some(existing) = api.order_for_idempotency_key(key).await? {
            info!("🛒️ Order resubmitted with the idempotency key of [{}]", existing.order_id);
            let response = OrderCreatedResponse {
                order_id: existing.order_id.as_str().to_string(),
                total: existing.total,
                duplicate: true,
            };
            return Ok(HttpResponse::Ok().json(response));
        }
    }

    let mut new_order = NewOrder::new(new_order_id(), request.email.clone(), request.player_id.clone(), total)
        .with_items(
            request
                .items
                .iter()
                .map(|i| NewOrderItem {
                    sku: i.sku.clone(),
                    name: i.name.clone(),
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                })
                .collect(),
        );
    new_order.player_nickname = request.player_nickname.clone();
    if let Some(key) = &request.idempotency_key {
        new_order = new_order.with_idempotency_key(key.clone());
    }
    let (order, inserted) = api.process_new_order(new_order).await?;
    if inserted {
        info!("🛒️ Order [{}] created for {}", order.order_id, total);
    } else {
        // An identical submission raced past the pre-check. The engine resolved it to the winner's order.
        info!("🛒️ Order submission replayed. Returning [{}]", order.order_id);
    }
    let response = OrderCreatedResponse {
        order_id: order.order_id.as_str().to_string(),
        total: order.total,
        duplicate: !inserted,
    };
    Ok(HttpResponse::Ok().json(response))
}

//----------------------------------------------   Payments  ----------------------------------------------------

route!(initiate_payment => Post "/payments/{provider}" impl PaymentGatewayDatabase);
/// Initiates a charge for a pending order on the rail named in the path.
///
/// A declined charge is recorded against the order and reported with a 402; the order stays pending so the
/// buyer can try another method. Orders that have already been paid answer 409.
pub async fn initiate_payment<B: PaymentGatewayDatabase>(
    path: web::Path<String>,
    body: web::Json<PaymentRequest>,
    api: web::Data<OrderFlowApi<B>>,
    adapters: web::Data<PaymentAdapters>,
) -> Result<HttpResponse, ServerError> {
    let provider = path.into_inner();
    let method = provider
        .parse::<PaymentMethod>()
        .map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    if method == PaymentMethod::Voucher {
        return Err(ServerError::InvalidRequestBody(
            "Vouchers are applied via /api/payments/voucher".to_string(),
        ));
    }
    let adapter = adapters
        .for_method(method)
        .ok_or_else(|| ServerError::InvalidRequestBody("Unsupported payment method".to_string()))?;
    let request = body.into_inner();
    let order_id = OrderId::from(request.order_id.clone());
    let order = api
        .fetch_order(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    if order.status != OrderStatus::Pending {
        return Err(ServerError::ActionForbidden(format!(
            "Order {order_id} is {} and cannot take a new payment",
            order.status
        )));
    }
    debug!("🛒️ Initiating {method} charge of {} for [{order_id}]", order.total);

    let charge = ChargeRequest {
        order_id: order_id.as_str().to_string(),
        amount: order.total,
        currency: order.currency.clone(),
        email: order.email.clone(),
        instrument: request.instrument.clone(),
        return_url: request.return_url.clone(),
        cancel_url: request.cancel_url.clone(),
    };
    let outcome = match adapter.initiate_charge(&charge).await {
        Ok(outcome) => outcome,
        Err(ProviderError::Declined { code, message }) => InitiateOutcome::Declined { code, message },
        Err(e) => {
            warn!("🛒️ Charge initiation for [{order_id}] failed: {e}");
            return Err(e.into());
        },
    };
    record_charge_outcome(&api, &order_id, method, order.total, outcome).await
}

route!(pay_with_voucher => Post "/payments/voucher" impl PaymentGatewayDatabase, VoucherStore);
/// Pays a pending order in full from a gift voucher.
///
/// A completed redemption confirms the order on the voucher rail in the same way a provider webhook would.
/// Every other redemption outcome, including invalid codes, comes back as a 200 with the tagged `result`
/// field and leaves the order pending.
pub async fn pay_with_voucher<B, V>(
    body: web::Json<VoucherPaymentRequest>,
    orders: web::Data<OrderFlowApi<B>>,
    vouchers: web::Data<VoucherApi<V>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    V: VoucherStore,
{
    let request = body.into_inner();
    let order_id = OrderId::from(request.order_id.clone());
    let order = orders
        .fetch_order(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    if order.status != OrderStatus::Pending {
        return Err(ServerError::ActionForbidden(format!(
            "Order {order_id} is {} and cannot take a new payment",
            order.status
        )));
    }
    let outcome = vouchers.redeem(&request.voucher_code, order.total).await?;
    if let RedeemOutcome::Completed { code, .. } = &outcome {
        let confirmation = PaymentConfirmation {
            order_id: order_id.clone(),
            txid: format!("voucher:{code}"),
            method: PaymentMethod::Voucher,
            amount: order.total,
        };
        if let Err(e) = orders.confirm_payment(confirmation).await {
            if !e.is_noop() {
                return Err(e.into());
            }
        }
        info!("🎁️ Order [{order_id}] paid in full by voucher");
    }
    Ok(HttpResponse::Ok().json(json!({ "order_id": order_id.as_str(), "redemption": outcome })))
}

async fn record_charge_outcome<B: PaymentGatewayDatabase>(
    api: &OrderFlowApi<B>,
    order_id: &OrderId,
    method: PaymentMethod,
    total: Money,
    outcome: InitiateOutcome,
) -> Result<HttpResponse, ServerError> {
    let attempt = NewTransaction::new(order_id.clone(), method, total);
    match &outcome {
        InitiateOutcome::Completed { reference } => {
            api.add_payment_attempt(attempt.with_txid(reference.clone())).await?;
            // Synchronous success. The webhook will arrive too; the reconciler swallows the duplicate.
            let confirmation = PaymentConfirmation {
                order_id: order_id.clone(),
                txid: reference.clone(),
                method,
                amount: total,
            };
            if let Err(e) = api.confirm_payment(confirmation).await {
                if !e.is_noop() {
                    return Err(e.into());
                }
            }
        },
        InitiateOutcome::RequiresAction { reference, .. } => {
            let attempt =
                attempt.with_txid(reference.clone()).with_status(TransactionStatus::RequiresAction);
            api.add_payment_attempt(attempt).await?;
        },
        InitiateOutcome::Pending { reference, .. } => {
            api.add_payment_attempt(attempt.with_txid(reference.clone())).await?;
        },
        InitiateOutcome::Declined { code, message } => {
            let metadata = json!({ "decline_code": code, "message": message }).to_string();
            let attempt = attempt.with_status(TransactionStatus::Failed).with_metadata(metadata);
            api.add_payment_attempt(attempt).await?;
            return Err(ServerError::PaymentDeclined { code: code.clone(), message: message.clone() });
        },
    }
    let response = PaymentResponse { order_id: order_id.as_str().to_string(), total, method, outcome };
    Ok(HttpResponse::Ok().json(response))
}

route!(order_by_id => Get "/orders/{id}" impl PaymentGatewayDatabase);
/// Fetches an order together with its line items and payment attempts.
pub async fn order_by_id<B: PaymentGatewayDatabase>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ GET order_by_id({order_id})");
    let order = api
        .fetch_order(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    let items = api.fetch_order_items(&order_id).await?;
    let transactions = api.fetch_transactions_for_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "order": order, "items": items, "transactions": transactions })))
}

/// The flattened query-string form of [`OrderQueryFilter`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderSearchQuery {
    pub email: Option<String>,
    pub player_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl From<OrderSearchQuery> for OrderQueryFilter {
    fn from(q: OrderSearchQuery) -> Self {
        OrderQueryFilter {
            email: q.email,
            player_id: q.player_id,
            status: q.status.map(|s| vec![s]),
            since: q.since,
            until: q.until,
        }
    }
}

route!(search_orders => Get "/orders" impl PaymentGatewayDatabase);
pub async fn search_orders<B: PaymentGatewayDatabase>(
    query: web::Query<OrderSearchQuery>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let filter = OrderQueryFilter::from(query.into_inner());
    debug!("💻️ GET search_orders({filter:?})");
    let orders = api.search_orders(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(retry_delivery => Post "/orders/{id}/retry_delivery" impl PaymentGatewayDatabase, DeliveryProvider);
/// Manually retries delivery for a paid order whose dispatch previously exhausted its attempts.
pub async fn retry_delivery<B, D>(
    path: web::Path<String>,
    api: web::Data<FulfillmentApi<B, D>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    D: DeliveryProvider,
{
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ POST retry_delivery({order_id})");
    match api.retry_delivery(&order_id).await {
        Ok(order) => Ok(HttpResponse::Ok().json(order)),
        Err(e) if e.is_noop() => Ok(HttpResponse::Ok().json(JsonResponse::success("Order is already delivered."))),
        Err(e) => Err(e.into()),
    }
}

route!(refund_order => Post "/orders/{id}/refund" impl PaymentGatewayDatabase);
/// Starts a refund of the order's confirmed payment with its provider. The order itself only transitions to
/// `refunded` when the provider's refund webhook lands, so the response reports the provider's refund
/// reference, not a new order state.
pub async fn refund_order<B: PaymentGatewayDatabase>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
    adapters: web::Data<PaymentAdapters>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ POST refund_order({order_id})");
    let order = api
        .fetch_order(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    if order.status != OrderStatus::PaymentConfirmed {
        return Err(ServerError::ActionForbidden(format!(
            "Order {order_id} is {} and cannot be refunded",
            order.status
        )));
    }
    let transactions = api.fetch_transactions_for_order(&order_id).await?;
    let txid = transactions
        .into_iter()
        .filter(|t| t.status == TransactionStatus::Completed)
        .find_map(|t| t.txid.map(|txid| (t.method, txid)));
    let Some((method, txid)) = txid else {
        return Err(ServerError::NoRecordFound(format!("Completed payment for order {order_id}")));
    };
    let adapter = adapters.for_method(method).ok_or_else(|| {
        ServerError::ActionForbidden("Voucher payments are refunded by issuing a new voucher".to_string())
    })?;
    let refund = adapter.refund(&txid).await?;
    info!("💻️ Refund of {} initiated for [{order_id}] under reference {}", refund.amount, refund.reference);
    Ok(HttpResponse::Ok().json(json!({ "order_id": order_id.as_str(), "refund": refund })))
}

//----------------------------------------------   Vouchers  ----------------------------------------------------

route!(redeem_voucher => Post "/vouchers/redeem" impl VoucherStore);
/// Redeems an amount against a gift voucher. All redemption outcomes, including invalid codes, come back as a
/// 200 with a tagged `result` field; only infrastructure failures produce an error status.
pub async fn redeem_voucher<B: VoucherStore>(
    body: web::Json<crate::data_objects::VoucherRedeemRequest>,
    api: web::Data<VoucherApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    if !request.amount.is_positive() {
        return Err(ServerError::InvalidRequestBody("Redemption amount must be positive".to_string()));
    }
    debug!("💻️ POST redeem_voucher for {}", request.amount);
    let outcome = api.redeem(&request.code, request.amount).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(create_voucher => Post "/vouchers" impl VoucherStore);
pub async fn create_voucher<B: VoucherStore>(
    body: web::Json<VoucherCreateRequest>,
    api: web::Data<VoucherApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    if !request.balance.is_positive() {
        return Err(ServerError::InvalidRequestBody("Voucher balance must be positive".to_string()));
    }
    let voucher = NewVoucher {
        code: request.code.unwrap_or_default(),
        balance: request.balance,
        max_uses: request.max_uses,
        expires_at: request.expires_at,
        is_reusable: request.is_reusable,
        source: request.source.unwrap_or_else(|| "internal".to_string()),
    };
    let voucher = api.create_voucher(voucher).await?;
    Ok(HttpResponse::Ok().json(voucher))
}

route!(deactivate_voucher => Post "/vouchers/{code}/deactivate" impl VoucherStore);
pub async fn deactivate_voucher<B: VoucherStore>(
    path: web::Path<String>,
    api: web::Data<VoucherApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = path.into_inner();
    let voucher = api.deactivate_voucher(&code).await?;
    Ok(HttpResponse::Ok().json(voucher))
}

route!(voucher_stats => Get "/vouchers/stats" impl VoucherStore);
pub async fn voucher_stats<B: VoucherStore>(api: web::Data<VoucherApi<B>>) -> Result<HttpResponse, ServerError> {
    let stats = api.stats().await?;
    Ok(HttpResponse::Ok().json(stats))
}

//----------------------------------------------   Payouts   ----------------------------------------------------

route!(initiate_payout => Post "/payouts" impl PayoutStore, TransferProvider);
/// Queues a payout to a store's connected account and submits the transfer. A failed submission still returns
/// 200: the payout is stored as failed with a retry scheduled, and the record reports its own state.
pub async fn initiate_payout<B, T>(
    body: web::Json<PayoutRequest>,
    api: web::Data<PayoutApi<B, T>>,
) -> Result<HttpResponse, ServerError>
where
    B: PayoutStore,
    T: TransferProvider,
{
    let request = body.into_inner();
    if !request.amount.is_positive() {
        return Err(ServerError::InvalidRequestBody("Payout amount must be positive".to_string()));
    }
    debug!("💻️ POST initiate_payout of {} to {}", request.amount, request.store_id);
    let payout = api
        .initiate(topup_payment_engine::db_types::NewPayout::new(request.store_id, request.amount))
        .await?;
    Ok(HttpResponse::Ok().json(payout))
}

route!(retry_payout => Post "/payouts/{id}/retry" impl PayoutStore, TransferProvider);
pub async fn retry_payout<B, T>(
    path: web::Path<i64>,
    api: web::Data<PayoutApi<B, T>>,
) -> Result<HttpResponse, ServerError>
where
    B: PayoutStore,
    T: TransferProvider,
{
    let id = path.into_inner();
    debug!("💻️ POST retry_payout({id})");
    let payout = api.retry(id).await?;
    Ok(HttpResponse::Ok().json(payout))
}

route!(payout_by_id => Get "/payouts/{id}" impl PayoutStore, TransferProvider);
pub async fn payout_by_id<B, T>(
    path: web::Path<i64>,
    api: web::Data<PayoutApi<B, T>>,
) -> Result<HttpResponse, ServerError>
where
    B: PayoutStore,
    T: TransferProvider,
{
    let id = path.into_inner();
    let payout =
        api.fetch_payout(id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Payout #{id}")))?;
    Ok(HttpResponse::Ok().json(payout))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data_objects::OrderItemRequest;

    fn valid_request() -> OrderRequest {
        OrderRequest {
            email: "alice@example.com".to_string(),
            player_id: "player-001".to_string(),
            player_nickname: None,
            country: "US".to_string(),
            items: vec![OrderItemRequest {
                sku: "GEMS-500".to_string(),
                name: "500 Gems".to_string(),
                quantity: 2,
                unit_price: Money::from_cents(499),
            }],
            idempotency_key: None,
        }
    }

    #[test]
    fn a_valid_order_totals_the_cart() {
        let total = validate_order(&valid_request()).unwrap();
        assert_eq!(total, Money::from_cents(998));
    }

    #[test]
    fn orders_reject_bad_emails() {
        let mut req = valid_request();
        req.email = "not-an-email".to_string();
        assert!(validate_order(&req).is_err());
    }

    #[test]
    fn orders_reject_short_and_long_player_ids() {
        let mut req = valid_request();
        req.player_id = "ab".to_string();
        assert!(validate_order(&req).is_err());
        req.player_id = "x".repeat(51);
        assert!(validate_order(&req).is_err());
        req.player_id = "abc".to_string();
        assert!(validate_order(&req).is_ok());
    }

    #[test]
    fn orders_reject_bad_country_codes() {
        let mut req = valid_request();
        req.country = "USA".to_string();
        assert!(validate_order(&req).is_err());
        req.country = "1A".to_string();
        assert!(validate_order(&req).is_err());
    }

    #[test]
    fn orders_reject_empty_carts_and_bad_items() {
        let mut req = valid_request();
        req.items.clear();
        assert!(validate_order(&req).is_err());
        req = valid_request();
        req.items[0].quantity = 0;
        assert!(validate_order(&req).is_err());
    }

    #[test]
    fn orders_reject_oversized_quantities_and_overflowing_totals() {
        let mut req = valid_request();
        req.items[0].quantity = MAX_ITEM_QUANTITY + 1;
        assert!(validate_order(&req).is_err());
        req.items[0].quantity = i64::MAX;
        assert!(validate_order(&req).is_err());
        // A total that wraps i64 must be rejected, not persisted.
        req = valid_request();
        req.items[0].quantity = 2;
        req.items[0].unit_price = Money::from_cents(i64::MAX);
        assert!(validate_order(&req).is_err());
        req.items.push(OrderItemRequest {
            sku: "GEMS-900".to_string(),
            name: "900 Gems".to_string(),
            quantity: 1,
            unit_price: Money::from_cents(i64::MAX),
        });
        req.items[0].quantity = 1;
        assert!(validate_order(&req).is_err());
    }

    #[test]
    fn orders_enforce_total_bounds() {
        let mut req = valid_request();
        req.items[0].quantity = 1;
        req.items[0].unit_price = Money::from_cents(49);
        assert!(validate_order(&req).is_err());
        req.items[0].unit_price = MIN_ORDER_TOTAL;
        assert!(validate_order(&req).is_ok());
        req.items[0].unit_price = Money::from_dollars(10_001);
        assert!(validate_order(&req).is_err());
        req.items[0].unit_price = MAX_ORDER_TOTAL;
        assert!(validate_order(&req).is_ok());
    }
}
