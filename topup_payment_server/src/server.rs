//! Server assembly.
//!
//! [`run_server`] opens the database and hands off to [`create_server_instance`], which wires the engine APIs,
//! the provider clients and the event hooks into an actix application.
//!
//! The order-paid hook is where payment and fulfillment meet: once the reconciler commits a confirmation, the
//! hook dispatches the order to the supplier on a background task, so webhook responses never wait on delivery.
use std::time::Duration;

use actix_web::{dev::{Server, Service}, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use payment_providers::{DeliveryClient, StripeClient};
use topup_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    FulfillmentApi,
    OrderFlowApi,
    PayoutApi,
    SqliteDatabase,
    VoucherApi,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{PaymentAdapters, StripeTransfers, TopUpDeliveryProvider},
    routes::{
        health,
        CreateOrderRoute,
        CreateVoucherRoute,
        DeactivateVoucherRoute,
        InitiatePaymentRoute,
        InitiatePayoutRoute,
        OrderByIdRoute,
        PayWithVoucherRoute,
        PayoutByIdRoute,
        RedeemVoucherRoute,
        RefundOrderRoute,
        RetryDeliveryRoute,
        RetryPayoutRoute,
        SearchOrdersRoute,
        VoucherStatsRoute,
    },
    webhooks::{
        BinanceWebhookRoute,
        CoinbaseWebhookRoute,
        DeliveryCallbackRoute,
        PaypalWebhookRoute,
        StripeWebhookRoute,
        WebhookSecrets,
    },
};

const EVENT_BUFFER_SIZE: usize = 50;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let adapters = PaymentAdapters::try_from_config(&config.providers)?;
    let delivery_client = DeliveryClient::new(config.providers.delivery.clone())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let delivery_provider = TopUpDeliveryProvider::new(delivery_client);
    let stripe_client = StripeClient::new(config.providers.stripe.clone())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let transfers = StripeTransfers::new(stripe_client);
    let secrets = WebhookSecrets::from_provider_config(&config.providers);

    // The delivered hook has no downstream consumers of its own, so it is built first and its producer feeds the
    // fulfillment API. The paid hook captures that API and dispatches delivery off the webhook request path.
    let mut delivered_hooks = EventHooks::default();
    delivered_hooks.on_order_delivered(|event| {
        Box::pin(async move {
            info!("📬️ Order [{}] has been delivered to player {}", event.order.order_id, event.order.player_id);
        })
    });
    let delivered_handlers = EventHandlers::new(EVENT_BUFFER_SIZE, delivered_hooks);
    let delivered_producers = delivered_handlers.producers();

    let fulfillment =
        FulfillmentApi::new(db.clone(), delivery_provider, config.fulfillment.clone(), delivered_producers.clone());

    let hook_fulfillment = fulfillment.clone();
    let mut paid_hooks = EventHooks::default();
    paid_hooks.on_order_paid(move |event| {
        let api = hook_fulfillment.clone();
        Box::pin(async move {
            let order_id = event.order.order_id.clone();
            debug!("📬️ Payment confirmed for [{order_id}]. Dispatching fulfillment");
            match api.dispatch(&order_id).await {
                Ok(order) => info!("📬️ Order [{}] fulfilled. Status: {}", order.order_id, order.status),
                Err(e) if e.is_noop() => debug!("📬️ Order [{order_id}] was already delivered"),
                Err(e) => error!("📬️ Fulfillment of [{order_id}] did not complete: {e}"),
            }
        })
    });
    let paid_handlers = EventHandlers::new(EVENT_BUFFER_SIZE, paid_hooks);
    let producers = EventProducers {
        order_paid_producer: paid_handlers.producers().order_paid_producer,
        order_delivered_producer: delivered_producers.order_delivered_producer,
    };
    tokio::spawn(async move {
        delivered_handlers.start_handlers().await;
        paid_handlers.start_handlers().await;
    });

    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let vouchers_api = VoucherApi::new(db.clone());
        let payouts_api = PayoutApi::new(db.clone(), transfers.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("tup::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(vouchers_api))
            .app_data(web::Data::new(fulfillment.clone()))
            .app_data(web::Data::new(payouts_api))
            .app_data(web::Data::new(adapters.clone()))
            .app_data(web::Data::new(secrets.clone()));
        // The fixed /payments/voucher path must register before the /payments/{provider} pattern.
        let api_scope = web::scope("/api")
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(PayWithVoucherRoute::<SqliteDatabase, SqliteDatabase>::new())
            .service(InitiatePaymentRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(SearchOrdersRoute::<SqliteDatabase>::new())
            .service(RefundOrderRoute::<SqliteDatabase>::new())
            .service(RetryDeliveryRoute::<SqliteDatabase, TopUpDeliveryProvider>::new())
            .service(RedeemVoucherRoute::<SqliteDatabase>::new())
            .service(CreateVoucherRoute::<SqliteDatabase>::new())
            .service(DeactivateVoucherRoute::<SqliteDatabase>::new())
            .service(VoucherStatsRoute::<SqliteDatabase>::new())
            .service(InitiatePayoutRoute::<SqliteDatabase, StripeTransfers>::new())
            .service(RetryPayoutRoute::<SqliteDatabase, StripeTransfers>::new())
            .service(PayoutByIdRoute::<SqliteDatabase, StripeTransfers>::new());
        let use_x_forwarded_for = config.use_x_forwarded_for;
        let use_forwarded = config.use_forwarded;
        let webhook_scope = web::scope("/webhooks")
            .wrap_fn(move |req, srv| {
                // Signature verification gates access; the peer IP is only recorded for the audit trail. Proxy
                // headers are trusted only when the corresponding config flag is set.
                let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
                let peer_ip = req
                    .headers()
                    .get("X-Forwarded-For")
                    .and_then(|v| use_x_forwarded_for.then(|| v.to_str().ok()).flatten())
                    .or_else(|| {
                        req.headers().get("Forwarded").and_then(|v| use_forwarded.then(|| v.to_str().ok()).flatten())
                    })
                    .map(String::from)
                    .or(peer_addr);
                debug!("📨️ Webhook delivery from {}", peer_ip.as_deref().unwrap_or("unknown peer"));
                srv.call(req)
            })
            .service(StripeWebhookRoute::<SqliteDatabase, SqliteDatabase, StripeTransfers>::new())
            .service(PaypalWebhookRoute::<SqliteDatabase>::new())
            .service(BinanceWebhookRoute::<SqliteDatabase>::new())
            .service(CoinbaseWebhookRoute::<SqliteDatabase>::new())
            .service(DeliveryCallbackRoute::<SqliteDatabase, TopUpDeliveryProvider>::new());
        app.service(api_scope).service(webhook_scope).service(health)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
