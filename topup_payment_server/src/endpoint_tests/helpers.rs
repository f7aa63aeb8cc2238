use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use topup_payment_engine::{
    db_types::{NewOrder, NewOrderItem, Order, OrderId, OrderItem},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    DeliveryProvider,
    FulfillmentApi,
    FulfillmentConfig,
    OrderFlowApi,
    PayoutApi,
    SqliteDatabase,
    TransferProvider,
    UpstreamError,
    VoucherApi,
};
use tup_common::Money;

use crate::{
    routes::{health, CreateOrderRoute, CreateVoucherRoute, OrderByIdRoute, PayWithVoucherRoute, RedeemVoucherRoute},
    webhooks::{CoinbaseWebhookRoute, DeliveryCallbackRoute, StripeWebhookRoute, WebhookSecrets},
};

pub const STRIPE_TEST_SECRET: &str = "whsec_endpoint_test";
pub const COINBASE_TEST_SECRET: &str = "cb_endpoint_test";
pub const DELIVERY_TEST_SECRET: &str = "dl_endpoint_test";

pub fn test_secrets() -> WebhookSecrets {
    WebhookSecrets {
        stripe_webhook_secret: STRIPE_TEST_SECRET.to_string(),
        coinbase_webhook_secret: COINBASE_TEST_SECRET.to_string(),
        delivery_shared_secret: DELIVERY_TEST_SECRET.to_string(),
        ..WebhookSecrets::default()
    }
}

pub fn hmac_hex(key: &str, message: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes()).unwrap();
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// A supplier stub that accepts every delivery on the first attempt.
#[derive(Debug, Clone)]
pub struct InstantSupplier;

impl DeliveryProvider for InstantSupplier {
    async fn deliver(&self, order: &Order, _items: &[OrderItem]) -> Result<String, UpstreamError> {
        Ok(format!("SUP-{}", order.order_id))
    }
}

/// A payout rail stub that accepts every transfer.
#[derive(Debug, Clone)]
pub struct InstantRail;

impl TransferProvider for InstantRail {
    async fn create_transfer(
        &self,
        payout: &topup_payment_engine::db_types::Payout,
    ) -> Result<String, UpstreamError> {
        Ok(format!("tr_{}", payout.id))
    }
}

pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub fn orders_api(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db.clone(), EventProducers::default())
}

pub fn sample_order(id: &str, total: Money) -> NewOrder {
    NewOrder::new(OrderId::from(id.to_string()), "alice@example.com".to_string(), "player-001".to_string(), total)
        .with_items(vec![NewOrderItem {
            sku: "GEMS-500".to_string(),
            name: "500 Gems".to_string(),
            quantity: 1,
            unit_price: total,
        }])
}

/// Spins up a test app against the given database and plays a single request into it.
pub async fn send_request(db: &SqliteDatabase, req: TestRequest) -> (StatusCode, String) {
    let fulfillment = FulfillmentApi::new(
        db.clone(),
        InstantSupplier,
        FulfillmentConfig::default(),
        EventProducers::default(),
    );
    let payouts = PayoutApi::new(db.clone(), InstantRail);
    let app = App::new()
        .app_data(web::Data::new(orders_api(db)))
        .app_data(web::Data::new(VoucherApi::new(db.clone())))
        .app_data(web::Data::new(fulfillment))
        .app_data(web::Data::new(payouts))
        .app_data(web::Data::new(test_secrets()))
        .service(
            web::scope("/api")
                .service(CreateOrderRoute::<SqliteDatabase>::new())
                .service(PayWithVoucherRoute::<SqliteDatabase, SqliteDatabase>::new())
                .service(OrderByIdRoute::<SqliteDatabase>::new())
                .service(RedeemVoucherRoute::<SqliteDatabase>::new())
                .service(CreateVoucherRoute::<SqliteDatabase>::new()),
        )
        .service(
            web::scope("/webhooks")
                .service(StripeWebhookRoute::<SqliteDatabase, SqliteDatabase, InstantRail>::new())
                .service(CoinbaseWebhookRoute::<SqliteDatabase>::new())
                .service(DeliveryCallbackRoute::<SqliteDatabase, InstantSupplier>::new()),
        )
        .service(health);
    let service = test::init_service(app).await;
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}
