use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use topup_payment_engine::{
    db_types::*,
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::PaymentConfirmation,
    DeliveryProvider,
    FulfillmentApi,
    FulfillmentConfig,
    OrderFlowApi,
    PaymentGatewayError,
    SqliteDatabase,
    UpstreamError,
};
use tup_common::{Money, PaymentMethod};

/// A scripted supplier. Fails the first `failures` calls with the given error, then succeeds.
#[derive(Clone)]
struct ScriptedSupplier {
    calls: Arc<AtomicUsize>,
    failures: usize,
    retryable: bool,
}

impl ScriptedSupplier {
    fn new(failures: usize, retryable: bool) -> Self {
        Self { calls: Arc::new(AtomicUsize::new(0)), failures, retryable }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DeliveryProvider for ScriptedSupplier {
    async fn deliver(&self, order: &Order, _items: &[OrderItem]) -> Result<String, UpstreamError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            if self.retryable {
                Err(UpstreamError::Unavailable("supplier timeout".to_string()))
            } else {
                Err(UpstreamError::Rejected { status: 400, message: "unknown player id".to_string() })
            }
        } else {
            Ok(format!("DLV-{}", order.order_id.as_str()))
        }
    }
}

fn fast_config() -> FulfillmentConfig {
    FulfillmentConfig { max_attempts: 3, initial_backoff: Duration::from_millis(5), max_concurrent: 4 }
}

async fn paid_order(id: &str) -> (SqliteDatabase, OrderId) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let orders = OrderFlowApi::new(db.clone(), EventProducers::default());
    let total = Money::from_cents(999);
    let order = NewOrder::new(
        OrderId::from(id.to_string()),
        "alice@example.com".to_string(),
        "player-001".to_string(),
        total,
    )
    .with_items(vec![NewOrderItem {
        sku: "GEMS-100".to_string(),
        name: "100 Gems".to_string(),
        quantity: 1,
        unit_price: total,
    }]);
    let (order, _) = orders.process_new_order(order).await.unwrap();
    let confirmation = PaymentConfirmation {
        order_id: order.order_id.clone(),
        txid: format!("pi_{id}"),
        method: PaymentMethod::Stripe,
        amount: total,
    };
    orders.confirm_payment(confirmation).await.unwrap();
    (db, order.order_id)
}

#[tokio::test]
async fn paid_order_is_delivered_first_time() {
    let (db, order_id) = paid_order("ful-happy").await;
    let supplier = ScriptedSupplier::new(0, true);
    let api = FulfillmentApi::new(db, supplier.clone(), fast_config(), EventProducers::default());

    let order = api.dispatch(&order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
    assert_eq!(order.delivery_ref.as_deref(), Some("DLV-ful-happy"));
    assert_eq!(supplier.call_count(), 1);

    // Dispatching a delivered order again changes nothing.
    let err = api.dispatch(&order_id).await.unwrap_err();
    assert!(err.is_noop());
    assert_eq!(supplier.call_count(), 1);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let (db, order_id) = paid_order("ful-flaky").await;
    let supplier = ScriptedSupplier::new(2, true);
    let api = FulfillmentApi::new(db, supplier.clone(), fast_config(), EventProducers::default());

    let order = api.dispatch(&order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
    assert_eq!(supplier.call_count(), 3);
}

#[tokio::test]
async fn exhausted_retries_leave_the_order_confirmed() {
    let (db, order_id) = paid_order("ful-down").await;
    let supplier = ScriptedSupplier::new(5, true);
    let api = FulfillmentApi::new(db.clone(), supplier.clone(), fast_config(), EventProducers::default());

    let err = api.dispatch(&order_id).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::DeliveryFailed(_)));
    assert_eq!(supplier.call_count(), 3);

    // The order keeps its payment and records the failure for a manual retry.
    let orders = OrderFlowApi::new(db, EventProducers::default());
    let order = orders.fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::PaymentConfirmed);
    assert_eq!(order.delivery_attempts, 1);
    assert!(order.delivery_error.as_deref().unwrap_or("").contains("timeout"));

    // The supplier recovers and the manual retry goes through.
    let order = api.retry_delivery(&order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn rejections_are_not_retried() {
    let (db, order_id) = paid_order("ful-reject").await;
    let supplier = ScriptedSupplier::new(5, false);
    let api = FulfillmentApi::new(db.clone(), supplier.clone(), fast_config(), EventProducers::default());

    let err = api.dispatch(&order_id).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::DeliveryFailed(_)));
    assert_eq!(supplier.call_count(), 1);

    let orders = OrderFlowApi::new(db, EventProducers::default());
    let order = orders.fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::PaymentConfirmed);
    assert!(order.delivery_error.as_deref().unwrap_or("").contains("unknown player id"));
}

#[tokio::test]
async fn unpaid_orders_cannot_be_dispatched() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let orders = OrderFlowApi::new(db.clone(), EventProducers::default());
    let order = NewOrder::new(
        OrderId::from("ful-unpaid".to_string()),
        "alice@example.com".to_string(),
        "player-001".to_string(),
        Money::from_cents(500),
    );
    orders.process_new_order(order).await.unwrap();

    let supplier = ScriptedSupplier::new(0, true);
    let api = FulfillmentApi::new(db, supplier.clone(), fast_config(), EventProducers::default());
    let err = api.dispatch(&OrderId::from("ful-unpaid".to_string())).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::FulfillmentForbidden(_)));
    assert_eq!(supplier.call_count(), 0);
}

#[tokio::test]
async fn supplier_callback_confirms_delivery_idempotently() {
    let (db, order_id) = paid_order("ful-callback").await;
    let supplier = ScriptedSupplier::new(0, true);
    let api = FulfillmentApi::new(db, supplier, fast_config(), EventProducers::default());

    let order = api.confirm_delivery(&order_id, "DLV-EXT-1").await.unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
    assert_eq!(order.delivery_ref.as_deref(), Some("DLV-EXT-1"));

    let err = api.confirm_delivery(&order_id, "DLV-EXT-1").await.unwrap_err();
    assert!(err.is_noop());
}
