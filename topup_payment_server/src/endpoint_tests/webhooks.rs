use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Utc;
use serde_json::json;
use topup_payment_engine::{
    db_types::{OrderId, OrderStatus},
    traits::PaymentConfirmation,
    PaymentGatewayDatabase,
};
use tup_common::{Money, PaymentMethod};

use crate::endpoint_tests::helpers::{
    hmac_hex,
    new_test_db,
    orders_api,
    sample_order,
    send_request,
    COINBASE_TEST_SECRET,
    DELIVERY_TEST_SECRET,
    STRIPE_TEST_SECRET,
};

fn coinbase_payload(order_id: &str) -> String {
    json!({
        "event": {
            "type": "charge:confirmed",
            "data": {
                "code": format!("CB-{order_id}"),
                "metadata": { "order_id": order_id },
                "pricing": { "local": { "value": "19.99" } }
            }
        }
    })
    .to_string()
}

fn coinbase_request(payload: &str, signature: String) -> TestRequest {
    TestRequest::post()
        .uri("/webhooks/coinbase")
        .insert_header(("X-CC-Webhook-Signature", signature))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(payload.to_string())
}

#[actix_web::test]
async fn coinbase_webhook_confirms_an_order() {
    let db = new_test_db().await;
    let api = orders_api(&db);
    let (order, _) = api.process_new_order(sample_order("order-cb-1", Money::from_cents(1999))).await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);

    let payload = coinbase_payload("order-cb-1");
    let sig = hmac_hex(COINBASE_TEST_SECRET, &payload);
    let (status, body) = send_request(&db, coinbase_request(&payload, sig)).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let order = api.fetch_order(&OrderId::from("order-cb-1".to_string())).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::PaymentConfirmed);
}

#[actix_web::test]
async fn replayed_webhooks_are_acknowledged() {
    let db = new_test_db().await;
    let api = orders_api(&db);
    api.process_new_order(sample_order("order-cb-2", Money::from_cents(1999))).await.unwrap();

    let payload = coinbase_payload("order-cb-2");
    let sig = hmac_hex(COINBASE_TEST_SECRET, &payload);
    let (status, _) = send_request(&db, coinbase_request(&payload, sig.clone())).await;
    assert_eq!(status, StatusCode::OK);
    // The provider redelivers. Same event, same 200.
    let (status, body) = send_request(&db, coinbase_request(&payload, sig)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("already"), "unexpected body: {body}");
}

#[actix_web::test]
async fn invalid_signatures_get_a_403_and_move_nothing() {
    let db = new_test_db().await;
    let api = orders_api(&db);
    api.process_new_order(sample_order("order-cb-3", Money::from_cents(1999))).await.unwrap();

    let payload = coinbase_payload("order-cb-3");
    let sig = hmac_hex("not-the-secret", &payload);
    let (status, _) = send_request(&db, coinbase_request(&payload, sig)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let order = api.fetch_order(&OrderId::from("order-cb-3".to_string())).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    // The rejected delivery still lands in the audit log, flagged as unverified.
    let events = db.fetch_webhook_events("coinbase").await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(!events[0].signature_valid);
    assert_eq!(events[0].event_type, "charge:confirmed");
}

#[actix_web::test]
async fn stripe_webhook_confirms_an_order() {
    let db = new_test_db().await;
    let api = orders_api(&db);
    api.process_new_order(sample_order("order-st-1", Money::from_cents(2500))).await.unwrap();

    let payload = json!({
        "type": "payment_intent.succeeded",
        "data": {
            "object": {
                "id": "pi_endpoint_1",
                "amount_received": 2500,
                "metadata": { "order_id": "order-st-1" }
            }
        }
    })
    .to_string();
    let ts = Utc::now().timestamp();
    let sig = hmac_hex(STRIPE_TEST_SECRET, &format!("{ts}.{payload}"));
    let req = TestRequest::post()
        .uri("/webhooks/stripe")
        .insert_header(("Stripe-Signature", format!("t={ts},v1={sig}")))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(payload);
    let (status, body) = send_request(&db, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let order = api.fetch_order(&OrderId::from("order-st-1".to_string())).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::PaymentConfirmed);
}

#[actix_web::test]
async fn delivery_callback_completes_a_paid_order() {
    let db = new_test_db().await;
    let api = orders_api(&db);
    let total = Money::from_cents(999);
    let (order, _) = api.process_new_order(sample_order("order-dl-1", total)).await.unwrap();
    api.confirm_payment(PaymentConfirmation {
        order_id: order.order_id.clone(),
        txid: "pi_dl_1".to_string(),
        method: PaymentMethod::Stripe,
        amount: total,
    })
    .await
    .unwrap();

    let payload = json!({ "order_id": "order-dl-1", "reference": "SUP-REF-1", "status": "delivered" }).to_string();
    let ts = Utc::now().timestamp();
    let sig = hmac_hex(DELIVERY_TEST_SECRET, &format!("{ts}.{payload}"));
    let req = TestRequest::post()
        .uri("/webhooks/delivery")
        .insert_header(("X-Topup-Signature", sig))
        .insert_header(("X-Topup-Timestamp", ts.to_string()))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(payload);
    let (status, body) = send_request(&db, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let order = api.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
    assert_eq!(order.delivery_ref.as_deref(), Some("SUP-REF-1"));
}
