use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;

use crate::endpoint_tests::helpers::{new_test_db, send_request};

fn order_request(idempotency_key: Option<&str>) -> TestRequest {
    let mut body = json!({
        "email": "alice@example.com",
        "player_id": "player-001",
        "country": "US",
        "items": [ { "sku": "GEMS-500", "name": "500 Gems", "quantity": 1, "unit_price": 1999 } ]
    });
    if let Some(key) = idempotency_key {
        body["idempotency_key"] = json!(key);
    }
    TestRequest::post().uri("/api/orders").set_json(body)
}

fn order_id_of(body: &str) -> String {
    let parsed: serde_json::Value = serde_json::from_str(body).unwrap();
    parsed["order_id"].as_str().unwrap().to_string()
}

#[actix_web::test]
async fn creating_an_order_returns_its_id_and_total() {
    let db = new_test_db().await;
    let (status, body) = send_request(&db, order_request(None)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""total":1999"#), "unexpected body: {body}");
    assert!(body.contains(r#""duplicate":false"#), "unexpected body: {body}");
}

#[actix_web::test]
async fn resubmitting_an_idempotency_key_returns_the_original_order() {
    let db = new_test_db().await;
    let (status, body) = send_request(&db, order_request(Some("idem-1"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let first_id = order_id_of(&body);

    let (status, body) = send_request(&db, order_request(Some("idem-1"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(order_id_of(&body), first_id);
    assert!(body.contains(r#""duplicate":true"#), "unexpected body: {body}");
}

#[actix_web::test]
async fn a_voucher_pays_an_order_in_full() {
    let db = new_test_db().await;
    let create = TestRequest::post()
        .uri("/api/vouchers")
        .set_json(json!({ "code": "order-pay-1", "balance": 5000, "is_reusable": true }));
    let (status, body) = send_request(&db, create).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = send_request(&db, order_request(None)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order_id = order_id_of(&body);

    let pay = TestRequest::post()
        .uri("/api/payments/voucher")
        .set_json(json!({ "order_id": order_id, "voucher_code": "order-pay-1" }));
    let (status, body) = send_request(&db, pay).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""result":"completed""#), "unexpected body: {body}");

    let (status, body) = send_request(&db, TestRequest::get().uri(&format!("/api/orders/{order_id}"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""status":"payment_confirmed""#), "unexpected body: {body}");
}

#[actix_web::test]
async fn an_unknown_voucher_leaves_the_order_pending() {
    let db = new_test_db().await;
    let (_, body) = send_request(&db, order_request(None)).await;
    let order_id = order_id_of(&body);

    let pay = TestRequest::post()
        .uri("/api/payments/voucher")
        .set_json(json!({ "order_id": order_id, "voucher_code": "GIFT-NOPE" }));
    let (status, body) = send_request(&db, pay).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""result":"invalid""#), "unexpected body: {body}");

    let (_, body) = send_request(&db, TestRequest::get().uri(&format!("/api/orders/{order_id}"))).await;
    assert!(body.contains(r#""status":"pending""#), "unexpected body: {body}");
}
