use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;

use crate::endpoint_tests::helpers::{new_test_db, send_request};

fn redeem_request(code: &str, amount: i64) -> TestRequest {
    TestRequest::post().uri("/api/vouchers/redeem").set_json(json!({ "code": code, "amount": amount }))
}

#[actix_web::test]
async fn create_and_redeem_a_voucher() {
    let db = new_test_db().await;
    let create = TestRequest::post()
        .uri("/api/vouchers")
        .set_json(json!({ "code": "endpoint-test-1", "balance": 5000, "is_reusable": false }));
    let (status, body) = send_request(&db, create).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    // Codes are normalized on the way in.
    assert!(body.contains("ENDPOINT-TEST-1"), "unexpected body: {body}");

    let (status, body) = send_request(&db, redeem_request(" endpoint-test-1 ", 2000)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""result":"completed""#), "unexpected body: {body}");
    // Single-use vouchers burn in full; nothing remains after the redemption.
    assert!(body.contains(r#""remaining":0"#), "unexpected body: {body}");
}

#[actix_web::test]
async fn unknown_codes_come_back_as_invalid() {
    let db = new_test_db().await;
    let (status, body) = send_request(&db, redeem_request("GIFT-DOES-NOT-EXIST", 100)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""result":"invalid""#), "unexpected body: {body}");
}

#[actix_web::test]
async fn nonpositive_redemptions_are_rejected() {
    let db = new_test_db().await;
    let (status, _) = send_request(&db, redeem_request("GIFT-ANY", 0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
