mod helpers;
mod orders;
mod vouchers;
mod webhooks;

use actix_web::{http::StatusCode, test::TestRequest};

use crate::endpoint_tests::helpers::{new_test_db, send_request};

#[actix_web::test]
async fn health_check() {
    let db = new_test_db().await;
    let (status, body) = send_request(&db, TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}
