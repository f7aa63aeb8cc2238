use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use topup_payment_engine::{
    db_types::*,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    PaymentGatewayError,
    PayoutApi,
    SqliteDatabase,
    TransferProvider,
    UpstreamError,
};
use tup_common::Money;

/// A scripted transfer rail. Fails the first `failures` submissions, then accepts them.
#[derive(Clone)]
struct ScriptedRail {
    calls: Arc<AtomicUsize>,
    failures: usize,
}

impl ScriptedRail {
    fn new(failures: usize) -> Self {
        Self { calls: Arc::new(AtomicUsize::new(0)), failures }
    }
}

impl TransferProvider for ScriptedRail {
    async fn create_transfer(&self, payout: &Payout) -> Result<String, UpstreamError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Err(UpstreamError::Unavailable("transfer rail down".to_string()))
        } else {
            Ok(format!("tr_{}_{n}", payout.id))
        }
    }
}

async fn new_api(failures: usize) -> PayoutApi<SqliteDatabase, ScriptedRail> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    PayoutApi::new(db, ScriptedRail::new(failures))
}

#[tokio::test]
async fn payout_moves_to_processing_on_submission() {
    let api = new_api(0).await;
    let payout = api.initiate(NewPayout::new("store-1".to_string(), Money::from_dollars(150))).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Processing);
    assert!(payout.transfer_id.as_deref().unwrap_or("").starts_with("tr_"));
    assert_eq!(payout.retry_count, 0);
}

#[tokio::test]
async fn failed_submission_schedules_a_retry() {
    let api = new_api(1).await;
    let payout = api.initiate(NewPayout::new("store-2".to_string(), Money::from_dollars(80))).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Failed);
    assert_eq!(payout.retry_count, 1);
    assert!(payout.next_retry_at.is_some());
    assert!(payout.error_message.as_deref().unwrap_or("").contains("rail down"));

    // The rail recovers and a manual retry succeeds.
    let payout = api.retry(payout.id).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Processing);
}

#[tokio::test]
async fn webhook_settles_the_transfer() {
    let api = new_api(0).await;
    let payout = api.initiate(NewPayout::new("store-3".to_string(), Money::from_dollars(40))).await.unwrap();
    let transfer_id = payout.transfer_id.clone().unwrap();

    let settled = api.transfer_completed(&transfer_id).await.unwrap();
    assert_eq!(settled.status, PayoutStatus::Completed);
    assert!(settled.processed_at.is_some());

    // Replayed webhook is a no-op.
    let err = api.transfer_completed(&transfer_id).await.unwrap_err();
    assert!(err.is_noop());
}

#[tokio::test]
async fn provider_failure_reschedules_six_hours_out() {
    let api = new_api(0).await;
    let payout = api.initiate(NewPayout::new("store-4".to_string(), Money::from_dollars(25))).await.unwrap();
    let transfer_id = payout.transfer_id.clone().unwrap();

    let failed = api.transfer_failed(&transfer_id, "insufficient platform balance").await.unwrap();
    assert_eq!(failed.status, PayoutStatus::Failed);
    assert_eq!(failed.retry_count, 1);
    let delay = failed.next_retry_at.unwrap() - chrono::Utc::now();
    assert!(delay > chrono::Duration::hours(5));
}

#[tokio::test]
async fn completed_transfers_can_be_reversed() {
    let api = new_api(0).await;
    let payout = api.initiate(NewPayout::new("store-5".to_string(), Money::from_dollars(60))).await.unwrap();
    let transfer_id = payout.transfer_id.clone().unwrap();
    api.transfer_completed(&transfer_id).await.unwrap();

    let reversed = api.transfer_reversed(&transfer_id).await.unwrap();
    assert_eq!(reversed.status, PayoutStatus::Reversed);

    // A reversed payout cannot be retried.
    let err = api.retry(reversed.id).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::PayoutRetryForbidden(_)));
}

#[tokio::test]
async fn retries_are_capped() {
    let api = new_api(100).await;
    let mut payout = api.initiate(NewPayout::new("store-6".to_string(), Money::from_dollars(10))).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Failed);
    // Four more failed retries exhaust the budget.
    for _ in 0..4 {
        payout = api.retry(payout.id).await.unwrap();
        assert_eq!(payout.status, PayoutStatus::Failed);
    }
    assert_eq!(payout.retry_count, 5);
    let err = api.retry(payout.id).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::PayoutRetryForbidden(_)));
}

#[tokio::test]
async fn due_retries_are_resubmitted() {
    let api = new_api(1).await;
    let payout = api.initiate(NewPayout::new("store-7".to_string(), Money::from_dollars(30))).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Failed);

    // Nothing is due yet; the retry is an hour out.
    let processed = api.process_due_retries().await.unwrap();
    assert!(processed.is_empty());

    // Force the schedule and the sweep picks it up.
    let past = chrono::Utc::now() - chrono::Duration::minutes(1);
    sqlx::query("UPDATE payouts SET next_retry_at = $1 WHERE id = $2")
        .bind(past)
        .bind(payout.id)
        .execute(api.db().pool())
        .await
        .unwrap();
    let processed = api.process_due_retries().await.unwrap();
    assert_eq!(processed.len(), 1);
    assert_eq!(processed[0].status, PayoutStatus::Processing);
}
