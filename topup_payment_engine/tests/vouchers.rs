use chrono::{Duration, Utc};
use topup_payment_engine::{
    db_types::NewVoucher,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::RedeemOutcome,
    SqliteDatabase,
    VoucherApi,
};
use tup_common::Money;

async fn new_api() -> VoucherApi<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    VoucherApi::new(db)
}

#[tokio::test]
async fn single_use_voucher_burns_in_full() {
    let api = new_api().await;
    let voucher =
        api.create_voucher(NewVoucher::new("gift-abc-1".to_string(), Money::from_cents(2500))).await.unwrap();
    assert_eq!(voucher.code, "GIFT-ABC-1");

    let outcome = api.redeem(" gift-abc-1 ", Money::from_cents(1000)).await.unwrap();
    match outcome {
        RedeemOutcome::Completed { debited, remaining, reissued_code, .. } => {
            assert_eq!(debited, Money::from_cents(1000));
            assert_eq!(remaining, Money::from_cents(0));
            assert!(reissued_code.is_none());
        },
        other => panic!("Expected Completed, got {other:?}"),
    }
    // Single use. The unredeemed remainder is gone and the code is dead.
    let voucher = api.fetch_voucher("GIFT-ABC-1").await.unwrap().unwrap();
    assert!(!voucher.is_active);
    let outcome = api.redeem("GIFT-ABC-1", Money::from_cents(1)).await.unwrap();
    assert!(matches!(outcome, RedeemOutcome::Invalid));
}

#[tokio::test]
async fn reusable_voucher_reissues_its_remainder() {
    let api = new_api().await;
    let mut voucher = NewVoucher::new("gift-multi-1".to_string(), Money::from_cents(5000));
    voucher.is_reusable = true;
    api.create_voucher(voucher).await.unwrap();

    let outcome = api.redeem("GIFT-MULTI-1", Money::from_cents(3000)).await.unwrap();
    let reissued_code = match outcome {
        RedeemOutcome::Completed { debited, reissued_code, .. } => {
            assert_eq!(debited, Money::from_cents(3000));
            reissued_code.expect("reusable voucher should reissue its remainder")
        },
        other => panic!("Expected Completed, got {other:?}"),
    };

    // The original code is spent; the remainder lives on a fresh single-use code.
    let original = api.fetch_voucher("GIFT-MULTI-1").await.unwrap().unwrap();
    assert!(!original.is_active);
    assert_eq!(original.balance, Money::from_cents(0));
    let reissued = api.fetch_voucher(&reissued_code).await.unwrap().unwrap();
    assert!(reissued.is_active);
    assert!(!reissued.is_reusable);
    assert_eq!(reissued.balance, Money::from_cents(2000));
    assert_eq!(reissued.max_uses, Some(1));
}

#[tokio::test]
async fn concurrent_redemptions_settle_exactly_once() {
    let api = new_api().await;
    api.create_voucher(NewVoucher::new("gift-race".to_string(), Money::from_cents(1000))).await.unwrap();

    let (first, second) = tokio::join!(
        api.redeem("GIFT-RACE", Money::from_cents(1000)),
        api.redeem("GIFT-RACE", Money::from_cents(1000)),
    );
    let outcomes = [first.unwrap(), second.unwrap()];
    let completed = outcomes.iter().filter(|o| matches!(o, RedeemOutcome::Completed { .. })).count();
    assert_eq!(completed, 1, "exactly one concurrent redemption may settle, got {outcomes:?}");
    // The loser is told the code is spent, not handed an error.
    assert!(outcomes.iter().all(|o| matches!(
        o,
        RedeemOutcome::Completed { .. } | RedeemOutcome::Invalid | RedeemOutcome::InsufficientBalance { .. }
    )));
    // The balance moved once.
    let voucher = api.fetch_voucher("GIFT-RACE").await.unwrap().unwrap();
    assert!(!voucher.is_active);
    assert_eq!(voucher.balance, Money::from_cents(0));
    assert_eq!(voucher.used_count, 1);
}

#[tokio::test]
async fn insufficient_balance_reports_the_balance() {
    let api = new_api().await;
    api.create_voucher(NewVoucher::new("gift-small".to_string(), Money::from_cents(500))).await.unwrap();
    let outcome = api.redeem("GIFT-SMALL", Money::from_cents(501)).await.unwrap();
    match outcome {
        RedeemOutcome::InsufficientBalance { balance, .. } => assert_eq!(balance, Money::from_cents(500)),
        other => panic!("Expected InsufficientBalance, got {other:?}"),
    }
}

#[tokio::test]
async fn unusable_codes_are_indistinguishable() {
    let api = new_api().await;
    // Unknown code.
    let outcome = api.redeem("GIFT-NOPE", Money::from_cents(100)).await.unwrap();
    assert!(matches!(outcome, RedeemOutcome::Invalid));
    // Deactivated code.
    api.create_voucher(NewVoucher::new("gift-dead".to_string(), Money::from_cents(1000))).await.unwrap();
    api.deactivate_voucher("GIFT-DEAD").await.unwrap();
    let outcome = api.redeem("GIFT-DEAD", Money::from_cents(100)).await.unwrap();
    assert!(matches!(outcome, RedeemOutcome::Invalid));
    // Expired code.
    let mut voucher = NewVoucher::new("gift-old".to_string(), Money::from_cents(1000));
    voucher.expires_at = Some(Utc::now() - Duration::days(1));
    api.create_voucher(voucher).await.unwrap();
    let outcome = api.redeem("GIFT-OLD", Money::from_cents(100)).await.unwrap();
    assert!(matches!(outcome, RedeemOutcome::Invalid));
}

#[tokio::test]
async fn large_redemptions_need_manual_verification() {
    let api = new_api().await;
    api.create_voucher(NewVoucher::new("gift-big".to_string(), Money::from_dollars(500))).await.unwrap();
    let outcome = api.redeem("GIFT-BIG", Money::from_dollars(101)).await.unwrap();
    assert!(matches!(outcome, RedeemOutcome::PendingVerification { .. }));
    // At the threshold it still goes straight through.
    let outcome = api.redeem("GIFT-BIG", Money::from_dollars(100)).await.unwrap();
    assert!(matches!(outcome, RedeemOutcome::Completed { .. }));
}

#[tokio::test]
async fn external_vouchers_need_manual_verification() {
    let api = new_api().await;
    let mut voucher = NewVoucher::new("gift-ext".to_string(), Money::from_cents(1000));
    voucher.source = "external".to_string();
    api.create_voucher(voucher).await.unwrap();
    let outcome = api.redeem("GIFT-EXT", Money::from_cents(100)).await.unwrap();
    match outcome {
        RedeemOutcome::PendingVerification { reason, .. } => assert!(reason.contains("external")),
        other => panic!("Expected PendingVerification, got {other:?}"),
    }
}

#[tokio::test]
async fn soon_to_expire_vouchers_need_manual_verification() {
    let api = new_api().await;
    let mut voucher = NewVoucher::new("gift-soon".to_string(), Money::from_cents(1000));
    voucher.expires_at = Some(Utc::now() + Duration::days(3));
    api.create_voucher(voucher).await.unwrap();
    let outcome = api.redeem("GIFT-SOON", Money::from_cents(100)).await.unwrap();
    assert!(matches!(outcome, RedeemOutcome::PendingVerification { .. }));
}

#[tokio::test]
async fn created_vouchers_get_generated_codes() {
    let api = new_api().await;
    let voucher = api.create_voucher(NewVoucher::new("  ".to_string(), Money::from_cents(1000))).await.unwrap();
    assert!(voucher.code.starts_with("GIFT-"));
}

#[tokio::test]
async fn stats_track_the_ledger() {
    let api = new_api().await;
    api.create_voucher(NewVoucher::new("gift-s1".to_string(), Money::from_cents(1000))).await.unwrap();
    api.create_voucher(NewVoucher::new("gift-s2".to_string(), Money::from_cents(2000))).await.unwrap();
    api.redeem("GIFT-S1", Money::from_cents(1000)).await.unwrap();

    let stats = api.stats().await.unwrap();
    assert_eq!(stats.total_vouchers, 2);
    assert_eq!(stats.active_vouchers, 1);
    assert_eq!(stats.outstanding_balance, Money::from_cents(2000));
    assert_eq!(stats.total_redemptions, 1);
}
