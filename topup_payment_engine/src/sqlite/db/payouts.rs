use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPayout, Payout},
    traits::PaymentGatewayError,
};

pub async fn insert_payout(payout: NewPayout, conn: &mut SqliteConnection) -> Result<Payout, PaymentGatewayError> {
    let record: Payout =
        sqlx::query_as("INSERT INTO payouts (store_id, amount, currency) VALUES ($1, $2, $3) RETURNING *")
            .bind(payout.store_id)
            .bind(payout.amount)
            .bind(payout.currency)
            .fetch_one(conn)
            .await?;
    debug!("💸️ Payout #{} of {} queued for store {}", record.id, record.amount, record.store_id);
    Ok(record)
}

pub async fn fetch_payout(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payout>, sqlx::Error> {
    let payout = sqlx::query_as("SELECT * FROM payouts WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(payout)
}

pub async fn fetch_payout_by_transfer_id(
    transfer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payout>, sqlx::Error> {
    let payout =
        sqlx::query_as("SELECT * FROM payouts WHERE transfer_id = $1").bind(transfer_id).fetch_optional(conn).await?;
    Ok(payout)
}

pub(crate) async fn mark_processing(
    id: i64,
    transfer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Payout, PaymentGatewayError> {
    let payout: Option<Payout> = sqlx::query_as(
        "UPDATE payouts SET status = 'processing', transfer_id = $1, error_message = NULL, updated_at = \
         CURRENT_TIMESTAMP WHERE id = $2 AND status IN ('pending', 'failed') RETURNING *",
    )
    .bind(transfer_id)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    payout.ok_or(PaymentGatewayError::PayoutNotFound(id))
}

pub(crate) async fn mark_completed(
    transfer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payout>, PaymentGatewayError> {
    let payout: Option<Payout> = sqlx::query_as(
        "UPDATE payouts SET status = 'completed', processed_at = CURRENT_TIMESTAMP, next_retry_at = NULL, \
         updated_at = CURRENT_TIMESTAMP WHERE transfer_id = $1 AND status = 'processing' RETURNING *",
    )
    .bind(transfer_id)
    .fetch_optional(conn)
    .await?;
    Ok(payout)
}

pub(crate) async fn mark_failed(
    id: i64,
    error: &str,
    next_retry_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Payout, PaymentGatewayError> {
    let payout: Option<Payout> = sqlx::query_as(
        "UPDATE payouts SET status = 'failed', error_message = $1, retry_count = retry_count + 1, next_retry_at = \
         $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3 AND status IN ('pending', 'processing', 'failed') \
         RETURNING *",
    )
    .bind(error)
    .bind(next_retry_at)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    payout.ok_or(PaymentGatewayError::PayoutNotFound(id))
}

pub(crate) async fn mark_reversed(
    transfer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payout>, PaymentGatewayError> {
    let payout: Option<Payout> = sqlx::query_as(
        "UPDATE payouts SET status = 'reversed', updated_at = CURRENT_TIMESTAMP WHERE transfer_id = $1 AND status \
         IN ('processing', 'completed') RETURNING *",
    )
    .bind(transfer_id)
    .fetch_optional(conn)
    .await?;
    Ok(payout)
}

pub async fn fetch_due_retries(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Payout>, sqlx::Error> {
    let payouts = sqlx::query_as(
        "SELECT * FROM payouts WHERE status = 'failed' AND next_retry_at IS NOT NULL AND next_retry_at <= $1 ORDER \
         BY next_retry_at ASC",
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(payouts)
}
