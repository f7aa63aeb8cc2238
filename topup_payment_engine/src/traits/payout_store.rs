use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewPayout, Payout},
    traits::PaymentGatewayError,
};

/// Backend contract for the store payout ledger.
///
/// Payouts are identified internally by row id until a transfer is submitted; after that the provider's transfer
/// id is the handle the webhook channel uses.
#[allow(async_fn_in_trait)]
pub trait PayoutStore: Clone {
    async fn insert_payout(&self, payout: NewPayout) -> Result<Payout, PaymentGatewayError>;

    async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, PaymentGatewayError>;

    async fn fetch_payout_by_transfer_id(&self, transfer_id: &str) -> Result<Option<Payout>, PaymentGatewayError>;

    /// Records the submitted transfer id and moves the payout to `processing`.
    async fn mark_payout_processing(&self, id: i64, transfer_id: &str) -> Result<Payout, PaymentGatewayError>;

    /// Webhook confirmation: `processing` to `completed`, stamping `processed_at`.
    async fn mark_payout_completed(&self, transfer_id: &str) -> Result<Payout, PaymentGatewayError>;

    /// Marks the payout failed, bumping the retry counter and scheduling the next attempt.
    async fn mark_payout_failed(
        &self,
        id: i64,
        error: &str,
        next_retry_at: DateTime<Utc>,
    ) -> Result<Payout, PaymentGatewayError>;

    /// Webhook notification that a completed transfer was clawed back.
    async fn mark_payout_reversed(&self, transfer_id: &str) -> Result<Payout, PaymentGatewayError>;

    /// Fetches failed payouts whose `next_retry_at` has passed.
    async fn fetch_due_payout_retries(&self, now: DateTime<Utc>) -> Result<Vec<Payout>, PaymentGatewayError>;
}
