use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{NewPayout, Payout, PayoutStatus},
    traits::{PaymentGatewayError, PayoutStore, TransferProvider},
};

/// A payout that has failed this many times stays failed until an operator intervenes.
pub const MAX_PAYOUT_RETRIES: i64 = 5;
/// Retry delay when the transfer submission itself fails.
pub const INIT_FAILURE_BACKOFF_HOURS: i64 = 1;
/// Retry delay when the provider reports an already-submitted transfer as failed.
pub const PROVIDER_FAILURE_BACKOFF_HOURS: i64 = 6;

/// `PayoutApi` drives store payouts through the transfer provider.
///
/// Submitting a transfer is asynchronous on the provider side, so a payout sits in `processing` until the
/// webhook channel reports the transfer as completed, failed or reversed.
#[derive(Debug, Clone)]
pub struct PayoutApi<B, T> {
    db: B,
    provider: T,
}

impl<B, T> PayoutApi<B, T> {
    pub fn new(db: B, provider: T) -> Self {
        Self { db, provider }
    }
}

impl<B, T> PayoutApi<B, T>
where
    B: PayoutStore,
    T: TransferProvider,
{
    /// Creates the payout record and submits the transfer.
    ///
    /// A submission failure is not an error at this level: the payout is stored as `failed` with a retry
    /// scheduled an hour out, and the failed record is returned so callers can report its state.
    pub async fn initiate(&self, payout: NewPayout) -> Result<Payout, PaymentGatewayError> {
        let payout = self.db.insert_payout(payout).await?;
        self.submit_transfer(payout).await
    }

    /// Retries a failed payout. Completed or reversed payouts, and payouts that have exhausted their retry
    /// budget, are refused with [`PaymentGatewayError::PayoutRetryForbidden`].
    pub async fn retry(&self, id: i64) -> Result<Payout, PaymentGatewayError> {
        let payout = self.db.fetch_payout(id).await?.ok_or(PaymentGatewayError::PayoutNotFound(id))?;
        match payout.status {
            PayoutStatus::Completed | PayoutStatus::Reversed => {
                return Err(PaymentGatewayError::PayoutRetryForbidden(format!(
                    "Payout #{id} is {} and cannot be retried",
                    payout.status
                )));
            },
            _ if payout.retry_count >= MAX_PAYOUT_RETRIES => {
                return Err(PaymentGatewayError::PayoutRetryForbidden(format!(
                    "Payout #{id} has exhausted its {MAX_PAYOUT_RETRIES} retries"
                )));
            },
            _ => {},
        }
        info!("💸️ Retrying payout #{id} (attempt {})", payout.retry_count + 1);
        self.submit_transfer(payout).await
    }

    /// Resubmits every failed payout whose retry time has passed. Returns the payouts that were resubmitted.
    pub async fn process_due_retries(&self) -> Result<Vec<Payout>, PaymentGatewayError> {
        let due = self.db.fetch_due_payout_retries(Utc::now()).await?;
        let mut processed = Vec::with_capacity(due.len());
        for payout in due {
            if payout.retry_count >= MAX_PAYOUT_RETRIES {
                debug!("💸️ Skipping payout #{} with exhausted retries", payout.id);
                continue;
            }
            let id = payout.id;
            match self.submit_transfer(payout).await {
                Ok(p) => processed.push(p),
                Err(e) => warn!("💸️ Scheduled retry of payout #{id} failed: {e}"),
            }
        }
        Ok(processed)
    }

    async fn submit_transfer(&self, payout: Payout) -> Result<Payout, PaymentGatewayError> {
        match self.provider.create_transfer(&payout).await {
            Ok(transfer_id) => {
                info!("💸️ Payout #{} submitted as transfer {transfer_id}", payout.id);
                self.db.mark_payout_processing(payout.id, &transfer_id).await
            },
            Err(e) => {
                let next_retry = Utc::now() + Duration::hours(INIT_FAILURE_BACKOFF_HOURS);
                warn!("💸️ Transfer submission for payout #{} failed: {e}. Next retry at {next_retry}", payout.id);
                self.db.mark_payout_failed(payout.id, &e.to_string(), next_retry).await
            },
        }
    }

    /// Webhook confirmation that the transfer settled.
    pub async fn transfer_completed(&self, transfer_id: &str) -> Result<Payout, PaymentGatewayError> {
        let payout = self.db.mark_payout_completed(transfer_id).await?;
        info!("💸️ Payout #{} completed via transfer {transfer_id}", payout.id);
        Ok(payout)
    }

    /// Webhook notification that a submitted transfer failed at the provider. Schedules a retry six hours out.
    pub async fn transfer_failed(&self, transfer_id: &str, error: &str) -> Result<Payout, PaymentGatewayError> {
        let payout = self
            .db
            .fetch_payout_by_transfer_id(transfer_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::TransferNotFound(transfer_id.to_string()))?;
        let next_retry = Utc::now() + Duration::hours(PROVIDER_FAILURE_BACKOFF_HOURS);
        warn!("💸️ Transfer {transfer_id} for payout #{} failed: {error}. Next retry at {next_retry}", payout.id);
        self.db.mark_payout_failed(payout.id, error, next_retry).await
    }

    /// Webhook notification that a completed transfer was clawed back.
    pub async fn transfer_reversed(&self, transfer_id: &str) -> Result<Payout, PaymentGatewayError> {
        let payout = self.db.mark_payout_reversed(transfer_id).await?;
        warn!("💸️ Transfer {transfer_id} was reversed. Payout #{} marked reversed", payout.id);
        Ok(payout)
    }

    pub async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, PaymentGatewayError> {
        self.db.fetch_payout(id).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
