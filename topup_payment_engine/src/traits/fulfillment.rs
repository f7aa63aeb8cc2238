use thiserror::Error;

use crate::db_types::{Order, OrderItem, Payout};

/// Failure modes of the upstream services the engine drives. The split decides whether the dispatcher retries:
/// a rejection is a final answer, unavailability is worth another attempt.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("Upstream rejected the request. Status {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("Upstream is temporarily unavailable: {0}")]
    Unavailable(String),
}

impl UpstreamError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, UpstreamError::Unavailable(_))
    }
}

/// The seam between the fulfillment dispatcher and the upstream top-up supplier. Returns the supplier's delivery
/// reference on success.
#[allow(async_fn_in_trait)]
pub trait DeliveryProvider: Clone + Send + Sync {
    async fn deliver(&self, order: &Order, items: &[OrderItem]) -> Result<String, UpstreamError>;
}

/// The seam between the payout engine and the transfer provider. Returns the provider's transfer id; completion
/// is reported later over the webhook channel.
#[allow(async_fn_in_trait)]
pub trait TransferProvider: Clone + Send + Sync {
    async fn create_transfer(&self, payout: &Payout) -> Result<String, UpstreamError>;
}
