use std::{sync::Arc, time::Duration};

use log::*;
use tokio::sync::Semaphore;

use crate::{
    db_types::{Order, OrderId, OrderStatus},
    events::{EventProducers, OrderDeliveredEvent},
    traits::{DeliveryProvider, PaymentGatewayDatabase, PaymentGatewayError},
};

#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
    /// Total delivery attempts per dispatch, including the first.
    pub max_attempts: u32,
    /// Backoff before the first retry. Subsequent retries double it.
    pub initial_backoff: Duration,
    /// Upper bound on concurrent in-flight deliveries to the supplier.
    pub max_concurrent: usize,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self { max_attempts: 3, initial_backoff: Duration::from_secs(5), max_concurrent: 16 }
    }
}

/// `FulfillmentApi` pushes paid orders to the upstream top-up supplier.
///
/// Dispatch is triggered by the order-paid hook, retried with exponential backoff while the supplier is
/// unavailable, and abandoned on a rejection. A dispatch that exhausts its attempts leaves the order in
/// `payment_confirmed` with the error recorded, so an operator (or the retry endpoint) can try again later.
pub struct FulfillmentApi<B, D> {
    db: B,
    provider: D,
    config: FulfillmentConfig,
    permits: Arc<Semaphore>,
    producers: EventProducers,
}

impl<B: Clone, D: Clone> Clone for FulfillmentApi<B, D> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            provider: self.provider.clone(),
            config: self.config.clone(),
            permits: Arc::clone(&self.permits),
            producers: self.producers.clone(),
        }
    }
}

impl<B, D> FulfillmentApi<B, D> {
    pub fn new(db: B, provider: D, config: FulfillmentConfig, producers: EventProducers) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent));
        Self { db, provider, config, permits, producers }
    }
}

impl<B, D> FulfillmentApi<B, D>
where
    B: PaymentGatewayDatabase,
    D: DeliveryProvider,
{
    /// Dispatches a paid order to the supplier.
    ///
    /// An already delivered order resolves as [`PaymentGatewayError::ReconciliationNoop`]; any other status that
    /// is not `payment_confirmed` is [`PaymentGatewayError::FulfillmentForbidden`].
    pub async fn dispatch(&self, order_id: &OrderId) -> Result<Order, PaymentGatewayError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        match order.status {
            OrderStatus::PaymentConfirmed => {},
            OrderStatus::Delivered => {
                return Err(PaymentGatewayError::ReconciliationNoop(format!(
                    "Order [{order_id}] has already been delivered"
                )));
            },
            other => {
                return Err(PaymentGatewayError::FulfillmentForbidden(format!(
                    "Order [{order_id}] is {other}, not payment_confirmed"
                )));
            },
        }
        self.deliver_with_retries(order).await
    }

    /// Manual retry of a dispatch that exhausted its attempts. Same rules as [`Self::dispatch`].
    pub async fn retry_delivery(&self, order_id: &OrderId) -> Result<Order, PaymentGatewayError> {
        info!("🚚️ Manual delivery retry requested for order [{order_id}]");
        self.dispatch(order_id).await
    }

    /// Records a delivery confirmation arriving over the supplier's callback channel. Idempotent: confirming an
    /// already delivered order is a [`PaymentGatewayError::ReconciliationNoop`].
    pub async fn confirm_delivery(&self, order_id: &OrderId, reference: &str) -> Result<Order, PaymentGatewayError> {
        let order = self.db.mark_order_delivered(order_id, reference).await?;
        info!("🚚️ Delivery of order [{order_id}] confirmed by supplier callback. Ref: {reference}");
        self.call_order_delivered_hook(&order).await;
        Ok(order)
    }

    async fn deliver_with_retries(&self, order: Order) -> Result<Order, PaymentGatewayError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| PaymentGatewayError::DeliveryFailed(format!("Dispatcher is shutting down: {e}")))?;
        let items = self.db.fetch_order_items(&order.order_id).await?;
        let mut last_error = String::new();
        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                // 5s, 10s, 20s, ... with the default config.
                let backoff = self.config.initial_backoff * (1u32 << (attempt - 1).min(16));
                debug!("🚚️ Waiting {:?} before delivery retry #{attempt} for [{}]", backoff, order.order_id);
                tokio::time::sleep(backoff).await;
            }
            match self.provider.deliver(&order, &items).await {
                Ok(reference) => {
                    let order = self.db.mark_order_delivered(&order.order_id, &reference).await?;
                    info!("🚚️ Order [{}] delivered. Ref: {reference}", order.order_id);
                    self.call_order_delivered_hook(&order).await;
                    return Ok(order);
                },
                Err(e) if e.is_retryable() => {
                    warn!("🚚️ Delivery attempt {} for [{}] failed: {e}", attempt + 1, order.order_id);
                    last_error = e.to_string();
                },
                Err(e) => {
                    warn!("🚚️ Supplier rejected delivery of [{}]: {e}", order.order_id);
                    self.db.record_delivery_failure(&order.order_id, &e.to_string()).await?;
                    return Err(PaymentGatewayError::DeliveryFailed(e.to_string()));
                },
            }
        }
        error!(
            "🚚️ Delivery of [{}] abandoned after {} attempts. Last error: {last_error}",
            order.order_id, self.config.max_attempts
        );
        self.db.record_delivery_failure(&order.order_id, &last_error).await?;
        Err(PaymentGatewayError::DeliveryFailed(last_error))
    }

    async fn call_order_delivered_hook(&self, order: &Order) {
        for emitter in &self.producers.order_delivered_producer {
            debug!("🚚️📦️ Notifying order delivered hook subscribers");
            let event = OrderDeliveredEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
