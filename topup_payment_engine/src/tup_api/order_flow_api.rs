use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, NewTransaction, NewWebhookEvent, Order, OrderId, OrderItem, Transaction, WebhookEvent},
    events::{EventProducers, OrderPaidEvent},
    traits::{OrderQueryFilter, PaymentConfirmation, PaymentGatewayDatabase, PaymentGatewayError},
};

/// `OrderFlowApi` is the primary API for handling order and payment flows: checkout-side order creation, and the
/// reconciliation of payment confirmations arriving over the webhook channel.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Submit a new order. The call is idempotent: when the client retries a checkout with the same order id (or
    /// the same idempotency key, which callers should resolve first via [`Self::order_for_idempotency_key`]), the
    /// existing order record is returned with `false` in the second position.
    pub async fn process_new_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError> {
        let (order, inserted) = self.db.insert_order(order).await?;
        debug!("🔄️📦️ Order [{}] processing complete. Inserted: {inserted}", order.order_id);
        Ok((order, inserted))
    }

    pub async fn order_for_idempotency_key(&self, key: &str) -> Result<Option<Order>, PaymentGatewayError> {
        self.db.fetch_order_by_idempotency_key(key).await
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        self.db.fetch_order_by_order_id(order_id).await
    }

    pub async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError> {
        self.db.fetch_order_items(order_id).await
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, PaymentGatewayError> {
        self.db.search_orders(query).await
    }

    /// Records a payment attempt against an order. Called from checkout once a charge has been initiated and the
    /// provider reference is known.
    pub async fn add_payment_attempt(&self, tx: NewTransaction) -> Result<Transaction, PaymentGatewayError> {
        let txid = tx.txid.clone().unwrap_or_default();
        let record = self.db.insert_transaction(tx).await?;
        trace!("🔄️💰️ Payment attempt [{txid}] for order [{}] recorded.", record.order_id);
        Ok(record)
    }

    pub async fn fetch_transactions_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<Transaction>, PaymentGatewayError> {
        self.db.fetch_transactions_for_order(order_id).await
    }

    /// The reconciliation entry point. Applies a payment confirmation exactly once; duplicates resolve as
    /// [`PaymentGatewayError::ReconciliationNoop`]. The `OrderPaidEvent` hook fires only after the database
    /// transaction has committed, so subscribers never see a payment that subsequently rolled back.
    pub async fn confirm_payment(&self, confirmation: PaymentConfirmation) -> Result<Order, PaymentGatewayError> {
        trace!("🔄️✅️ Payment {} for order [{}] is being confirmed", confirmation.txid, confirmation.order_id);
        let (order, tx) = self.db.confirm_order_payment(&confirmation).await?;
        debug!("🔄️✅️ [{}] confirmed payment of {} for order [{}]", tx.txid.as_deref().unwrap_or("-"), tx.amount, order.order_id);
        self.call_order_paid_hook(&order).await;
        Ok(order)
    }

    async fn call_order_paid_hook(&self, order: &Order) {
        for emitter in &self.producers.order_paid_producer {
            debug!("🔄️📦️ Notifying order paid hook subscribers");
            let event = OrderPaidEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    /// Marks a single payment attempt as failed. The order stays pending so the buyer can try another method.
    pub async fn fail_payment_attempt(&self, txid: &str, reason: &str) -> Result<Transaction, PaymentGatewayError> {
        trace!("🔄️❌️ Payment {txid} is being marked as failed");
        self.db.fail_transaction(txid, reason).await
    }

    /// Fails the order outright, typically in response to a terminal webhook (expired, cancelled, payment failed).
    pub async fn fail_order(
        &self,
        order_id: &OrderId,
        txid: Option<&str>,
        reason: &str,
    ) -> Result<Order, PaymentGatewayError> {
        trace!("🔄️❌️ Order [{order_id}] is being marked as failed");
        self.db.fail_order_payment(order_id, txid, reason).await
    }

    /// Applies a refund reported over the webhook channel. Only confirmed, undelivered orders can be refunded.
    pub async fn refund_order(&self, order_id: &OrderId, txid: &str) -> Result<Order, PaymentGatewayError> {
        trace!("🔄️↩️ Order [{order_id}] is being refunded");
        self.db.refund_order(order_id, txid).await
    }

    /// Appends a webhook delivery to the audit log. Called unconditionally, before any reconciliation happens
    /// and regardless of whether the signature verified.
    pub async fn log_webhook_event(&self, event: NewWebhookEvent) -> Result<WebhookEvent, PaymentGatewayError> {
        self.db.log_webhook_event(event).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
