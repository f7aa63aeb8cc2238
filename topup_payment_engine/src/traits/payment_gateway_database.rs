use thiserror::Error;
use tup_common::{Money, PaymentMethod};

use crate::{
    db_types::{NewOrder, NewTransaction, NewWebhookEvent, Order, OrderId, OrderItem, Transaction, WebhookEvent},
    traits::OrderQueryFilter,
};

/// Everything the reconciler needs to know about a confirmed payment. The order id comes from explicit provider
/// metadata, never from parsing the provider's own reference.
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub order_id: OrderId,
    /// The provider's reference for the charge.
    pub txid: String,
    pub method: PaymentMethod,
    pub amount: Money,
}

/// This trait defines the highest level of behaviour for backends supporting the payment engine.
///
/// This behaviour includes:
/// * Storing orders and their line items.
/// * Recording payment attempts as transactions and reconciling webhook confirmations against them.
/// * Tracking delivery state on orders.
/// * Keeping an unconditional audit log of every received webhook.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Takes a new order and, in a single atomic transaction, stores the order and its items.
    /// This call is idempotent on the order id.
    /// Returns the order record and `true` if the order was inserted, or `false` if it already existed.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    /// Looks up an order by the client-supplied idempotency key, so a resubmitted checkout returns the original
    /// order instead of creating a duplicate.
    async fn fetch_order_by_idempotency_key(&self, key: &str) -> Result<Option<Order>, PaymentGatewayError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError>;

    /// Fetches orders according to the criteria in the filter, ordered by creation time ascending.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Records a payment attempt against an order.
    async fn insert_transaction(&self, tx: NewTransaction) -> Result<Transaction, PaymentGatewayError>;

    async fn fetch_transaction_by_txid(&self, txid: &str) -> Result<Option<Transaction>, PaymentGatewayError>;

    async fn fetch_transactions_for_order(&self, order_id: &OrderId)
        -> Result<Vec<Transaction>, PaymentGatewayError>;

    /// The reconciliation step. In a single atomic transaction:
    /// * verifies the order exists and is still `pending`,
    /// * verifies no other transaction for the order has already completed,
    /// * marks the matching transaction `completed` (inserting one if the attempt was never recorded),
    /// * moves the order to `payment_confirmed`.
    ///
    /// Any already-satisfied condition aborts with [`PaymentGatewayError::ReconciliationNoop`], which callers
    /// treat as a successful duplicate rather than a failure. The same confirmation can therefore be delivered
    /// any number of times with exactly one side effect.
    async fn confirm_order_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<(Order, Transaction), PaymentGatewayError>;

    /// Marks a single payment attempt as failed without touching the order, which stays `pending` so the buyer
    /// can try another payment method.
    async fn fail_transaction(&self, txid: &str, reason: &str) -> Result<Transaction, PaymentGatewayError>;

    /// Marks the order `failed` and the given transaction (if any) `failed`. Only a `pending` order can fail;
    /// anything else is a [`PaymentGatewayError::ReconciliationNoop`].
    async fn fail_order_payment(
        &self,
        order_id: &OrderId,
        txid: Option<&str>,
        reason: &str,
    ) -> Result<Order, PaymentGatewayError>;

    /// Moves a `payment_confirmed` order to `refunded` and marks the completed transaction `refunded`.
    async fn refund_order(&self, order_id: &OrderId, txid: &str) -> Result<Order, PaymentGatewayError>;

    /// Moves a `payment_confirmed` order to `delivered`, recording the supplier's delivery reference. Calling
    /// this on an already delivered order is a [`PaymentGatewayError::ReconciliationNoop`].
    async fn mark_order_delivered(&self, order_id: &OrderId, delivery_ref: &str)
        -> Result<Order, PaymentGatewayError>;

    /// Records a failed delivery attempt on the order without changing its status. The order stays
    /// `payment_confirmed` and can be retried manually.
    async fn record_delivery_failure(&self, order_id: &OrderId, error: &str) -> Result<Order, PaymentGatewayError>;

    /// Appends a webhook delivery to the audit log. Called for every received webhook, valid signature or not.
    async fn log_webhook_event(&self, event: NewWebhookEvent) -> Result<WebhookEvent, PaymentGatewayError>;

    /// Reads back the audit log for one provider, oldest first.
    async fn fetch_webhook_events(&self, provider: &str) -> Result<Vec<WebhookEvent>, PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists: {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested transaction does not exist for txid {0}")]
    TransactionNotFound(String),
    #[error("No voucher exists with code {0}")]
    VoucherNotFound(String),
    #[error("The requested payout #{0} does not exist")]
    PayoutNotFound(i64),
    #[error("No payout is linked to transfer {0}")]
    TransferNotFound(String),
    #[error("The event has already been applied: {0}")]
    ReconciliationNoop(String),
    #[error("The requested order change is forbidden.")]
    OrderModificationForbidden,
    #[error("Fulfillment is not possible: {0}")]
    FulfillmentForbidden(String),
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
    #[error("The payout cannot be retried: {0}")]
    PayoutRetryForbidden(String),
    #[error("{0} is not supported")]
    UnsupportedAction(String),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}

impl PaymentGatewayError {
    /// True for the errors that represent an already-applied event rather than a real failure.
    pub fn is_noop(&self) -> bool {
        matches!(self, PaymentGatewayError::ReconciliationNoop(_))
    }
}
