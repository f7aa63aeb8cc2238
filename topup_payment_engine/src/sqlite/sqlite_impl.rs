//! `SqliteDatabase` is a concrete implementation of a payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;
use tup_common::Money;

use super::db::{db_url, new_pool, orders, payouts, transactions, vouchers, webhooks};
use crate::{
    db_types::{
        NewOrder,
        NewPayout,
        NewTransaction,
        NewVoucher,
        NewWebhookEvent,
        Order,
        OrderId,
        OrderItem,
        OrderStatus,
        Payout,
        Transaction,
        TransactionStatus,
        Voucher,
        WebhookEvent,
    },
    traits::{
        OrderQueryFilter,
        PaymentConfirmation,
        PaymentGatewayDatabase,
        PaymentGatewayError,
        PayoutStore,
        VoucherDebit,
        VoucherStats,
        VoucherStore,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database given in the `TUP_DATABASE_URL` environment variable.
    pub async fn new(max_connections: u32) -> Result<Self, PaymentGatewayError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PaymentGatewayError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let (order, inserted) = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        if inserted {
            debug!("🗃️ Order [{}] has been saved in the DB with id {}", order.order_id, order.id);
        }
        Ok((order, inserted))
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_idempotency_key(&self, key: &str) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_idempotency_key(key, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn insert_transaction(&self, tx: NewTransaction) -> Result<Transaction, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let record = transactions::insert_transaction(tx, &mut conn).await?;
        Ok(record)
    }

    async fn fetch_transaction_by_txid(&self, txid: &str) -> Result<Option<Transaction>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let tx = transactions::fetch_transaction_by_txid(txid, &mut conn).await?;
        Ok(tx)
    }

    async fn fetch_transactions_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<Transaction>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let txs = transactions::fetch_transactions_for_order(order_id, &mut conn).await?;
        Ok(txs)
    }

    /// The reconciliation step. Every guard lives inside one transaction, so concurrent duplicate webhooks race
    /// for a single commit and the losers resolve as no-ops.
    async fn confirm_order_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<(Order, Transaction), PaymentGatewayError> {
        let PaymentConfirmation { order_id, txid, method, amount } = confirmation;
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        if order.status != OrderStatus::Pending {
            return Err(PaymentGatewayError::ReconciliationNoop(format!(
                "Order [{order_id}] is already {}",
                order.status
            )));
        }
        let completed = transactions::count_completed_for_order(order_id, &mut tx).await?;
        if completed > 0 {
            return Err(PaymentGatewayError::ReconciliationNoop(format!(
                "Order [{order_id}] already has a completed transaction"
            )));
        }
        let guard = [TransactionStatus::Pending, TransactionStatus::RequiresAction];
        let record = match transactions::update_transaction_status(txid, &guard, TransactionStatus::Completed, &mut tx)
            .await?
        {
            Some(record) => record,
            None => {
                // The attempt was never recorded (webhook raced the checkout response). Create the completed
                // record now so the ledger stays whole.
                if transactions::fetch_transaction_by_txid(txid, &mut tx).await?.is_some() {
                    return Err(PaymentGatewayError::ReconciliationNoop(format!(
                        "Transaction {txid} has already settled"
                    )));
                }
                let new_tx = NewTransaction::new(order_id.clone(), *method, *amount)
                    .with_txid(txid.clone())
                    .with_status(TransactionStatus::Completed);
                transactions::insert_transaction(new_tx, &mut tx).await?
            },
        };
        let order = orders::update_order_status(order_id, &[OrderStatus::Pending], OrderStatus::PaymentConfirmed, &mut tx)
            .await?
            .ok_or_else(|| {
                PaymentGatewayError::ReconciliationNoop(format!("Order [{order_id}] left pending mid-flight"))
            })?;
        tx.commit().await?;
        info!("🗃️ Payment for order [{order_id}] confirmed by transaction {txid}");
        Ok((order, record))
    }

    async fn fail_transaction(&self, txid: &str, reason: &str) -> Result<Transaction, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let record = transactions::fail_transaction(txid, reason, &mut conn).await?.ok_or_else(|| {
            PaymentGatewayError::ReconciliationNoop(format!("Transaction {txid} has already settled"))
        })?;
        debug!("🗃️ Transaction {txid} marked as failed: {reason}");
        Ok(record)
    }

    async fn fail_order_payment(
        &self,
        order_id: &OrderId,
        txid: Option<&str>,
        reason: &str,
    ) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        if let Some(txid) = txid {
            let _unsettled = transactions::fail_transaction(txid, reason, &mut tx).await?;
        }
        let order = orders::update_order_status(order_id, &[OrderStatus::Pending], OrderStatus::Failed, &mut tx)
            .await?
            .ok_or_else(|| {
                PaymentGatewayError::ReconciliationNoop(format!("Order [{order_id}] is not pending"))
            })?;
        tx.commit().await?;
        info!("🗃️ Order [{order_id}] marked as failed: {reason}");
        Ok(order)
    }

    async fn refund_order(&self, order_id: &OrderId, txid: &str) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let guard = [TransactionStatus::Completed];
        transactions::update_transaction_status(txid, &guard, TransactionStatus::Refunded, &mut tx)
            .await?
            .ok_or_else(|| {
                PaymentGatewayError::ReconciliationNoop(format!("Transaction {txid} is not completed"))
            })?;
        let order =
            orders::update_order_status(order_id, &[OrderStatus::PaymentConfirmed], OrderStatus::Refunded, &mut tx)
                .await?
                .ok_or_else(|| {
                    PaymentGatewayError::ReconciliationNoop(format!("Order [{order_id}] cannot be refunded"))
                })?;
        tx.commit().await?;
        info!("🗃️ Order [{order_id}] refunded against transaction {txid}");
        Ok(order)
    }

    async fn mark_order_delivered(
        &self,
        order_id: &OrderId,
        delivery_ref: &str,
    ) -> Result<Order, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::mark_delivered(order_id, delivery_ref, &mut conn).await?.ok_or_else(|| {
            PaymentGatewayError::ReconciliationNoop(format!("Order [{order_id}] is not awaiting delivery"))
        })?;
        info!("🗃️ Order [{order_id}] delivered. Supplier reference {delivery_ref}");
        Ok(order)
    }

    async fn record_delivery_failure(&self, order_id: &OrderId, error: &str) -> Result<Order, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::record_delivery_failure(order_id, error, &mut conn).await?;
        warn!("🗃️ Delivery attempt {} for order [{order_id}] failed: {error}", order.delivery_attempts);
        Ok(order)
    }

    async fn log_webhook_event(&self, event: NewWebhookEvent) -> Result<WebhookEvent, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let record = webhooks::insert_webhook_event(event, &mut conn).await?;
        Ok(record)
    }

    async fn fetch_webhook_events(&self, provider: &str) -> Result<Vec<WebhookEvent>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let events = webhooks::fetch_webhook_events(provider, &mut conn).await?;
        Ok(events)
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl VoucherStore for SqliteDatabase {
    async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let record = vouchers::insert_voucher(voucher, &mut conn).await?;
        Ok(record)
    }

    async fn fetch_voucher(&self, code: &str) -> Result<Option<Voucher>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let voucher = vouchers::fetch_voucher(code, &mut conn).await?;
        Ok(voucher)
    }

    async fn debit_voucher(&self, code: &str, amount: Money) -> Result<VoucherDebit, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let debit = vouchers::debit_voucher(code, amount, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Voucher [{code}] debited by {amount}");
        Ok(debit)
    }

    async fn deactivate_voucher(&self, code: &str) -> Result<Voucher, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let voucher = vouchers::deactivate_voucher(code, &mut conn).await?;
        info!("🗃️ Voucher [{code}] deactivated");
        Ok(voucher)
    }

    async fn voucher_stats(&self) -> Result<VoucherStats, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let stats = vouchers::voucher_stats(&mut conn).await?;
        Ok(stats)
    }
}

impl PayoutStore for SqliteDatabase {
    async fn insert_payout(&self, payout: NewPayout) -> Result<Payout, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let record = payouts::insert_payout(payout, &mut conn).await?;
        Ok(record)
    }

    async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let payout = payouts::fetch_payout(id, &mut conn).await?;
        Ok(payout)
    }

    async fn fetch_payout_by_transfer_id(&self, transfer_id: &str) -> Result<Option<Payout>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let payout = payouts::fetch_payout_by_transfer_id(transfer_id, &mut conn).await?;
        Ok(payout)
    }

    async fn mark_payout_processing(&self, id: i64, transfer_id: &str) -> Result<Payout, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let payout = payouts::mark_processing(id, transfer_id, &mut conn).await?;
        info!("🗃️ Payout #{id} submitted as transfer {transfer_id}");
        Ok(payout)
    }

    async fn mark_payout_completed(&self, transfer_id: &str) -> Result<Payout, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let payout = payouts::mark_completed(transfer_id, &mut conn).await?.ok_or_else(|| {
            PaymentGatewayError::ReconciliationNoop(format!("Transfer {transfer_id} is not processing"))
        })?;
        info!("🗃️ Payout #{} completed via transfer {transfer_id}", payout.id);
        Ok(payout)
    }

    async fn mark_payout_failed(
        &self,
        id: i64,
        error: &str,
        next_retry_at: DateTime<Utc>,
    ) -> Result<Payout, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let payout = payouts::mark_failed(id, error, next_retry_at, &mut conn).await?;
        warn!("🗃️ Payout #{id} failed (attempt {}): {error}", payout.retry_count);
        Ok(payout)
    }

    async fn mark_payout_reversed(&self, transfer_id: &str) -> Result<Payout, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let payout = payouts::mark_reversed(transfer_id, &mut conn).await?.ok_or_else(|| {
            PaymentGatewayError::ReconciliationNoop(format!("Transfer {transfer_id} cannot be reversed"))
        })?;
        warn!("🗃️ Payout #{} reversed by the provider", payout.id);
        Ok(payout)
    }

    async fn fetch_due_payout_retries(&self, now: DateTime<Utc>) -> Result<Vec<Payout>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let payouts = payouts::fetch_due_retries(now, &mut conn).await?;
        Ok(payouts)
    }
}
