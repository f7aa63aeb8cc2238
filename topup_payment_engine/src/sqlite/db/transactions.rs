use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewTransaction, OrderId, Transaction, TransactionStatus},
    traits::PaymentGatewayError,
};

pub async fn insert_transaction(
    tx: NewTransaction,
    conn: &mut SqliteConnection,
) -> Result<Transaction, PaymentGatewayError> {
    let record: Transaction = sqlx::query_as(
        r#"
            INSERT INTO transactions (order_id, txid, method, amount, currency, status, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(tx.order_id)
    .bind(tx.txid)
    .bind(tx.method)
    .bind(tx.amount)
    .bind(tx.currency)
    .bind(tx.status.to_string())
    .bind(tx.metadata)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Transaction recorded for order [{}] with id {}", record.order_id, record.id);
    Ok(record)
}

pub async fn fetch_transaction_by_txid(
    txid: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    let tx = sqlx::query_as("SELECT * FROM transactions WHERE txid = $1").bind(txid).fetch_optional(conn).await?;
    Ok(tx)
}

pub async fn fetch_transactions_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let txs = sqlx::query_as("SELECT * FROM transactions WHERE order_id = $1 ORDER BY created_at ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(txs)
}

/// Counts completed transactions for the order. The reconciler uses this to enforce the single-completion
/// invariant before it moves anything.
pub(crate) async fn count_completed_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM transactions WHERE order_id = $1 AND status = 'completed'")
            .bind(order_id.as_str())
            .fetch_one(conn)
            .await?;
    Ok(count)
}

/// Conditionally advances a transaction. The `from` guard makes the update a compare-and-set: if the transaction
/// has already left the guard set, no row matches and `None` is returned.
pub(crate) async fn update_transaction_status(
    txid: &str,
    from: &[TransactionStatus],
    to: TransactionStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, PaymentGatewayError> {
    let guard = from.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
    let sql = format!(
        "UPDATE transactions SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE txid = $2 AND status IN ({guard}) \
         RETURNING *"
    );
    let result: Option<Transaction> =
        sqlx::query_as(&sql).bind(to.to_string()).bind(txid).fetch_optional(conn).await?;
    Ok(result)
}

/// Appends a failure reason to the transaction metadata and marks it failed.
pub(crate) async fn fail_transaction(
    txid: &str,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, PaymentGatewayError> {
    let metadata = serde_json::json!({ "failure_reason": reason }).to_string();
    let result: Option<Transaction> = sqlx::query_as(
        "UPDATE transactions SET status = 'failed', metadata = $1, updated_at = CURRENT_TIMESTAMP WHERE txid = $2 \
         AND status IN ('pending', 'requires_action') RETURNING *",
    )
    .bind(metadata)
    .bind(txid)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}
