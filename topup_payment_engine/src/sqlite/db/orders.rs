use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderStatus},
    traits::{OrderQueryFilter, PaymentGatewayError},
};

/// Inserts the order and its items, returning `false` in the second parameter if the order already exists.
///
/// Two identical submissions can race past the pre-check; the loser hits the UNIQUE constraint on `order_id`
/// or `idempotency_key` and resolves to the row the winner created instead of surfacing the violation.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), PaymentGatewayError> {
    if let Some(existing) = fetch_order_by_order_id(&order.order_id, &mut *conn).await? {
        return Ok((existing, false));
    }
    let order_id = order.order_id.clone();
    let idempotency_key = order.idempotency_key.clone();
    let items = order.items.clone();
    match insert_order(order, &mut *conn).await {
        Ok(order) => {
            insert_order_items(&order.order_id, &items, &mut *conn).await?;
            debug!("📝️ Order [{}] inserted with id {}", order.order_id, order.id);
            Ok((order, true))
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing = match fetch_order_by_order_id(&order_id, &mut *conn).await? {
                Some(existing) => Some(existing),
                None => match &idempotency_key {
                    Some(key) => fetch_order_by_idempotency_key(key, &mut *conn).await?,
                    None => None,
                },
            };
            existing.map(|o| (o, false)).ok_or(PaymentGatewayError::OrderAlreadyExists(order_id))
        },
        Err(e) => Err(e.into()),
    }
}

/// Inserts a new order using the given connection. This is not atomic on its own. You can embed this call inside
/// a transaction if you need atomicity, and pass `&mut *tx` as the connection argument.
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                email,
                player_id,
                player_nickname,
                subtotal,
                tax,
                total,
                currency,
                idempotency_key
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.email)
    .bind(order.player_id)
    .bind(order.player_nickname)
    .bind(order.subtotal)
    .bind(order.tax)
    .bind(order.total)
    .bind(order.currency)
    .bind(order.idempotency_key)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

async fn insert_order_items(
    order_id: &OrderId,
    items: &[NewOrderItem],
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    for item in items {
        sqlx::query("INSERT INTO order_items (order_id, sku, name, quantity, unit_price) VALUES ($1, $2, $3, $4, $5)")
            .bind(order_id.as_str())
            .bind(&item.sku)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_idempotency_key(
    key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE idempotency_key = $1").bind(key).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`.
///
/// Resulting orders are ordered by `created_at` in ascending order.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(email) = query.email {
        where_clause.push("email = ");
        where_clause.push_bind_unseparated(email);
    }
    if let Some(player_id) = query.player_id {
        where_clause.push("player_id = ");
        where_clause.push_bind_unseparated(player_id);
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let statuses =
            query.status.as_ref().map(|v| v.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>()).unwrap_or_default();
        where_clause.push(format!("status IN ({})", statuses.join(",")));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");
    trace!("📝️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {} rows", orders.len());
    Ok(orders)
}

/// Conditionally transitions an order. The guard statuses enforce the forward-only state machine: when no row
/// matches, the transition has already happened (or is forbidden) and `None` is returned.
pub(crate) async fn update_order_status(
    order_id: &OrderId,
    from: &[OrderStatus],
    to: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let guard = from.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
    let sql = format!(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 AND status IN ({guard}) \
         RETURNING *"
    );
    let result: Option<Order> =
        sqlx::query_as(&sql).bind(to.to_string()).bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(result)
}

pub(crate) async fn mark_delivered(
    order_id: &OrderId,
    delivery_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = 'delivered', delivery_ref = $1, delivery_error = NULL, updated_at = \
         CURRENT_TIMESTAMP WHERE order_id = $2 AND status = 'payment_confirmed' RETURNING *",
    )
    .bind(delivery_ref)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

pub(crate) async fn record_delivery_failure(
    order_id: &OrderId,
    error: &str,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET delivery_error = $1, delivery_attempts = delivery_attempts + 1, updated_at = \
         CURRENT_TIMESTAMP WHERE order_id = $2 RETURNING *",
    )
    .bind(error)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))
}
