use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewWebhookEvent, WebhookEvent},
    traits::PaymentGatewayError,
};

/// Appends a webhook delivery to the audit log. Every delivery lands here, including ones that failed signature
/// verification.
pub async fn insert_webhook_event(
    event: NewWebhookEvent,
    conn: &mut SqliteConnection,
) -> Result<WebhookEvent, PaymentGatewayError> {
    let record: WebhookEvent = sqlx::query_as(
        "INSERT INTO webhook_events (provider, event_type, payload, signature_valid) VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(event.provider)
    .bind(event.event_type)
    .bind(event.payload)
    .bind(event.signature_valid)
    .fetch_one(conn)
    .await?;
    debug!("📬️ Webhook event #{} logged from {} ({})", record.id, record.provider, record.event_type);
    Ok(record)
}

pub async fn fetch_webhook_events(
    provider: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<WebhookEvent>, sqlx::Error> {
    let events = sqlx::query_as("SELECT * FROM webhook_events WHERE provider = $1 ORDER BY id")
        .bind(provider)
        .fetch_all(conn)
        .await?;
    Ok(events)
}
