use std::sync::Arc;

use chrono::Utc;
use hmac::{Hmac, Mac};
use log::*;
use reqwest::Client;
use sha2::Sha256;

use crate::{
    config::DeliveryConfig,
    data_objects::{DeliveryReceipt, DeliveryRequest},
    error::ProviderError,
};

/// Client for the upstream top-up supplier. Requests are signed with a shared-secret HMAC over the timestamp and
/// body so the supplier can authenticate us the same way we authenticate its status callbacks.
#[derive(Clone)]
pub struct DeliveryClient {
    config: DeliveryConfig,
    client: Arc<Client>,
}

impl DeliveryClient {
    pub fn new(config: DeliveryConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().build().map_err(|e| ProviderError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn shared_secret(&self) -> &str {
        self.config.shared_secret.reveal()
    }

    fn sign(&self, timestamp: i64, body: &str) -> Result<String, ProviderError> {
        let payload = format!("{timestamp}.{body}");
        let mut mac = Hmac::<Sha256>::new_from_slice(self.config.shared_secret.reveal().as_bytes())
            .map_err(|e| ProviderError::Initialization(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Submits a fulfillment request. A success returns the supplier's reference; 5xx and 429 responses map to the
    /// retryable side of [`ProviderError`], everything else is permanent.
    pub async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt, ProviderError> {
        let body = serde_json::to_string(request).map_err(|e| ProviderError::JsonError(e.to_string()))?;
        let timestamp = Utc::now().timestamp();
        let signature = self.sign(timestamp, &body)?;
        let url = format!("{}/deliver", self.config.api_url);
        debug!("Submitting delivery for order {} to {url}", request.order_id);
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("X-Topup-Signature", signature)
            .header("X-Topup-Timestamp", timestamp.to_string())
            .body(body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestError(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            let receipt =
                response.json::<DeliveryReceipt>().await.map_err(|e| ProviderError::JsonError(e.to_string()))?;
            info!("Delivery accepted for order {}. Reference {}", request.order_id, receipt.reference);
            Ok(receipt)
        } else {
            let message = response.text().await.map_err(|e| ProviderError::ResponseError(e.to_string()))?;
            warn!("Delivery for order {} failed with status {status}", request.order_id);
            Err(ProviderError::from_status(status.as_u16(), message))
        }
    }
}
