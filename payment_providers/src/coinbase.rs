use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    config::CoinbaseConfig,
    data_objects::{ChargeRequest, InitiateOutcome},
    error::ProviderError,
};

#[derive(Debug, Deserialize)]
struct ChargeEnvelope {
    data: CoinbaseCharge,
}

#[derive(Debug, Deserialize)]
struct CoinbaseCharge {
    code: String,
    hosted_url: String,
}

/// Client for Coinbase Commerce, the crypto rail. A charge gets a hosted payment page; confirmation arrives as a
/// charge:confirmed webhook once the chain settles.
#[derive(Clone)]
pub struct CoinbaseClient {
    config: CoinbaseConfig,
    client: Arc<Client>,
}

impl CoinbaseClient {
    pub fn new(config: CoinbaseConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::with_capacity(3);
        let val = HeaderValue::from_str(config.api_key.reveal())
            .map_err(|e| ProviderError::Initialization(e.to_string()))?;
        headers.insert("X-CC-Api-Key", val);
        headers.insert("X-CC-Version", HeaderValue::from_static("2018-03-22"));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client =
            Client::builder().default_headers(headers).build().map_err(|e| ProviderError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn webhook_secret(&self) -> &str {
        self.config.webhook_secret.reveal()
    }

    /// Creates a fixed-price charge. The order id is attached as charge metadata.
    pub async fn initiate_charge(&self, charge: &ChargeRequest) -> Result<InitiateOutcome, ProviderError> {
        debug!("Creating Coinbase charge for {}", charge.order_id);
        let body = json!({
            "name": format!("Top-up order {}", charge.order_id),
            "description": "Game credit top-up",
            "pricing_type": "fixed_price",
            "local_price": {
                "amount": charge.amount.to_decimal_string(),
                "currency": charge.currency,
            },
            "metadata": { "order_id": charge.order_id },
            "redirect_url": charge.return_url,
            "cancel_url": charge.cancel_url,
        });
        let url = format!("{}/charges", self.config.api_url);
        trace!("Posting charge request to {url}");
        let response =
            self.client.post(url).json(&body).send().await.map_err(|e| ProviderError::RequestError(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.map_err(|e| ProviderError::ResponseError(e.to_string()))?;
            return Err(ProviderError::from_status(status.as_u16(), message));
        }
        let envelope = response.json::<ChargeEnvelope>().await.map_err(|e| ProviderError::JsonError(e.to_string()))?;
        info!("Coinbase charge {} created for {}", envelope.data.code, charge.order_id);
        Ok(InitiateOutcome::Pending { reference: envelope.data.code, redirect_url: envelope.data.hosted_url })
    }
}
