use std::sync::Arc;

use chrono::Utc;
use hmac::{Hmac, Mac};
use log::*;
use rand::{distributions::Alphanumeric, Rng};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha512;

use crate::{
    config::BinancePayConfig,
    data_objects::{ChargeRequest, InitiateOutcome},
    error::ProviderError,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceEnvelope {
    status: String,
    code: String,
    data: Option<BinanceOrderData>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceOrderData {
    prepay_id: String,
    checkout_url: String,
}

/// Client for the Binance Pay redirect rail. Requests are signed with an HMAC over the timestamp, a random nonce
/// and the JSON body; the buyer completes the payment on Binance's checkout page.
#[derive(Clone)]
pub struct BinancePayClient {
    config: BinancePayConfig,
    client: Arc<Client>,
}

impl BinancePayClient {
    pub fn new(config: BinancePayConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().build().map_err(|e| ProviderError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn api_secret(&self) -> &str {
        self.config.api_secret.reveal()
    }

    fn sign(&self, timestamp: i64, nonce: &str, body: &str) -> Result<String, ProviderError> {
        let payload = format!("{timestamp}\n{nonce}\n{body}\n");
        let mut mac = Hmac::<Sha512>::new_from_slice(self.config.api_secret.reveal().as_bytes())
            .map_err(|e| ProviderError::Initialization(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode_upper(mac.finalize().into_bytes()))
    }

    /// Creates a Binance Pay order. The merchant trade number is our order id, so the webhook carries it back
    /// without translation.
    pub async fn initiate_charge(&self, charge: &ChargeRequest) -> Result<InitiateOutcome, ProviderError> {
        debug!("Creating Binance Pay order for {}", charge.order_id);
        let body = json!({
            "env": { "terminalType": "WEB" },
            "merchantTradeNo": charge.order_id,
            "orderAmount": charge.amount.to_decimal_string(),
            "currency": "USDT",
            "description": format!("Top-up order {}", charge.order_id),
            "goodsDetails": [{
                "goodsType": "02",
                "goodsCategory": "Z000",
                "referenceGoodsId": charge.order_id,
                "goodsName": "Game credit top-up",
            }],
            "returnUrl": charge.return_url,
            "cancelUrl": charge.cancel_url,
        });
        let body = serde_json::to_string(&body).map_err(|e| ProviderError::JsonError(e.to_string()))?;
        let timestamp = Utc::now().timestamp_millis();
        let nonce: String = rand::thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect();
        let signature = self.sign(timestamp, &nonce, &body)?;
        let url = format!("{}/binancepay/openapi/v3/order", self.config.api_url);
        trace!("Posting signed order request to {url}");
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("BinancePay-Timestamp", timestamp.to_string())
            .header("BinancePay-Nonce", nonce)
            .header("BinancePay-Certificate-SN", &self.config.api_key)
            .header("BinancePay-Signature", signature)
            .body(body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestError(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.map_err(|e| ProviderError::ResponseError(e.to_string()))?;
            return Err(ProviderError::from_status(status.as_u16(), message));
        }
        let envelope = response.json::<BinanceEnvelope>().await.map_err(|e| ProviderError::JsonError(e.to_string()))?;
        if envelope.status != "SUCCESS" {
            let message = envelope.error_message.unwrap_or_else(|| "Binance Pay rejected the order".to_string());
            info!("Binance Pay declined order {}: {} {message}", charge.order_id, envelope.code);
            return Ok(InitiateOutcome::Declined { code: envelope.code, message });
        }
        let data =
            envelope.data.ok_or_else(|| ProviderError::ResponseError("Binance Pay response has no data".into()))?;
        info!("Binance Pay order {} created for {}", data.prepay_id, charge.order_id);
        Ok(InitiateOutcome::Pending { reference: data.prepay_id, redirect_url: data.checkout_url })
    }
}
