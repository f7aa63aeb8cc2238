use std::sync::Arc;

use log::*;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::{
    config::PayPalConfig,
    data_objects::{ChargeRequest, InitiateOutcome, RefundOutcome},
    error::ProviderError,
};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PayPalLink {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct PayPalOrder {
    id: String,
    #[serde(default)]
    links: Vec<PayPalLink>,
}

#[derive(Debug, Deserialize)]
struct PayPalAmount {
    value: String,
}

#[derive(Debug, Deserialize)]
struct PayPalRefund {
    id: String,
    amount: PayPalAmount,
}

/// Client for the PayPal redirect rail. Every call authenticates with a fresh client-credentials token; the buyer
/// approves the order on PayPal's side and the capture lands as a webhook.
#[derive(Clone)]
pub struct PayPalClient {
    config: PayPalConfig,
    client: Arc<Client>,
}

impl PayPalClient {
    pub fn new(config: PayPalConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().build().map_err(|e| ProviderError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn webhook_id(&self) -> &str {
        &self.config.webhook_id
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        let url = format!("{}/v1/oauth2/token", self.config.api_url);
        trace!("Requesting OAuth token from {url}");
        let response = self
            .client
            .post(url)
            .basic_auth(&self.config.client_id, Some(self.config.client_secret.reveal()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ProviderError::RequestError(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(|e| ProviderError::ResponseError(e.to_string()))?;
            return Err(ProviderError::from_status(status.as_u16(), body));
        }
        let token = response.json::<TokenResponse>().await.map_err(|e| ProviderError::JsonError(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ProviderError> {
        let token = self.access_token().await?;
        let url = format!("{}{path}", self.config.api_url);
        trace!("Posting to {url}");
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestError(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(|e| ProviderError::JsonError(e.to_string()))
        } else {
            let message = response.text().await.map_err(|e| ProviderError::ResponseError(e.to_string()))?;
            Err(ProviderError::from_status(status.as_u16(), message))
        }
    }

    /// Creates a CAPTURE order and returns the approval redirect. The order id is set as the purchase unit
    /// reference so the capture webhook carries it back unambiguously.
    pub async fn initiate_charge(&self, charge: &ChargeRequest) -> Result<InitiateOutcome, ProviderError> {
        debug!("Creating PayPal order for {}", charge.order_id);
        let mut body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": charge.order_id,
                "amount": {
                    "currency_code": charge.currency,
                    "value": charge.amount.to_decimal_string(),
                },
            }],
        });
        if let (Some(ret), Some(cancel)) = (&charge.return_url, &charge.cancel_url) {
            body["application_context"] = json!({ "return_url": ret, "cancel_url": cancel });
        }
        let order = self.post_json::<PayPalOrder>("/v2/checkout/orders", body).await?;
        let approve = order
            .links
            .iter()
            .find(|l| l.rel == "approve")
            .map(|l| l.href.clone())
            .ok_or_else(|| ProviderError::ResponseError("PayPal order has no approval link".into()))?;
        info!("PayPal order {} created for {}", order.id, charge.order_id);
        Ok(InitiateOutcome::Pending { reference: order.id, redirect_url: approve })
    }

    /// Refunds a captured payment in full.
    pub async fn refund(&self, capture_id: &str) -> Result<RefundOutcome, ProviderError> {
        debug!("Refunding PayPal capture {capture_id}");
        let path = format!("/v2/payments/captures/{capture_id}/refund");
        let refund = self.post_json::<PayPalRefund>(&path, json!({})).await?;
        let amount = refund
            .amount
            .value
            .parse()
            .map_err(|e: tup_common::MoneyConversionError| ProviderError::InvalidCurrencyAmount(e.to_string()))?;
        info!("PayPal refund {} issued for capture {capture_id}", refund.id);
        Ok(RefundOutcome { reference: refund.id, amount })
    }
}
