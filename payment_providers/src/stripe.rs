use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::Deserialize;
use tup_common::Money;

use crate::{
    config::StripeConfig,
    data_objects::{ChargeRequest, InitiateOutcome, RefundOutcome},
    error::ProviderError,
};

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    status: String,
    client_secret: Option<String>,
    last_payment_error: Option<StripeErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Refund {
    id: String,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct Transfer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

/// Client for the Stripe card rail. Charges run through confirmed PaymentIntents; store payouts run through
/// Connect transfers.
#[derive(Clone)]
pub struct StripeClient {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::with_capacity(2);
        let auth = format!("Bearer {}", config.secret_key.reveal());
        let val = HeaderValue::from_str(&auth).map_err(|e| ProviderError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/x-www-form-urlencoded"));
        let client =
            Client::builder().default_headers(headers).build().map_err(|e| ProviderError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn webhook_secret(&self) -> &str {
        self.config.webhook_secret.reveal()
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{path}", self.config.api_url);
        trace!("Posting form request to {url}");
        let response =
            self.client.post(url).form(form).send().await.map_err(|e| ProviderError::RequestError(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            trace!("Stripe request successful. {status}");
            response.json::<T>().await.map_err(|e| ProviderError::JsonError(e.to_string()))
        } else {
            let body = response.text().await.map_err(|e| ProviderError::ResponseError(e.to_string()))?;
            // Card declines come back as 402 with a structured error body.
            if status.as_u16() == 402 {
                if let Ok(envelope) = serde_json::from_str::<StripeErrorEnvelope>(&body) {
                    return Err(ProviderError::Declined {
                        code: envelope.error.code.unwrap_or_else(|| "card_declined".to_string()),
                        message: envelope.error.message.unwrap_or_else(|| "Your card was declined".to_string()),
                    });
                }
            }
            Err(ProviderError::from_status(status.as_u16(), body))
        }
    }

    /// Creates and confirms a PaymentIntent for the order. The order id rides in the intent metadata so that the
    /// webhook reports it back verbatim.
    pub async fn initiate_charge(&self, charge: &ChargeRequest) -> Result<InitiateOutcome, ProviderError> {
        let instrument = charge
            .instrument
            .clone()
            .ok_or_else(|| ProviderError::Rejected { status: 400, message: "Missing payment method token".into() })?;
        debug!("Creating payment intent for order {}", charge.order_id);
        let form = vec![
            ("amount", charge.amount.value().to_string()),
            ("currency", charge.currency.to_lowercase()),
            ("payment_method", instrument),
            ("confirm", "true".to_string()),
            ("receipt_email", charge.email.clone()),
            ("metadata[order_id]", charge.order_id.clone()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("automatic_payment_methods[allow_redirects]", "never".to_string()),
        ];
        let result = self.post_form::<PaymentIntent>("/payment_intents", &form).await;
        let intent = match result {
            Ok(intent) => intent,
            Err(ProviderError::Declined { code, message }) => {
                info!("Payment intent for order {} was declined: {code}", charge.order_id);
                return Ok(InitiateOutcome::Declined { code, message });
            },
            Err(e) => return Err(e),
        };
        info!("Payment intent {} for order {} is {}", intent.id, charge.order_id, intent.status);
        match intent.status.as_str() {
            "succeeded" => Ok(InitiateOutcome::Completed { reference: intent.id }),
            "requires_action" => {
                let client_secret = intent
                    .client_secret
                    .ok_or_else(|| ProviderError::ResponseError("Intent requires action without client secret".into()))?;
                Ok(InitiateOutcome::RequiresAction { reference: intent.id, client_secret })
            },
            _ => {
                let (code, message) = match intent.last_payment_error {
                    Some(err) => (
                        err.code.unwrap_or_else(|| "payment_failed".to_string()),
                        err.message.unwrap_or_else(|| "The payment did not complete".to_string()),
                    ),
                    None => ("payment_failed".to_string(), format!("Unexpected intent status {}", intent.status)),
                };
                Ok(InitiateOutcome::Declined { code, message })
            },
        }
    }

    /// Refunds a completed PaymentIntent in full.
    pub async fn refund(&self, intent_id: &str) -> Result<RefundOutcome, ProviderError> {
        debug!("Refunding payment intent {intent_id}");
        let form = vec![("payment_intent", intent_id.to_string())];
        let refund = self.post_form::<Refund>("/refunds", &form).await?;
        info!("Refund {} issued for intent {intent_id}", refund.id);
        Ok(RefundOutcome { reference: refund.id, amount: Money::from_cents(refund.amount) })
    }

    /// Kicks off a Connect transfer to a store's connected account. Completion arrives over the webhook channel as
    /// a transfer.created event.
    pub async fn create_transfer(
        &self,
        account_id: &str,
        amount: Money,
        currency: &str,
        payout_id: i64,
    ) -> Result<String, ProviderError> {
        debug!("Creating transfer of {amount} to {account_id}");
        let form = vec![
            ("amount", amount.value().to_string()),
            ("currency", currency.to_lowercase()),
            ("destination", account_id.to_string()),
            ("metadata[payout_id]", payout_id.to_string()),
        ];
        let transfer = self.post_form::<Transfer>("/transfers", &form).await?;
        info!("Transfer {} created for payout {payout_id}", transfer.id);
        Ok(transfer.id)
    }
}
