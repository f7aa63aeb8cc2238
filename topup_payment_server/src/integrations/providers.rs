use log::*;
use payment_providers::{
    BinancePayClient,
    CoinbaseClient,
    DeliveryClient,
    DeliveryItem,
    DeliveryRequest,
    PayPalClient,
    PaymentAdapter,
    ProviderError,
    ProvidersConfig,
    StripeClient,
};
use topup_payment_engine::{
    db_types::{Order, OrderItem, Payout},
    DeliveryProvider,
    TransferProvider,
    UpstreamError,
};
use tup_common::PaymentMethod;

use crate::errors::ServerError;

/// The full set of payment rails the server can initiate charges on, keyed by payment method.
#[derive(Clone)]
pub struct PaymentAdapters {
    stripe: PaymentAdapter,
    paypal: PaymentAdapter,
    binance: PaymentAdapter,
    coinbase: PaymentAdapter,
}

impl PaymentAdapters {
    pub fn try_from_config(config: &ProvidersConfig) -> Result<Self, ServerError> {
        let init = |e: ProviderError| ServerError::InitializeError(e.to_string());
        Ok(Self {
            stripe: PaymentAdapter::Stripe(StripeClient::new(config.stripe.clone()).map_err(init)?),
            paypal: PaymentAdapter::Paypal(PayPalClient::new(config.paypal.clone()).map_err(init)?),
            binance: PaymentAdapter::BinancePay(BinancePayClient::new(config.binance.clone()).map_err(init)?),
            coinbase: PaymentAdapter::Coinbase(CoinbaseClient::new(config.coinbase.clone()).map_err(init)?),
        })
    }

    /// Vouchers are not a charge rail, so they have no adapter.
    pub fn for_method(&self, method: PaymentMethod) -> Option<&PaymentAdapter> {
        match method {
            PaymentMethod::Stripe => Some(&self.stripe),
            PaymentMethod::Paypal => Some(&self.paypal),
            PaymentMethod::BinancePay => Some(&self.binance),
            PaymentMethod::Coinbase => Some(&self.coinbase),
            PaymentMethod::Voucher => None,
        }
    }
}

fn to_upstream(e: ProviderError) -> UpstreamError {
    match e {
        ProviderError::Unavailable { status, message } => {
            UpstreamError::Unavailable(format!("Status {status}. {message}"))
        },
        ProviderError::RequestError(s) => UpstreamError::Unavailable(s),
        ProviderError::Rejected { status, message } => UpstreamError::Rejected { status, message },
        other => UpstreamError::Rejected { status: 500, message: other.to_string() },
    }
}

/// Sends paid orders to the upstream top-up supplier.
#[derive(Clone)]
pub struct TopUpDeliveryProvider {
    client: DeliveryClient,
}

impl TopUpDeliveryProvider {
    pub fn new(client: DeliveryClient) -> Self {
        Self { client }
    }
}

impl DeliveryProvider for TopUpDeliveryProvider {
    async fn deliver(&self, order: &Order, items: &[OrderItem]) -> Result<String, UpstreamError> {
        let request = DeliveryRequest {
            order_id: order.order_id.as_str().to_string(),
            player_id: order.player_id.clone(),
            items: items
                .iter()
                .map(|i| DeliveryItem { sku: i.sku.clone(), name: i.name.clone(), quantity: i.quantity })
                .collect(),
        };
        let receipt = self.client.deliver(&request).await.map_err(to_upstream)?;
        debug!("🚚️ Supplier accepted order [{}] with status {}", order.order_id, receipt.status);
        Ok(receipt.reference)
    }
}

/// Submits store payouts as Stripe Connect transfers.
#[derive(Clone)]
pub struct StripeTransfers {
    client: StripeClient,
}

impl StripeTransfers {
    pub fn new(client: StripeClient) -> Self {
        Self { client }
    }
}

impl TransferProvider for StripeTransfers {
    async fn create_transfer(&self, payout: &Payout) -> Result<String, UpstreamError> {
        self.client
            .create_transfer(&payout.store_id, payout.amount, &payout.currency, payout.id)
            .await
            .map_err(to_upstream)
    }
}
