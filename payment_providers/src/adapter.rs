use tup_common::PaymentMethod;

use crate::{
    binance::BinancePayClient,
    coinbase::CoinbaseClient,
    data_objects::{ChargeRequest, InitiateOutcome, RefundOutcome},
    error::ProviderError,
    paypal::PayPalClient,
    stripe::StripeClient,
};

/// The tagged provider dispatch. Checkout selects a variant from the order's payment method and everything past
/// this point is provider agnostic.
#[derive(Clone)]
pub enum PaymentAdapter {
    Stripe(StripeClient),
    Paypal(PayPalClient),
    BinancePay(BinancePayClient),
    Coinbase(CoinbaseClient),
}

impl PaymentAdapter {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentAdapter::Stripe(_) => PaymentMethod::Stripe,
            PaymentAdapter::Paypal(_) => PaymentMethod::Paypal,
            PaymentAdapter::BinancePay(_) => PaymentMethod::BinancePay,
            PaymentAdapter::Coinbase(_) => PaymentMethod::Coinbase,
        }
    }

    pub async fn initiate_charge(&self, charge: &ChargeRequest) -> Result<InitiateOutcome, ProviderError> {
        match self {
            PaymentAdapter::Stripe(client) => client.initiate_charge(charge).await,
            PaymentAdapter::Paypal(client) => client.initiate_charge(charge).await,
            PaymentAdapter::BinancePay(client) => client.initiate_charge(charge).await,
            PaymentAdapter::Coinbase(client) => client.initiate_charge(charge).await,
        }
    }

    /// Refunds a completed charge by its provider reference. The crypto rails have no refund API, so those
    /// variants answer with a permanent rejection.
    pub async fn refund(&self, reference: &str) -> Result<RefundOutcome, ProviderError> {
        match self {
            PaymentAdapter::Stripe(client) => client.refund(reference).await,
            PaymentAdapter::Paypal(client) => client.refund(reference).await,
            PaymentAdapter::BinancePay(_) | PaymentAdapter::Coinbase(_) => Err(ProviderError::Rejected {
                status: 400,
                message: format!("{} does not support refunds", self.method()),
            }),
        }
    }
}
