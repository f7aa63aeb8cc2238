use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

/// The payment rails the gateway can route an order through. The tag is stored on the transaction record and selects
/// the adapter at the checkout boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Stripe,
    Paypal,
    BinancePay,
    Coinbase,
    Voucher,
}

#[derive(Debug, Clone, Error)]
#[error("Unsupported payment method: {0}")]
pub struct PaymentMethodError(String);

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentMethod::Stripe => "stripe",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::BinancePay => "binance_pay",
            PaymentMethod::Coinbase => "coinbase",
            PaymentMethod::Voucher => "voucher",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PaymentMethod {
    type Err = PaymentMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(Self::Stripe),
            "paypal" => Ok(Self::Paypal),
            "binance_pay" => Ok(Self::BinancePay),
            "coinbase" => Ok(Self::Coinbase),
            "voucher" => Ok(Self::Voucher),
            other => Err(PaymentMethodError(other.to_string())),
        }
    }
}

impl PaymentMethod {
    /// True for rails that redirect the buyer away and report the outcome exclusively over the webhook channel.
    pub fn is_redirect_rail(&self) -> bool {
        matches!(self, PaymentMethod::Paypal | PaymentMethod::BinancePay | PaymentMethod::Coinbase)
    }
}
