//! HTTP clients for the external payment and delivery providers.
//!
//! Each provider gets its own thin client that speaks the provider's wire format and normalizes every response into
//! the common vocabulary in [`data_objects`]: a charge either completes, needs buyer action, fails with a decline,
//! or stays pending until the provider's webhook channel reports the terminal state. The [`PaymentAdapter`] enum is
//! the single dispatch point; nothing downstream of it knows which provider is in play.
mod adapter;
mod binance;
mod coinbase;
mod config;
mod data_objects;
mod delivery;
mod error;
mod paypal;
mod stripe;

pub use adapter::PaymentAdapter;
pub use binance::BinancePayClient;
pub use coinbase::CoinbaseClient;
pub use config::{
    BinancePayConfig,
    CoinbaseConfig,
    DeliveryConfig,
    PayPalConfig,
    ProvidersConfig,
    StripeConfig,
};
pub use data_objects::{
    ChargeRequest,
    DeliveryItem,
    DeliveryReceipt,
    DeliveryRequest,
    InitiateOutcome,
    RefundOutcome,
};
pub use delivery::DeliveryClient;
pub use error::ProviderError;
pub use paypal::PayPalClient;
pub use stripe::StripeClient;
