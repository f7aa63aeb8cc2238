use log::*;
use tup_common::Secret;

fn env_or_warn(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| {
        warn!("{var} not set, using (probably useless) default");
        default.to_string()
    })
}

fn secret_or_warn(var: &str) -> Secret<String> {
    Secret::new(std::env::var(var).unwrap_or_else(|_| {
        warn!("{var} not set, using (probably useless) default");
        "00000000000000".to_string()
    }))
}

#[derive(Debug, Clone, Default)]
pub struct StripeConfig {
    pub api_url: String,
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
}

impl StripeConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env_or_warn("TUP_STRIPE_API_URL", "https://api.stripe.com/v1");
        let secret_key = secret_or_warn("TUP_STRIPE_SECRET_KEY");
        let webhook_secret = secret_or_warn("TUP_STRIPE_WEBHOOK_SECRET");
        Self { api_url, secret_key, webhook_secret }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PayPalConfig {
    pub api_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// The webhook id PayPal assigned to this endpoint. It is part of the signed transmission string.
    pub webhook_id: String,
}

impl PayPalConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env_or_warn("TUP_PAYPAL_API_URL", "https://api-m.sandbox.paypal.com");
        let client_id = env_or_warn("TUP_PAYPAL_CLIENT_ID", "paypal-client-id");
        let client_secret = secret_or_warn("TUP_PAYPAL_CLIENT_SECRET");
        let webhook_id = env_or_warn("TUP_PAYPAL_WEBHOOK_ID", "paypal-webhook-id");
        Self { api_url, client_id, client_secret, webhook_id }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BinancePayConfig {
    pub api_url: String,
    pub merchant_id: String,
    pub api_key: String,
    pub api_secret: Secret<String>,
}

impl BinancePayConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env_or_warn("TUP_BINANCE_API_URL", "https://bpay.binanceapi.com");
        let merchant_id = env_or_warn("TUP_BINANCE_MERCHANT_ID", "000000");
        let api_key = env_or_warn("TUP_BINANCE_API_KEY", "binance-api-key");
        let api_secret = secret_or_warn("TUP_BINANCE_API_SECRET");
        Self { api_url, merchant_id, api_key, api_secret }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoinbaseConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
    pub webhook_secret: Secret<String>,
}

impl CoinbaseConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env_or_warn("TUP_COINBASE_API_URL", "https://api.commerce.coinbase.com");
        let api_key = secret_or_warn("TUP_COINBASE_API_KEY");
        let webhook_secret = secret_or_warn("TUP_COINBASE_WEBHOOK_SECRET");
        Self { api_url, api_key, webhook_secret }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryConfig {
    pub api_url: String,
    /// Shared secret for signing outbound delivery requests and verifying the supplier's status callbacks.
    pub shared_secret: Secret<String>,
}

impl DeliveryConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env_or_warn("TUP_DELIVERY_API_URL", "https://topup.example.com/api");
        let shared_secret = secret_or_warn("TUP_DELIVERY_SHARED_SECRET");
        Self { api_url, shared_secret }
    }
}

/// The complete provider credential set, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct ProvidersConfig {
    pub stripe: StripeConfig,
    pub paypal: PayPalConfig,
    pub binance: BinancePayConfig,
    pub coinbase: CoinbaseConfig,
    pub delivery: DeliveryConfig,
}

impl ProvidersConfig {
    pub fn from_env_or_default() -> Self {
        Self {
            stripe: StripeConfig::from_env_or_default(),
            paypal: PayPalConfig::from_env_or_default(),
            binance: BinancePayConfig::from_env_or_default(),
            coinbase: CoinbaseConfig::from_env_or_default(),
            delivery: DeliveryConfig::from_env_or_default(),
        }
    }
}
