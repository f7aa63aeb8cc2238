use std::{env, time::Duration};

use log::*;
use payment_providers::ProvidersConfig;
use topup_payment_engine::FulfillmentConfig;

const DEFAULT_TUP_HOST: &str = "127.0.0.1";
const DEFAULT_TUP_PORT: u16 = 8480;
const DEFAULT_MAX_DELIVERY_ATTEMPTS: u32 = 3;
const DEFAULT_DELIVERY_BACKOFF_SECS: u64 = 5;
const DEFAULT_MAX_CONCURRENT_DELIVERIES: usize = 16;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// Retry and concurrency limits for the fulfillment dispatcher.
    pub fulfillment: FulfillmentConfig,
    /// Credentials for the payment rails and the upstream supplier.
    pub providers: ProvidersConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TUP_HOST.to_string(),
            port: DEFAULT_TUP_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            fulfillment: FulfillmentConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("TUP_HOST").ok().unwrap_or_else(|| DEFAULT_TUP_HOST.into());
        let port = env::var("TUP_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for TUP_PORT. {e} Using the default, {DEFAULT_TUP_PORT}, \
                         instead."
                    );
                    DEFAULT_TUP_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_TUP_PORT);
        let database_url = env::var("TUP_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ TUP_DATABASE_URL is not set. Please set it to the URL for the gateway database.");
            String::default()
        });
        let use_x_forwarded_for =
            env::var("TUP_USE_X_FORWARDED_FOR").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let use_forwarded = env::var("TUP_USE_FORWARDED").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let fulfillment = configure_fulfillment();
        let providers = ProvidersConfig::from_env_or_default();
        Self { host, port, database_url, use_x_forwarded_for, use_forwarded, fulfillment, providers }
    }
}

fn configure_fulfillment() -> FulfillmentConfig {
    let max_attempts = env_u64("TUP_MAX_DELIVERY_ATTEMPTS", u64::from(DEFAULT_MAX_DELIVERY_ATTEMPTS)) as u32;
    let backoff_secs = env_u64("TUP_DELIVERY_BACKOFF_SECS", DEFAULT_DELIVERY_BACKOFF_SECS);
    let max_concurrent = env_u64("TUP_MAX_CONCURRENT_DELIVERIES", DEFAULT_MAX_CONCURRENT_DELIVERIES as u64) as usize;
    FulfillmentConfig {
        max_attempts: max_attempts.max(1),
        initial_backoff: Duration::from_secs(backoff_secs),
        max_concurrent: max_concurrent.max(1),
    }
}

fn env_u64(var: &str, default: u64) -> u64 {
    env::var(var)
        .map(|s| {
            s.parse::<u64>().unwrap_or_else(|e| {
                warn!("🪛️ {s} is not a valid value for {var}. {e} Using the default, {default}, instead.");
                default
            })
        })
        .unwrap_or(default)
}
