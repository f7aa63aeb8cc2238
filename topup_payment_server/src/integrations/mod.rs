//! Glue between the engine's provider traits and the concrete API clients.
mod providers;

pub use providers::{PaymentAdapters, StripeTransfers, TopUpDeliveryProvider};
