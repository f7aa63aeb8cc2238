//! Top-up Payment Engine
//!
//! The engine holds the core order, transaction, voucher and payout logic for the top-up gateway. It is
//! provider-agnostic: everything that talks to an external payment rail or the upstream supplier lives behind the
//! traits in [`mod@traits`].
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). You should never need to access the database directly.
//!    Instead, use the public APIs in [`mod@tup_api`]. The exception is the data types used in the database, which
//!    are defined in the `db_types` module and are public.
//! 2. The engine public API ([`mod@tup_api`]). This provides the order flow (reconciliation), voucher, fulfillment
//!    and payout APIs. Specific backends need to implement the traits in [`mod@traits`] in order to act as a
//!    backend for the payment server.
//!
//! The engine also emits events when orders are paid or delivered. A simple actor framework lets you hook into
//! these events and perform custom actions, such as dispatching fulfillment when a payment is confirmed.
pub mod db_types;
pub mod events;
pub mod helpers;
mod sqlite;
pub mod test_utils;
pub mod traits;
mod tup_api;

pub use sqlite::SqliteDatabase;
pub use traits::{
    DeliveryProvider,
    PaymentGatewayDatabase,
    PaymentGatewayError,
    PayoutStore,
    TransferProvider,
    UpstreamError,
    VoucherStore,
};
pub use tup_api::{
    fulfillment_api::{FulfillmentApi, FulfillmentConfig},
    order_flow_api::OrderFlowApi,
    payout_api::PayoutApi,
    voucher_api::VoucherApi,
};
