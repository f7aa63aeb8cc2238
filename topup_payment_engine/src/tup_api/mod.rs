//! The engine's public APIs.
//!
//! * [`order_flow_api::OrderFlowApi`] handles checkout-side order creation and webhook-side reconciliation.
//! * [`voucher_api::VoucherApi`] handles gift voucher redemption and administration.
//! * [`fulfillment_api::FulfillmentApi`] dispatches paid orders to the upstream supplier with bounded retries.
//! * [`payout_api::PayoutApi`] drives store payouts through the transfer provider.
pub mod fulfillment_api;
pub mod order_flow_api;
pub mod payout_api;
pub mod voucher_api;
