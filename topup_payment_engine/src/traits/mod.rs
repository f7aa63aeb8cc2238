//! # Database management and control.
//!
//! This module defines the interface contracts of the payment engine database *backends* and of the upstream
//! services the engine drives.
//!
//! * [`PaymentGatewayDatabase`] covers orders, transactions, reconciliation and the webhook audit log.
//! * [`VoucherStore`] covers the gift voucher ledger, including the atomic debit used during redemption.
//! * [`PayoutStore`] covers the store payout ledger.
//! * [`DeliveryProvider`] and [`TransferProvider`] are the outward-facing seams: the delivery client and the
//!   payout transfer client implement these so the fulfillment and payout APIs never see provider specifics.
mod data_objects;
mod fulfillment;
mod payment_gateway_database;
mod payout_store;
mod voucher_store;

pub use data_objects::{OrderQueryFilter, RedeemOutcome, VoucherDebit, VoucherStats};
pub use fulfillment::{DeliveryProvider, TransferProvider, UpstreamError};
pub use payment_gateway_database::{PaymentConfirmation, PaymentGatewayDatabase, PaymentGatewayError};
pub use payout_store::PayoutStore;
pub use voucher_store::VoucherStore;
