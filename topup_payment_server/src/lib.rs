//! # Top-up payment server
//! This crate hosts the HTTP surface of the top-up payment gateway. It is responsible for:
//! * Taking order submissions and initiating charges on the configured payment rails.
//! * Listening for incoming webhook requests from Stripe, PayPal, Binance Pay and Coinbase Commerce, verifying
//!   their signatures, and feeding them to the reconciler.
//! * Receiving delivery status callbacks from the upstream top-up supplier.
//! * Exposing the voucher ledger and the store payout operations.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! Business routes live under `/api`, webhook ingestion under `/webhooks`, and `/health` answers liveness probes.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod integrations;
pub mod routes;
pub mod server;
pub mod signature;

pub mod webhooks;

#[cfg(test)]
mod endpoint_tests;
