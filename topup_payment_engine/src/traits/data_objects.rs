use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tup_common::Money;

use crate::db_types::{OrderStatus, Voucher};

/// Filter for order searches. Empty fields are not constrained.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub email: Option<String>,
    pub player_id: Option<String>,
    pub status: Option<Vec<OrderStatus>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl OrderQueryFilter {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() &&
            self.player_id.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.since.is_none() &&
            self.until.is_none()
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_player_id(mut self, player_id: impl Into<String>) -> Self {
        self.player_id = Some(player_id.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }
}

/// The result of an atomic voucher debit.
#[derive(Debug, Clone)]
pub struct VoucherDebit {
    /// The voucher after the debit.
    pub voucher: Voucher,
    pub debited: Money,
    /// For reusable vouchers redeemed below their balance, the fresh single-use voucher carrying the remainder.
    pub reissued: Option<Voucher>,
}

/// The redemption vocabulary exposed to clients. Anything that is not one of these four words does not leave
/// the voucher API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RedeemOutcome {
    /// The voucher covered the requested amount.
    Completed { code: String, debited: Money, remaining: Money, reissued_code: Option<String> },
    /// The redemption needs a human look before funds move.
    PendingVerification { code: String, reason: String },
    /// The voucher exists and is usable, but its balance is below the requested amount.
    InsufficientBalance { code: String, balance: Money },
    /// Unknown, inactive, expired or exhausted. Deliberately vague so the message cannot be used to probe codes.
    Invalid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoucherStats {
    pub total_vouchers: i64,
    pub active_vouchers: i64,
    pub outstanding_balance: Money,
    pub total_redemptions: i64,
}
