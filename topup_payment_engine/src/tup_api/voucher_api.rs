use chrono::{Duration, Utc};
use log::*;
use tup_common::Money;

use crate::{
    db_types::{NewVoucher, Voucher},
    helpers::{new_voucher_code, normalize_voucher_code},
    traits::{PaymentGatewayError, RedeemOutcome, VoucherStats, VoucherStore},
};

/// Redemptions above this amount always go through manual verification.
pub const MANUAL_REVIEW_THRESHOLD: Money = Money::from_cents(100_00);
/// Vouchers expiring within this many days trigger manual verification.
pub const EXPIRY_SOON_DAYS: i64 = 7;

/// `VoucherApi` wraps the voucher ledger with the redemption policy: which redemptions go straight through,
/// which get parked for a human, and how failures are reported to clients without leaking code state.
#[derive(Debug, Clone)]
pub struct VoucherApi<B> {
    db: B,
}

impl<B> VoucherApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> VoucherApi<B>
where B: VoucherStore
{
    /// Redeems `amount` against the voucher with the given code.
    ///
    /// All failure modes short of a database error are folded into the [`RedeemOutcome`] vocabulary. An unknown,
    /// inactive, expired or exhausted code is reported as [`RedeemOutcome::Invalid`] without distinguishing
    /// which, so the endpoint cannot be used to probe for live codes.
    pub async fn redeem(&self, code: &str, amount: Money) -> Result<RedeemOutcome, PaymentGatewayError> {
        let code = normalize_voucher_code(code);
        let Some(voucher) = self.db.fetch_voucher(&code).await? else {
            debug!("🎁️ Redemption attempt against unknown voucher code");
            return Ok(RedeemOutcome::Invalid);
        };
        let now = Utc::now();
        if !voucher.is_active || voucher.is_expired(now) || !voucher.has_uses_remaining() {
            debug!("🎁️ Redemption attempt against unusable voucher [{code}]");
            return Ok(RedeemOutcome::Invalid);
        }
        if voucher.balance < amount {
            return Ok(RedeemOutcome::InsufficientBalance { code, balance: voucher.balance });
        }
        if let Some(reason) = Self::verification_reason(&voucher, amount, now) {
            info!("🎁️ Redemption of {amount} against [{code}] parked for manual verification: {reason}");
            return Ok(RedeemOutcome::PendingVerification { code, reason });
        }
        let debit = self.db.debit_voucher(&code, amount).await;
        match debit {
            Ok(debit) => {
                // For a reusable voucher the remainder lives on the reissued code.
                let remaining = debit.reissued.as_ref().map(|v| v.balance).unwrap_or(debit.voucher.balance);
                info!("🎁️ Redeemed {} against voucher [{code}]. Remaining: {remaining}", debit.debited);
                Ok(RedeemOutcome::Completed {
                    code,
                    debited: debit.debited,
                    remaining,
                    reissued_code: debit.reissued.map(|v| v.code),
                })
            },
            // The voucher state changed between the read and the debit. The concurrent winner took the funds.
            Err(e) if e.is_noop() => {
                debug!("🎁️ Voucher [{code}] changed underneath a redemption: {e}");
                Ok(RedeemOutcome::Invalid)
            },
            Err(e) => Err(e),
        }
    }

    fn verification_reason(voucher: &Voucher, amount: Money, now: chrono::DateTime<Utc>) -> Option<String> {
        if amount > MANUAL_REVIEW_THRESHOLD {
            return Some(format!("redemption amount {amount} exceeds the automatic approval limit"));
        }
        if voucher.source == "external" {
            return Some("voucher was issued by an external system".to_string());
        }
        if let Some(expires_at) = voucher.expires_at {
            if expires_at - now < Duration::days(EXPIRY_SOON_DAYS) {
                return Some(format!("voucher expires within {EXPIRY_SOON_DAYS} days"));
            }
        }
        None
    }

    /// Issues a new voucher. When the request carries no code, a fresh `GIFT-` code is generated.
    pub async fn create_voucher(&self, mut voucher: NewVoucher) -> Result<Voucher, PaymentGatewayError> {
        if voucher.code.trim().is_empty() {
            voucher.code = new_voucher_code();
        } else {
            voucher.code = normalize_voucher_code(&voucher.code);
        }
        self.db.insert_voucher(voucher).await
    }

    pub async fn fetch_voucher(&self, code: &str) -> Result<Option<Voucher>, PaymentGatewayError> {
        self.db.fetch_voucher(&normalize_voucher_code(code)).await
    }

    pub async fn deactivate_voucher(&self, code: &str) -> Result<Voucher, PaymentGatewayError> {
        let code = normalize_voucher_code(code);
        info!("🎁️ Deactivating voucher [{code}]");
        self.db.deactivate_voucher(&code).await
    }

    pub async fn stats(&self) -> Result<VoucherStats, PaymentGatewayError> {
        self.db.voucher_stats().await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
