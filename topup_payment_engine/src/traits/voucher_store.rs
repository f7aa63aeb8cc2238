use tup_common::Money;

use crate::{
    db_types::{NewVoucher, Voucher},
    traits::{PaymentGatewayError, VoucherDebit, VoucherStats},
};

/// Backend contract for the gift voucher ledger.
///
/// Redemption *policy* (manual verification thresholds, the client-facing outcome vocabulary) lives in the
/// voucher API. The store only provides atomic primitives; in particular [`VoucherStore::debit_voucher`] must
/// re-check the balance inside its own transaction so that two concurrent redemptions cannot both succeed.
#[allow(async_fn_in_trait)]
pub trait VoucherStore: Clone {
    async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, PaymentGatewayError>;

    /// Fetches a voucher by its normalized code.
    async fn fetch_voucher(&self, code: &str) -> Result<Option<Voucher>, PaymentGatewayError>;

    /// Atomically debits the voucher. In a single transaction:
    /// * re-reads the voucher and re-validates balance, active flag, expiry and use count,
    /// * subtracts the amount and increments the use count,
    /// * deactivates single-use vouchers,
    /// * for reusable vouchers with a remainder, issues a fresh single-use voucher carrying the remainder with
    ///   the same expiry.
    async fn debit_voucher(&self, code: &str, amount: Money) -> Result<VoucherDebit, PaymentGatewayError>;

    async fn deactivate_voucher(&self, code: &str) -> Result<Voucher, PaymentGatewayError>;

    async fn voucher_stats(&self) -> Result<VoucherStats, PaymentGatewayError>;
}
