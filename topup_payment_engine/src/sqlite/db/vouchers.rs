use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;
use tup_common::Money;

use crate::{
    db_types::{NewVoucher, Voucher},
    helpers::new_voucher_code,
    traits::{PaymentGatewayError, VoucherDebit, VoucherStats},
};

pub async fn insert_voucher(voucher: NewVoucher, conn: &mut SqliteConnection) -> Result<Voucher, PaymentGatewayError> {
    let record: Voucher = sqlx::query_as(
        r#"
            INSERT INTO vouchers (code, balance, max_uses, expires_at, is_reusable, source)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(voucher.code)
    .bind(voucher.balance)
    .bind(voucher.max_uses)
    .bind(voucher.expires_at)
    .bind(voucher.is_reusable)
    .bind(voucher.source)
    .fetch_one(conn)
    .await?;
    debug!("🎁️ Voucher [{}] created with balance {}", record.code, record.balance);
    Ok(record)
}

pub async fn fetch_voucher(code: &str, conn: &mut SqliteConnection) -> Result<Option<Voucher>, sqlx::Error> {
    let voucher = sqlx::query_as("SELECT * FROM vouchers WHERE code = $1").bind(code).fetch_optional(conn).await?;
    Ok(voucher)
}

/// Debits the voucher. Run this inside a transaction. The guarded UPDATE is the first statement in that
/// transaction, so two concurrent redemptions serialize on the row and the loser's UPDATE matches nothing
/// instead of draining the same balance twice.
pub(crate) async fn debit_voucher(
    code: &str,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<VoucherDebit, PaymentGatewayError> {
    // RETURNING reflects the updated row, but balance is untouched here, so it still carries the pre-debit
    // balance. It zeroes out below once the remainder is known.
    let debited: Option<Voucher> = sqlx::query_as(
        "UPDATE vouchers SET used_count = used_count + 1, is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE \
         code = $1 AND is_active = 1 AND balance >= $2 RETURNING *",
    )
    .bind(code)
    .bind(amount)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(mut voucher) = debited else {
        return Err(match fetch_voucher(code, &mut *conn).await? {
            None => PaymentGatewayError::VoucherNotFound(code.to_string()),
            Some(v) if v.is_active && v.balance < amount => PaymentGatewayError::ReconciliationNoop(format!(
                "Voucher {code} balance {} is below the requested {amount}",
                v.balance
            )),
            Some(_) => PaymentGatewayError::ReconciliationNoop(format!("Voucher {code} is no longer usable")),
        });
    };
    // Expiry and use-count limits are validated on the row as the write lock holds it. An Err here rolls the
    // transaction back, so the voucher is untouched.
    let now = Utc::now();
    let uses_exhausted = voucher.max_uses.map(|m| voucher.used_count > m).unwrap_or(false);
    if voucher.is_expired(now) || uses_exhausted {
        return Err(PaymentGatewayError::ReconciliationNoop(format!("Voucher {code} is no longer usable")));
    }
    let remainder = voucher.balance - amount;
    sqlx::query("UPDATE vouchers SET balance = 0 WHERE code = $1").bind(code).execute(&mut *conn).await?;
    voucher.balance = Money::from_cents(0);
    // Single-use vouchers burn in full: any unredeemed remainder is forfeited. Reusable vouchers split: the
    // redeemed row closes out and the remainder moves to a fresh single-use code with the same expiry. Either
    // way the debited row ends its life here.
    let reissue = voucher.is_reusable && remainder.is_positive();
    let reissued = if reissue {
        let new_voucher = NewVoucher {
            code: new_voucher_code(),
            balance: remainder,
            max_uses: Some(1),
            expires_at: voucher.expires_at,
            is_reusable: false,
            source: voucher.source.clone(),
        };
        let reissued = insert_voucher(new_voucher, &mut *conn).await?;
        debug!("🎁️ Remainder {remainder} of voucher [{code}] reissued as [{}]", reissued.code);
        Some(reissued)
    } else {
        None
    };
    Ok(VoucherDebit { voucher, debited: amount, reissued })
}

pub async fn deactivate_voucher(code: &str, conn: &mut SqliteConnection) -> Result<Voucher, PaymentGatewayError> {
    let voucher: Option<Voucher> = sqlx::query_as(
        "UPDATE vouchers SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE code = $1 RETURNING *",
    )
    .bind(code)
    .fetch_optional(conn)
    .await?;
    voucher.ok_or_else(|| PaymentGatewayError::VoucherNotFound(code.to_string()))
}

pub async fn voucher_stats(conn: &mut SqliteConnection) -> Result<VoucherStats, sqlx::Error> {
    let (total_vouchers, active_vouchers, outstanding, total_redemptions): (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(is_active), 0), COALESCE(SUM(CASE WHEN is_active THEN balance ELSE 0 END), \
         0), COALESCE(SUM(used_count), 0) FROM vouchers",
    )
    .fetch_one(conn)
    .await?;
    Ok(VoucherStats {
        total_vouchers,
        active_vouchers,
        outstanding_balance: Money::from_cents(outstanding),
        total_redemptions,
    })
}
