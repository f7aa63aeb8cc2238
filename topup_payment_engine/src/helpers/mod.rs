//! Small free-standing helpers shared across the engine.
use chrono::Utc;
use rand::RngCore;

use crate::db_types::OrderId;

/// Generates a fresh order id of the form `ORD-{16 hex chars}-{unix timestamp}`.
pub fn new_order_id() -> OrderId {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    OrderId(format!("ORD-{hex}-{}", Utc::now().timestamp()))
}

/// Generates a voucher code of the form `GIFT-{10 hex chars}-{YYYYMMDDHHMM}`.
pub fn new_voucher_code() -> String {
    let mut bytes = [0u8; 5];
    rand::thread_rng().fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
    format!("GIFT-{hex}-{}", Utc::now().format("%Y%m%d%H%M"))
}

/// Voucher codes are matched case-insensitively and ignore surrounding whitespace.
pub fn normalize_voucher_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_ids_are_unique_and_well_formed() {
        let a = new_order_id();
        let b = new_order_id();
        assert_ne!(a, b);
        let parts: Vec<&str> = a.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1].len(), 16);
        assert!(parts[2].parse::<i64>().is_ok());
    }

    #[test]
    fn voucher_codes_are_well_formed() {
        let code = new_voucher_code();
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "GIFT");
        assert_eq!(parts[1].len(), 10);
        assert_eq!(parts[2].len(), 12);
        assert_eq!(code, normalize_voucher_code(&format!("  {} ", code.to_lowercase())));
    }
}
