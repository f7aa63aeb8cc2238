use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const STORE_CURRENCY: &str = "USD";
pub const STORE_CURRENCY_LOWER: &str = "usd";

//--------------------------------------       Money       -----------------------------------------------------------
/// A monetary amount in integer cents. All prices, voucher balances and payout amounts in the system are stored and
/// calculated in cents to avoid floating point rounding drift.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {} is too large to convert to Money", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{sign}${}.{:02}", cents / 100, cents % 100)
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses a decimal amount such as "12.50" into cents. At most two decimal places are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('$');
        let (dollars, cents) = match s.split_once('.') {
            Some((d, c)) => (d, c),
            None => (s, "0"),
        };
        if cents.len() > 2 {
            return Err(MoneyConversionError(format!("Too many decimal places in {s}")));
        }
        let dollars = dollars.parse::<i64>().map_err(|e| MoneyConversionError(format!("Invalid amount {s}: {e}")))?;
        let mut frac =
            cents.parse::<i64>().map_err(|e| MoneyConversionError(format!("Invalid amount {s}: {e}")))?;
        if cents.len() == 1 {
            frac *= 10;
        }
        if frac < 0 {
            return Err(MoneyConversionError(format!("Invalid amount {s}")));
        }
        let sign = if dollars < 0 || s.starts_with('-') { -1 } else { 1 };
        Ok(Self(sign * (dollars.abs() * 100 + frac)))
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Overflow-checked multiplication for totals built from client-supplied quantities.
    pub fn checked_mul(self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Renders the amount as a plain decimal string ("12.50") as most provider APIs expect.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        format!("{sign}{}.{:02}", cents / 100, cents % 100)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_and_decimal_string() {
        assert_eq!(Money::from_cents(1550).to_string(), "$15.50");
        assert_eq!(Money::from_cents(-75).to_string(), "-$0.75");
        assert_eq!(Money::from_cents(1000000).to_decimal_string(), "10000.00");
        assert_eq!(Money::from_cents(5).to_decimal_string(), "0.05");
    }

    #[test]
    fn parse_decimal_amounts() {
        assert_eq!("12.50".parse::<Money>().unwrap(), Money::from_cents(1250));
        assert_eq!("$0.50".parse::<Money>().unwrap(), Money::from_cents(50));
        assert_eq!("7".parse::<Money>().unwrap(), Money::from_dollars(7));
        assert_eq!("3.5".parse::<Money>().unwrap(), Money::from_cents(350));
        assert!("1.005".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
    }

    #[test]
    fn arithmetic() {
        let a = Money::from_cents(150);
        let b = Money::from_cents(75);
        assert_eq!(a + b, Money::from_cents(225));
        assert_eq!(a - b, b);
        assert_eq!(b * 4, Money::from_cents(300));
        assert_eq!(vec![a, b].into_iter().sum::<Money>(), Money::from_cents(225));
    }

    #[test]
    fn checked_arithmetic_flags_overflow() {
        assert_eq!(Money::from_cents(200).checked_mul(3), Some(Money::from_cents(600)));
        assert_eq!(Money::from_cents(200).checked_add(Money::from_cents(25)), Some(Money::from_cents(225)));
        assert!(Money::from_cents(i64::MAX).checked_mul(2).is_none());
        assert!(Money::from_cents(2).checked_mul(i64::MAX).is_none());
        assert!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)).is_none());
    }
}
