//! Amounts travel as decimals on the wire and as integer cents in storage.

use rust_decimal::{Decimal, prelude::ToPrimitive};

use crate::error::{AppError, AppResult};

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Converts a positive amount with at most two decimal places to cents.
pub fn to_cents(amount: Decimal) -> AppResult<i64> {
    if amount <= Decimal::ZERO {
        return Err(AppError::BadRequest("amount must be greater than 0".into()));
    }
    if amount.normalize().scale() > 2 {
        return Err(AppError::BadRequest(
            "amount must have at most two decimal places".into(),
        ));
    }
    (amount * Decimal::ONE_HUNDRED)
        .to_i64()
        .ok_or_else(|| AppError::BadRequest("amount is out of range".into()))
}

/// Nearest cent, for filters where zero and negatives are meaningful.
pub fn approx_cents(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED).round().to_i64()
}

/// Loyalty points for a paid order: one point per full 10.00 spent.
pub fn loyalty_points(cents: i64) -> i32 {
    (cents.max(0) / 1000).min(i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn cents_conversion() {
        assert_eq!(to_cents(Decimal::from_str("13.76").unwrap()).unwrap(), 1376);
        assert_eq!(to_cents(Decimal::from_str("10").unwrap()).unwrap(), 1000);
        assert_eq!(to_cents(Decimal::from_str("2.50").unwrap()).unwrap(), 250);
        assert_eq!(from_cents(1376).to_string(), "13.76");
    }

    #[test]
    fn rejects_zero_negative_and_fractional_cents() {
        assert!(to_cents(Decimal::ZERO).is_err());
        assert!(to_cents(Decimal::from_str("-1").unwrap()).is_err());
        assert!(to_cents(Decimal::from_str("1.005").unwrap()).is_err());
    }

    #[test]
    fn points_round_down() {
        assert_eq!(loyalty_points(1376), 1);
        assert_eq!(loyalty_points(999), 0);
        assert_eq!(loyalty_points(25_000), 25);
    }
}
