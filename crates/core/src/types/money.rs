//! Money helpers using decimal arithmetic.
//!
//! Amounts are carried as [`Decimal`] in the currency's standard unit
//! (rupees). The payment gateway expects integer minor units (paise), which
//! [`to_minor_units`] produces.

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// ISO 4217 code of the store currency.
pub const CURRENCY_CODE: &str = "INR";

/// Number of minor units in one major unit (paise per rupee).
const MINOR_UNITS_PER_MAJOR: i64 = 100;

/// Errors converting money amounts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Amount is negative where only non-negative amounts make sense.
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
    /// Amount does not fit in the gateway's integer representation.
    #[error("amount out of range: {0}")]
    OutOfRange(Decimal),
}

/// Round an amount to two decimal places, half away from zero.
///
/// ```
/// use rust_decimal::Decimal;
/// use kirana_core::round_money;
///
/// assert_eq!(round_money(Decimal::new(12345, 3)), Decimal::new(1235, 2));
/// ```
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert an amount in rupees to paise.
///
/// # Errors
///
/// Returns `MoneyError::Negative` for negative amounts and
/// `MoneyError::OutOfRange` if the value overflows `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative(amount));
    }

    let minor = round_money(amount)
        .checked_mul(Decimal::from(MINOR_UNITS_PER_MAJOR))
        .ok_or(MoneyError::OutOfRange(amount))?;

    i64::try_from(minor.trunc()).map_err(|_| MoneyError::OutOfRange(amount))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(Decimal::new(1005, 3)), Decimal::new(101, 2));
        assert_eq!(round_money(Decimal::new(1004, 3)), Decimal::new(100, 2));
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(49_950, 2)).unwrap(), 49_950);
        assert_eq!(to_minor_units(Decimal::from(1)).unwrap(), 100);
        assert_eq!(to_minor_units(Decimal::ZERO).unwrap(), 0);
    }

    #[test]
    fn test_to_minor_units_rounds_sub_paise() {
        assert_eq!(to_minor_units(Decimal::new(10_005, 4)).unwrap(), 100);
    }

    #[test]
    fn test_to_minor_units_rejects_negative() {
        assert!(matches!(
            to_minor_units(Decimal::new(-1, 0)),
            Err(MoneyError::Negative(_))
        ));
    }
}
