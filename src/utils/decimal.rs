//! Decimal arithmetic utilities for share accounting and rate math.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Scale factor used by 1e18 fixed-point wire representations
/// (e.g. `1e18` = 100% for rates, or one whole token for amounts).
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Convert a 1e18 scaled integer into a `Decimal`.
///
/// Used at the oracle/bridge boundary where counterparties speak in
/// wei-style fixed point.
pub fn from_wad(value: u128) -> Decimal {
    Decimal::from_i128_with_scale(value as i128, 18)
}

/// Convert a `Decimal` into its 1e18 scaled integer representation,
/// truncating any precision beyond 18 decimal places. Values too large
/// to scale saturate at `u128::MAX`; negatives map to zero.
pub fn to_wad(value: Decimal) -> u128 {
    match value.checked_mul(Decimal::from(WAD as u64)) {
        Some(scaled) => scaled.trunc().to_u128().unwrap_or(0),
        None => u128::MAX,
    }
}

/// Convert a rate to percentage points (0.04 -> 4).
pub fn to_percent(rate: Decimal) -> Decimal {
    rate * dec!(100)
}

/// Safe division that returns zero if the divisor is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wad_round_trip() {
        assert_eq!(from_wad(WAD), dec!(1.000000000000000000));
        assert_eq!(from_wad(40_000_000_000_000_000), dec!(0.040000000000000000)); // 4%
        assert_eq!(to_wad(dec!(0.04)), 40_000_000_000_000_000);
        assert_eq!(to_wad(dec!(1)), WAD);
    }

    #[test]
    fn test_to_wad_saturates_instead_of_panicking() {
        // scaling by 1e18 overflows Decimal above ~7.9e10
        assert_eq!(to_wad(dec!(100_000_000_000)), u128::MAX);
        assert_eq!(to_wad(dec!(-1)), 0);
    }

    #[test]
    fn test_to_percent() {
        assert_eq!(to_percent(dec!(0.15)), dec!(15));
    }

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(dec!(10), dec!(4)), dec!(2.5));
        assert_eq!(safe_div(dec!(10), Decimal::ZERO), Decimal::ZERO);
    }
}
