//! Decimal arithmetic utilities for financial calculations.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Round a decimal to a specific number of decimal places.
///
/// Uses banker's rounding, so `0.125` becomes `0.12` at two places.
pub fn round_to_precision(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp(decimals)
}

/// Truncate a decimal toward zero at a specific number of decimal places.
pub fn truncate_to_precision(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::ToZero)
}

/// Whole units obtainable for `notional` at `price`, truncated toward zero.
///
/// Returns `None` for a non-positive price or when the quotient does not
/// fit in an `i64`.
pub fn whole_units(notional: Decimal, price: Decimal) -> Option<i64> {
    if price <= Decimal::ZERO {
        return None;
    }
    notional.checked_div(price)?.trunc().to_i64()
}

/// Parse a decimal from plain or scientific notation.
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

/// Safe division that returns `None` if the divisor is zero or the result overflows.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator == Decimal::ZERO {
        None
    } else {
        numerator.checked_div(denominator)
    }
}
