//! Money arithmetic
//!
//! All amounts are `rust_decimal::Decimal` end to end (NUMERIC in PostgreSQL).
//! Anything derived from a rate is rounded to the currency's smallest unit with
//! round-half-up before it is stored or credited.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{CommissionError, CommissionResult};

/// Round to `scale` decimal places, ties away from zero.
///
/// Reward and balance amounts are never negative, so this is round-half-up.
///
/// ```
/// use commission_engine::money::round_to_unit;
/// use rust_decimal::Decimal;
///
/// assert_eq!(round_to_unit(Decimal::new(12345, 3), 2), Decimal::new(1235, 2));
/// ```
#[inline]
pub fn round_to_unit(amount: Decimal, scale: u32) -> Decimal {
    amount.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount * rate`, rounded to the currency unit
#[inline]
pub fn apply_rate(amount: Decimal, rate: Decimal, scale: u32) -> Decimal {
    round_to_unit(amount * rate, scale)
}

/// Decimal places of every money column (`NUMERIC(20, 8)`)
pub const STORAGE_SCALE: u32 = 8;

/// Exclusive upper bound on any single amount. Leaves headroom below the
/// 10^12 integer digits of `NUMERIC(20, 8)` for accumulated balances.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Strictly positive and representable in `scale` places without rounding
pub fn is_valid_amount(amount: Decimal, scale: u32) -> bool {
    amount > Decimal::ZERO && amount.normalize().scale() <= scale
}

/// Positive, below [`MAX_AMOUNT`] and with at most `scale` decimal places.
/// `what` names the amount in the error message.
pub fn check_amount(what: &str, amount: Decimal, scale: u32) -> CommissionResult<()> {
    if amount <= Decimal::ZERO {
        return Err(CommissionError::invalid(format!(
            "{} must be positive, got {}",
            what, amount
        )));
    }
    if amount >= MAX_AMOUNT {
        return Err(CommissionError::invalid(format!(
            "{} {} must be below {}",
            what, amount, MAX_AMOUNT
        )));
    }
    if !is_valid_amount(amount, scale) {
        return Err(CommissionError::invalid(format!(
            "{} {} exceeds {} decimal places",
            what, amount, scale
        )));
    }
    Ok(())
}
