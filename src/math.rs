//! Fixed-point helpers used across the engine.
//!
//! `Decimal` arithmetic truncates after every multiplication and division. Ratios that
//! combine a multiplication with a division go through [`mul_div`] so that the result is
//! truncated exactly once, like integer `a * b / c`.

use scrypto::prelude::*;

/// Scale applied to nominal collateral ratios (collateral per unit of debt, times 100).
pub fn nicr_precision() -> Decimal {
    dec!(100)
}

/// Upper bound on the number of minutes used when decaying the base rate (1000 years).
pub const MAX_MINUTES_DECAY: i64 = 525_600_000;

pub const SECONDS_IN_ONE_MINUTE: i64 = 60;

/// `a * b / c` with a single truncation. Saturates to `Decimal::MAX` on overflow.
pub fn mul_div(a: Decimal, b: Decimal, c: Decimal) -> Decimal {
    let product = I384::from(a.attos()) * I384::from(b.attos()) / I384::from(c.attos());
    match I192::try_from(product) {
        Ok(attos) => Decimal::from_attos(attos),
        Err(_) => Decimal::MAX,
    }
}

/// Individual collateral ratio at the given price.
///
/// A trove without collateral is worth nothing, whatever its debt or the price. A trove with
/// collateral but no debt is infinitely collateralized.
pub fn compute_cr(coll: Decimal, debt: Decimal, price: Decimal) -> Decimal {
    if coll.is_zero() {
        Decimal::ZERO
    } else if debt.is_zero() {
        Decimal::MAX
    } else {
        mul_div(coll, price, debt)
    }
}

/// Price-independent collateral ratio used as the sort key of the trove index.
pub fn compute_nominal_cr(coll: Decimal, debt: Decimal) -> Decimal {
    if coll.is_zero() {
        Decimal::ZERO
    } else if debt.is_zero() {
        Decimal::MAX
    } else {
        mul_div(coll, nicr_precision(), debt)
    }
}

/// `base ^ minutes` with the exponent capped at [`MAX_MINUTES_DECAY`].
pub fn dec_pow(base: Decimal, minutes: i64) -> Decimal {
    let minutes = minutes.clamp(0, MAX_MINUTES_DECAY);
    base.checked_powi(minutes).unwrap_or(Decimal::ZERO)
}

pub fn abs_diff(a: Decimal, b: Decimal) -> Decimal {
    if a >= b {
        a - b
    } else {
        b - a
    }
}
