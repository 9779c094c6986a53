//! Decimal helpers shared by the evaluator and the function sets
//!
//! `+`, `-` and `*` on `Decimal` panic on overflow, so every operation the
//! engine performs goes through the checked wrappers here.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{CalcError, Result};

/// Default number of significant digits kept by division (HALF_UP)
pub const DEFAULT_PRECISION: u32 = 10;

/// Largest precision `Decimal` can represent
pub const MAX_PRECISION: u32 = 28;

/// Comparison and logic results: 1 for true, 0 for false
pub fn truth(value: bool) -> Decimal {
    if value {
        Decimal::ONE
    } else {
        Decimal::ZERO
    }
}

/// Any non-zero value is true
pub fn is_truthy(value: Decimal) -> bool {
    !value.is_zero()
}

/// Round to `precision` significant digits, half away from zero
pub fn round_significant(value: Decimal, precision: u32) -> Decimal {
    if value.is_zero() {
        return value;
    }
    value
        .round_sf_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero)
        .unwrap_or(value)
}

pub fn add(lhs: Decimal, rhs: Decimal) -> Result<Decimal> {
    lhs.checked_add(rhs)
        .ok_or_else(|| CalcError::arithmetic(format!("Overflow in {} + {}", lhs, rhs)))
}

pub fn sub(lhs: Decimal, rhs: Decimal) -> Result<Decimal> {
    lhs.checked_sub(rhs)
        .ok_or_else(|| CalcError::arithmetic(format!("Overflow in {} - {}", lhs, rhs)))
}

pub fn mul(lhs: Decimal, rhs: Decimal) -> Result<Decimal> {
    lhs.checked_mul(rhs)
        .ok_or_else(|| CalcError::arithmetic(format!("Overflow in {} * {}", lhs, rhs)))
}

/// Division by exact zero is an error, never infinity
pub fn div(lhs: Decimal, rhs: Decimal, precision: u32) -> Result<Decimal> {
    if rhs.is_zero() {
        return Err(CalcError::arithmetic("Division by zero"));
    }
    let quotient = lhs
        .checked_div(rhs)
        .ok_or_else(|| CalcError::arithmetic(format!("Overflow in {} / {}", lhs, rhs)))?;
    Ok(round_significant(quotient, precision))
}

/// Sum of a slice, checked
pub fn sum(values: impl IntoIterator<Item = Decimal>) -> Result<Decimal> {
    values.into_iter().try_fold(Decimal::ZERO, add)
}

pub fn to_f64(value: Decimal, function: &str) -> Result<f64> {
    value
        .to_f64()
        .ok_or_else(|| CalcError::arithmetic(format!("{}: cannot convert {}", function, value)))
}

/// Convert a transcendental result back; NaN and out-of-range values are errors
pub fn from_f64(value: f64, function: &str) -> Result<Decimal> {
    if !value.is_finite() {
        return Err(CalcError::arithmetic(format!(
            "{}: result is not a finite number",
            function
        )));
    }
    Decimal::from_f64(value)
        .ok_or_else(|| CalcError::arithmetic(format!("{}: result {} is out of range", function, value)))
}

pub fn sqrt(value: Decimal, function: &str) -> Result<Decimal> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(CalcError::arithmetic(format!(
            "{}: argument must be non-negative, got {}",
            function, value
        )));
    }
    from_f64(to_f64(value, function)?.sqrt(), function)
}
