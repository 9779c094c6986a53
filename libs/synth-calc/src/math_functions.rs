//! Math functions for synthetic variable expressions
//!
//! Pure functions over already evaluated arguments. Exact decimal arithmetic
//! is used where it exists (abs, rounding, min/max, integral powers);
//! transcendental functions go through `f64`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::decimal;
use crate::error::{CalcError, Result};

/// Integral exponents up to this size are computed exactly
const MAX_EXACT_EXPONENT: i64 = 1024;

pub fn sqrt(args: &[Decimal]) -> Result<Decimal> {
    decimal::sqrt(single(args, "sqrt")?, "sqrt")
}

/// pow(base, exponent)
pub fn pow(args: &[Decimal]) -> Result<Decimal> {
    let [base, exponent] = pair(args, "pow")?;

    if exponent.fract().is_zero() {
        if let Some(n) = exponent.to_i64().filter(|n| n.abs() <= MAX_EXACT_EXPONENT) {
            return integral_pow(base, n);
        }
    }

    if base.is_sign_negative() && !base.is_zero() {
        return Err(CalcError::arithmetic(format!(
            "pow: negative base {} with fractional exponent {}",
            base, exponent
        )));
    }
    let result = decimal::to_f64(base, "pow")?.powf(decimal::to_f64(exponent, "pow")?);
    decimal::from_f64(result, "pow")
}

fn integral_pow(base: Decimal, exponent: i64) -> Result<Decimal> {
    if exponent < 0 && base.is_zero() {
        return Err(CalcError::arithmetic("pow: zero cannot be raised to a negative power"));
    }

    // Square-and-multiply
    let mut result = Decimal::ONE;
    let mut factor = base;
    let mut remaining = exponent.unsigned_abs();
    while remaining > 0 {
        if remaining & 1 == 1 {
            result = checked_pow_step(result, factor)?;
        }
        remaining >>= 1;
        if remaining > 0 {
            factor = checked_pow_step(factor, factor)?;
        }
    }

    if exponent < 0 {
        Decimal::ONE
            .checked_div(result)
            .ok_or_else(|| CalcError::arithmetic(format!("pow: {}^{} is out of range", base, exponent)))
    } else {
        Ok(result)
    }
}

fn checked_pow_step(lhs: Decimal, rhs: Decimal) -> Result<Decimal> {
    lhs.checked_mul(rhs)
        .ok_or_else(|| CalcError::arithmetic("pow: result is out of range"))
}

pub fn abs(args: &[Decimal]) -> Result<Decimal> {
    Ok(single(args, "abs")?.abs())
}

/// Natural logarithm
pub fn log(args: &[Decimal]) -> Result<Decimal> {
    let x = positive(single(args, "log")?, "log")?;
    decimal::from_f64(decimal::to_f64(x, "log")?.ln(), "log")
}

pub fn log10(args: &[Decimal]) -> Result<Decimal> {
    let x = positive(single(args, "log10")?, "log10")?;
    decimal::from_f64(decimal::to_f64(x, "log10")?.log10(), "log10")
}

pub fn exp(args: &[Decimal]) -> Result<Decimal> {
    unary_f64(args, "exp", f64::exp)
}

pub fn sin(args: &[Decimal]) -> Result<Decimal> {
    unary_f64(args, "sin", f64::sin)
}

pub fn cos(args: &[Decimal]) -> Result<Decimal> {
    unary_f64(args, "cos", f64::cos)
}

pub fn tan(args: &[Decimal]) -> Result<Decimal> {
    unary_f64(args, "tan", f64::tan)
}

pub fn asin(args: &[Decimal]) -> Result<Decimal> {
    let x = unit_interval(single(args, "asin")?, "asin")?;
    decimal::from_f64(decimal::to_f64(x, "asin")?.asin(), "asin")
}

pub fn acos(args: &[Decimal]) -> Result<Decimal> {
    let x = unit_interval(single(args, "acos")?, "acos")?;
    decimal::from_f64(decimal::to_f64(x, "acos")?.acos(), "acos")
}

pub fn atan(args: &[Decimal]) -> Result<Decimal> {
    unary_f64(args, "atan", f64::atan)
}

/// Round half away from zero to an integer
pub fn round(args: &[Decimal]) -> Result<Decimal> {
    Ok(single(args, "round")?.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
}

pub fn floor(args: &[Decimal]) -> Result<Decimal> {
    Ok(single(args, "floor")?.floor())
}

pub fn ceil(args: &[Decimal]) -> Result<Decimal> {
    Ok(single(args, "ceil")?.ceil())
}

/// min(x, y, ...)
pub fn min(args: &[Decimal]) -> Result<Decimal> {
    args.iter()
        .copied()
        .reduce(Ord::min)
        .ok_or_else(|| CalcError::arity("min", "at least 1", 0))
}

/// max(x, y, ...)
pub fn max(args: &[Decimal]) -> Result<Decimal> {
    args.iter()
        .copied()
        .reduce(Ord::max)
        .ok_or_else(|| CalcError::arity("max", "at least 1", 0))
}

// === Argument helpers ===

fn single(args: &[Decimal], function: &str) -> Result<Decimal> {
    match args {
        [x] => Ok(*x),
        _ => Err(CalcError::arity(function, 1, args.len())),
    }
}

fn pair(args: &[Decimal], function: &str) -> Result<[Decimal; 2]> {
    match args {
        [a, b] => Ok([*a, *b]),
        _ => Err(CalcError::arity(function, 2, args.len())),
    }
}

fn positive(x: Decimal, function: &str) -> Result<Decimal> {
    if x <= Decimal::ZERO {
        return Err(CalcError::arithmetic(format!(
            "{}: argument must be positive, got {}",
            function, x
        )));
    }
    Ok(x)
}

fn unit_interval(x: Decimal, function: &str) -> Result<Decimal> {
    if x < Decimal::NEGATIVE_ONE || x > Decimal::ONE {
        return Err(CalcError::arithmetic(format!(
            "{}: argument must be between -1 and 1, got {}",
            function, x
        )));
    }
    Ok(x)
}

fn unary_f64(args: &[Decimal], function: &str, op: fn(f64) -> f64) -> Result<Decimal> {
    let x = decimal::to_f64(single(args, function)?, function)?;
    decimal::from_f64(op(x), function)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
#[allow(clippy::approx_constant)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn close(actual: Decimal, expected: f64) -> bool {
        (actual.to_f64().unwrap() - expected).abs() < 1e-9
    }

    #[test]
    fn test_sqrt() {
        assert_eq!(sqrt(&[d("16")]).unwrap(), d("4"));
        assert!(close(sqrt(&[d("2")]).unwrap(), 1.4142135623730951));
        assert!(matches!(sqrt(&[d("-4")]), Err(CalcError::Arithmetic(_))));
    }

    #[test]
    fn test_pow_integral_is_exact() {
        assert_eq!(pow(&[d("2"), d("10")]).unwrap(), d("1024"));
        assert_eq!(pow(&[d("1.1"), d("2")]).unwrap(), d("1.21"));
        assert_eq!(pow(&[d("-3"), d("3")]).unwrap(), d("-27"));
        assert_eq!(pow(&[d("2"), d("-2")]).unwrap(), d("0.25"));
        assert_eq!(pow(&[d("7"), d("0")]).unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_pow_fractional_and_errors() {
        assert!(close(pow(&[d("9"), d("0.5")]).unwrap(), 3.0));
        assert!(matches!(pow(&[d("-8"), d("0.5")]), Err(CalcError::Arithmetic(_))));
        assert!(matches!(pow(&[Decimal::ZERO, d("-1")]), Err(CalcError::Arithmetic(_))));
        assert!(matches!(pow(&[d("10"), d("100")]), Err(CalcError::Arithmetic(_))));
    }

    #[test]
    fn test_logarithms() {
        assert_eq!(log(&[Decimal::ONE]).unwrap(), Decimal::ZERO);
        assert!(close(log10(&[d("1000")]).unwrap(), 3.0));
        assert!(close(log(&[d("2.718281828459045")]).unwrap(), 1.0));
        for bad in ["0", "-1"] {
            assert!(matches!(log(&[d(bad)]), Err(CalcError::Arithmetic(_))));
            assert!(matches!(log10(&[d(bad)]), Err(CalcError::Arithmetic(_))));
        }
    }

    #[test]
    fn test_exp() {
        assert_eq!(exp(&[Decimal::ZERO]).unwrap(), Decimal::ONE);
        assert!(matches!(exp(&[d("1000")]), Err(CalcError::Arithmetic(_))));
    }

    #[test]
    fn test_trigonometry() {
        assert_eq!(sin(&[Decimal::ZERO]).unwrap(), Decimal::ZERO);
        assert_eq!(cos(&[Decimal::ZERO]).unwrap(), Decimal::ONE);
        assert!(close(tan(&[d("0.7853981633974483")]).unwrap(), 1.0));
        assert!(close(asin(&[Decimal::ONE]).unwrap(), std::f64::consts::FRAC_PI_2));
        assert!(close(acos(&[Decimal::ONE]).unwrap(), 0.0));
        assert!(close(atan(&[Decimal::ONE]).unwrap(), std::f64::consts::FRAC_PI_4));
        assert!(matches!(asin(&[d("1.5")]), Err(CalcError::Arithmetic(_))));
        assert!(matches!(acos(&[d("-1.01")]), Err(CalcError::Arithmetic(_))));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round(&[d("2.5")]).unwrap(), d("3"));
        assert_eq!(round(&[d("-2.5")]).unwrap(), d("-3"));
        assert_eq!(round(&[d("2.49")]).unwrap(), d("2"));
        assert_eq!(floor(&[d("-1.5")]).unwrap(), d("-2"));
        assert_eq!(ceil(&[d("1.2")]).unwrap(), d("2"));
    }

    #[test]
    fn test_min_max() {
        assert_eq!(min(&[d("3"), d("-1"), d("2")]).unwrap(), d("-1"));
        assert_eq!(max(&[d("3"), d("-1"), d("2")]).unwrap(), d("3"));
        assert_eq!(max(&[d("7")]).unwrap(), d("7"));
        assert!(matches!(min(&[]), Err(CalcError::Arity { .. })));
    }

    #[test]
    fn test_wrong_arity() {
        assert!(matches!(abs(&[]), Err(CalcError::Arity { .. })));
        assert!(matches!(pow(&[d("1")]), Err(CalcError::Arity { .. })));
    }
}
