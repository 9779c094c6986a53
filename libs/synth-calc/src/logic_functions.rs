//! Logic and conditional functions
//!
//! `if`, `and` and `or` pull their arguments lazily so that branches which
//! do not decide the result are never evaluated.

use rust_decimal::Decimal;

use crate::decimal::{is_truthy, truth};
use crate::error::{CalcError, Result};
use crate::registry::ArgSource;

/// if(condition, trueValue, falseValue)
pub fn if_then_else(args: &mut dyn ArgSource) -> Result<Decimal> {
    if args.remaining() != 3 {
        return Err(CalcError::arity("if", 3, args.remaining()));
    }

    if is_truthy(args.next_value()?) {
        let value = args.next_value()?;
        args.skip_next()?;
        Ok(value)
    } else {
        args.skip_next()?;
        args.next_value()
    }
}

/// and(x, y, ...) - 1 if every argument is non-zero, else 0
pub fn and(args: &mut dyn ArgSource) -> Result<Decimal> {
    require_some(args, "and")?;
    while args.remaining() > 0 {
        if !is_truthy(args.next_value()?) {
            skip_rest(args)?;
            return Ok(Decimal::ZERO);
        }
    }
    Ok(Decimal::ONE)
}

/// or(x, y, ...) - 1 if any argument is non-zero, else 0
pub fn or(args: &mut dyn ArgSource) -> Result<Decimal> {
    require_some(args, "or")?;
    while args.remaining() > 0 {
        if is_truthy(args.next_value()?) {
            skip_rest(args)?;
            return Ok(Decimal::ONE);
        }
    }
    Ok(Decimal::ZERO)
}

/// not(x) - 1 if x is exactly zero, else 0
pub fn not(args: &[Decimal]) -> Result<Decimal> {
    match args {
        [x] => Ok(truth(x.is_zero())),
        _ => Err(CalcError::arity("not", 1, args.len())),
    }
}

fn require_some(args: &dyn ArgSource, function: &str) -> Result<()> {
    if args.remaining() == 0 {
        return Err(CalcError::arity(function, "at least 1", 0));
    }
    Ok(())
}

fn skip_rest(args: &mut dyn ArgSource) -> Result<()> {
    while args.remaining() > 0 {
        args.skip_next()?;
    }
    Ok(())
}
