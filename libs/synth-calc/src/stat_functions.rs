//! Statistical functions over a trailing time window
//!
//! The evaluator fetches the window from the telemetry store and hands the
//! samples to one of the reducers below. Reducers never query the store.
//!
//! Empty windows: `count` and `sum` yield 0, every other reducer fails with
//! an arithmetic error naming the function and the window.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::decimal;
use crate::error::{CalcError, Result};
use crate::store::Sample;
use crate::window::TimeWindow;

const MINUTES_PER_HOUR: i64 = 60;
const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Samples of one variable inside one window, oldest first
#[derive(Debug, Clone, Copy)]
pub struct Series<'a> {
    pub samples: &'a [Sample],
    pub window: TimeWindow,
    /// Significant digits kept by divisions
    pub precision: u32,
}

impl<'a> Series<'a> {
    pub fn new(samples: &'a [Sample], window: TimeWindow, precision: u32) -> Self {
        Self {
            samples,
            window,
            precision,
        }
    }

    fn values(&self) -> impl Iterator<Item = Decimal> + 'a {
        self.samples.iter().map(|s| s.value)
    }

    fn sorted_values(&self) -> Vec<Decimal> {
        let mut values: Vec<Decimal> = self.values().collect();
        values.sort_unstable();
        values
    }

    fn len(&self) -> Decimal {
        Decimal::from(self.samples.len())
    }

    /// Fail on an empty window, otherwise return the first and last samples
    fn bounds(&self, function: &str) -> Result<(&'a Sample, &'a Sample)> {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => Ok((first, last)),
            _ => Err(self.empty(function)),
        }
    }

    fn empty(&self, function: &str) -> CalcError {
        CalcError::arithmetic(format!(
            "{}: no samples in the last {}",
            function, self.window
        ))
    }

    fn mean(&self, function: &str) -> Result<Decimal> {
        self.bounds(function)?;
        decimal::div(decimal::sum(self.values())?, self.len(), self.precision)
    }
}

/// Which end of the value range `extremum` looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Min,
    Max,
}

/// Sample holding the smallest or largest value; the earliest one wins ties
pub fn extremum(samples: &[Sample], which: Extremum) -> Option<&Sample> {
    samples.iter().reduce(|best, candidate| {
        let better = match which {
            Extremum::Min => candidate.value < best.value,
            Extremum::Max => candidate.value > best.value,
        };
        if better {
            candidate
        } else {
            best
        }
    })
}

pub fn avg(series: &Series<'_>, _args: &[Decimal]) -> Result<Decimal> {
    series.mean("avg")
}

/// Same reduction as `avg`; kept separate for smoothing expressions
pub fn moving_avg(series: &Series<'_>, _args: &[Decimal]) -> Result<Decimal> {
    series.mean("movingAvg")
}

pub fn sum(series: &Series<'_>, _args: &[Decimal]) -> Result<Decimal> {
    decimal::sum(series.values())
}

pub fn count(series: &Series<'_>, _args: &[Decimal]) -> Result<Decimal> {
    Ok(series.len())
}

/// Population standard deviation
pub fn stddev(series: &Series<'_>, _args: &[Decimal]) -> Result<Decimal> {
    let mean = series.mean("stddev")?;
    if series.samples.len() == 1 {
        return Ok(Decimal::ZERO);
    }

    let mut squares = Decimal::ZERO;
    for value in series.values() {
        let deviation = decimal::sub(value, mean)?;
        squares = decimal::add(squares, decimal::mul(deviation, deviation)?)?;
    }
    let variance = decimal::div(squares, series.len(), series.precision)?;
    let deviation = decimal::sqrt(variance, "stddev")?;
    Ok(decimal::round_significant(deviation, series.precision))
}

pub fn median(series: &Series<'_>, _args: &[Decimal]) -> Result<Decimal> {
    series.bounds("median")?;
    let values = series.sorted_values();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Ok(values[mid])
    } else {
        let pair = decimal::add(values[mid - 1], values[mid])?;
        decimal::div(pair, Decimal::TWO, series.precision)
    }
}

pub fn min_time(series: &Series<'_>, _args: &[Decimal]) -> Result<Decimal> {
    extremum(series.samples, Extremum::Min)
        .map(|s| s.value)
        .ok_or_else(|| series.empty("minTime"))
}

pub fn max_time(series: &Series<'_>, _args: &[Decimal]) -> Result<Decimal> {
    extremum(series.samples, Extremum::Max)
        .map(|s| s.value)
        .ok_or_else(|| series.empty("maxTime"))
}

/// Net change per hour: (latest - earliest) scaled to the window length
pub fn rate(series: &Series<'_>, _args: &[Decimal]) -> Result<Decimal> {
    let (first, last) = series.bounds("rate")?;
    let change = decimal::sub(last.value, first.value)?;
    let per_window = decimal::mul(change, Decimal::from(MINUTES_PER_HOUR))?;
    decimal::div(
        per_window,
        Decimal::from(series.window.minutes()),
        series.precision,
    )
}

/// (latest - earliest) / earliest * 100
pub fn percent_change(series: &Series<'_>, _args: &[Decimal]) -> Result<Decimal> {
    let (first, last) = series.bounds("percentChange")?;
    if first.value.is_zero() {
        return Err(CalcError::arithmetic(format!(
            "percentChange: earliest value in the last {} is zero",
            series.window
        )));
    }
    let change = decimal::sub(last.value, first.value)?;
    decimal::div(decimal::mul(change, HUNDRED)?, first.value, series.precision)
}

/// Nearest-rank percentile, rank in [0, 100]. Called as
/// `percentile(variable, rank, window)`; an empty window is an error.
pub fn percentile(series: &Series<'_>, args: &[Decimal]) -> Result<Decimal> {
    let p = match args {
        [p] => *p,
        _ => return Err(CalcError::arity("percentile", 3, args.len() + 2)),
    };
    if p < Decimal::ZERO || p > HUNDRED {
        return Err(CalcError::arithmetic(format!(
            "percentile: rank must be between 0 and 100, got {}",
            p
        )));
    }
    series.bounds("percentile")?;

    let values = series.sorted_values();
    let position = decimal::mul(p, series.len())?
        .checked_div(HUNDRED)
        .map(|x| x.ceil())
        .and_then(|x| x.to_usize())
        .ok_or_else(|| CalcError::arithmetic("percentile: rank is out of range"))?;
    let index = position.saturating_sub(1).min(values.len() - 1);
    Ok(values[index])
}
