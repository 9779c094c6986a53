//! Function registry
//!
//! A name -> implementation catalog built once at startup and shared
//! read-only by every evaluation. Function names are matched
//! case-insensitively.

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

use crate::error::{CalcError, Result};
use crate::stat_functions::Series;

/// Function category, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Math,
    Logic,
    Statistical,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Math => "Math",
            Category::Logic => "Logic",
            Category::Statistical => "Statistical",
        })
    }
}

/// Accepted argument count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// How an argument position is read by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Full sub-expression evaluated to a decimal
    Number,
    /// Quoted literal taken verbatim (variable names, window codes)
    Literal,
}

/// A parsed argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Number(Decimal),
    Literal(String),
}

impl Arg {
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Arg::Number(n) => Some(*n),
            Arg::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Arg::Literal(s) => Some(s),
            Arg::Number(_) => None,
        }
    }
}

/// Argument stream for functions that decide which arguments to evaluate
///
/// Arguments not pulled by the function are parsed but never evaluated.
pub trait ArgSource {
    /// Arguments not yet consumed
    fn remaining(&self) -> usize;

    /// Evaluate the next argument
    fn next_value(&mut self) -> Result<Decimal>;

    /// Consume the next argument without evaluating it
    fn skip_next(&mut self) -> Result<()>;
}

/// Pure function over evaluated arguments
pub type NumericFn = fn(&[Decimal]) -> Result<Decimal>;

/// Function that pulls its arguments on demand (short-circuit)
pub type LazyFn = fn(&mut dyn ArgSource) -> Result<Decimal>;

/// Reduction of a fetched window, plus any trailing numeric arguments
pub type StatisticalFn = fn(&Series<'_>, &[Decimal]) -> Result<Decimal>;

/// Argument signature shared by the windowed functions: `(variable, window)`
pub const WINDOW_SIGNATURE: &[ArgKind] = &[ArgKind::Literal, ArgKind::Literal];

/// `(variable, rank, window)`
pub const RANK_WINDOW_SIGNATURE: &[ArgKind] = &[ArgKind::Literal, ArgKind::Number, ArgKind::Literal];

#[derive(Clone, Copy)]
pub enum Implementation {
    Numeric { arity: Arity, func: NumericFn },
    Lazy { arity: Arity, func: LazyFn },
    /// The first literal in the signature is the variable name, the second the window code
    Statistical {
        signature: &'static [ArgKind],
        func: StatisticalFn,
    },
}

impl Implementation {
    pub fn arity(&self) -> Arity {
        match self {
            Implementation::Numeric { arity, .. } | Implementation::Lazy { arity, .. } => *arity,
            Implementation::Statistical { signature, .. } => Arity::Exact(signature.len()),
        }
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Implementation::Numeric { arity, .. } => write!(f, "Numeric({})", arity),
            Implementation::Lazy { arity, .. } => write!(f, "Lazy({})", arity),
            Implementation::Statistical { signature, .. } => {
                write!(f, "Statistical({:?})", signature)
            },
        }
    }
}

/// Registered function
#[derive(Debug, Clone)]
pub struct FunctionEntry {
    pub name: String,
    pub category: Category,
    pub description: String,
    pub implementation: Implementation,
}

impl FunctionEntry {
    pub fn arity(&self) -> Arity {
        self.implementation.arity()
    }

    pub fn info(&self) -> FunctionInfo {
        FunctionInfo {
            name: self.name.clone(),
            category: self.category,
            description: self.description.clone(),
            arity: self.arity().to_string(),
        }
    }
}

/// Function metadata for autocomplete and documentation surfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub category: Category,
    pub description: String,
    pub arity: String,
}

/// Name -> function catalog
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: FxHashMap<String, FunctionEntry>,
}

static GLOBAL: OnceLock<Arc<FunctionRegistry>> = OnceLock::new();

impl FunctionRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every builtin Math, Logic and Statistical function
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_math_functions();
        registry.register_logic_functions();
        registry.register_statistical_functions();

        let categories: BTreeSet<Category> =
            registry.functions.values().map(|e| e.category).collect();
        info!(
            functions = registry.len(),
            categories = categories.len(),
            "Registered expression functions"
        );
        registry
    }

    /// Process-wide builtin registry, built on first use
    pub fn global() -> Arc<FunctionRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::with_builtins())))
    }

    /// Register a function; a previous entry with the same name is replaced and returned
    pub fn register(
        &mut self,
        name: &str,
        category: Category,
        implementation: Implementation,
        description: &str,
    ) -> Option<FunctionEntry> {
        let entry = FunctionEntry {
            name: name.to_string(),
            category,
            description: description.to_string(),
            implementation,
        };
        let replaced = self.functions.insert(name.to_ascii_lowercase(), entry);
        if replaced.is_some() {
            warn!(function = name, "Function registered twice, previous entry replaced");
        }
        replaced
    }

    /// Look up a function by name (case-insensitive)
    pub fn lookup(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions.get(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Metadata grouped by category, entries sorted by name
    pub fn list_by_category(&self) -> BTreeMap<Category, Vec<FunctionInfo>> {
        let mut grouped: BTreeMap<Category, Vec<FunctionInfo>> = BTreeMap::new();
        for entry in self.functions.values() {
            grouped.entry(entry.category).or_default().push(entry.info());
        }
        for infos in grouped.values_mut() {
            infos.sort_by(|a, b| a.name.cmp(&b.name));
        }
        grouped
    }

    /// Flat metadata list sorted by name
    pub fn functions(&self) -> Vec<FunctionInfo> {
        let mut infos: Vec<FunctionInfo> = self.functions.values().map(FunctionEntry::info).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    fn register_math(&mut self, name: &str, arity: Arity, func: NumericFn, description: &str) {
        self.register(
            name,
            Category::Math,
            Implementation::Numeric { arity, func },
            description,
        );
    }

    fn register_statistical(
        &mut self,
        name: &str,
        signature: &'static [ArgKind],
        func: StatisticalFn,
        description: &str,
    ) {
        self.register(
            name,
            Category::Statistical,
            Implementation::Statistical { signature, func },
            description,
        );
    }

    fn register_math_functions(&mut self) {
        use crate::math_functions as m;
        let one = Arity::Exact(1);

        self.register_math("sqrt", one, m::sqrt, "Square root: sqrt(x)");
        self.register_math("pow", Arity::Exact(2), m::pow, "Power: pow(base, exponent)");
        self.register_math("abs", one, m::abs, "Absolute value: abs(x)");
        self.register_math("log", one, m::log, "Natural logarithm: log(x)");
        self.register_math("log10", one, m::log10, "Base-10 logarithm: log10(x)");
        self.register_math("exp", one, m::exp, "Exponential: exp(x) = e^x");
        self.register_math("sin", one, m::sin, "Sine: sin(x) in radians");
        self.register_math("cos", one, m::cos, "Cosine: cos(x) in radians");
        self.register_math("tan", one, m::tan, "Tangent: tan(x) in radians");
        self.register_math("asin", one, m::asin, "Arc sine: asin(x) in radians");
        self.register_math("acos", one, m::acos, "Arc cosine: acos(x) in radians");
        self.register_math("atan", one, m::atan, "Arc tangent: atan(x) in radians");
        self.register_math("round", one, m::round, "Round to nearest integer: round(x)");
        self.register_math("floor", one, m::floor, "Floor: floor(x)");
        self.register_math("ceil", one, m::ceil, "Ceiling: ceil(x)");
        self.register_math("min", Arity::AtLeast(1), m::min, "Minimum value: min(x, y, ...)");
        self.register_math("max", Arity::AtLeast(1), m::max, "Maximum value: max(x, y, ...)");
    }

    fn register_logic_functions(&mut self) {
        use crate::logic_functions as l;

        self.register(
            "if",
            Category::Logic,
            Implementation::Lazy {
                arity: Arity::Exact(3),
                func: l::if_then_else,
            },
            "Conditional: if(condition, trueValue, falseValue)",
        );
        self.register(
            "and",
            Category::Logic,
            Implementation::Lazy {
                arity: Arity::AtLeast(1),
                func: l::and,
            },
            "Logical AND: and(x, y, ...) - returns 1 if all non-zero, else 0",
        );
        self.register(
            "or",
            Category::Logic,
            Implementation::Lazy {
                arity: Arity::AtLeast(1),
                func: l::or,
            },
            "Logical OR: or(x, y, ...) - returns 1 if any non-zero, else 0",
        );
        self.register(
            "not",
            Category::Logic,
            Implementation::Numeric {
                arity: Arity::Exact(1),
                func: l::not,
            },
            "Logical NOT: not(x) - returns 1 if x is 0, else 0",
        );
    }

    fn register_statistical_functions(&mut self) {
        use crate::stat_functions as s;
        let window = WINDOW_SIGNATURE;

        self.register_statistical("avg", window, s::avg, "Average over time window: avg(\"variable\", \"1h\")");
        self.register_statistical("sum", window, s::sum, "Sum over time window: sum(\"variable\", \"24h\")");
        self.register_statistical("count", window, s::count, "Number of samples in time window: count(\"variable\", \"1h\")");
        self.register_statistical("stddev", window, s::stddev, "Population standard deviation: stddev(\"variable\", \"1h\")");
        self.register_statistical("median", window, s::median, "Median over time window: median(\"variable\", \"1h\")");
        self.register_statistical("minTime", window, s::min_time, "Minimum over time window: minTime(\"variable\", \"24h\")");
        self.register_statistical("maxTime", window, s::max_time, "Maximum over time window: maxTime(\"variable\", \"7d\")");
        self.register_statistical("rate", window, s::rate, "Change per hour over time window: rate(\"variable\", \"1h\")");
        self.register_statistical("movingAvg", window, s::moving_avg, "Moving average: movingAvg(\"variable\", \"15m\")");
        self.register_statistical("percentChange", window, s::percent_change, "Percent change over time window: percentChange(\"variable\", \"1h\")");
        self.register_statistical(
            "percentile",
            RANK_WINDOW_SIGNATURE,
            s::percentile,
            "Nearest-rank percentile: percentile(\"variable\", 95, \"1h\")",
        );
    }
}

/// Check a call's argument count against an entry
pub(crate) fn check_arity(entry: &FunctionEntry, count: usize) -> Result<()> {
    let arity = entry.arity();
    if arity.accepts(count) {
        Ok(())
    } else {
        Err(CalcError::arity(&entry.name, arity, count))
    }
}
