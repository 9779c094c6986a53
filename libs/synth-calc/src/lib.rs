//! synth-calc - Synthetic telemetry variables
//!
//! Evaluates user-defined expressions over live device readings with exact
//! decimal arithmetic, and answers windowed statistical queries against a
//! telemetry time-series store.
//!
//! # Example
//!
//! ```rust
//! use synth_calc::{CalcEngine, ExecutionContext, MemoryTelemetryStore};
//! use rust_decimal::Decimal;
//! use chrono::{Duration, Utc};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryTelemetryStore::new());
//! let now = Utc::now();
//! store.record("D1", "voltage", now - Duration::minutes(30), Decimal::from(100));
//! store.record("D1", "voltage", now - Duration::minutes(10), Decimal::from(200));
//!
//! let engine = CalcEngine::new(store);
//!
//! let mut vars = HashMap::new();
//! vars.insert("temperature".to_string(), Decimal::from(75));
//! vars.insert("voltage".to_string(), Decimal::from(220));
//!
//! // Plain expressions need no context
//! let status = engine
//!     .evaluate("if(and(temperature < 80, voltage > 210, voltage < 230), 100, 70)", &vars, None)
//!     .unwrap();
//! assert_eq!(status, Decimal::from(100));
//!
//! // Statistical functions read history for one device up to a reference time
//! let context = ExecutionContext::new("D1", now);
//! let avg = engine.evaluate(r#"avg("voltage", "1h")"#, &vars, Some(&context)).unwrap();
//! assert_eq!(avg, Decimal::from(150));
//! ```
//!
//! # Functions
//!
//! | Category | Functions |
//! |----------|-----------|
//! | Math | `sqrt` `pow` `abs` `log` `log10` `exp` `sin` `cos` `tan` `asin` `acos` `atan` `round` `floor` `ceil` `min` `max` |
//! | Logic | `if` `and` `or` `not` |
//! | Statistical | `avg` `sum` `count` `stddev` `median` `minTime` `maxTime` `rate` `movingAvg` `percentChange` `percentile` |
//!
//! Statistical functions take a quoted variable name and a quoted window
//! (`5m`, `15m`, `1h`, `24h`, `7d`, `30d`).

pub mod config;
pub mod context;
pub mod decimal;
pub mod error;
pub mod evaluator;
pub mod logic_functions;
pub mod math_functions;
pub mod registry;
pub mod stat_functions;
pub mod store;
pub mod synthetic;
mod token;
pub mod window;

// Re-exports for convenience
pub use config::EngineConfig;
pub use context::ExecutionContext;
pub use error::{CalcError, Result};
pub use evaluator::{CalcEngine, ExpressionInfo};
pub use registry::{Arity, Category, FunctionEntry, FunctionInfo, FunctionRegistry};
pub use store::{MemoryTelemetryStore, NullTelemetryStore, Sample, TelemetryStore};
pub use synthetic::{SyntheticCalculator, SyntheticValue, SyntheticVariable};
pub use window::TimeWindow;
