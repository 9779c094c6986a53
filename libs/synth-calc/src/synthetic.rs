//! Synthetic variable pipeline
//!
//! Computes derived telemetry values for one device reading. A variable
//! whose expression fails is skipped for that cycle and logged; it never
//! aborts the batch.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::evaluator::{CalcEngine, ExpressionInfo};
use crate::store::TelemetryStore;

fn default_enabled() -> bool {
    true
}

/// A user-defined derived variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticVariable {
    pub name: String,
    pub expression: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl SyntheticVariable {
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            enabled: true,
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// One computed value, ready to be stored next to the measured readings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticValue {
    pub name: String,
    pub value: Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Evaluates synthetic variables for incoming device readings
pub struct SyntheticCalculator<S: TelemetryStore + ?Sized> {
    engine: CalcEngine<S>,
}

impl<S: TelemetryStore + ?Sized> Clone for SyntheticCalculator<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<S: TelemetryStore + ?Sized> SyntheticCalculator<S> {
    pub fn new(engine: CalcEngine<S>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &CalcEngine<S> {
        &self.engine
    }

    /// Configuration-time check of a variable's expression
    pub fn validate(&self, variable: &SyntheticVariable) -> Result<ExpressionInfo> {
        self.engine.validate(&variable.expression).map_err(|e| {
            warn!(
                variable = %variable.name,
                expression = %variable.expression,
                error = %e,
                "Invalid synthetic variable expression"
            );
            e
        })
    }

    /// Compute every enabled variable for one reading
    ///
    /// Results keep the order of `variables`. Failed variables are left out.
    pub fn compute(
        &self,
        device_id: &str,
        timestamp: DateTime<Utc>,
        readings: &HashMap<String, Decimal>,
        variables: &[SyntheticVariable],
    ) -> Vec<SyntheticValue> {
        let context = ExecutionContext::new(device_id, timestamp);
        let mut values = Vec::with_capacity(variables.len());

        for variable in variables.iter().filter(|v| v.enabled) {
            match self
                .engine
                .evaluate(&variable.expression, readings, Some(&context))
            {
                Ok(value) => values.push(SyntheticValue {
                    name: variable.name.clone(),
                    value,
                    timestamp,
                    unit: variable.unit.clone(),
                }),
                Err(e) => {
                    warn!(
                        device = device_id,
                        variable = %variable.name,
                        error = %e,
                        configuration = e.is_configuration_error(),
                        "Skipping synthetic variable"
                    );
                },
            }
        }

        debug!(
            device = device_id,
            computed = values.len(),
            configured = variables.len(),
            "Computed synthetic variables"
        );
        values
    }
}

impl<S: TelemetryStore + ?Sized + 'static> SyntheticCalculator<S> {
    /// `compute` on the blocking thread pool, for callers on async tasks
    pub async fn compute_async(
        &self,
        device_id: String,
        timestamp: DateTime<Utc>,
        readings: Arc<HashMap<String, Decimal>>,
        variables: Arc<Vec<SyntheticVariable>>,
    ) -> Vec<SyntheticValue> {
        let calculator = self.clone();
        let task = tokio::task::spawn_blocking(move || {
            calculator.compute(&device_id, timestamp, &readings, &variables)
        });

        match task.await {
            Ok(values) => values,
            Err(e) => {
                error!("Synthetic variable task failed: {}", e);
                Vec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::store::{MemoryTelemetryStore, NullTelemetryStore};
    use chrono::Duration;
    use std::str::FromStr;
    use tracing_test::traced_test;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-11-11T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn readings() -> HashMap<String, Decimal> {
        [("voltage", "220"), ("current", "5"), ("temperature", "75")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), d(v)))
            .collect()
    }

    fn calculator() -> SyntheticCalculator<NullTelemetryStore> {
        SyntheticCalculator::new(CalcEngine::new(Arc::new(NullTelemetryStore)))
    }

    #[test]
    fn test_compute_in_order() {
        let variables = vec![
            SyntheticVariable::new("power", "voltage * current").with_unit("W"),
            SyntheticVariable::new("healthy", "if(temperature < 80, 100, 70)"),
        ];
        let values = calculator().compute("D1", now(), &readings(), &variables);

        assert_eq!(values.len(), 2);
        assert_eq!(values[0].name, "power");
        assert_eq!(values[0].value, d("1100"));
        assert_eq!(values[0].unit.as_deref(), Some("W"));
        assert_eq!(values[0].timestamp, now());
        assert_eq!(values[1].value, d("100"));
    }

    #[test]
    fn test_disabled_variables_are_not_computed() {
        let variables = vec![
            SyntheticVariable::new("power", "voltage * current").disabled(),
            SyntheticVariable::new("doubled", "voltage * 2"),
        ];
        let values = calculator().compute("D1", now(), &readings(), &variables);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].name, "doubled");
    }

    #[test]
    #[traced_test]
    fn test_failures_are_skipped_and_logged() {
        let variables = vec![
            SyntheticVariable::new("broken", "voltage / 0"),
            SyntheticVariable::new("missing", "pressure * 2"),
            SyntheticVariable::new("ok", "current + 1"),
        ];
        let values = calculator().compute("D1", now(), &readings(), &variables);

        assert_eq!(values.len(), 1);
        assert_eq!(values[0].name, "ok");
        assert!(logs_contain("Skipping synthetic variable"));
        assert!(logs_contain("broken"));
        assert!(logs_contain("pressure"));
    }

    #[test]
    fn test_statistical_variable_uses_reading_timestamp() {
        let store = Arc::new(MemoryTelemetryStore::new());
        let t = now();
        store.record("D1", "voltage", t - Duration::minutes(30), d("100"));
        store.record("D1", "voltage", t - Duration::minutes(10), d("200"));
        store.record("D1", "voltage", t + Duration::minutes(10), d("999"));

        let calculator = SyntheticCalculator::new(CalcEngine::new(store));
        let variables = vec![SyntheticVariable::new(
            "deviation",
            "voltage - avg(\"voltage\", \"1h\")",
        )];
        let values = calculator.compute("D1", t, &readings(), &variables);
        assert_eq!(values[0].value, d("70"));
    }

    #[test]
    #[traced_test]
    fn test_validate_logs_invalid_expression() {
        let calculator = calculator();
        let info = calculator
            .validate(&SyntheticVariable::new("power", "voltage * current"))
            .unwrap();
        assert_eq!(info.variables.len(), 2);

        assert!(calculator
            .validate(&SyntheticVariable::new("bad", "sqrt(1, 2)"))
            .is_err());
        assert!(logs_contain("Invalid synthetic variable expression"));
    }

    #[test]
    fn test_variable_serde_defaults() {
        let variable: SyntheticVariable =
            serde_json::from_str(r#"{"name": "power", "expression": "voltage * current"}"#)
                .unwrap();
        assert!(variable.enabled);
        assert_eq!(variable.unit, None);

        let json = serde_json::to_value(&variable).unwrap();
        assert!(json.get("unit").is_none());
    }

    #[tokio::test]
    async fn test_compute_async() {
        let variables = Arc::new(vec![SyntheticVariable::new("power", "voltage * current")]);
        let values = calculator()
            .compute_async("D1".to_string(), now(), Arc::new(readings()), variables)
            .await;
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, d("1100"));
    }
}
