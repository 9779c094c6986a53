//! Per-call execution context for statistical functions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device and reference time a statistical query is resolved against
///
/// Built by the caller for one `evaluate` call and only read by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    device_id: String,
    reference_timestamp: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(device_id: impl Into<String>, reference_timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            reference_timestamp,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn reference_timestamp(&self) -> DateTime<Utc> {
        self.reference_timestamp
    }
}
