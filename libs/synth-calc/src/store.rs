//! Read interface to the telemetry time-series store
//!
//! Statistical functions are the only part of the engine that touches
//! history. They issue a single blocking `fetch_window` call per invocation.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One stored reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: Decimal,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, value: Decimal) -> Self {
        Self { timestamp, value }
    }
}

/// Time-series read trait
///
/// Implementations can wrap a database, a cache, or in-memory storage.
pub trait TelemetryStore: Send + Sync {
    /// All samples of `variable` for `device_id` with `start <= timestamp <= end`,
    /// ordered by timestamp ascending. The engine does not re-sort.
    fn fetch_window(
        &self,
        device_id: &str,
        variable: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>>;
}

type SeriesKey = (String, String);

/// In-memory store for testing and embedded use
///
/// Each (device, variable) series is kept sorted on insert.
#[derive(Default)]
pub struct MemoryTelemetryStore {
    series: DashMap<SeriesKey, RwLock<Vec<Sample>>>,
}

impl MemoryTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one reading
    pub fn record(
        &self,
        device_id: &str,
        variable: &str,
        timestamp: DateTime<Utc>,
        value: Decimal,
    ) {
        let key = (device_id.to_string(), variable.to_string());
        let entry = self.series.entry(key).or_default();
        let mut samples = entry.write();
        // Equal timestamps keep arrival order
        let index = samples.partition_point(|s| s.timestamp <= timestamp);
        samples.insert(index, Sample::new(timestamp, value));
    }

    /// Record several readings of one variable
    pub fn record_all(
        &self,
        device_id: &str,
        variable: &str,
        samples: impl IntoIterator<Item = (DateTime<Utc>, Decimal)>,
    ) {
        for (timestamp, value) in samples {
            self.record(device_id, variable, timestamp, value);
        }
    }

    /// Number of samples stored for one series
    pub fn series_len(&self, device_id: &str, variable: &str) -> usize {
        self.series
            .get(&(device_id.to_string(), variable.to_string()))
            .map(|series| series.read().len())
            .unwrap_or(0)
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.series.clear();
    }
}

impl TelemetryStore for MemoryTelemetryStore {
    fn fetch_window(
        &self,
        device_id: &str,
        variable: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>> {
        let key = (device_id.to_string(), variable.to_string());
        let Some(series) = self.series.get(&key) else {
            return Ok(Vec::new());
        };
        let samples = series.read();
        let from = samples.partition_point(|s| s.timestamp < start);
        let to = samples.partition_point(|s| s.timestamp <= end);
        if from >= to {
            return Ok(Vec::new());
        }
        Ok(samples[from..to].to_vec())
    }
}

/// Null store - no history (every window is empty)
pub struct NullTelemetryStore;

impl TelemetryStore for NullTelemetryStore {
    fn fetch_window(
        &self,
        _device_id: &str,
        _variable: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Sample>> {
        Ok(Vec::new())
    }
}
