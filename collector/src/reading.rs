use serde::Serialize;

use crate::time::format_epoch_ms;

/// The one metric type holding an absolute count; it is never scaled.
pub const COUNT_METRIC: &str = "CNTU";

/// Divisor bringing every other metric's raw units down to crores.
pub const SCALE_DIVISOR: f64 = 10_000_000.0;

/// One entry parsed out of the source response, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMetric {
    pub metric_type: String,
    /// Position of this entry within its metric type's series. Part of the
    /// deduplication identity, since the source returns up to ten values
    /// per type.
    pub slot: usize,
    pub timestamp_ms: i64,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricReading {
    pub metric_type: String,
    #[serde(skip_serializing)]
    pub slot: usize,
    pub epoch_timestamp_ms: i64,
    pub readable_timestamp: String,
    pub value: f64,
    pub fetch_time: String,
}

impl MetricReading {
    /// Deduplication identity of this reading.
    pub fn key(&self) -> String {
        format!("{}:{}", self.metric_type, self.slot)
    }
}

/// Pure: scale the raw value and derive both timestamp representations.
/// `fetch_time` is captured once per run and shared by all readings.
pub fn normalize(raw: &RawMetric, fetch_time: &str) -> MetricReading {
    let value = if raw.metric_type == COUNT_METRIC {
        raw.value
    } else {
        raw.value / SCALE_DIVISOR
    };

    MetricReading {
        metric_type: raw.metric_type.clone(),
        slot: raw.slot,
        epoch_timestamp_ms: raw.timestamp_ms,
        readable_timestamp: format_epoch_ms(raw.timestamp_ms),
        value,
        fetch_time: fetch_time.to_owned(),
    }
}
