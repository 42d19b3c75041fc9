use chrono::{TimeZone, Utc};

/// Calendar format shared by every timestamp the collector emits, always UTC.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

pub trait TimeSource {
    // Return a TIMESTAMP_FORMAT timestamp
    fn current_time(&self) -> String;
}

#[derive(Clone)]
pub struct SystemTime {}

impl TimeSource for SystemTime {
    fn current_time(&self) -> String {
        Utc::now().format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Render an epoch-milliseconds timestamp in UTC, or `N/A` when the value
/// cannot be represented as a calendar time.
pub fn format_epoch_ms(epoch_ms: i64) -> String {
    match Utc.timestamp_millis_opt(epoch_ms).single() {
        Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
        None => String::from("N/A"),
    }
}
