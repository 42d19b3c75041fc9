use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;

use crate::error::CollectError;
use crate::reading::MetricReading;
use crate::sinks::HistorySink;

pub const CSV_HEADER: [&str; 5] = [
    "fetch_time",
    "metric_type",
    "epoch_timestamp",
    "timestamp_readable",
    "value",
];

/// Append-mode CSV history. The header row is written only when the file is
/// created; existing content is never truncated.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl AsRef<Path>) -> CsvSink {
        CsvSink {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl HistorySink for CsvSink {
    fn append(&mut self, reading: &MetricReading) -> Result<(), CollectError> {
        let write_header = !self.path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CollectError::LocalWriteError(e.to_string()))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if write_header {
            writer
                .write_record(CSV_HEADER)
                .map_err(|e| CollectError::LocalWriteError(e.to_string()))?;
        }

        let epoch = reading.epoch_timestamp_ms.to_string();
        let value = reading.value.to_string();
        writer
            .write_record([
                reading.fetch_time.as_str(),
                reading.metric_type.as_str(),
                epoch.as_str(),
                reading.readable_timestamp.as_str(),
                value.as_str(),
            ])
            .map_err(|e| CollectError::LocalWriteError(e.to_string()))?;

        writer
            .flush()
            .map_err(|e| CollectError::LocalWriteError(e.to_string()))
    }
}
