use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::CollectError;
use crate::reading::MetricReading;
use crate::sinks::HistorySink;

/// Secondary backup: one JSON object per reading per line.
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl AsRef<Path>) -> JsonlSink {
        JsonlSink {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl HistorySink for JsonlSink {
    fn append(&mut self, reading: &MetricReading) -> Result<(), CollectError> {
        let line = serde_json::to_string(reading)
            .map_err(|e| CollectError::LocalWriteError(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CollectError::LocalWriteError(e.to_string()))?;

        writeln!(file, "{line}").map_err(|e| CollectError::LocalWriteError(e.to_string()))
    }
}
