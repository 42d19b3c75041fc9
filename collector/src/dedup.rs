use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::CollectError;

/// Last value routed to each per-metric table, keyed by
/// `{metric_type}:{slot}`. This file is the single source of truth for
/// "did this metric change since last observed".
pub type LastValues = HashMap<String, f64>;

/// The one piece of cross-run mutable state, owned exclusively by a single
/// run for its duration. `record` only touches memory; the full mapping is
/// persisted by exactly one `flush` call at the end of the run.
pub trait DedupStore {
    fn lookup(&self, key: &str) -> Option<f64>;

    fn record(&mut self, key: &str, value: f64);

    /// Overwrite the persisted mapping with the in-memory one.
    fn flush(&mut self) -> Result<(), CollectError>;

    /// A reading is changed when its identity is absent or its stored value
    /// differs. Equality is exact: the same raw integer divided by the same
    /// constant in f64 arithmetic reproduces bit-identically, and
    /// serde_json round-trips f64 without loss.
    fn is_changed(&self, key: &str, value: f64) -> bool {
        self.lookup(key) != Some(value)
    }
}

pub struct FileStore {
    path: PathBuf,
    values: LastValues,
}

impl FileStore {
    /// Load the state file. A missing or unparseable file means an empty
    /// mapping (first-run semantics), never a failed run.
    pub fn load(path: impl AsRef<Path>) -> FileStore {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(values) => values,
                Err(e) => {
                    warn!(
                        "state file {} is unparseable, starting empty: {}",
                        path.display(),
                        e
                    );
                    LastValues::new()
                }
            },
            Err(_) => LastValues::new(),
        };

        FileStore { path, values }
    }
}

impl DedupStore for FileStore {
    fn lookup(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    fn record(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_owned(), value);
    }

    fn flush(&mut self) -> Result<(), CollectError> {
        let contents = serde_json::to_string_pretty(&self.values)
            .map_err(|e| CollectError::PersistenceError(e.to_string()))?;
        fs::write(&self.path, contents).map_err(|e| CollectError::PersistenceError(e.to_string()))
    }
}

/// Substitutes for the file-backed store in tests and when running without
/// persistence.
#[derive(Default)]
pub struct MemoryStore {
    values: LastValues,
}

impl DedupStore for MemoryStore {
    fn lookup(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    fn record(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_owned(), value);
    }

    fn flush(&mut self) -> Result<(), CollectError> {
        Ok(())
    }
}
