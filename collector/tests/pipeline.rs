use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use httpmock::prelude::*;
use serde_json::json;

use collector::config::{Config, EnvMsDuration};
use collector::dedup::{DedupStore, FileStore};
use collector::error::CollectError;
use collector::pipeline::{collect, run_once, RunStatus};
use collector::reading::MetricReading;
use collector::sinks::csv::CsvSink;
use collector::sinks::{HistorySink, RemoteSink};
use collector::source::MetricSource;
use collector::time::TimeSource;

#[derive(Clone)]
struct FixedTime {
    time: String,
}

impl TimeSource for FixedTime {
    fn current_time(&self) -> String {
        self.time.to_string()
    }
}

fn clock() -> FixedTime {
    FixedTime {
        time: "25/02/2025 17:00:00".to_string(),
    }
}

#[derive(Clone, Default)]
struct MemoryRemote {
    all_data: Arc<Mutex<Vec<MetricReading>>>,
    per_metric: Arc<Mutex<Vec<MetricReading>>>,
}

impl MemoryRemote {
    fn all_data_len(&self) -> usize {
        self.all_data.lock().unwrap().len()
    }

    fn metric_values(&self, metric_type: &str) -> Vec<f64> {
        self.per_metric
            .lock()
            .unwrap()
            .iter()
            .filter(|reading| reading.metric_type == metric_type)
            .map(|reading| reading.value)
            .collect()
    }
}

#[async_trait]
impl RemoteSink for MemoryRemote {
    async fn append_all_data(&mut self, reading: &MetricReading) -> Result<(), CollectError> {
        self.all_data.lock().unwrap().push(reading.clone());
        Ok(())
    }

    async fn append_metric(&mut self, reading: &MetricReading) -> Result<(), CollectError> {
        self.per_metric.lock().unwrap().push(reading.clone());
        Ok(())
    }
}

/// Rejects every write for one metric type, to force per-reading skips.
#[derive(Clone)]
struct FlakyRemote {
    failing_metric: String,
    inner: MemoryRemote,
}

#[async_trait]
impl RemoteSink for FlakyRemote {
    async fn append_all_data(&mut self, reading: &MetricReading) -> Result<(), CollectError> {
        if reading.metric_type == self.failing_metric {
            return Err(CollectError::RemoteWriteError(String::from(
                "forced failure",
            )));
        }
        self.inner.append_all_data(reading).await
    }

    async fn append_metric(&mut self, reading: &MetricReading) -> Result<(), CollectError> {
        if reading.metric_type == self.failing_metric {
            return Err(CollectError::RemoteWriteError(String::from(
                "forced failure",
            )));
        }
        self.inner.append_metric(reading).await
    }
}

fn test_config(api_url: &str, dir: &Path) -> Config {
    Config {
        api_url: api_url.to_string(),
        request_timeout: EnvMsDuration(Duration::from_millis(5000)),
        accept_invalid_certs: false,
        user_agent: "collector-tests".to_string(),
        csv_path: dir.join("history.csv").to_string_lossy().into_owned(),
        jsonl_path: None,
        state_path: dir.join(".last_values.json").to_string_lossy().into_owned(),
        google_sheet_id: None,
        google_sheets_credentials: None,
        google_sheets_credentials_path: None,
        discord_webhook: None,
        slack_webhook: None,
        notify_on_success: false,
    }
}

#[tokio::test]
async fn a_successful_run_grows_both_unconditional_histories() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/ir-data");
        then.status(200).json_body(json!({
            "AUM": [{"timestamp": 1740502237000i64, "value": 310944000000i64}],
            "CNTU": [{"timestamp": 1740502237000i64, "value": 12345}],
        }));
    });

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.url("/ir-data"), dir.path());
    let source = MetricSource::new(&config).unwrap();
    let mut local_sinks: Vec<Box<dyn HistorySink>> = vec![Box::new(CsvSink::new(&config.csv_path))];
    let mut dedup = FileStore::load(&config.state_path);
    let remote = MemoryRemote::default();

    let report = run_once(
        &source,
        &clock(),
        &mut local_sinks,
        Some(remote.clone()),
        &mut dedup,
    )
    .await;

    assert_eq!(report.status(), RunStatus::Success);
    assert_eq!(report.readings, 2);
    assert_eq!(report.changed, 2);

    // Local history: header plus one row per reading.
    let contents = std::fs::read_to_string(&config.csv_path).unwrap();
    assert_eq!(contents.lines().count(), 3);
    assert!(contents.contains("AUM,1740502237000,25/02/2025 16:50:37,31094.4"));
    assert!(contents.contains("CNTU,1740502237000,25/02/2025 16:50:37,12345"));

    // Remote: both readings in "All Data", both first occurrences routed
    // to their per-metric table.
    assert_eq!(remote.all_data_len(), 2);
    assert_eq!(remote.metric_values("AUM"), vec![31094.4]);
    assert_eq!(remote.metric_values("CNTU"), vec![12345.0]);
}

#[tokio::test]
async fn only_changed_values_reach_the_per_metric_history() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.url("/ir-data"), dir.path());
    let remote = MemoryRemote::default();

    for value in [10, 10, 12, 12, 12, 15] {
        let mut mock = server.mock(|when, then| {
            when.method(GET).path("/ir-data");
            then.status(200).json_body(json!({
                "CNTU": [{"timestamp": 1740502237000i64, "value": value}],
            }));
        });

        // Reload the state file every run, as separate invocations would.
        let source = MetricSource::new(&config).unwrap();
        let mut local_sinks: Vec<Box<dyn HistorySink>> =
            vec![Box::new(CsvSink::new(&config.csv_path))];
        let mut dedup = FileStore::load(&config.state_path);

        let report = run_once(
            &source,
            &clock(),
            &mut local_sinks,
            Some(remote.clone()),
            &mut dedup,
        )
        .await;
        assert_eq!(report.status(), RunStatus::Success);

        mock.delete();
    }

    assert_eq!(remote.all_data_len(), 6);
    assert_eq!(remote.metric_values("CNTU"), vec![10.0, 12.0, 15.0]);

    // The local history grew unconditionally: header plus six rows.
    let contents = std::fs::read_to_string(&config.csv_path).unwrap();
    assert_eq!(contents.lines().count(), 7);
}

#[tokio::test]
async fn state_reload_yields_the_last_value_per_identity() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/ir-data");
        then.status(200).json_body(json!({
            "AUM": [{"timestamp": 1740502237000i64, "value": 310944000000i64}],
            "CNTU": [{"timestamp": 1740502237000i64, "value": 12345}],
        }));
    });

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.url("/ir-data"), dir.path());
    let source = MetricSource::new(&config).unwrap();
    let mut local_sinks: Vec<Box<dyn HistorySink>> = vec![Box::new(CsvSink::new(&config.csv_path))];
    let mut dedup = FileStore::load(&config.state_path);

    run_once(
        &source,
        &clock(),
        &mut local_sinks,
        Some(MemoryRemote::default()),
        &mut dedup,
    )
    .await;

    let reloaded = FileStore::load(&config.state_path);
    assert_eq!(reloaded.lookup("AUM:0"), Some(31094.4));
    assert_eq!(reloaded.lookup("CNTU:0"), Some(12345.0));
}

#[tokio::test]
async fn a_corrupt_state_file_means_first_run_semantics() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/ir-data");
        then.status(200).json_body(json!({
            "AUM": [{"timestamp": 1740502237000i64, "value": 310944000000i64}],
            "CNTU": [{"timestamp": 1740502237000i64, "value": 12345}],
        }));
    });

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.url("/ir-data"), dir.path());
    std::fs::write(&config.state_path, "{ not json at all").unwrap();

    let source = MetricSource::new(&config).unwrap();
    let mut local_sinks: Vec<Box<dyn HistorySink>> = vec![Box::new(CsvSink::new(&config.csv_path))];
    let mut dedup = FileStore::load(&config.state_path);
    let remote = MemoryRemote::default();

    let report = run_once(
        &source,
        &clock(),
        &mut local_sinks,
        Some(remote.clone()),
        &mut dedup,
    )
    .await;

    // Every reading counts as changed, and the state file heals.
    assert_eq!(report.status(), RunStatus::Success);
    assert_eq!(report.changed, 2);
    assert_eq!(remote.metric_values("AUM"), vec![31094.4]);

    let reloaded = FileStore::load(&config.state_path);
    assert_eq!(reloaded.lookup("CNTU:0"), Some(12345.0));
}

#[tokio::test]
async fn a_failing_remote_write_skips_that_sink_only() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/ir-data");
        then.status(200).json_body(json!({
            "AUM": [{"timestamp": 1740502237000i64, "value": 310944000000i64}],
            "CNTU": [{"timestamp": 1740502237000i64, "value": 12345}],
        }));
    });

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.url("/ir-data"), dir.path());
    let source = MetricSource::new(&config).unwrap();
    let mut local_sinks: Vec<Box<dyn HistorySink>> = vec![Box::new(CsvSink::new(&config.csv_path))];
    let mut dedup = FileStore::load(&config.state_path);
    let remote = FlakyRemote {
        failing_metric: "AUM".to_string(),
        inner: MemoryRemote::default(),
    };

    let report = run_once(
        &source,
        &clock(),
        &mut local_sinks,
        Some(remote.clone()),
        &mut dedup,
    )
    .await;

    // Both readings still reach the local history, and the reading after
    // the failing one still reaches the remote tables.
    assert_eq!(report.status(), RunStatus::Partial);
    assert_eq!(report.skipped_remote, 2);
    let contents = std::fs::read_to_string(&config.csv_path).unwrap();
    assert_eq!(contents.lines().count(), 3);
    assert_eq!(remote.inner.all_data_len(), 1);
    assert_eq!(remote.inner.metric_values("CNTU"), vec![12345.0]);
}

#[tokio::test]
async fn a_failed_fetch_leaves_every_sink_and_the_state_file_untouched() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/ir-data");
        then.status(500).body("upstream exploded");
    });

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.url("/ir-data"), dir.path());
    let prior_state = r#"{"AUM:0":1.0}"#;
    std::fs::write(&config.state_path, prior_state).unwrap();

    let source = MetricSource::new(&config).unwrap();
    let mut local_sinks: Vec<Box<dyn HistorySink>> = vec![Box::new(CsvSink::new(&config.csv_path))];
    let mut dedup = FileStore::load(&config.state_path);
    let remote = MemoryRemote::default();

    let report = run_once(
        &source,
        &clock(),
        &mut local_sinks,
        Some(remote.clone()),
        &mut dedup,
    )
    .await;

    assert_eq!(report.status(), RunStatus::Failed);
    assert!(report.fetch_error.is_some());
    assert!(!Path::new(&config.csv_path).exists());
    assert_eq!(remote.all_data_len(), 0);
    assert_eq!(
        std::fs::read_to_string(&config.state_path).unwrap(),
        prior_state
    );
}

#[tokio::test]
async fn collect_wires_the_configured_local_sinks() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/ir-data");
        then.status(200).json_body(json!({
            "data": {
                "AUM": [{"timestamp": 1740502237000i64, "value": 310944000000i64}],
            },
            "types_count": 1,
            "values_per_type": 1,
        }));
    });

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&server.url("/ir-data"), dir.path());
    config.jsonl_path = Some(dir.path().join("history.jsonl").to_string_lossy().into_owned());

    let report = collect(&config).await;

    assert_eq!(report.status(), RunStatus::Success);
    assert_eq!(report.readings, 1);

    let csv = std::fs::read_to_string(&config.csv_path).unwrap();
    assert_eq!(csv.lines().count(), 2);

    let jsonl = std::fs::read_to_string(config.jsonl_path.as_ref().unwrap()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(jsonl.lines().next().unwrap()).unwrap();
    assert_eq!(parsed["metric_type"], "AUM");
    assert_eq!(parsed["value"], 31094.4);

    let state = FileStore::load(&config.state_path);
    assert_eq!(state.lookup("AUM:0"), Some(31094.4));
}
