use tracing::{error, info, warn};

use notify::{Notification, Notifier, Severity};

use crate::config::Config;
use crate::dedup::{DedupStore, FileStore};
use crate::error::CollectError;
use crate::reading::{normalize, MetricReading};
use crate::sinks::csv::CsvSink;
use crate::sinks::jsonl::JsonlSink;
use crate::sinks::sheets::SheetsSink;
use crate::sinks::{HistorySink, RemoteSink};
use crate::source::MetricSource;
use crate::time::{SystemTime, TimeSource};

/// What happened during one run. Non-fatal problems are accumulated here
/// and summarized once; they are never surfaced per occurrence.
#[derive(Debug, Default)]
pub struct RunReport {
    pub readings: usize,
    pub changed: usize,
    pub skipped_entries: usize,
    pub skipped_local: usize,
    pub skipped_remote: usize,
    pub fetch_error: Option<String>,
    pub remote_auth_error: Option<String>,
    pub flush_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        if self.fetch_error.is_some() || self.remote_auth_error.is_some() {
            RunStatus::Failed
        } else if self.skipped_local > 0 || self.skipped_remote > 0 || self.flush_error.is_some() {
            RunStatus::Partial
        } else {
            RunStatus::Success
        }
    }

    pub fn summary(&self) -> String {
        if let Some(e) = &self.fetch_error {
            return format!("run aborted before any write: {e}");
        }

        let mut summary = format!(
            "collected {} readings, {} changed",
            self.readings, self.changed
        );
        if let Some(e) = &self.remote_auth_error {
            summary.push_str(&format!("; remote sink failed: {e}"));
        }
        if self.skipped_local > 0 || self.skipped_remote > 0 {
            summary.push_str(&format!(
                "; skipped {} local and {} remote writes",
                self.skipped_local, self.skipped_remote
            ));
        }
        if self.skipped_entries > 0 {
            summary.push_str(&format!(
                "; dropped {} malformed entries",
                self.skipped_entries
            ));
        }
        if let Some(e) = &self.flush_error {
            summary.push_str(&format!("; state not persisted: {e}"));
        }
        summary
    }
}

/// One linear pass: fetch, normalize, then for each reading write the
/// unconditional histories, check the dedup store and route changed
/// readings to their per-metric table; finally flush the dedup state.
///
/// Only a fetch failure aborts (leaving every sink and the state file
/// untouched). Per-reading write failures skip that reading for that sink
/// only. A remote auth failure disables remote writes for the remainder of
/// the run, since every later call would fail the same way.
pub async fn run_once<R: RemoteSink + Send>(
    source: &MetricSource,
    clock: &dyn TimeSource,
    local_sinks: &mut [Box<dyn HistorySink>],
    mut remote: Option<R>,
    dedup: &mut dyn DedupStore,
) -> RunReport {
    let mut report = RunReport::default();
    let fetch_time = clock.current_time();

    let parsed = match source.fetch().await {
        Ok(parsed) => parsed,
        Err(e) => {
            error!("fetch failed, aborting run: {}", e);
            report.fetch_error = Some(e.to_string());
            return report;
        }
    };
    report.skipped_entries = parsed.skipped_entries;

    let readings: Vec<MetricReading> = parsed
        .metrics
        .iter()
        .map(|raw| normalize(raw, &fetch_time))
        .collect();
    report.readings = readings.len();
    info!("fetched {} readings", readings.len());

    for reading in &readings {
        for sink in local_sinks.iter_mut() {
            if let Err(e) = sink.append(reading) {
                warn!("local write skipped for {}: {}", reading.key(), e);
                report.skipped_local += 1;
            }
        }

        if let Some(mut sink) = remote.take() {
            match sink.append_all_data(reading).await {
                Ok(()) => remote = Some(sink),
                Err(CollectError::RemoteAuthError(e)) => {
                    error!("remote auth failed mid-run, disabling remote writes: {}", e);
                    report.remote_auth_error = Some(e);
                }
                Err(e) => {
                    warn!("remote write skipped for {}: {}", reading.key(), e);
                    report.skipped_remote += 1;
                    remote = Some(sink);
                }
            }
        }

        let key = reading.key();
        if dedup.is_changed(&key, reading.value) {
            report.changed += 1;
            dedup.record(&key, reading.value);

            if let Some(mut sink) = remote.take() {
                match sink.append_metric(reading).await {
                    Ok(()) => remote = Some(sink),
                    Err(CollectError::RemoteAuthError(e)) => {
                        error!("remote auth failed mid-run, disabling remote writes: {}", e);
                        report.remote_auth_error = Some(e);
                    }
                    Err(e) => {
                        warn!("remote write skipped for {}: {}", reading.key(), e);
                        report.skipped_remote += 1;
                        remote = Some(sink);
                    }
                }
            }
        }
    }

    if let Err(e) = dedup.flush() {
        error!("failed to persist dedup state: {}", e);
        report.flush_error = Some(e.to_string());
    }

    report
}

/// The zero-argument single-run entry point shared by the `collector`
/// binary and the scheduler: wire up the configured sinks, run one pass
/// and send the end-of-run notification.
pub async fn collect(config: &Config) -> RunReport {
    let notifier = Notifier::new(
        config.discord_webhook.clone(),
        config.slack_webhook.clone(),
    );

    let report = match MetricSource::new(config) {
        Ok(source) => {
            let mut local_sinks: Vec<Box<dyn HistorySink>> =
                vec![Box::new(CsvSink::new(&config.csv_path))];
            if let Some(path) = &config.jsonl_path {
                local_sinks.push(Box::new(JsonlSink::new(path)));
            }
            let mut dedup = FileStore::load(&config.state_path);

            let (remote, connect_error) = if config.google_sheet_id.is_some() {
                match SheetsSink::connect(config).await {
                    Ok(sink) => (Some(sink), None),
                    Err(e) => {
                        error!(
                            "remote sink unavailable, continuing with local sinks only: {}",
                            e
                        );
                        (None, Some(e.to_string()))
                    }
                }
            } else {
                (None, None)
            };

            let mut report =
                run_once(&source, &SystemTime {}, &mut local_sinks, remote, &mut dedup).await;
            if report.remote_auth_error.is_none() {
                report.remote_auth_error = connect_error;
            }
            report
        }
        Err(e) => RunReport {
            fetch_error: Some(e.to_string()),
            ..RunReport::default()
        },
    };

    notify_outcome(&notifier, config, &report).await;
    report
}

async fn notify_outcome(notifier: &Notifier, config: &Config, report: &RunReport) {
    if !notifier.is_configured() {
        return;
    }

    let status = report.status();
    if status != RunStatus::Failed && !config.notify_on_success {
        return;
    }

    let (title, severity) = match status {
        RunStatus::Success => ("Metrics collection succeeded", Severity::Success),
        RunStatus::Partial => ("Metrics collection partially succeeded", Severity::Warning),
        RunStatus::Failed => ("Metrics collection failed", Severity::Failure),
    };

    let notification = Notification {
        title: title.to_string(),
        description: report.summary(),
        severity,
        fields: vec![
            ("Readings".to_string(), report.readings.to_string()),
            ("Changed".to_string(), report.changed.to_string()),
            (
                "Skipped writes".to_string(),
                (report.skipped_local + report.skipped_remote).to_string(),
            ),
        ],
    };
    notifier.send(&notification).await;
}
