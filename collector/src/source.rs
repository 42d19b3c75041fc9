use reqwest::header;
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::Config;
use crate::error::CollectError;
use crate::reading::RawMetric;

/// Everything salvaged from one source response: the readings that parsed,
/// plus a count of entries dropped as malformed.
#[derive(Debug, Default, PartialEq)]
pub struct ParsedResponse {
    pub metrics: Vec<RawMetric>,
    pub skipped_entries: usize,
}

/// Client for the upstream metrics endpoint. One GET per run, fixed URL.
pub struct MetricSource {
    client: reqwest::Client,
    url: String,
}

impl MetricSource {
    pub fn new(config: &Config) -> Result<MetricSource, CollectError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout.0)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| CollectError::SourceUnavailable(e.to_string()))?;

        Ok(MetricSource {
            client,
            url: config.api_url.clone(),
        })
    }

    /// Fetch and parse one response. Malformed entries are skipped with a
    /// warning; an unreachable endpoint, a non-success status or a body that
    /// is not a JSON object fails the whole run.
    pub async fn fetch(&self) -> Result<ParsedResponse, CollectError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CollectError::SourceUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| CollectError::SourceUnavailable(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| CollectError::SourceUnavailable(e.to_string()))?;

        parse_response(&body)
    }
}

/// The source wraps the series map in a `data` envelope alongside
/// `types_count`/`values_per_type` counters; bare maps are accepted too.
pub fn parse_response(body: &Value) -> Result<ParsedResponse, CollectError> {
    let series: &Map<String, Value> = match body.get("data") {
        Some(Value::Object(map)) => map,
        _ => body.as_object().ok_or_else(|| {
            CollectError::SourceUnavailable(String::from("response is not a JSON object"))
        })?,
    };

    let mut parsed = ParsedResponse::default();
    for (metric_type, values) in series {
        let Some(entries) = values.as_array() else {
            warn!(metric_type = %metric_type, "series is not an array, skipping");
            parsed.skipped_entries += 1;
            continue;
        };

        for (slot, entry) in entries.iter().enumerate() {
            let timestamp = entry.get("timestamp").and_then(Value::as_i64);
            let value = entry.get("value").and_then(Value::as_f64);
            match (timestamp, value) {
                (Some(timestamp_ms), Some(value)) => parsed.metrics.push(RawMetric {
                    metric_type: metric_type.clone(),
                    slot,
                    timestamp_ms,
                    value,
                }),
                _ => {
                    warn!(metric_type = %metric_type, slot, "malformed entry, skipping");
                    parsed.skipped_entries += 1;
                }
            }
        }
    }

    Ok(parsed)
}
