use std::collections::HashSet;

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde_json::{json, Value};
use tracing::info;

use crate::config::Config;
use crate::error::CollectError;
use crate::reading::MetricReading;
use crate::sinks::RemoteSink;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SHEETS_SCOPE: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

pub const ALL_DATA_SHEET: &str = "All Data";
pub const ALL_DATA_HEADER: [&str; 4] = ["Fetch Time", "Metric Type", "Epoch Timestamp", "Value"];
pub const METRIC_HEADER: [&str; 3] = ["Metric Type", "Epoch Timestamp", "Value"];

/// Remote history over the Sheets v4 REST API, authenticated with a
/// service-account token. Sheets are created lazily, with a header row,
/// the first time a reading needs them.
pub struct SheetsSink {
    client: reqwest::Client,
    account: CustomServiceAccount,
    spreadsheet_id: String,
    known_sheets: HashSet<String>,
}

impl SheetsSink {
    /// Parse credentials, fetch a token and read the spreadsheet's sheet
    /// list. Failing any of these is fatal: every later call would fail
    /// the same way.
    pub async fn connect(config: &Config) -> Result<SheetsSink, CollectError> {
        let spreadsheet_id = config.google_sheet_id.clone().ok_or_else(|| {
            CollectError::RemoteAuthError(String::from("GOOGLE_SHEET_ID is not set"))
        })?;

        let account = match (
            &config.google_sheets_credentials,
            &config.google_sheets_credentials_path,
        ) {
            (Some(credentials), _) => CustomServiceAccount::from_json(credentials),
            (None, Some(path)) => CustomServiceAccount::from_file(path),
            (None, None) => {
                return Err(CollectError::RemoteAuthError(String::from(
                    "neither GOOGLE_SHEETS_CREDENTIALS nor GOOGLE_SHEETS_CREDENTIALS_PATH is set",
                )))
            }
        }
        .map_err(|e| CollectError::RemoteAuthError(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout.0)
            .build()
            .map_err(|e| CollectError::RemoteAuthError(e.to_string()))?;

        let mut sink = SheetsSink {
            client,
            account,
            spreadsheet_id,
            known_sheets: HashSet::new(),
        };
        sink.known_sheets = sink.list_sheets().await?;
        info!(
            "connected to spreadsheet with {} existing sheets",
            sink.known_sheets.len()
        );

        Ok(sink)
    }

    async fn token(&self) -> Result<String, CollectError> {
        let token = self
            .account
            .token(SHEETS_SCOPE)
            .await
            .map_err(|e| CollectError::RemoteAuthError(e.to_string()))?;
        Ok(token.as_str().to_owned())
    }

    async fn list_sheets(&self) -> Result<HashSet<String>, CollectError> {
        let url = format!(
            "{SHEETS_BASE_URL}/{}?fields=sheets.properties.title",
            self.spreadsheet_id
        );
        let token = self.token().await?;

        let body: Value = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| CollectError::RemoteAuthError(e.to_string()))?
            .error_for_status()
            .map_err(|e| CollectError::RemoteAuthError(e.to_string()))?
            .json()
            .await
            .map_err(|e| CollectError::RemoteAuthError(e.to_string()))?;

        let titles = body["sheets"]
            .as_array()
            .map(|sheets| {
                sheets
                    .iter()
                    .filter_map(|sheet| sheet["properties"]["title"].as_str())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Ok(titles)
    }

    async fn ensure_sheet(&mut self, title: &str, header: &[&str]) -> Result<(), CollectError> {
        if self.known_sheets.contains(title) {
            return Ok(());
        }

        let url = format!("{SHEETS_BASE_URL}/{}:batchUpdate", self.spreadsheet_id);
        let body = json!({
            "requests": [{
                "addSheet": { "properties": { "title": title } }
            }]
        });
        let token = self.token().await?;

        self.client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollectError::RemoteWriteError(e.to_string()))?
            .error_for_status()
            .map_err(|e| CollectError::RemoteWriteError(e.to_string()))?;

        let header_row = header.iter().map(|cell| json!(cell)).collect();
        self.append_row(title, header_row).await?;

        info!(sheet = %title, "created remote sheet");
        self.known_sheets.insert(title.to_owned());
        Ok(())
    }

    async fn append_row(&self, sheet: &str, row: Vec<Value>) -> Result<(), CollectError> {
        let url = format!(
            "{SHEETS_BASE_URL}/{}/values/{}:append",
            self.spreadsheet_id,
            encode_range(sheet)
        );
        let body = json!({ "values": [row] });
        let token = self.token().await?;

        self.client
            .post(&url)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollectError::RemoteWriteError(e.to_string()))?
            .error_for_status()
            .map_err(|e| CollectError::RemoteWriteError(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl RemoteSink for SheetsSink {
    async fn append_all_data(&mut self, reading: &MetricReading) -> Result<(), CollectError> {
        self.ensure_sheet(ALL_DATA_SHEET, &ALL_DATA_HEADER).await?;
        self.append_row(ALL_DATA_SHEET, all_data_row(reading)).await
    }

    async fn append_metric(&mut self, reading: &MetricReading) -> Result<(), CollectError> {
        let sheet = metric_sheet_title(&reading.metric_type);
        self.ensure_sheet(&sheet, &METRIC_HEADER).await?;
        self.append_row(&sheet, metric_row(reading)).await
    }
}

pub fn metric_sheet_title(metric_type: &str) -> String {
    format!("{metric_type}_Data")
}

pub fn all_data_row(reading: &MetricReading) -> Vec<Value> {
    vec![
        json!(reading.fetch_time),
        json!(reading.metric_type),
        json!(reading.epoch_timestamp_ms),
        json!(reading.value),
    ]
}

pub fn metric_row(reading: &MetricReading) -> Vec<Value> {
    vec![
        json!(reading.metric_type),
        json!(reading.epoch_timestamp_ms),
        json!(reading.value),
    ]
}

// The range path segment is the quoted sheet title; the space in
// "All Data" is the only character in our titles needing escape.
fn encode_range(sheet: &str) -> String {
    format!("'{sheet}'!A1").replace(' ', "%20")
}
