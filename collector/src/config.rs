use std::str::FromStr;
use std::time;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(
        from = "API_URL",
        default = "https://client-pixel.groww.in/api/v1/ir-data/calculate"
    )]
    pub api_url: String,

    #[envconfig(from = "REQUEST_TIMEOUT", default = "30000")]
    pub request_timeout: EnvMsDuration,

    // The upstream host serves a certificate chain that fails strict
    // verification. Relaxed for that one endpoint only; turn off when
    // pointing API_URL anywhere else.
    #[envconfig(from = "ACCEPT_INVALID_CERTS", default = "true")]
    pub accept_invalid_certs: bool,

    #[envconfig(
        from = "USER_AGENT",
        default = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
    )]
    pub user_agent: String,

    #[envconfig(from = "CSV_PATH", default = "ir_data.csv")]
    pub csv_path: String,

    /// Optional secondary backup, one JSON object per reading per line.
    #[envconfig(from = "JSONL_PATH")]
    pub jsonl_path: Option<String>,

    #[envconfig(from = "STATE_PATH", default = ".last_values.json")]
    pub state_path: String,

    /// The remote spreadsheet sink is disabled when unset.
    #[envconfig(from = "GOOGLE_SHEET_ID")]
    pub google_sheet_id: Option<String>,

    /// Service-account credential JSON, inline. Takes precedence over the
    /// file path when both are set.
    #[envconfig(from = "GOOGLE_SHEETS_CREDENTIALS")]
    pub google_sheets_credentials: Option<String>,

    #[envconfig(from = "GOOGLE_SHEETS_CREDENTIALS_PATH")]
    pub google_sheets_credentials_path: Option<String>,

    #[envconfig(from = "DISCORD_WEBHOOK")]
    pub discord_webhook: Option<String>,

    #[envconfig(from = "SLACK_WEBHOOK")]
    pub slack_webhook: Option<String>,

    /// Failures always notify; successful and partial runs only when enabled.
    #[envconfig(from = "NOTIFY_ON_SUCCESS", default = "false")]
    pub notify_on_success: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}
