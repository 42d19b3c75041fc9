//! Fire-and-forget status notifications over Discord and Slack incoming
//! webhooks. Delivery failures are logged and swallowed; they must never
//! influence the caller's outcome.

use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("failed to deliver notification: {0}")]
    RequestError(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Failure,
}

impl Severity {
    fn discord_color(self) -> u32 {
        match self {
            Severity::Success => 3_066_993,
            Severity::Warning => 16_776_960,
            Severity::Failure => 15_158_332,
        }
    }

    fn emoji(self) -> &'static str {
        match self {
            Severity::Success => "\u{2705}",
            Severity::Warning => "\u{26a0}\u{fe0f}",
            Severity::Failure => "\u{274c}",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    /// Short key/value details rendered as fields in both payloads.
    pub fields: Vec<(String, String)>,
}

pub struct Notifier {
    client: reqwest::Client,
    discord_webhook: Option<String>,
    slack_webhook: Option<String>,
}

impl Notifier {
    pub fn new(discord_webhook: Option<String>, slack_webhook: Option<String>) -> Notifier {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .expect("failed to construct reqwest client for notifications");

        Notifier {
            client,
            discord_webhook,
            slack_webhook,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.discord_webhook.is_some() || self.slack_webhook.is_some()
    }

    /// Deliver to every configured webhook, best effort.
    pub async fn send(&self, notification: &Notification) {
        if let Some(url) = &self.discord_webhook {
            if let Err(e) = self.post(url, discord_payload(notification)).await {
                warn!("discord notification failed: {}", e);
            }
        }

        if let Some(url) = &self.slack_webhook {
            if let Err(e) = self.post(url, slack_payload(notification)).await {
                warn!("slack notification failed: {}", e);
            }
        }
    }

    async fn post(&self, url: &str, payload: Value) -> Result<(), NotifyError> {
        self.client
            .post(url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

fn discord_payload(notification: &Notification) -> Value {
    let fields: Vec<Value> = notification
        .fields
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value, "inline": true }))
        .collect();

    json!({
        "content": format!("{} {}", notification.severity.emoji(), notification.title),
        "embeds": [{
            "title": notification.title,
            "description": notification.description,
            "color": notification.severity.discord_color(),
            "fields": fields,
        }]
    })
}

fn slack_payload(notification: &Notification) -> Value {
    let fields: Vec<Value> = notification
        .fields
        .iter()
        .map(|(name, value)| {
            json!({ "type": "mrkdwn", "text": format!("*{}:*\n{}", name, value) })
        })
        .collect();

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {
                "type": "plain_text",
                "text": format!("{} {}", notification.severity.emoji(), notification.title),
            }
        }),
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": notification.description }
        }),
    ];
    if !fields.is_empty() {
        blocks.push(json!({ "type": "section", "fields": fields }));
    }

    json!({
        "text": format!("{} {}", notification.severity.emoji(), notification.title),
        "blocks": blocks,
    })
}
