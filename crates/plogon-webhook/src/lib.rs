//! Webhook notifications for plogon build events (spec §6).
//!
//! Posts a build task's outcome to a configured endpoint, formatted for
//! Slack, Discord, or a generic JSON consumer. This crate stays a thin
//! formatter-and-POST client; the `WebhookPoster` collaborator trait it
//! backs is defined in `plogon-core`, which owns deciding *when* to
//! notify.
//!
//! # Example
//!
//! ```ignore
//! use plogon_webhook::{WebhookConfig, send_webhook, build_success_payload};
//!
//! let config = WebhookConfig {
//!     url: "https://hooks.slack.com/services/...".to_string(),
//!     webhook_type: WebhookType::Slack,
//! };
//!
//! let payload = build_success_payload("FooPlugin", "stable", "1.0.0");
//! send_webhook(&config, &payload).expect("send");
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Webhook message format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookType {
    /// Generic webhook (POST JSON).
    #[default]
    Generic,
    /// Slack incoming webhook.
    Slack,
    /// Discord webhook.
    Discord,
}

/// Webhook destination and delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Webhook URL.
    pub url: String,
    /// Message format.
    #[serde(default)]
    pub webhook_type: WebhookType,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            webhook_type: WebhookType::default(),
            timeout_secs: default_timeout(),
        }
    }
}

/// A notification about one task's outcome, generalized to carry the
/// color/title/footer fields §6 asks for regardless of destination
/// format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Main message body.
    pub message: String,
    /// Optional title line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Optional footer line (e.g. channel/commit context).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    /// Whether the task succeeded.
    pub success: bool,
    /// Plugin internal name, if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    /// Channel id, if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Effective version, if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Error detail, if the task failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Additional destination-specific fields.
    #[serde(flatten)]
    pub extra: std::collections::BTreeMap<String, serde_json::Value>,
}

/// Send a webhook notification, blocking.
pub fn send_webhook(config: &WebhookConfig, payload: &WebhookPayload) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("failed to create HTTP client")?;

    let body = format_payload(config.webhook_type, payload)?;

    let response = client
        .post(&config.url)
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .context("failed to send webhook request")?;

    if !response.status().is_success() {
        return Err(anyhow::anyhow!(
            "webhook request failed with status {}: {}",
            response.status(),
            response.text().unwrap_or_default()
        ));
    }

    Ok(())
}

/// Send a webhook notification asynchronously.
pub async fn send_webhook_async(config: &WebhookConfig, payload: &WebhookPayload) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("failed to create HTTP client")?;

    let body = format_payload(config.webhook_type, payload)?;

    let response = client
        .post(&config.url)
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await
        .context("failed to send webhook request")?;

    if !response.status().is_success() {
        return Err(anyhow::anyhow!(
            "webhook request failed with status {}: {}",
            response.status(),
            response.text().await.unwrap_or_default()
        ));
    }

    Ok(())
}

fn format_payload(webhook_type: WebhookType, payload: &WebhookPayload) -> Result<String> {
    match webhook_type {
        WebhookType::Generic => Ok(serde_json::to_string(payload)?),
        WebhookType::Slack => slack_payload(payload),
        WebhookType::Discord => discord_payload(payload),
    }
}

fn slack_payload(payload: &WebhookPayload) -> Result<String> {
    let color = if payload.success { "good" } else { "danger" };

    let mut fields = vec![];
    if let Some(plugin) = &payload.plugin {
        fields.push(json!({"title": "Plugin", "value": plugin, "short": true}));
    }
    if let Some(channel) = &payload.channel {
        fields.push(json!({"title": "Channel", "value": channel, "short": true}));
    }
    if let Some(version) = &payload.version {
        fields.push(json!({"title": "Version", "value": version, "short": true}));
    }
    if let Some(error) = &payload.error {
        fields.push(json!({"title": "Error", "value": error, "short": false}));
    }

    let slack_json = json!({
        "attachments": [{
            "color": color,
            "title": payload.title.as_deref().unwrap_or("plogon build"),
            "text": payload.message,
            "footer": payload.footer,
            "fields": fields
        }]
    });

    Ok(serde_json::to_string(&slack_json)?)
}

fn discord_payload(payload: &WebhookPayload) -> Result<String> {
    let color = if payload.success { 0x2E_CC71_u32 } else { 0xE7_4C3C_u32 };

    let mut fields = vec![];
    if let Some(plugin) = &payload.plugin {
        fields.push(json!({"name": "Plugin", "value": plugin, "inline": true}));
    }
    if let Some(channel) = &payload.channel {
        fields.push(json!({"name": "Channel", "value": channel, "inline": true}));
    }
    if let Some(version) = &payload.version {
        fields.push(json!({"name": "Version", "value": version, "inline": true}));
    }
    if let Some(error) = &payload.error {
        fields.push(json!({"name": "Error", "value": error, "inline": false}));
    }

    let discord_json = json!({
        "embeds": [{
            "title": payload.title.as_deref().unwrap_or("plogon build"),
            "description": payload.message,
            "color": color,
            "footer": payload.footer.as_ref().map(|text| json!({"text": text})),
            "fields": fields
        }]
    });

    Ok(serde_json::to_string(&discord_json)?)
}

/// Payload for a successfully built task.
pub fn build_success_payload(plugin: &str, channel: &str, version: &str) -> WebhookPayload {
    WebhookPayload {
        message: format!("Built {plugin}@{version}"),
        title: Some("Build succeeded".to_string()),
        footer: Some(format!("channel: {channel}")),
        success: true,
        plugin: Some(plugin.to_string()),
        channel: Some(channel.to_string()),
        version: Some(version.to_string()),
        ..Default::default()
    }
}

/// Payload for a task that failed to build.
pub fn build_failure_payload(plugin: &str, channel: &str, error: &str) -> WebhookPayload {
    WebhookPayload {
        message: format!("Failed to build {plugin}"),
        title: Some("Build failed".to_string()),
        footer: Some(format!("channel: {channel}")),
        success: false,
        plugin: Some(plugin.to_string()),
        channel: Some(channel.to_string()),
        error: Some(error.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_type_default_is_generic() {
        assert_eq!(WebhookType::default(), WebhookType::Generic);
    }

    #[test]
    fn webhook_config_default_timeout() {
        let config = WebhookConfig::default();
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn build_success_payload_carries_context() {
        let payload = build_success_payload("FooPlugin", "stable", "1.0.0");
        assert!(payload.success);
        assert_eq!(payload.plugin.as_deref(), Some("FooPlugin"));
        assert_eq!(payload.footer.as_deref(), Some("channel: stable"));
    }

    #[test]
    fn build_failure_payload_carries_error() {
        let payload = build_failure_payload("FooPlugin", "testing-live", "compile error");
        assert!(!payload.success);
        assert_eq!(payload.error.as_deref(), Some("compile error"));
    }

    #[test]
    fn slack_payload_uses_success_color() {
        let payload = build_success_payload("FooPlugin", "stable", "1.0.0");
        let json = slack_payload(&payload).expect("format");
        assert!(json.contains("\"color\":\"good\""));
    }

    #[test]
    fn slack_payload_uses_failure_color() {
        let payload = build_failure_payload("FooPlugin", "stable", "error");
        let json = slack_payload(&payload).expect("format");
        assert!(json.contains("\"color\":\"danger\""));
    }

    #[test]
    fn discord_payload_uses_success_color() {
        let payload = build_success_payload("FooPlugin", "stable", "1.0.0");
        let json = discord_payload(&payload).expect("format");
        assert!(json.contains(&format!("\"color\":{}", 0x2E_CC71_u32)));
    }

    #[test]
    fn generic_payload_is_plain_json() {
        let payload = build_success_payload("FooPlugin", "stable", "1.0.0");
        let json = format_payload(WebhookType::Generic, &payload).expect("format");
        assert!(json.contains("\"message\":\"Built FooPlugin@1.0.0\""));
    }
}
