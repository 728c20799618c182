use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::alert::engine::AlertEvent;

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, event: &AlertEvent) -> Result<()>;
}

pub struct StdoutSink;

#[async_trait]
impl AlertSink for StdoutSink {
    async fn send(&self, event: &AlertEvent) -> Result<()> {
        println!("[{}] {} - {}", event.kind, event.title, event.body);
        Ok(())
    }
}

/// Posts events as JSON. Discord webhook URLs get a `content` message instead.
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("drift-gate/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build webhook HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    fn is_discord(&self) -> bool {
        self.url.contains("discord.com/api/webhooks")
            || self.url.contains("discordapp.com/api/webhooks")
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn send(&self, event: &AlertEvent) -> Result<()> {
        let req = if self.is_discord() {
            let content = format!("[{}] {}\n{}", event.kind, event.title, event.body);
            self.client
                .post(&self.url)
                .json(&serde_json::json!({ "content": content }))
        } else {
            self.client.post(&self.url).json(event)
        };

        req.send().await?.error_for_status()?;
        Ok(())
    }
}

/// Sinks enabled by `[alerts]`. An empty webhook URL disables the webhook.
pub fn build_sinks(enable_stdout: bool, webhook: &str) -> Result<Vec<Box<dyn AlertSink>>> {
    let mut sinks: Vec<Box<dyn AlertSink>> = Vec::new();
    if enable_stdout {
        sinks.push(Box::new(StdoutSink));
    }
    if !webhook.trim().is_empty() {
        sinks.push(Box::new(WebhookSink::new(webhook.trim())?));
    }
    Ok(sinks)
}

#[cfg(test)]
mod tests {
    use super::{build_sinks, WebhookSink};

    #[test]
    fn detects_discord_urls() {
        let sink = WebhookSink::new("https://discord.com/api/webhooks/1/abc").expect("client");
        assert!(sink.is_discord());
        let sink = WebhookSink::new("https://hooks.example.com/drift").expect("client");
        assert!(!sink.is_discord());
    }

    #[test]
    fn blank_webhook_is_ignored() {
        let sinks = build_sinks(false, "   ").expect("sinks");
        assert!(sinks.is_empty());
        let sinks = build_sinks(true, "").expect("sinks");
        assert_eq!(sinks.len(), 1);
    }
}
