use async_trait::async_trait;
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Webhook returned HTTP {status}")]
    Status { status: u16 },
    #[error("Webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to write message preview: {0}")]
    Preview(#[from] std::io::Error),
}

/// Destination for rendered reports.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, text: &str) -> Result<(), DeliveryError>;
}

#[derive(Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
}

/// Slack incoming webhook.
pub struct SlackWebhook {
    url: String,
    client: reqwest::Client,
}

impl SlackWebhook {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl Notifier for SlackWebhook {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        let preview: String = text.chars().take(100).collect();
        debug!(preview = %preview, "Posting message to Slack webhook");

        let response = self
            .client
            .post(&self.url)
            .json(&SlackPayload { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
            });
        }
        info!(status = status.as_u16(), "Slack notification delivered");
        Ok(())
    }
}

/// Writes the message to a local stream instead of posting it (`--dry-run`).
/// stdout is left to the command's own result.
pub struct PreviewNotifier<W> {
    out: Mutex<W>,
}

impl PreviewNotifier<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> PreviewNotifier<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

#[async_trait]
impl<W: Write + Send + 'static> Notifier for PreviewNotifier<W> {
    fn name(&self) -> &'static str {
        "preview"
    }

    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(out, "{}\n", text)?;
        out.flush()?;
        Ok(())
    }
}
