//! Reporting sinks: screenshots, run summaries, notifications.
//!
//! The orchestrator calls these at fixed checkpoints but never depends on
//! them: every sink failure is logged and swallowed. A renewal must not fail
//! because a chat API was down.

use crate::classify::Outcome;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Final account of one run, handed to `publish`.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: Outcome,
    pub attempts: u32,
    /// Redacted account identifier.
    pub account: String,
}

impl RunSummary {
    pub fn message(&self) -> String {
        match self.outcome {
            Outcome::Success => {
                format!("Server renewed (account {}, attempt {})", self.account, self.attempts)
            }
            Outcome::SuccessPreconditionNotMet => format!(
                "Renewal not yet available (account {}); nothing to do",
                self.account
            ),
            outcome => format!(
                "Renewal failed with {} after {} attempt(s) (account {})",
                outcome, self.attempts, self.account
            ),
        }
    }
}

#[async_trait]
pub trait Reporter: Send + Sync {
    /// Store a diagnostic artifact (PNG screenshot bytes) under a label.
    async fn record_artifact(&self, _label: &str, _bytes: &[u8]) {}

    /// Publish the final run summary. Returns a URL when the sink hosts the
    /// report somewhere reachable.
    async fn publish(&self, _summary: &RunSummary) -> Option<String> {
        None
    }

    /// Push a short human-readable progress message.
    async fn notify(&self, _message: &str, _success: bool) {}
}

/// Sink that drops everything. Used in tests and when nothing is configured.
pub struct NullReporter;

#[async_trait]
impl Reporter for NullReporter {}

/// Telegram Bot API notifier.
pub struct TelegramReporter {
    token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramReporter {
    pub fn new(token: String, chat_id: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            token,
            chat_id,
            client,
        }
    }

    async fn send(&self, text: &str) -> Result<(), reqwest::Error> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("chat_id", self.chat_id.as_str()),
                ("parse_mode", "HTML"),
                ("text", text),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            tracing::warn!("telegram notify returned HTTP {}", response.status());
        }
        Ok(())
    }
}

#[async_trait]
impl Reporter for TelegramReporter {
    async fn notify(&self, message: &str, success: bool) {
        let flavor = if success { "OK" } else { "FAILED" };
        let text = format!("<b>evergreen</b> [{}] {}", flavor, message);
        if let Err(e) = self.send(&text).await {
            tracing::warn!("telegram notify failed (ignoring): {}", e);
        }
    }

    async fn publish(&self, summary: &RunSummary) -> Option<String> {
        self.notify(&summary.message(), summary.outcome.is_terminal_success())
            .await;
        None
    }
}

/// Writes screenshots into a directory, timestamped per file.
pub struct ArtifactDir {
    dir: PathBuf,
}

impl ArtifactDir {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, label: &str) -> PathBuf {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let safe: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}-{}.png", stamp, safe))
    }
}

#[async_trait]
impl Reporter for ArtifactDir {
    async fn record_artifact(&self, label: &str, bytes: &[u8]) {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            tracing::warn!("cannot create artifact dir {}: {}", self.dir.display(), e);
            return;
        }
        let path = self.path_for(label);
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => tracing::info!("saved artifact {}", path.display()),
            Err(e) => tracing::warn!("failed to save artifact {}: {}", path.display(), e),
        }
    }
}

/// Fans every call out to each configured sink.
pub struct CompositeReporter {
    sinks: Vec<Box<dyn Reporter>>,
}

impl CompositeReporter {
    pub fn new(sinks: Vec<Box<dyn Reporter>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl Reporter for CompositeReporter {
    async fn record_artifact(&self, label: &str, bytes: &[u8]) {
        for sink in &self.sinks {
            sink.record_artifact(label, bytes).await;
        }
    }

    async fn publish(&self, summary: &RunSummary) -> Option<String> {
        let mut url = None;
        for sink in &self.sinks {
            url = sink.publish(summary).await.or(url);
        }
        url
    }

    async fn notify(&self, message: &str, success: bool) {
        for sink in &self.sinks {
            sink.notify(message, success).await;
        }
    }
}
