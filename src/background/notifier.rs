//! Alert delivery.
//!
//! Alerts are fire-and-forget: [`deliver`] catches notifier errors and
//! timeouts, logs them, and never hands them back to the control loop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use super::status::Details;

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub severity: AlertSeverity,
    #[serde(default)]
    pub details: Details,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        severity: AlertSeverity,
        details: Details,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
            details,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("alert endpoint returned status {0}")]
    Rejected(reqwest::StatusCode),

    #[error("alert delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("notifier unavailable: {0}")]
    Unavailable(String),
}

/// Outbound alert channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_alert(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Deliver an alert, swallowing and logging any failure.
///
/// Returns whether delivery succeeded, for callers that want to count it.
pub async fn deliver(notifier: &dyn Notifier, alert: Alert, timeout: Duration) -> bool {
    let result = match tokio::time::timeout(timeout, notifier.send_alert(&alert)).await {
        Ok(result) => result,
        Err(_) => Err(NotifyError::Timeout(timeout)),
    };
    match result {
        Ok(()) => true,
        Err(e) => {
            error!(title = %alert.title, severity = %alert.severity, error = %e, "Failed to deliver alert");
            false
        }
    }
}

/// Writes alerts to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_alert(&self, alert: &Alert) -> Result<(), NotifyError> {
        match alert.severity {
            AlertSeverity::Info => info!(title = %alert.title, "{}", alert.message),
            AlertSeverity::Warning => warn!(title = %alert.title, "{}", alert.message),
            AlertSeverity::Error | AlertSeverity::Critical => {
                error!(title = %alert.title, severity = %alert.severity, "{}", alert.message);
            }
        }
        Ok(())
    }
}

/// POSTs alerts as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_alert(&self, alert: &Alert) -> Result<(), NotifyError> {
        let response = self.http.post(&self.url).json(alert).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status()));
        }
        Ok(())
    }
}

/// Sends every alert to each inner notifier in turn.
///
/// Fails if any inner notifier failed, after trying all of them.
pub struct FanoutNotifier {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn send_alert(&self, alert: &Alert) -> Result<(), NotifyError> {
        let mut first_error = None;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.send_alert(alert).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Keeps alerts in memory. Used by tests and embedding applications that
/// forward alerts themselves.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.alerts().into_iter().map(|a| a.title).collect()
    }

    pub fn count(&self) -> usize {
        self.alerts.lock().map(|a| a.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_alert(&self, alert: &Alert) -> Result<(), NotifyError> {
        self.alerts
            .lock()
            .map_err(|_| NotifyError::Unavailable("alert buffer poisoned".to_string()))?
            .push(alert.clone());
        Ok(())
    }
}
