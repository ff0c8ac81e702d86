//! Notification channels
//!
//! Channel-agnostic delivery seam. The engine decides *what* to send and *to
//! whom*; a `Notifier` attempts delivery and may fail. Rendering and retry
//! policy belong to the implementation, never to the engine.

use anyhow::{Context, Result};
use serde::Serialize;
use url::Url;

use crate::alerts::AlertId;
use crate::directory::Target;

/// What a notification is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    /// Fresh alert, sent to the current on-call responder
    New { quick_actions: Vec<String> },
    /// Timed out and moved to another responder
    Escalated,
    /// Individual escalation exhausted, the leadership tier takes over
    EscalatedToLeads,
}

/// Payload handed to a notifier alongside the target.
#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload {
    pub alert_id: AlertId,
    pub service: String,
    pub message: String,
    pub escalation_level: u32,
    #[serde(flatten)]
    pub kind: NotificationKind,
}

/// Trait for notification channels
pub trait Notifier: Send + Sync {
    fn notify(&self, target: &Target, payload: &AlertPayload) -> Result<()>;
    fn name(&self) -> &str;
}

/// Logs every notification; the default channel for local runs.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, target: &Target, payload: &AlertPayload) -> Result<()> {
        tracing::info!(
            "Notify: {} ({}) <- alert {} [{}] level {}: {}",
            target.name,
            target.contact,
            payload.alert_id,
            payload.service,
            payload.escalation_level,
            payload.message
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Generic webhook channel: POSTs the JSON payload to a configured URL.
pub struct WebhookNotifier {
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Result<Self> {
        Url::parse(&webhook_url).context("invalid webhook URL")?;
        Ok(Self { webhook_url })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, target: &Target, payload: &AlertPayload) -> Result<()> {
        let client = reqwest::blocking::Client::new();
        let body = serde_json::json!({
            "target": target.contact,
            "alert": payload,
        });

        client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .context("webhook delivery failed")?
            .error_for_status()
            .context("webhook rejected the notification")?;

        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Test double that records every delivery and wakes waiting tests.
#[cfg(test)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<(Target, AlertPayload)>>,
    signal: tokio::sync::Notify,
    /// When set, deliveries fail (for NotifyFailure handling tests).
    pub fail: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: std::sync::Mutex::new(Vec::new()),
            signal: tokio::sync::Notify::new(),
            fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent(&self) -> Vec<(Target, AlertPayload)> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait until at least `n` deliveries were attempted.
    pub async fn wait_for(&self, n: usize) {
        loop {
            let notified = self.signal.notified();
            if self.count() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, target: &Target, payload: &AlertPayload) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((target.clone(), payload.clone()));
        self.signal.notify_one();
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("simulated delivery failure");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_rejects_invalid_url() {
        assert!(WebhookNotifier::new("not a url".to_string()).is_err());
        assert!(WebhookNotifier::new("https://hooks.example.com/alerts".to_string()).is_ok());
    }

    #[test]
    fn test_payload_serializes_with_kind_tag() {
        let payload = AlertPayload {
            alert_id: "alert-1".to_string(),
            service: "database".to_string(),
            message: "Connection timeout detected".to_string(),
            escalation_level: 0,
            kind: NotificationKind::New {
                quick_actions: vec!["✅ Acknowledge".to_string()],
            },
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "new");
        assert_eq!(json["quick_actions"][0], "✅ Acknowledge");
        assert_eq!(json["service"], "database");
    }

    #[test]
    fn test_log_notifier_always_succeeds() {
        let payload = AlertPayload {
            alert_id: "alert-2".to_string(),
            service: "api".to_string(),
            message: "5xx spike".to_string(),
            escalation_level: 1,
            kind: NotificationKind::Escalated,
        };
        let target = Target::new("Bob", "bob@company.com");
        assert!(LogNotifier.notify(&target, &payload).is_ok());
    }
}
