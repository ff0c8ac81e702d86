//! Alert entity and lifecycle states
//!
//! The central data model: one `Alert` per notified problem, tracked from
//! creation through acknowledgment, snooze, ignore or escalation. All
//! mutation goes through the store; timers and target selection live in the
//! escalation engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::Target;

pub mod store;

/// Opaque alert identifier, assigned at creation.
pub type AlertId = String;

/// Lifecycle states of an alert. Exactly one holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Delivered to the on-call responder, waiting for a reaction
    Sent,
    /// A responder took ownership; terminal
    Acknowledged,
    /// Escalation deferred until `snooze_until`
    Snoozed,
    /// Timed out at least once and moved to another responder
    Escalated,
    /// Individual escalation exhausted, handed to the leadership tier; terminal
    EscalatedToLeads,
    /// Explicitly dismissed; terminal
    Ignored,
}

impl AlertStatus {
    /// Terminal states accept no further transitions and arm no timers.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AlertStatus::Acknowledged | AlertStatus::EscalatedToLeads | AlertStatus::Ignored
        )
    }
}

/// A single notified problem instance.
///
/// `id`, `service`, `message` and `created_at` are immutable after creation.
/// `escalation_level` counts completed escalation hops and only ever
/// increases. `last_activity_at` is updated on every state change and is for
/// observability only. The outstanding timeout timer is owned by the engine
/// and never appears here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub service: String,
    pub message: String,
    pub status: AlertStatus,
    pub escalation_level: u32,
    /// Responder or tier currently holding the alert; set at creation and on
    /// every escalation. A tier holder has an empty contact.
    pub current_target: Target,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    /// Present only while `status` is `Snoozed`; cleared on any other transition.
    pub snooze_until: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub ignored_by: Option<String>,
    pub ignored_at: Option<DateTime<Utc>>,
    pub last_escalation_at: Option<DateTime<Utc>>,
    pub escalated_to_leads_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(id: AlertId, service: &str, message: &str, target: Target, now: DateTime<Utc>) -> Self {
        Self {
            id,
            service: service.to_string(),
            message: message.to_string(),
            status: AlertStatus::Sent,
            escalation_level: 0,
            current_target: target,
            created_at: now,
            last_activity_at: now,
            snooze_until: None,
            acknowledged_by: None,
            acknowledged_at: None,
            ignored_by: None,
            ignored_at: None,
            last_escalation_at: None,
            escalated_to_leads_at: None,
        }
    }

    /// Single terminal-state check consulted by every transition entry point.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Read-only snapshot returned by status queries.
#[derive(Debug, Clone, Serialize)]
pub struct AlertView {
    pub id: AlertId,
    pub service: String,
    pub message: String,
    pub status: AlertStatus,
    pub escalation_level: u32,
    pub current_target: Target,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub snooze_until: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl From<&Alert> for AlertView {
    fn from(alert: &Alert) -> Self {
        Self {
            id: alert.id.clone(),
            service: alert.service.clone(),
            message: alert.message.clone(),
            status: alert.status,
            escalation_level: alert.escalation_level,
            current_target: alert.current_target.clone(),
            created_at: alert.created_at,
            last_activity_at: alert.last_activity_at,
            snooze_until: alert.snooze_until,
            acknowledged_by: alert.acknowledged_by.clone(),
            acknowledged_at: alert.acknowledged_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Alert {
        Alert::new(
            "alert-1".to_string(),
            "database",
            "Connection timeout detected",
            Target::new("Alice", "alice@company.com"),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_alert_starts_sent_at_level_zero() {
        let alert = sample();
        assert_eq!(alert.status, AlertStatus::Sent);
        assert_eq!(alert.escalation_level, 0);
        assert!(alert.snooze_until.is_none());
        assert!(!alert.is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        assert!(AlertStatus::Acknowledged.is_terminal());
        assert!(AlertStatus::Ignored.is_terminal());
        assert!(AlertStatus::EscalatedToLeads.is_terminal());
        assert!(!AlertStatus::Sent.is_terminal());
        assert!(!AlertStatus::Snoozed.is_terminal());
        assert!(!AlertStatus::Escalated.is_terminal());
    }

    #[test]
    fn test_view_snapshots_alert() {
        let mut alert = sample();
        alert.status = AlertStatus::Escalated;
        alert.escalation_level = 2;
        let view = AlertView::from(&alert);
        assert_eq!(view.id, alert.id);
        assert_eq!(view.status, AlertStatus::Escalated);
        assert_eq!(view.escalation_level, 2);
        assert_eq!(view.current_target.name, "Alice");
    }
}
