//! Alert store
//!
//! Owns every `Alert` keyed by id and is the only component allowed to
//! mutate alert state. `mutate` gives per-id mutual exclusion: the outer map
//! lock is held just long enough to clone the per-alert slot, so concurrent
//! transitions on unrelated alerts never serialize against each other.
//! Terminal alerts stay queryable until process shutdown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use super::{Alert, AlertId, AlertView};
use crate::directory::Target;
use crate::error::{AlertError, AlertResult};

pub struct AlertStore {
    alerts: Mutex<HashMap<AlertId, Arc<Mutex<Alert>>>>,
    seq: AtomicU64,
}

impl AlertStore {
    pub fn new() -> Self {
        Self {
            alerts: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// Create a new alert (status `Sent`, level 0) and return its snapshot.
    pub fn create(&self, service: &str, message: &str, target: Target) -> AlertView {
        let now = Utc::now();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let id = format!("alert-{}-{}", now.timestamp_millis(), seq);
        let alert = Alert::new(id.clone(), service, message, target, now);
        let view = AlertView::from(&alert);
        self.alerts
            .lock()
            .unwrap()
            .insert(id, Arc::new(Mutex::new(alert)));
        view
    }

    pub fn get(&self, id: &str) -> AlertResult<AlertView> {
        let slot = self.slot(id)?;
        let alert = slot.lock().unwrap();
        Ok(AlertView::from(&*alert))
    }

    /// Apply a transition atomically. No concurrent transition on the same id
    /// can interleave with `f`; unrelated alerts are untouched.
    pub fn mutate<T>(&self, id: &str, f: impl FnOnce(&mut Alert) -> T) -> AlertResult<T> {
        let slot = self.slot(id)?;
        let mut alert = slot.lock().unwrap();
        Ok(f(&mut alert))
    }

    /// Alerts currently targeted at `user` or acknowledged by them.
    pub fn for_user(&self, user: &str) -> Vec<AlertView> {
        let slots: Vec<Arc<Mutex<Alert>>> =
            self.alerts.lock().unwrap().values().cloned().collect();
        let mut views: Vec<AlertView> = slots
            .iter()
            .map(|slot| AlertView::from(&*slot.lock().unwrap()))
            .filter(|view| {
                view.current_target.name == user
                    || view.acknowledged_by.as_deref() == Some(user)
            })
            .collect();
        views.sort_by_key(|v| v.created_at);
        views
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, id: &str) -> AlertResult<Arc<Mutex<Alert>>> {
        self.alerts
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AlertError::NotFound(id.to_string()))
    }
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertStatus;

    fn target(name: &str) -> Target {
        Target::new(name, &format!("{}@company.com", name.to_lowercase()))
    }

    #[test]
    fn test_create_and_get() {
        let store = AlertStore::new();
        let view = store.create("database", "Connection timeout detected", target("Alice"));
        assert_eq!(view.status, AlertStatus::Sent);
        assert_eq!(view.escalation_level, 0);

        let fetched = store.get(&view.id).unwrap();
        assert_eq!(fetched.id, view.id);
        assert_eq!(fetched.service, "database");
    }

    #[test]
    fn test_ids_are_unique() {
        let store = AlertStore::new();
        let a = store.create("database", "first", target("Alice"));
        let b = store.create("database", "second", target("Alice"));
        assert_ne!(a.id, b.id);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_get_unknown_id_is_not_found() {
        let store = AlertStore::new();
        match store.get("alert-nope") {
            Err(AlertError::NotFound(id)) => assert_eq!(id, "alert-nope"),
            other => panic!("expected NotFound, got {:?}", other.map(|v| v.status)),
        }
    }

    #[test]
    fn test_mutate_applies_transition() {
        let store = AlertStore::new();
        let view = store.create("api", "5xx spike", target("Bob"));
        let applied = store
            .mutate(&view.id, |alert| {
                alert.status = AlertStatus::Acknowledged;
                alert.acknowledged_by = Some("Bob".to_string());
                true
            })
            .unwrap();
        assert!(applied);
        let fetched = store.get(&view.id).unwrap();
        assert_eq!(fetched.status, AlertStatus::Acknowledged);
        assert_eq!(fetched.acknowledged_by.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_for_user_matches_target_and_acknowledger() {
        let store = AlertStore::new();
        let a = store.create("database", "down", target("Alice"));
        store.create("api", "slow", target("Bob"));
        let c = store.create("cache", "evictions", target("Charlie"));
        store
            .mutate(&c.id, |alert| {
                alert.status = AlertStatus::Acknowledged;
                alert.acknowledged_by = Some("Alice".to_string());
            })
            .unwrap();

        let alice = store.for_user("Alice");
        let ids: Vec<&str> = alice.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec![a.id.as_str(), c.id.as_str()]);
        assert!(store.for_user("Dora").is_empty());
    }

    #[test]
    fn test_terminal_alerts_are_retained() {
        let store = AlertStore::new();
        let view = store.create("database", "down", target("Alice"));
        store
            .mutate(&view.id, |alert| alert.status = AlertStatus::Ignored)
            .unwrap();
        assert_eq!(store.get(&view.id).unwrap().status, AlertStatus::Ignored);
        assert_eq!(store.len(), 1);
    }
}
