//! On-call and escalation directories
//!
//! External lookup collaborators behind trait seams:
//! - `OnCallDirectory`: who is on call at a point in time (and who is next)
//! - `EscalationDirectory`: named tier -> set of notification targets
//!
//! `ShiftRoster` is the built-in weekday roster, JSON-loadable like the rest
//! of the app's home-directory files. `ConfigTiers` serves tiers straight
//! from the alert configuration.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AlertConfig;
use crate::error::{AlertError, AlertResult};

/// A notification target: an individual responder or a tier member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    /// Delivery address (email, chat handle, webhook route). Empty for a
    /// tier placeholder holding an alert after final escalation.
    pub contact: String,
}

impl Target {
    pub fn new(name: &str, contact: &str) -> Self {
        Self {
            name: name.to_string(),
            contact: contact.to_string(),
        }
    }

    /// Placeholder target representing a whole escalation tier.
    pub fn tier(name: &str) -> Self {
        Self {
            name: name.to_string(),
            contact: String::new(),
        }
    }
}

/// An individual on the shift roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Responder {
    pub name: String,
    pub contact: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Responder {
    pub fn target(&self) -> Target {
        Target::new(&self.name, &self.contact)
    }
}

/// Pure lookup of the assigned responder for a point in time.
pub trait OnCallDirectory: Send + Sync {
    fn current_responder(&self, now: DateTime<Utc>) -> AlertResult<Responder>;

    /// Responder for the next period, used to advance an escalation. May
    /// return the same responder as `current_responder` when the roster
    /// cannot supply a distinct one.
    fn next_responder(&self, now: DateTime<Utc>) -> AlertResult<Responder>;
}

/// Maps a named escalation tier to its notification targets.
pub trait EscalationDirectory: Send + Sync {
    fn resolve_tier(&self, name: &str) -> Option<Vec<Target>>;
}

/// Weekday-keyed shift roster (keys: "monday" .. "sunday", lowercase).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftRoster {
    shifts: HashMap<String, Responder>,
}

impl ShiftRoster {
    pub fn new(shifts: HashMap<String, Responder>) -> Self {
        Self { shifts }
    }

    /// Load the roster from a JSON file, falling back to the default demo
    /// roster when the file is missing or unparseable.
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(roster) => roster,
                Err(e) => {
                    warn!("Roster: failed to parse {:?}: {}, using default roster", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    fn lookup(&self, day: Weekday) -> AlertResult<Responder> {
        let key = weekday_key(day);
        self.shifts
            .get(key)
            .cloned()
            .ok_or_else(|| AlertError::DirectoryUnavailable(format!("no shift entry for {}", key)))
    }
}

impl Default for ShiftRoster {
    fn default() -> Self {
        let alice = Responder {
            name: "Alice".to_string(),
            contact: "alice@company.com".to_string(),
            phone: Some("+1-555-0101".to_string()),
        };
        let bob = Responder {
            name: "Bob".to_string(),
            contact: "bob@company.com".to_string(),
            phone: Some("+1-555-0102".to_string()),
        };
        let charlie = Responder {
            name: "Charlie".to_string(),
            contact: "charlie@company.com".to_string(),
            phone: Some("+1-555-0103".to_string()),
        };
        let mut shifts = HashMap::new();
        shifts.insert("monday".to_string(), alice.clone());
        shifts.insert("tuesday".to_string(), bob.clone());
        shifts.insert("wednesday".to_string(), charlie.clone());
        shifts.insert("thursday".to_string(), alice.clone());
        shifts.insert("friday".to_string(), bob);
        shifts.insert("saturday".to_string(), charlie);
        shifts.insert("sunday".to_string(), alice);
        Self { shifts }
    }
}

impl OnCallDirectory for ShiftRoster {
    fn current_responder(&self, now: DateTime<Utc>) -> AlertResult<Responder> {
        self.lookup(now.weekday())
    }

    fn next_responder(&self, now: DateTime<Utc>) -> AlertResult<Responder> {
        self.lookup((now + Duration::days(1)).weekday())
    }
}

fn weekday_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Escalation tiers served from the alert configuration's group map.
pub struct ConfigTiers {
    groups: HashMap<String, Vec<Target>>,
}

impl ConfigTiers {
    pub fn from_config(config: &AlertConfig) -> Self {
        let groups = config
            .escalation_groups
            .iter()
            .map(|(tier, contacts)| {
                let targets = contacts
                    .iter()
                    .map(|contact| Target::new(contact, contact))
                    .collect();
                (tier.clone(), targets)
            })
            .collect();
        Self { groups }
    }
}

impl EscalationDirectory for ConfigTiers {
    fn resolve_tier(&self, name: &str) -> Option<Vec<Target>> {
        self.groups.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // 2024-01-01 was a Monday
    fn monday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_current_responder_by_weekday() {
        let roster = ShiftRoster::default();
        assert_eq!(roster.current_responder(monday()).unwrap().name, "Alice");
        let tuesday = monday() + Duration::days(1);
        assert_eq!(roster.current_responder(tuesday).unwrap().name, "Bob");
        let wednesday = monday() + Duration::days(2);
        assert_eq!(roster.current_responder(wednesday).unwrap().name, "Charlie");
    }

    #[test]
    fn test_next_responder_is_next_period() {
        let roster = ShiftRoster::default();
        assert_eq!(roster.next_responder(monday()).unwrap().name, "Bob");
        // sunday -> monday wraps to Alice again; a repeat is allowed
        let sunday = monday() + Duration::days(6);
        assert_eq!(roster.next_responder(sunday).unwrap().name, "Alice");
    }

    #[test]
    fn test_missing_shift_entry_is_directory_unavailable() {
        let roster = ShiftRoster::new(HashMap::new());
        match roster.current_responder(monday()) {
            Err(AlertError::DirectoryUnavailable(detail)) => {
                assert!(detail.contains("monday"));
            }
            other => panic!("expected DirectoryUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_roster_round_trips_through_json() {
        let roster = ShiftRoster::default();
        let json = serde_json::to_string(&roster).unwrap();
        let parsed: ShiftRoster = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.current_responder(monday()).unwrap().name, "Alice");
    }

    #[test]
    fn test_config_tiers_resolve() {
        let tiers = ConfigTiers::from_config(&AlertConfig::default());
        let emergency = tiers.resolve_tier("emergency").unwrap();
        let contacts: Vec<&str> = emergency.iter().map(|t| t.contact.as_str()).collect();
        assert_eq!(contacts, vec!["charlie@company.com", "david@company.com"]);
        assert!(tiers.resolve_tier("no-such-tier").is_none());
    }
}
