//! Configuration module
//!
//! Provides centralized configuration:
//! - Alert/escalation settings (timeouts, attempts, tiers) from a JSON file
//! - Portable paths under `$HOME/.oncall-alerts/` (replaces hard-coded paths)
//!
//! Missing or unparseable files fall back to the built-in defaults so the
//! engine can always start.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Alert management settings. Every field has a default, so a config file
/// only needs to spell out what it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// How long to wait before the first escalation (minutes)
    pub timeout_minutes: u64,
    /// Maximum escalation attempts before going to the leads tier
    pub escalation_attempts: u32,
    /// Delay between escalation attempts (minutes)
    pub escalation_delay_minutes: u64,
    /// Tier name -> notification contacts
    pub escalation_groups: HashMap<String, Vec<String>>,
    /// Tier notified when individual escalation is exhausted
    pub leads_tier: String,
    /// Quick actions offered with a fresh alert
    pub quick_reply_options: Vec<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        let mut groups = HashMap::new();
        groups.insert(
            "devops-leads".to_string(),
            vec!["alice@company.com".to_string(), "bob@company.com".to_string()],
        );
        groups.insert(
            "emergency".to_string(),
            vec!["charlie@company.com".to_string(), "david@company.com".to_string()],
        );
        groups.insert(
            "management".to_string(),
            vec!["manager@company.com".to_string()],
        );
        Self {
            timeout_minutes: 15,
            escalation_attempts: 3,
            escalation_delay_minutes: 30,
            escalation_groups: groups,
            leads_tier: "emergency".to_string(),
            quick_reply_options: vec![
                "✅ Acknowledge".to_string(),
                "⏰ Snooze 15m".to_string(),
                "⏰ Snooze 30m".to_string(),
                "❌ Ignore".to_string(),
            ],
        }
    }
}

impl AlertConfig {
    /// Load from the default config file location.
    pub fn load() -> Self {
        Self::load_from(&Config::config_file_path())
    }

    /// Load from `path`; a missing file or parse error yields the defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Config: failed to parse {:?}: {}, using defaults", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Initial window before the first escalation.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes * 60)
    }

    /// Window between subsequent escalations.
    pub fn escalation_delay(&self) -> Duration {
        Duration::from_secs(self.escalation_delay_minutes * 60)
    }
}

/// Path helpers
pub struct Config;

impl Config {
    /// Config file: `$HOME/.oncall-alerts/config.json`, temp dir as fallback.
    pub fn config_file_path() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".oncall-alerts").join("config.json");
        }
        std::env::temp_dir().join("oncall-alerts-config.json")
    }

    /// Shift roster file: `$HOME/.oncall-alerts/roster.json`.
    pub fn roster_file_path() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".oncall-alerts").join("roster.json");
        }
        std::env::temp_dir().join("oncall-alerts-roster.json")
    }

    /// Log file: `$HOME/.oncall-alerts/debug.log`.
    pub fn log_file_path() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".oncall-alerts").join("debug.log");
        }
        std::env::temp_dir().join("oncall-alerts-debug.log")
    }

    /// Create the directory containing the log file if it doesn't exist.
    pub fn ensure_log_directory() -> std::io::Result<()> {
        if let Some(parent) = Self::log_file_path().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_shipped_policy() {
        let config = AlertConfig::default();
        assert_eq!(config.timeout_minutes, 15);
        assert_eq!(config.escalation_attempts, 3);
        assert_eq!(config.escalation_delay_minutes, 30);
        assert_eq!(config.leads_tier, "emergency");
        assert_eq!(config.quick_reply_options.len(), 4);
        assert!(config.escalation_groups.contains_key("emergency"));
        assert!(config.escalation_groups.contains_key("devops-leads"));
    }

    #[test]
    fn test_partial_json_keeps_defaults_for_the_rest() {
        let config: AlertConfig =
            serde_json::from_str(r#"{"timeout_minutes": 5, "leads_tier": "management"}"#).unwrap();
        assert_eq!(config.timeout_minutes, 5);
        assert_eq!(config.leads_tier, "management");
        assert_eq!(config.escalation_attempts, 3);
        assert_eq!(config.timeout(), Duration::from_secs(5 * 60));
    }

    #[test]
    fn test_load_from_missing_file_is_default() {
        let config = AlertConfig::load_from(Path::new("/nonexistent/oncall-config.json"));
        assert_eq!(config.timeout_minutes, 15);
    }

    #[test]
    fn test_durations() {
        let config = AlertConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(900));
        assert_eq!(config.escalation_delay(), Duration::from_secs(1800));
    }
}
