//! On-call alert lifecycle and escalation engine.
//!
//! Tracks operational alerts from creation to resolution: every alert is
//! delivered to the current on-call responder and escalated along the shift
//! roster until someone acknowledges it, snoozes it, ignores it, or the
//! leadership tier is notified.
//!
//! Modules:
//! - `alerts`: the alert entity, lifecycle states and the in-memory store
//! - `engine`: timers, escalation decisions and command handling
//! - `directory`: on-call roster and escalation-tier lookups
//! - `notify`: notification channel seam (log, webhook)
//! - `config`: escalation policy and home-directory paths
//! - `logging`: tracing setup

pub mod alerts;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod logging;
pub mod notify;

pub use alerts::{AlertStatus, AlertView};
pub use engine::EscalationEngine;
pub use error::{AlertError, AlertResult};
pub use logging::init_tracing;
