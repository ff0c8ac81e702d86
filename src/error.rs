//! Crate-wide error types

use thiserror::Error;

/// Errors surfaced by the alert store and escalation engine.
///
/// Deliberately small: repeating a command against a terminal alert is a
/// silent no-op rather than an error (commands may arrive more than once from
/// an at-least-once transport), and notification failures are logged by the
/// dispatcher instead of being surfaced to callers.
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("alert {0} not found")]
    NotFound(String),

    #[error("on-call directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

/// Result type for alert operations
pub type AlertResult<T> = Result<T, AlertError>;
