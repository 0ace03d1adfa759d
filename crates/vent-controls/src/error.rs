//! Error types for controller construction and configuration.

use thiserror::Error;

/// Result type for control system operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors raised while building a controller.
///
/// The per-tick path never fails; these only come out of configuration checks.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Configuration value rejected by validation.
    #[error("Invalid configuration: {field} = {value} ({reason})")]
    InvalidConfig {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// Error bubbled up from the shared foundation crate.
    #[error("Core error: {message}")]
    Core { message: String },
}

impl ControlError {
    pub(crate) fn config(field: &'static str, value: impl ToString, reason: &'static str) -> Self {
        Self::InvalidConfig {
            field,
            value: value.to_string(),
            reason,
        }
    }
}

impl From<vent_core::VentError> for ControlError {
    fn from(e: vent_core::VentError) -> Self {
        ControlError::Core {
            message: e.to_string(),
        }
    }
}
