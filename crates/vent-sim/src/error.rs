//! Error types for bench simulation.

use thiserror::Error;

/// Errors encountered while loading or running a scenario.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Invalid scenario: {what}")]
    InvalidScenario { what: String },

    #[error("Non-physical condition: {what}")]
    NonPhysical { what: &'static str },

    #[error("Controller error: {0}")]
    Control(#[from] vent_controls::ControlError),

    #[error("Core error: {0}")]
    Core(#[from] vent_core::VentError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type SimResult<T> = Result<T, SimError>;
