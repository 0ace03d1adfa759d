//! Pressure-control core of a mechanical ventilator.
//!
//! Given a stream of pressure samples and a set of operator targets, the
//! [`PressureController`] drives a blower-side and a patient-side valve
//! through inhalation, plateau and exhalation, while four debounced
//! safeguards keep peak pressure, plateau pressure and PEEP inside bounds.
//!
//! # Architecture
//!
//! - **Cycle timing** ([`cycle`]): breaths per minute to phase boundaries in centiseconds
//! - **Phases** ([`phase`]): closed state set with a forward-only transition
//! - **Safeguards** ([`safeguard`]): hysteresis state machines, evaluated after the phase policy
//! - **Commands** ([`command`]): lock-free operator settings, committed once per cycle
//! - **Actuators** ([`actuator`]): the valve seam; the controller only sets target apertures
//!
//! # Design Principles
//!
//! - **Infallible tick path**: configuration is validated once, up front
//! - **Single writer per field**: operators write commands, the tick loop writes everything else
//! - **Bounded work**: every tick is a fixed amount of branch-driven integer arithmetic

pub mod actuator;
pub mod command;
pub mod config;
pub mod controller;
pub mod cycle;
pub mod error;
pub mod measured;
pub mod phase;
pub mod safeguard;

pub use actuator::{Actuator, Aperture, PinchValve, ValveMotion};
pub use command::{
    Adjustment, CommandHandle, CommandLimits, CommandStore, Setting, SettingLimit, Settings,
};
pub use config::{ApertureConfig, ControllerConfig, PhaseTimingConfig};
pub use controller::{ControllerSnapshot, CycleMeasurements, PressureController};
pub use cycle::CycleTiming;
pub use error::{ControlError, ControlResult};
pub use measured::PressureLatch;
pub use phase::{CyclePhase, CycleState, CycleSubPhase, ExhalationMode};
pub use safeguard::{
    DebounceState, DebounceWindows, Debouncer, SafeguardBank, SafeguardConfig, SafeguardKind,
};
