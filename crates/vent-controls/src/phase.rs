//! Respiratory cycle phases.
//!
//! [`CyclePhase`] and [`CycleSubPhase`] are the plain values exposed to
//! display and telemetry layers. Internally the controller tracks a
//! [`CycleState`], which folds the two together so that a held exhalation can
//! only exist inside the exhalation phase.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of the respiratory cycle, in the order they occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Inhalation,
    Plateau,
    Exhalation,
}

/// Refinement of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleSubPhase {
    /// Blower pushing air into the patient circuit.
    Inspiration,
    /// Both valves closed at the top of the breath.
    HoldInspiration,
    /// Patient valve open to atmosphere.
    Exhale,
    /// Patient valve closed to stop the pressure from decaying below PEEP.
    HoldExhale,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inhalation => "inhalation",
            Self::Plateau => "plateau",
            Self::Exhalation => "exhalation",
        };
        f.write_str(name)
    }
}

impl fmt::Display for CycleSubPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inspiration => "inspiration",
            Self::HoldInspiration => "hold_inspiration",
            Self::Exhale => "exhale",
            Self::HoldExhale => "hold_exhale",
        };
        f.write_str(name)
    }
}

/// How the exhalation phase is currently being carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhalationMode {
    Exhale,
    Hold,
}

/// Phase and sub-phase as one closed state set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Inhalation,
    Plateau,
    Exhalation(ExhalationMode),
}

impl CycleState {
    /// State at the start of every respiratory cycle.
    pub const START: Self = Self::Inhalation;

    /// State on entry into `phase`.
    pub fn enter(phase: CyclePhase) -> Self {
        match phase {
            CyclePhase::Inhalation => Self::Inhalation,
            CyclePhase::Plateau => Self::Plateau,
            CyclePhase::Exhalation => Self::Exhalation(ExhalationMode::Exhale),
        }
    }

    pub fn phase(self) -> CyclePhase {
        match self {
            Self::Inhalation => CyclePhase::Inhalation,
            Self::Plateau => CyclePhase::Plateau,
            Self::Exhalation(_) => CyclePhase::Exhalation,
        }
    }

    pub fn sub_phase(self) -> CycleSubPhase {
        match self {
            Self::Inhalation => CycleSubPhase::Inspiration,
            Self::Plateau => CycleSubPhase::HoldInspiration,
            Self::Exhalation(ExhalationMode::Exhale) => CycleSubPhase::Exhale,
            Self::Exhalation(ExhalationMode::Hold) => CycleSubPhase::HoldExhale,
        }
    }

    /// Move towards the phase the cycle clock asks for.
    ///
    /// Phases only ever move forward within a cycle; a target earlier than the
    /// current phase leaves the state untouched, and so does a target equal to
    /// it (the exhalation mode is preserved).
    pub fn advance(self, target: CyclePhase) -> Self {
        if target > self.phase() {
            Self::enter(target)
        } else {
            self
        }
    }

    /// Switch between normal and held exhalation. No-op outside exhalation.
    pub fn with_exhalation_hold(self, hold: bool) -> Self {
        match self {
            Self::Exhalation(_) if hold => Self::Exhalation(ExhalationMode::Hold),
            Self::Exhalation(_) => Self::Exhalation(ExhalationMode::Exhale),
            other => other,
        }
    }
}

impl Default for CycleState {
    fn default() -> Self {
        Self::START
    }
}
