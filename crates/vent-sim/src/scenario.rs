//! Bench scenario files.
//!
//! A scenario bundles a controller configuration, the patient circuit, the
//! two valve motion models, how many breaths to run, and operator adjustments
//! to inject along the way.

use crate::error::{SimError, SimResult};
use crate::lung::LungParams;
use serde::{Deserialize, Serialize};
use std::path::Path;
use vent_controls::{CommandHandle, ControllerConfig, ValveMotion};
use vent_core::timing::CENTISEC_PER_MINUTE;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValveParams {
    #[serde(default)]
    pub blower: ValveMotion,
    #[serde(default)]
    pub patient: ValveMotion,
}

/// One of the eight operator adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorAction {
    CycleMinus,
    CyclePlus,
    PeepMinus,
    PeepPlus,
    PlateauPressureMinus,
    PlateauPressurePlus,
    PeakPressureMinus,
    PeakPressurePlus,
}

impl OperatorAction {
    /// Apply the adjustment and return the new command value.
    pub fn apply(self, commands: &CommandHandle) -> u16 {
        match self {
            Self::CycleMinus => commands.on_cycle_minus(),
            Self::CyclePlus => commands.on_cycle_plus(),
            Self::PeepMinus => commands.on_peep_minus(),
            Self::PeepPlus => commands.on_peep_plus(),
            Self::PlateauPressureMinus => commands.on_plateau_pressure_minus(),
            Self::PlateauPressurePlus => commands.on_plateau_pressure_plus(),
            Self::PeakPressureMinus => commands.on_peak_pressure_minus(),
            Self::PeakPressurePlus => commands.on_peak_pressure_plus(),
        }
    }
}

/// Operator adjustment issued during a given breath.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorEvent {
    /// Breath number (1-based) during which the adjustment is made.
    pub cycle: u32,
    /// Centiseconds into that breath.
    #[serde(default)]
    pub at_centisec: u16,
    pub action: OperatorAction,
    /// How many times the adjustment is repeated.
    #[serde(default = "default_repeat")]
    pub repeat: u16,
}

fn default_repeat() -> u16 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub cycles: u32,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub lung: LungParams,
    #[serde(default)]
    pub valves: ValveParams,
    #[serde(default)]
    pub events: Vec<OperatorEvent>,
}

impl Scenario {
    /// Default controller and circuit, run for `cycles` breaths.
    pub fn new(name: impl Into<String>, cycles: u32) -> Self {
        Self {
            name: name.into(),
            cycles,
            controller: ControllerConfig::default(),
            lung: LungParams::default(),
            valves: ValveParams::default(),
            events: Vec::new(),
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.cycles == 0 {
            return Err(SimError::InvalidScenario {
                what: "cycles must be at least 1".to_string(),
            });
        }
        self.controller.validate()?;
        self.lung.validate()?;

        let full_open = f64::from(self.controller.apertures.full_open);
        for (name, motion) in [("blower", &self.valves.blower), ("patient", &self.valves.patient)] {
            ValveMotion::new(motion.tau, motion.rate_limit, motion.full_open)?;
            if motion.full_open < full_open {
                return Err(SimError::InvalidScenario {
                    what: format!(
                        "{name} valve opens to {} but the controller commands up to {}",
                        motion.full_open, full_open
                    ),
                });
            }
        }

        // cycles_per_minute.min is non-zero once the controller config validated
        let longest_breath =
            CENTISEC_PER_MINUTE / self.controller.limits.cycles_per_minute.min.max(1);
        for event in &self.events {
            if event.cycle == 0 || event.cycle > self.cycles {
                return Err(SimError::InvalidScenario {
                    what: format!(
                        "event {:?} targets cycle {} outside 1..={}",
                        event.action, event.cycle, self.cycles
                    ),
                });
            }
            if event.at_centisec >= longest_breath {
                return Err(SimError::InvalidScenario {
                    what: format!(
                        "event {:?} at {} cs falls after the longest possible breath ({} cs)",
                        event.action, event.at_centisec, longest_breath
                    ),
                });
            }
        }
        Ok(())
    }

    /// Events to apply during breath `cycle`.
    pub fn events_for(&self, cycle: u32) -> impl Iterator<Item = &OperatorEvent> {
        self.events.iter().filter(move |e| e.cycle == cycle)
    }
}

pub fn from_yaml_str(content: &str) -> SimResult<Scenario> {
    let scenario: Scenario = serde_yaml::from_str(content)?;
    scenario.validate()?;
    Ok(scenario)
}

pub fn load_yaml(path: &Path) -> SimResult<Scenario> {
    let content = std::fs::read_to_string(path)?;
    from_yaml_str(&content)
}

pub fn save_yaml(path: &Path, scenario: &Scenario) -> SimResult<()> {
    scenario.validate()?;
    let content = serde_yaml::to_string(scenario)?;
    std::fs::write(path, content)?;
    Ok(())
}
