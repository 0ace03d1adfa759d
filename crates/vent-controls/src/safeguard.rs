//! Debounced safety-threshold detectors.
//!
//! Each safeguard watches one condition and runs the same hysteresis:
//!
//! ```text
//!   Clear --cond--> Detecting(since) --cond held >= detect--> Armed
//!     ^                 |                                       |
//!     +-----!cond-------+                                     !cond
//!     |                                                         v
//!     +------------!cond held >= suppress------------ Suppressing(since)
//!                                                 (cond --> Armed)
//! ```
//!
//! A safeguard corrects the actuator commands while it is `Armed` or
//! `Suppressing`. Single noisy samples therefore neither arm nor disarm it.

use serde::{Deserialize, Serialize};
use std::fmt;
use vent_core::timing::Tick;

/// Debounce windows in centiseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceWindows {
    /// How long the condition must hold before arming.
    pub detect: u16,
    /// How long the condition must stay cleared before disarming.
    pub suppress: u16,
}

impl DebounceWindows {
    pub const fn new(detect: u16, suppress: u16) -> Self {
        Self { detect, suppress }
    }
}

/// Hysteresis state of one safeguard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DebounceState {
    Clear,
    Detecting { since: Tick },
    Armed,
    Suppressing { since: Tick },
}

impl DebounceState {
    pub fn is_armed(self) -> bool {
        matches!(self, Self::Armed | Self::Suppressing { .. })
    }

    /// Transition function of the debounce state machine.
    pub fn next(self, condition: bool, now: Tick, windows: DebounceWindows) -> Self {
        let elapsed = |since: Tick| now.saturating_sub(since);
        match (self, condition) {
            (Self::Clear, false) => Self::Clear,
            (Self::Clear, true) => Self::Detecting { since: now }.next(true, now, windows),
            (Self::Detecting { since }, true) => {
                if elapsed(since) >= Tick::from(windows.detect) {
                    Self::Armed
                } else {
                    self
                }
            }
            (Self::Detecting { .. }, false) => Self::Clear,
            (Self::Armed, true) => Self::Armed,
            (Self::Armed, false) => Self::Suppressing { since: now }.next(false, now, windows),
            (Self::Suppressing { .. }, true) => Self::Armed,
            (Self::Suppressing { since }, false) => {
                if elapsed(since) >= Tick::from(windows.suppress) {
                    Self::Clear
                } else {
                    self
                }
            }
        }
    }
}

impl Default for DebounceState {
    fn default() -> Self {
        Self::Clear
    }
}

/// One debounced threshold detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debouncer {
    windows: DebounceWindows,
    state: DebounceState,
    activations: u32,
}

impl Debouncer {
    pub fn new(windows: DebounceWindows) -> Self {
        Self {
            windows,
            state: DebounceState::Clear,
            activations: 0,
        }
    }

    /// Feed the condition observed at `now`. Returns whether the safeguard is armed.
    pub fn update(&mut self, condition: bool, now: Tick) -> bool {
        let was_armed = self.state.is_armed();
        self.state = self.state.next(condition, now, self.windows);
        let armed = self.state.is_armed();
        if armed && !was_armed {
            self.activations = self.activations.saturating_add(1);
        }
        armed
    }

    pub fn is_armed(&self) -> bool {
        self.state.is_armed()
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn windows(&self) -> DebounceWindows {
        self.windows
    }

    /// Number of times this safeguard went from disarmed to armed.
    pub fn activations(&self) -> u32 {
        self.activations
    }
}

/// The four safeguards, in the order they are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafeguardKind {
    PeakPressure,
    PlateauPressure,
    PeepHold,
    PeepMaintain,
}

impl SafeguardKind {
    pub const ALL: [SafeguardKind; 4] = [
        Self::PeakPressure,
        Self::PlateauPressure,
        Self::PeepHold,
        Self::PeepMaintain,
    ];
}

impl fmt::Display for SafeguardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PeakPressure => "peak_pressure",
            Self::PlateauPressure => "plateau_pressure",
            Self::PeepHold => "peep_hold",
            Self::PeepMaintain => "peep_maintain",
        };
        f.write_str(name)
    }
}

/// Debounce windows for every safeguard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeguardConfig {
    pub peak_pressure: DebounceWindows,
    pub plateau_pressure: DebounceWindows,
    pub peep_hold: DebounceWindows,
    pub peep_maintain: DebounceWindows,
}

impl SafeguardConfig {
    pub fn windows(&self, kind: SafeguardKind) -> DebounceWindows {
        match kind {
            SafeguardKind::PeakPressure => self.peak_pressure,
            SafeguardKind::PlateauPressure => self.plateau_pressure,
            SafeguardKind::PeepHold => self.peep_hold,
            SafeguardKind::PeepMaintain => self.peep_maintain,
        }
    }
}

impl Default for SafeguardConfig {
    fn default() -> Self {
        Self {
            peak_pressure: DebounceWindows::new(2, 10),
            plateau_pressure: DebounceWindows::new(3, 10),
            peep_hold: DebounceWindows::new(5, 10),
            peep_maintain: DebounceWindows::new(10, 10),
        }
    }
}

/// The four safeguards of the pressure controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeguardBank {
    peak_pressure: Debouncer,
    plateau_pressure: Debouncer,
    peep_hold: Debouncer,
    peep_maintain: Debouncer,
}

impl SafeguardBank {
    pub fn new(config: &SafeguardConfig) -> Self {
        Self {
            peak_pressure: Debouncer::new(config.peak_pressure),
            plateau_pressure: Debouncer::new(config.plateau_pressure),
            peep_hold: Debouncer::new(config.peep_hold),
            peep_maintain: Debouncer::new(config.peep_maintain),
        }
    }

    pub fn get(&self, kind: SafeguardKind) -> &Debouncer {
        match kind {
            SafeguardKind::PeakPressure => &self.peak_pressure,
            SafeguardKind::PlateauPressure => &self.plateau_pressure,
            SafeguardKind::PeepHold => &self.peep_hold,
            SafeguardKind::PeepMaintain => &self.peep_maintain,
        }
    }

    fn get_mut(&mut self, kind: SafeguardKind) -> &mut Debouncer {
        match kind {
            SafeguardKind::PeakPressure => &mut self.peak_pressure,
            SafeguardKind::PlateauPressure => &mut self.plateau_pressure,
            SafeguardKind::PeepHold => &mut self.peep_hold,
            SafeguardKind::PeepMaintain => &mut self.peep_maintain,
        }
    }

    /// Feed one safeguard and log arm/disarm edges.
    pub fn observe(&mut self, kind: SafeguardKind, condition: bool, now: Tick) -> bool {
        let debouncer = self.get_mut(kind);
        let was_armed = debouncer.is_armed();
        let armed = debouncer.update(condition, now);
        if armed && !was_armed {
            tracing::warn!(safeguard = %kind, tick = now, "safeguard armed");
        } else if was_armed && !armed {
            tracing::info!(safeguard = %kind, tick = now, "safeguard disarmed");
        }
        armed
    }

    pub fn is_armed(&self, kind: SafeguardKind) -> bool {
        self.get(kind).is_armed()
    }

    pub fn activations(&self, kind: SafeguardKind) -> u32 {
        self.get(kind).activations()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn arms_only_after_continuous_detection(
            detect in 0_u16..20,
            suppress in 0_u16..20,
            samples in prop::collection::vec(any::<bool>(), 1..200),
        ) {
            let windows = DebounceWindows::new(detect, suppress);
            let mut d = Debouncer::new(windows);
            let mut run_length: u32 = 0;
            for (now, &cond) in samples.iter().enumerate() {
                let was_armed = d.is_armed();
                let armed = d.update(cond, now as Tick);
                run_length = if cond { run_length + 1 } else { 0 };
                if armed && !was_armed {
                    // run_length counts the onset sample itself
                    prop_assert!(run_length > u32::from(detect));
                }
                if !armed && was_armed {
                    prop_assert!(!cond);
                }
            }
        }
    }
}
