//! Operator-desired settings.
//!
//! The command store is the only state written from outside the tick loop.
//! Every field is an atomic that only operator actions write, and every write
//! is clamped to the configured safe range. The controller reads the store
//! once per cycle, in `init_respiratory_cycle`, and commits the snapshot as the
//! active settings for that breath. A command issued mid-breath is therefore
//! never seen before the next cycle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

/// One adjustable operator setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Setting {
    CyclesPerMinute,
    MinPeep,
    MaxPlateauPressure,
    MaxPeakPressure,
    Aperture,
}

impl Setting {
    pub const ALL: [Setting; 5] = [
        Self::CyclesPerMinute,
        Self::MinPeep,
        Self::MaxPlateauPressure,
        Self::MaxPeakPressure,
        Self::Aperture,
    ];
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CyclesPerMinute => "cycles_per_minute",
            Self::MinPeep => "min_peep",
            Self::MaxPlateauPressure => "max_plateau_pressure",
            Self::MaxPeakPressure => "max_peak_pressure",
            Self::Aperture => "aperture",
        };
        f.write_str(name)
    }
}

/// Direction of an operator adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    Decrease,
    Increase,
}

/// Values of all operator settings (mmH2O for pressures, servo degrees for aperture).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub cycles_per_minute: u16,
    pub min_peep: u16,
    pub max_plateau_pressure: u16,
    pub max_peak_pressure: u16,
    pub aperture: u16,
}

impl Settings {
    pub fn get(&self, setting: Setting) -> u16 {
        match setting {
            Setting::CyclesPerMinute => self.cycles_per_minute,
            Setting::MinPeep => self.min_peep,
            Setting::MaxPlateauPressure => self.max_plateau_pressure,
            Setting::MaxPeakPressure => self.max_peak_pressure,
            Setting::Aperture => self.aperture,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cycles_per_minute: 20,
            min_peep: 50,
            max_plateau_pressure: 300,
            max_peak_pressure: 400,
            aperture: 60,
        }
    }
}

/// Inclusive safe range and step of one setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingLimit {
    pub min: u16,
    pub max: u16,
    pub step: u16,
}

impl SettingLimit {
    pub const fn new(min: u16, max: u16, step: u16) -> Self {
        Self { min, max, step }
    }

    pub fn range(&self) -> RangeInclusive<u16> {
        self.min..=self.max
    }

    pub fn clamp(&self, value: u16) -> u16 {
        value.clamp(self.min, self.max)
    }

    /// Value after one adjustment, kept inside the range.
    pub fn adjust(&self, value: u16, adjustment: Adjustment) -> u16 {
        let next = match adjustment {
            Adjustment::Decrease => value.saturating_sub(self.step),
            Adjustment::Increase => value.saturating_add(self.step),
        };
        self.clamp(next)
    }
}

/// Safe ranges of all operator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLimits {
    pub cycles_per_minute: SettingLimit,
    pub min_peep: SettingLimit,
    pub max_plateau_pressure: SettingLimit,
    pub max_peak_pressure: SettingLimit,
    pub aperture: SettingLimit,
}

impl CommandLimits {
    pub fn get(&self, setting: Setting) -> SettingLimit {
        match setting {
            Setting::CyclesPerMinute => self.cycles_per_minute,
            Setting::MinPeep => self.min_peep,
            Setting::MaxPlateauPressure => self.max_plateau_pressure,
            Setting::MaxPeakPressure => self.max_peak_pressure,
            Setting::Aperture => self.aperture,
        }
    }
}

impl Default for CommandLimits {
    fn default() -> Self {
        Self {
            cycles_per_minute: SettingLimit::new(5, 35, 1),
            min_peep: SettingLimit::new(0, 300, 10),
            max_plateau_pressure: SettingLimit::new(100, 400, 10),
            max_peak_pressure: SettingLimit::new(100, 700, 10),
            aperture: SettingLimit::new(0, 90, 5),
        }
    }
}

/// Lock-free store of operator commands.
#[derive(Debug)]
pub struct CommandStore {
    limits: CommandLimits,
    cycles_per_minute: AtomicU16,
    min_peep: AtomicU16,
    max_plateau_pressure: AtomicU16,
    max_peak_pressure: AtomicU16,
    aperture: AtomicU16,
}

impl CommandStore {
    /// Create a store holding `initial`, each value clamped to its limit.
    pub fn new(initial: Settings, limits: CommandLimits) -> Self {
        let init = |s: Setting| AtomicU16::new(limits.get(s).clamp(initial.get(s)));
        Self {
            limits,
            cycles_per_minute: init(Setting::CyclesPerMinute),
            min_peep: init(Setting::MinPeep),
            max_plateau_pressure: init(Setting::MaxPlateauPressure),
            max_peak_pressure: init(Setting::MaxPeakPressure),
            aperture: init(Setting::Aperture),
        }
    }

    fn slot(&self, setting: Setting) -> &AtomicU16 {
        match setting {
            Setting::CyclesPerMinute => &self.cycles_per_minute,
            Setting::MinPeep => &self.min_peep,
            Setting::MaxPlateauPressure => &self.max_plateau_pressure,
            Setting::MaxPeakPressure => &self.max_peak_pressure,
            Setting::Aperture => &self.aperture,
        }
    }

    pub fn limits(&self) -> &CommandLimits {
        &self.limits
    }

    pub fn get(&self, setting: Setting) -> u16 {
        self.slot(setting).load(Ordering::Acquire)
    }

    /// Apply one adjustment and return the new command value.
    pub fn adjust(&self, setting: Setting, adjustment: Adjustment) -> u16 {
        let limit = self.limits.get(setting);
        let previous = self
            .slot(setting)
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                Some(limit.adjust(v, adjustment))
            })
            .unwrap_or_else(|v| v);
        let value = limit.adjust(previous, adjustment);
        tracing::debug!(setting = %setting, ?adjustment, value, "operator command");
        value
    }

    /// Set a command directly, clamped to its limit. Returns the stored value.
    pub fn set(&self, setting: Setting, value: u16) -> u16 {
        let value = self.limits.get(setting).clamp(value);
        self.slot(setting).store(value, Ordering::Release);
        value
    }

    pub fn snapshot(&self) -> Settings {
        Settings {
            cycles_per_minute: self.get(Setting::CyclesPerMinute),
            min_peep: self.get(Setting::MinPeep),
            max_plateau_pressure: self.get(Setting::MaxPlateauPressure),
            max_peak_pressure: self.get(Setting::MaxPeakPressure),
            aperture: self.get(Setting::Aperture),
        }
    }
}

/// Cloneable handle to the command store for the operator-input context.
#[derive(Debug, Clone)]
pub struct CommandHandle(Arc<CommandStore>);

impl CommandHandle {
    pub fn new(store: CommandStore) -> Self {
        Self(Arc::new(store))
    }

    pub fn on_cycle_minus(&self) -> u16 {
        self.0.adjust(Setting::CyclesPerMinute, Adjustment::Decrease)
    }

    pub fn on_cycle_plus(&self) -> u16 {
        self.0.adjust(Setting::CyclesPerMinute, Adjustment::Increase)
    }

    pub fn on_peep_minus(&self) -> u16 {
        self.0.adjust(Setting::MinPeep, Adjustment::Decrease)
    }

    pub fn on_peep_plus(&self) -> u16 {
        self.0.adjust(Setting::MinPeep, Adjustment::Increase)
    }

    pub fn on_plateau_pressure_minus(&self) -> u16 {
        self.0
            .adjust(Setting::MaxPlateauPressure, Adjustment::Decrease)
    }

    pub fn on_plateau_pressure_plus(&self) -> u16 {
        self.0
            .adjust(Setting::MaxPlateauPressure, Adjustment::Increase)
    }

    pub fn on_peak_pressure_minus(&self) -> u16 {
        self.0.adjust(Setting::MaxPeakPressure, Adjustment::Decrease)
    }

    pub fn on_peak_pressure_plus(&self) -> u16 {
        self.0.adjust(Setting::MaxPeakPressure, Adjustment::Increase)
    }
}

impl std::ops::Deref for CommandHandle {
    type Target = CommandStore;

    fn deref(&self) -> &CommandStore {
        &self.0
    }
}
