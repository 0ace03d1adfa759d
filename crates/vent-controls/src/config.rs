//! Controller configuration.
//!
//! Everything here is plain serde data so a bench or firmware build can load
//! it from YAML. `ControllerConfig::validate` is the only gate between a
//! configuration file and the real-time path: once it passes, nothing on the
//! tick path can fail.

use crate::actuator::Aperture;
use crate::command::{CommandLimits, Setting, SettingLimit, Settings};
use crate::cycle::CycleTiming;
use crate::error::{ControlError, ControlResult};
use crate::safeguard::{SafeguardConfig, SafeguardKind};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU16;

/// Split of the inhalation budget between active inspiration and plateau hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimingConfig {
    /// Share of the inhalation budget, in percent, spent with the blower open.
    pub plateau_onset_percent: u8,
}

impl Default for PhaseTimingConfig {
    fn default() -> Self {
        Self {
            plateau_onset_percent: 80,
        }
    }
}

/// Fixed valve apertures used by the phase policy and the safeguards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApertureConfig {
    pub closed: Aperture,
    pub full_open: Aperture,
    /// Patient valve opening while the plateau safeguard is armed.
    pub plateau_relief: Aperture,
    /// Blower valve opening while PEEP maintain is armed.
    pub peep_maintain: Aperture,
}

impl Default for ApertureConfig {
    fn default() -> Self {
        Self {
            closed: 0,
            full_open: 90,
            plateau_relief: 30,
            peep_maintain: 20,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Initial operator settings, also the active settings of the first cycle.
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub limits: CommandLimits,
    #[serde(default)]
    pub timing: PhaseTimingConfig,
    #[serde(default)]
    pub safeguards: SafeguardConfig,
    #[serde(default)]
    pub apertures: ApertureConfig,
}

impl ControllerConfig {
    pub fn validate(&self) -> ControlResult<()> {
        for setting in Setting::ALL {
            validate_limit(setting, self.limits.get(setting))?;
            let value = self.settings.get(setting);
            if !self.limits.get(setting).range().contains(&value) {
                return Err(ControlError::config(
                    setting_field(setting),
                    value,
                    "initial setting outside its limit range",
                ));
            }
        }

        let cpm = self.limits.cycles_per_minute;
        if cpm.min == 0 {
            return Err(ControlError::config(
                "limits.cycles_per_minute.min",
                cpm.min,
                "cycles per minute must stay positive",
            ));
        }
        if self.settings.min_peep >= self.settings.max_plateau_pressure {
            return Err(ControlError::config(
                "settings.min_peep",
                self.settings.min_peep,
                "PEEP floor must be below the plateau ceiling",
            ));
        }
        if self.settings.max_plateau_pressure > self.settings.max_peak_pressure {
            return Err(ControlError::config(
                "settings.max_plateau_pressure",
                self.settings.max_plateau_pressure,
                "plateau ceiling must not exceed the peak ceiling",
            ));
        }

        if !(1..=99).contains(&self.timing.plateau_onset_percent) {
            return Err(ControlError::config(
                "timing.plateau_onset_percent",
                self.timing.plateau_onset_percent,
                "must leave room for both inspiration and plateau (1..=99)",
            ));
        }
        // Phase lengths only shrink as the rate grows, so the fastest breath decides
        let fastest = NonZeroU16::new(cpm.max).ok_or_else(|| {
            ControlError::config(
                "limits.cycles_per_minute.max",
                cpm.max,
                "cycles per minute must stay positive",
            )
        })?;
        let timing = CycleTiming::compute(fastest, self.timing.plateau_onset_percent);
        if !timing.has_every_phase() {
            return Err(ControlError::config(
                "limits.cycles_per_minute.max",
                cpm.max,
                "fastest breath leaves a phase without a single tick",
            ));
        }

        let maintain = self.safeguards.windows(SafeguardKind::PeepMaintain);
        if maintain.detect == 0 {
            return Err(ControlError::config(
                "safeguards.peep_maintain.detect",
                maintain.detect,
                "PEEP maintain must wait on PEEP hold",
            ));
        }

        let ap = &self.apertures;
        if ap.closed >= ap.full_open {
            return Err(ControlError::config(
                "apertures.closed",
                ap.closed,
                "closed aperture must be below full_open",
            ));
        }
        for (field, value) in [
            ("apertures.plateau_relief", ap.plateau_relief),
            ("apertures.peep_maintain", ap.peep_maintain),
            ("limits.aperture.max", self.limits.aperture.max),
        ] {
            if value > ap.full_open {
                return Err(ControlError::config(
                    field,
                    value,
                    "aperture beyond full_open",
                ));
            }
        }
        Ok(())
    }
}

fn setting_field(setting: Setting) -> &'static str {
    match setting {
        Setting::CyclesPerMinute => "settings.cycles_per_minute",
        Setting::MinPeep => "settings.min_peep",
        Setting::MaxPlateauPressure => "settings.max_plateau_pressure",
        Setting::MaxPeakPressure => "settings.max_peak_pressure",
        Setting::Aperture => "settings.aperture",
    }
}

fn validate_limit(setting: Setting, limit: SettingLimit) -> ControlResult<()> {
    if limit.min > limit.max {
        return Err(ControlError::config(
            setting_field(setting),
            format!("{}..={}", limit.min, limit.max),
            "limit range is inverted",
        ));
    }
    if limit.step == 0 {
        return Err(ControlError::config(
            setting_field(setting),
            limit.step,
            "adjustment step must be positive",
        ));
    }
    Ok(())
}
