//! Cycle timing: breaths per minute to phase boundaries in centiseconds.
//!
//! Inhalation takes one third of the cycle. Within that budget the blower
//! pushes for `plateau_onset_percent` of the time and the remainder is the
//! no-flow plateau hold. Exhalation takes the other two thirds.

use crate::error::{ControlError, ControlResult};
use crate::phase::CyclePhase;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU16;
use vent_core::timing::{CENTISEC_PER_MINUTE, CentiSec};

/// Phase boundaries of one respiratory cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleTiming {
    /// Breaths per minute this timing was computed for.
    pub cycles_per_minute: u16,
    /// Length of the whole cycle.
    pub centi_sec_per_cycle: CentiSec,
    /// Length of inhalation, plateau included.
    pub centi_sec_per_inhalation: CentiSec,
    /// Elapsed centiseconds at which the plateau hold begins.
    pub plateau_onset: CentiSec,
}

impl CycleTiming {
    /// Compute the timing for a breath rate.
    ///
    /// `plateau_onset_percent` above 100 is treated as 100 (no plateau).
    pub fn compute(cycles_per_minute: NonZeroU16, plateau_onset_percent: u8) -> Self {
        let centi_sec_per_cycle = CENTISEC_PER_MINUTE / cycles_per_minute.get();
        let centi_sec_per_inhalation = centi_sec_per_cycle / 3;
        let onset = u32::from(centi_sec_per_inhalation) * u32::from(plateau_onset_percent.min(100))
            / 100;
        Self {
            cycles_per_minute: cycles_per_minute.get(),
            centi_sec_per_cycle,
            centi_sec_per_inhalation,
            // onset <= centi_sec_per_inhalation, so it always fits
            plateau_onset: onset as CentiSec,
        }
    }

    /// Checked variant of [`CycleTiming::compute`].
    ///
    /// # Errors
    ///
    /// Returns error if `cycles_per_minute` is zero.
    pub fn new(cycles_per_minute: u16, plateau_onset_percent: u8) -> ControlResult<Self> {
        let cpm = NonZeroU16::new(cycles_per_minute).ok_or(ControlError::InvalidArg {
            what: "cycles_per_minute must be positive",
        })?;
        Ok(Self::compute(cpm, plateau_onset_percent))
    }

    /// Phase the cycle should be in after `centisec` elapsed centiseconds.
    ///
    /// Anything at or beyond the end of the cycle stays in exhalation until the
    /// driver starts the next cycle.
    pub fn phase_at(&self, centisec: CentiSec) -> CyclePhase {
        if centisec < self.plateau_onset {
            CyclePhase::Inhalation
        } else if centisec < self.centi_sec_per_inhalation {
            CyclePhase::Plateau
        } else {
            CyclePhase::Exhalation
        }
    }

    pub fn centi_sec_per_exhalation(&self) -> CentiSec {
        self.centi_sec_per_cycle - self.centi_sec_per_inhalation
    }

    /// True when inhalation, plateau and exhalation each last at least one tick.
    pub fn has_every_phase(&self) -> bool {
        0 < self.plateau_onset
            && self.plateau_onset < self.centi_sec_per_inhalation
            && self.centi_sec_per_inhalation < self.centi_sec_per_cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_breaths_per_minute() {
        let t = CycleTiming::new(20, 80).unwrap();
        assert_eq!(t.centi_sec_per_cycle, 300);
        assert_eq!(t.centi_sec_per_inhalation, 100);
        assert_eq!(t.plateau_onset, 80);
        assert_eq!(t.centi_sec_per_exhalation(), 200);
    }

    #[test]
    fn phase_boundaries() {
        let t = CycleTiming::new(20, 80).unwrap();
        assert_eq!(t.phase_at(0), CyclePhase::Inhalation);
        assert_eq!(t.phase_at(79), CyclePhase::Inhalation);
        assert_eq!(t.phase_at(80), CyclePhase::Plateau);
        assert_eq!(t.phase_at(99), CyclePhase::Plateau);
        assert_eq!(t.phase_at(100), CyclePhase::Exhalation);
        assert_eq!(t.phase_at(299), CyclePhase::Exhalation);
        assert_eq!(t.phase_at(1000), CyclePhase::Exhalation);
    }

    #[test]
    fn integer_division_truncates() {
        let t = CycleTiming::new(7, 100).unwrap();
        assert_eq!(t.centi_sec_per_cycle, 857);
        assert_eq!(t.centi_sec_per_inhalation, 285);
        assert_eq!(t.plateau_onset, 285);
    }

    #[test]
    fn edge_onsets_drop_a_phase() {
        assert!(CycleTiming::new(20, 80).unwrap().has_every_phase());
        assert!(CycleTiming::new(35, 99).unwrap().has_every_phase());

        // Zero onset starts the breath on the plateau
        let t = CycleTiming::new(20, 0).unwrap();
        assert_eq!(t.phase_at(0), CyclePhase::Plateau);
        assert!(!t.has_every_phase());

        // Full onset never reaches the plateau
        let t = CycleTiming::new(20, 100).unwrap();
        assert!((0..300).all(|cs| t.phase_at(cs) != CyclePhase::Plateau));
        assert!(!t.has_every_phase());

        // One-centisecond inhalation truncates the onset to zero
        let t = CycleTiming::new(2000, 80).unwrap();
        assert_eq!(t.centi_sec_per_inhalation, 1);
        assert_eq!(t.plateau_onset, 0);
        assert!(!t.has_every_phase());
    }

    #[test]
    fn zero_rate_rejected() {
        assert!(CycleTiming::new(0, 80).is_err());
    }
}
