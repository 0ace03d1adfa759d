//! Closed-loop driver: the controller breathing into the lung model.
//!
//! Per tick, in this order:
//! - inject any operator adjustments scheduled for this centisecond (or, on
//!   the last tick, any scheduled beyond the end of the breath)
//! - latch the sensor reading and hand it to the controller
//! - run the controller tick (valves move one servo step)
//! - advance the patient circuit with the new valve openings

use crate::error::SimResult;
use crate::lung::LungModel;
use crate::scenario::{OperatorEvent, Scenario};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vent_controls::{
    Actuator, CommandHandle, PinchValve, PressureController, PressureLatch, SafeguardBank,
    SafeguardKind,
};
use vent_core::timing::TICK_SECONDS;
use vent_core::units::MmH2O;

pub type BenchController = PressureController<PinchValve, PinchValve>;

/// Safeguard activations, one counter per safeguard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeguardCounts {
    pub peak_pressure: u32,
    pub plateau_pressure: u32,
    pub peep_hold: u32,
    pub peep_maintain: u32,
}

impl SafeguardCounts {
    pub fn from_bank(bank: &SafeguardBank) -> Self {
        Self {
            peak_pressure: bank.activations(SafeguardKind::PeakPressure),
            plateau_pressure: bank.activations(SafeguardKind::PlateauPressure),
            peep_hold: bank.activations(SafeguardKind::PeepHold),
            peep_maintain: bank.activations(SafeguardKind::PeepMaintain),
        }
    }

    pub fn since(self, earlier: Self) -> Self {
        Self {
            peak_pressure: self.peak_pressure - earlier.peak_pressure,
            plateau_pressure: self.plateau_pressure - earlier.plateau_pressure,
            peep_hold: self.peep_hold - earlier.peep_hold,
            peep_maintain: self.peep_maintain - earlier.peep_maintain,
        }
    }

    pub fn get(&self, kind: SafeguardKind) -> u32 {
        match kind {
            SafeguardKind::PeakPressure => self.peak_pressure,
            SafeguardKind::PlateauPressure => self.plateau_pressure,
            SafeguardKind::PeepHold => self.peep_hold,
            SafeguardKind::PeepMaintain => self.peep_maintain,
        }
    }
}

/// Summary of one completed breath.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle_nb: u32,
    pub cycles_per_minute: u16,
    pub centi_sec_per_cycle: u16,
    pub min_peep: u16,
    pub max_plateau_pressure: u16,
    pub max_peak_pressure: u16,
    pub peak_pressure: MmH2O,
    pub plateau_pressure: MmH2O,
    pub peep: MmH2O,
    /// Lowest and highest samples seen during the breath.
    pub min_sample: MmH2O,
    pub max_sample: MmH2O,
    /// Safeguards that armed during this breath.
    pub activations: SafeguardCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub scenario: String,
    pub ticks: u64,
    pub records: Vec<CycleRecord>,
}

/// Controller, circuit and sensor latch wired together.
pub struct Bench {
    controller: BenchController,
    lung: LungModel,
    latch: Arc<PressureLatch>,
    commands: CommandHandle,
    ticks: u64,
}

impl Bench {
    pub fn new(scenario: &Scenario) -> SimResult<Self> {
        scenario.validate()?;
        let closed = scenario.controller.apertures.closed;
        let controller = PressureController::new(
            scenario.controller.clone(),
            PinchValve::new(scenario.valves.blower.clone(), closed),
            PinchValve::new(scenario.valves.patient.clone(), closed),
        )?;
        let lung = LungModel::new(scenario.lung.clone())?;
        let latch = PressureLatch::shared(lung.measure());
        let commands = controller.command_handle();

        let mut bench = Self {
            controller,
            lung,
            latch,
            commands,
            ticks: 0,
        };
        bench.controller.setup();
        Ok(bench)
    }

    pub fn controller(&self) -> &BenchController {
        &self.controller
    }

    pub fn lung(&self) -> &LungModel {
        &self.lung
    }

    pub fn latch(&self) -> &Arc<PressureLatch> {
        &self.latch
    }

    /// Handle an operator panel would hold.
    pub fn commands(&self) -> &CommandHandle {
        &self.commands
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one full breath, applying `events` at their scheduled centisecond.
    pub fn run_cycle<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a OperatorEvent>,
    ) -> SimResult<CycleRecord> {
        let events: Vec<&OperatorEvent> = events.into_iter().collect();

        let before = SafeguardCounts::from_bank(self.controller.safeguards());
        self.controller.init_respiratory_cycle();
        let cycle_ticks = self.controller.centi_sec_per_cycle();

        let mut min_sample = MmH2O::MAX;
        let mut max_sample = MmH2O::MIN;
        // Events scheduled past the end of a shortened breath land on its last tick
        let last_tick = cycle_ticks.saturating_sub(1);
        for centi_sec in 0..cycle_ticks {
            for event in events.iter().filter(|e| e.at_centisec.min(last_tick) == centi_sec) {
                if event.at_centisec > last_tick {
                    tracing::debug!(
                        action = ?event.action,
                        at_centisec = event.at_centisec,
                        cycle_ticks,
                        "event past end of breath, applied on last tick"
                    );
                }
                for _ in 0..event.repeat {
                    event.action.apply(&self.commands);
                }
            }

            self.latch.store(self.lung.measure());
            let sample = self.latch.load();
            min_sample = min_sample.min(sample);
            max_sample = max_sample.max(sample);

            self.controller.update_pressure(sample);
            self.controller.compute(centi_sec);

            let blower = self.controller.blower().opening_fraction();
            let patient = self.controller.patient().opening_fraction();
            self.lung.step(blower, patient, TICK_SECONDS)?;
            self.ticks += 1;
        }

        let c = &self.controller;
        let record = CycleRecord {
            cycle_nb: c.cycle_nb(),
            cycles_per_minute: c.cycles_per_minute(),
            centi_sec_per_cycle: cycle_ticks,
            min_peep: c.min_peep(),
            max_plateau_pressure: c.max_plateau_pressure(),
            max_peak_pressure: c.max_peak_pressure(),
            peak_pressure: c.peak_pressure(),
            plateau_pressure: c.plateau_pressure(),
            peep: c.peep(),
            min_sample,
            max_sample,
            activations: SafeguardCounts::from_bank(c.safeguards()).since(before),
        };
        tracing::debug!(
            cycle = record.cycle_nb,
            peak = record.peak_pressure,
            plateau = record.plateau_pressure,
            peep = record.peep,
            blower_position = c.blower().position(),
            "breath complete"
        );
        Ok(record)
    }
}

/// Run every breath of a scenario.
pub fn run_scenario(scenario: &Scenario) -> SimResult<SessionReport> {
    run_scenario_with_progress(scenario, None)
}

/// Run every breath of a scenario, reporting each completed breath.
pub fn run_scenario_with_progress(
    scenario: &Scenario,
    mut progress: Option<&mut dyn FnMut(&CycleRecord)>,
) -> SimResult<SessionReport> {
    let mut bench = Bench::new(scenario)?;
    let mut records = Vec::with_capacity(scenario.cycles as usize);
    for cycle in 1..=scenario.cycles {
        let record = bench.run_cycle(scenario.events_for(cycle))?;
        if let Some(cb) = progress.as_deref_mut() {
            cb(&record);
        }
        records.push(record);
    }
    tracing::info!(
        scenario = %scenario.name,
        cycles = records.len(),
        ticks = bench.ticks(),
        "scenario complete"
    );
    Ok(SessionReport {
        scenario: scenario.name.clone(),
        ticks: bench.ticks(),
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bench_starts_closed() {
        let bench = Bench::new(&Scenario::new("setup", 1)).unwrap();
        assert_eq!(bench.controller().blower().command(), 0);
        assert_eq!(bench.controller().patient().command(), 0);
        assert_eq!(bench.controller().cycle_nb(), 0);
    }

    #[test]
    fn one_breath_runs_every_tick() {
        let mut bench = Bench::new(&Scenario::new("one", 1)).unwrap();
        let record = bench.run_cycle(std::iter::empty()).unwrap();
        assert_eq!(record.cycle_nb, 1);
        assert_eq!(record.centi_sec_per_cycle, 300);
        assert_eq!(bench.ticks(), 300);
        assert_eq!(bench.latch().sample_count(), 300);
        assert!(record.peak_pressure > 0);
        assert!(record.max_sample >= record.peak_pressure);
    }

    #[test]
    fn counts_difference() {
        let later = SafeguardCounts {
            peak_pressure: 3,
            plateau_pressure: 1,
            peep_hold: 5,
            peep_maintain: 2,
        };
        let earlier = SafeguardCounts {
            peak_pressure: 1,
            plateau_pressure: 1,
            peep_hold: 2,
            peep_maintain: 0,
        };
        let d = later.since(earlier);
        assert_eq!(d.get(SafeguardKind::PeakPressure), 2);
        assert_eq!(d.get(SafeguardKind::PlateauPressure), 0);
        assert_eq!(d.get(SafeguardKind::PeepHold), 3);
        assert_eq!(d.get(SafeguardKind::PeepMaintain), 2);
    }
}
