//! Pressure-controlled ventilation core.
//!
//! The driver loop owns a [`PressureController`] and, once per centisecond:
//! 1. calls [`PressureController::update_pressure`] with the latched sample
//! 2. calls [`PressureController::compute`] with the centiseconds elapsed in the cycle
//!
//! and calls [`PressureController::init_respiratory_cycle`] at every cycle
//! boundary. `compute` advances the phase, runs the phase policy, lets the
//! safeguards override it, and pushes the final apertures to both valves.

use crate::actuator::{Actuator, Aperture};
use crate::command::{CommandHandle, CommandStore, Settings};
use crate::config::ControllerConfig;
use crate::cycle::CycleTiming;
use crate::error::ControlResult;
use crate::phase::{CyclePhase, CycleState, CycleSubPhase, ExhalationMode};
use crate::safeguard::{SafeguardBank, SafeguardKind};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU16;
use vent_core::timing::{CentiSec, CycleClock, Tick};
use vent_core::units::MmH2O;

/// Pressures measured during the current cycle, in mmH2O.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleMeasurements {
    /// Highest pressure seen during inspiration.
    pub peak_pressure: MmH2O,
    /// Pressure on entry into the plateau hold.
    pub plateau_pressure: MmH2O,
    /// Latest exhalation pressure; end-expiratory once the cycle is over.
    pub peep: MmH2O,
}

/// Point-in-time view of the controller for display and telemetry layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    /// Monotonic tick of the latest control step.
    pub tick: Tick,
    pub cycle_nb: u32,
    pub phase: CyclePhase,
    pub sub_phase: CycleSubPhase,
    pub pressure: MmH2O,
    pub measurements: CycleMeasurements,
    pub active: Settings,
    pub commands: Settings,
    pub timing: CycleTiming,
    pub blower_command: Aperture,
    pub patient_command: Aperture,
}

pub struct PressureController<B: Actuator, P: Actuator> {
    config: ControllerConfig,
    commands: CommandHandle,

    // Active values: written only by init_respiratory_cycle
    active: Settings,
    timing: CycleTiming,

    // Measurements and cycle state: written only by the tick loop
    pressure: MmH2O,
    measurements: CycleMeasurements,
    state: CycleState,
    previous_phase: CyclePhase,
    cycle_nb: u32,
    clock: CycleClock,
    safeguards: SafeguardBank,

    // Apertures computed this tick
    blower_command: Aperture,
    patient_command: Aperture,

    blower: B,
    patient: P,
}

impl<B: Actuator, P: Actuator> PressureController<B, P> {
    /// Build a controller from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found by
    /// [`ControllerConfig::validate`], e.g. a breath rate that could reach zero.
    pub fn new(config: ControllerConfig, blower: B, patient: P) -> ControlResult<Self> {
        config.validate()?;
        Ok(Self::build(config, blower, patient))
    }

    /// Build a controller with the default configuration.
    pub fn with_defaults(blower: B, patient: P) -> Self {
        Self::build(ControllerConfig::default(), blower, patient)
    }

    fn build(config: ControllerConfig, blower: B, patient: P) -> Self {
        let commands = CommandHandle::new(CommandStore::new(config.settings, config.limits));
        let active = commands.snapshot();
        let timing = Self::timing_for(&config, active.cycles_per_minute);
        let closed = config.apertures.closed;
        let safeguards = SafeguardBank::new(&config.safeguards);
        Self {
            config,
            commands,
            active,
            timing,
            pressure: 0,
            measurements: CycleMeasurements::default(),
            state: CycleState::START,
            previous_phase: CyclePhase::Inhalation,
            cycle_nb: 0,
            clock: CycleClock::new(),
            safeguards,
            blower_command: closed,
            patient_command: closed,
            blower,
            patient,
        }
    }

    fn timing_for(config: &ControllerConfig, cycles_per_minute: u16) -> CycleTiming {
        // validated limits keep the rate at or above 1
        let cpm = NonZeroU16::new(cycles_per_minute).unwrap_or(NonZeroU16::MIN);
        CycleTiming::compute(cpm, config.timing.plateau_onset_percent)
    }

    /// Bring both valves to their failsafe aperture.
    pub fn setup(&mut self) {
        self.blower.setup();
        self.patient.setup();
        self.blower_command = self.blower.command();
        self.patient_command = self.patient.command();
    }

    /// Start a new respiratory cycle.
    ///
    /// Commits the operator commands as the active settings, recomputes the
    /// cycle timing and resets the per-cycle measurements and phase.
    pub fn init_respiratory_cycle(&mut self) {
        self.active = self.commands.snapshot();
        self.timing = Self::timing_for(&self.config, self.active.cycles_per_minute);
        self.state = CycleState::START;
        self.previous_phase = CyclePhase::Inhalation;
        self.measurements = CycleMeasurements::default();
        self.cycle_nb = self.cycle_nb.wrapping_add(1);
        self.clock.start_cycle();

        tracing::info!(
            cycle = self.cycle_nb,
            tick = self.clock.cycle_origin(),
            cycles_per_minute = self.active.cycles_per_minute,
            centi_sec_per_cycle = self.timing.centi_sec_per_cycle,
            min_peep = self.active.min_peep,
            max_plateau_pressure = self.active.max_plateau_pressure,
            max_peak_pressure = self.active.max_peak_pressure,
            aperture = self.active.aperture,
            "respiratory cycle started"
        );
    }

    /// Record the latest pressure sample (mmH2O).
    pub fn update_pressure(&mut self, pressure: MmH2O) {
        self.pressure = pressure;
    }

    /// Run one control tick, `centi_sec` centiseconds into the current cycle.
    pub fn compute(&mut self, centi_sec: CentiSec) {
        let now = self.clock.tick(centi_sec);

        self.update_phase(centi_sec);

        match self.state {
            CycleState::Inhalation => self.inhale(),
            CycleState::Plateau => self.plateau(),
            CycleState::Exhalation(ExhalationMode::Exhale) => self.exhale(),
            CycleState::Exhalation(ExhalationMode::Hold) => self.hold_exhalation(),
        }

        self.apply_safeguards(now);
        self.execute_commands();

        self.previous_phase = self.state.phase();
    }

    fn update_phase(&mut self, centi_sec: CentiSec) {
        let next = self.state.advance(self.timing.phase_at(centi_sec));
        if next.phase() != self.state.phase() {
            tracing::debug!(
                cycle = self.cycle_nb,
                centi_sec,
                from = %self.state.phase(),
                to = %next.phase(),
                "phase transition"
            );
        }
        self.state = next;
    }

    fn inhale(&mut self) {
        self.blower_command = self.active.aperture;
        self.patient_command = self.config.apertures.closed;
        self.measurements.peak_pressure = self.measurements.peak_pressure.max(self.pressure);
    }

    fn plateau(&mut self) {
        self.blower_command = self.config.apertures.closed;
        self.patient_command = self.config.apertures.closed;
        if self.previous_phase != CyclePhase::Plateau {
            self.measurements.plateau_pressure = self.pressure;
        }
    }

    fn exhale(&mut self) {
        self.blower_command = self.config.apertures.closed;
        self.patient_command = self.config.apertures.full_open;
        self.measurements.peep = self.pressure;
    }

    fn hold_exhalation(&mut self) {
        self.blower_command = self.config.apertures.closed;
        self.patient_command = self.config.apertures.closed;
        self.measurements.peep = self.pressure;
    }

    /// Run the four safeguards in order; a later one overrides an earlier one.
    fn apply_safeguards(&mut self, now: Tick) {
        let apertures = self.config.apertures;
        let phase = self.state.phase();
        let pressure = i32::from(self.pressure);

        // Peak: stop feeding the circuit, whatever the phase
        let over_peak = pressure > i32::from(self.active.max_peak_pressure);
        if self
            .safeguards
            .observe(SafeguardKind::PeakPressure, over_peak, now)
        {
            self.blower_command = apertures.closed;
        }

        // Plateau: vent some of the trapped volume
        let in_plateau = phase == CyclePhase::Plateau;
        let over_plateau = in_plateau && pressure > i32::from(self.active.max_plateau_pressure);
        if self
            .safeguards
            .observe(SafeguardKind::PlateauPressure, over_plateau, now)
            && in_plateau
        {
            self.blower_command = apertures.closed;
            self.patient_command = apertures.plateau_relief;
        }

        // PEEP stage 1: hold the exhalation
        let in_exhalation = phase == CyclePhase::Exhalation;
        let below_peep = in_exhalation && pressure < i32::from(self.active.min_peep);
        let hold = self
            .safeguards
            .observe(SafeguardKind::PeepHold, below_peep, now);
        if in_exhalation {
            self.state = self.state.with_exhalation_hold(hold);
            self.patient_command = if hold {
                apertures.closed
            } else {
                apertures.full_open
            };
        }

        // PEEP stage 2: only counts while stage 1 is already holding
        let maintain = self
            .safeguards
            .observe(SafeguardKind::PeepMaintain, below_peep && hold, now);
        if maintain && in_exhalation {
            self.blower_command = apertures.peep_maintain;
        }
    }

    fn execute_commands(&mut self) {
        self.blower.apply(self.blower_command);
        self.patient.apply(self.patient_command);
    }

    // Operator adjustments. These only touch the command store.

    pub fn on_cycle_minus(&self) -> u16 {
        self.commands.on_cycle_minus()
    }

    pub fn on_cycle_plus(&self) -> u16 {
        self.commands.on_cycle_plus()
    }

    pub fn on_peep_minus(&self) -> u16 {
        self.commands.on_peep_minus()
    }

    pub fn on_peep_plus(&self) -> u16 {
        self.commands.on_peep_plus()
    }

    pub fn on_plateau_pressure_minus(&self) -> u16 {
        self.commands.on_plateau_pressure_minus()
    }

    pub fn on_plateau_pressure_plus(&self) -> u16 {
        self.commands.on_plateau_pressure_plus()
    }

    pub fn on_peak_pressure_minus(&self) -> u16 {
        self.commands.on_peak_pressure_minus()
    }

    pub fn on_peak_pressure_plus(&self) -> u16 {
        self.commands.on_peak_pressure_plus()
    }

    /// Handle for adjusting commands from another execution context.
    pub fn command_handle(&self) -> CommandHandle {
        self.commands.clone()
    }

    // Command values

    pub fn cycles_per_minute_command(&self) -> u16 {
        self.commands.snapshot().cycles_per_minute
    }

    pub fn max_peak_pressure_command(&self) -> u16 {
        self.commands.snapshot().max_peak_pressure
    }

    pub fn max_plateau_pressure_command(&self) -> u16 {
        self.commands.snapshot().max_plateau_pressure
    }

    pub fn min_peep_command(&self) -> u16 {
        self.commands.snapshot().min_peep
    }

    pub fn aperture_command(&self) -> u16 {
        self.commands.snapshot().aperture
    }

    // Active values

    pub fn cycles_per_minute(&self) -> u16 {
        self.active.cycles_per_minute
    }

    pub fn centi_sec_per_cycle(&self) -> CentiSec {
        self.timing.centi_sec_per_cycle
    }

    pub fn centi_sec_per_inhalation(&self) -> CentiSec {
        self.timing.centi_sec_per_inhalation
    }

    pub fn aperture(&self) -> Aperture {
        self.active.aperture
    }

    pub fn max_peak_pressure(&self) -> u16 {
        self.active.max_peak_pressure
    }

    pub fn max_plateau_pressure(&self) -> u16 {
        self.active.max_plateau_pressure
    }

    pub fn min_peep(&self) -> u16 {
        self.active.min_peep
    }

    pub fn timing(&self) -> &CycleTiming {
        &self.timing
    }

    // Measurements and state

    pub fn pressure(&self) -> MmH2O {
        self.pressure
    }

    pub fn peak_pressure(&self) -> MmH2O {
        self.measurements.peak_pressure
    }

    pub fn plateau_pressure(&self) -> MmH2O {
        self.measurements.plateau_pressure
    }

    pub fn peep(&self) -> MmH2O {
        self.measurements.peep
    }

    pub fn measurements(&self) -> CycleMeasurements {
        self.measurements
    }

    pub fn phase(&self) -> CyclePhase {
        self.state.phase()
    }

    pub fn sub_phase(&self) -> CycleSubPhase {
        self.state.sub_phase()
    }

    pub fn cycle_nb(&self) -> u32 {
        self.cycle_nb
    }

    pub fn safeguards(&self) -> &SafeguardBank {
        &self.safeguards
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn blower_command(&self) -> Aperture {
        self.blower_command
    }

    pub fn patient_command(&self) -> Aperture {
        self.patient_command
    }

    pub fn blower(&self) -> &B {
        &self.blower
    }

    pub fn patient(&self) -> &P {
        &self.patient
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            tick: self.clock.now(),
            cycle_nb: self.cycle_nb,
            phase: self.phase(),
            sub_phase: self.sub_phase(),
            pressure: self.pressure,
            measurements: self.measurements,
            active: self.active,
            commands: self.commands.snapshot(),
            timing: self.timing,
            blower_command: self.blower_command,
            patient_command: self.patient_command,
        }
    }
}

impl<B: Actuator + Default, P: Actuator + Default> Default for PressureController<B, P> {
    fn default() -> Self {
        Self::with_defaults(B::default(), P::default())
    }
}
