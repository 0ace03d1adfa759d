//! Whole breaths driven by scripted pressure traces.

use vent_controls::{
    Actuator, Aperture, ControllerConfig, CyclePhase, CycleSubPhase, PressureController,
    SafeguardKind,
};
use vent_core::timing::CentiSec;
use vent_core::units::MmH2O;

/// Valve that reaches its command instantly.
#[derive(Debug, Default)]
struct IdealValve {
    command: Aperture,
}

impl Actuator for IdealValve {
    fn setup(&mut self) {
        self.command = 0;
    }

    fn apply(&mut self, aperture: Aperture) {
        self.command = aperture;
    }

    fn command(&self) -> Aperture {
        self.command
    }

    fn position(&self) -> f64 {
        f64::from(self.command)
    }
}

type Controller = PressureController<IdealValve, IdealValve>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TickRecord {
    phase: CyclePhase,
    sub_phase: CycleSubPhase,
    blower: Aperture,
    patient: Aperture,
}

fn started() -> Controller {
    let mut c = Controller::default();
    c.setup();
    c
}

/// Run one full breath, feeding `trace(centi_sec)` as the sample of each tick.
fn breathe(c: &mut Controller, trace: impl Fn(CentiSec) -> MmH2O) -> Vec<TickRecord> {
    c.init_respiratory_cycle();
    (0..c.centi_sec_per_cycle())
        .map(|cs| {
            c.update_pressure(trace(cs));
            c.compute(cs);
            TickRecord {
                phase: c.phase(),
                sub_phase: c.sub_phase(),
                blower: c.blower().command(),
                patient: c.patient().command(),
            }
        })
        .collect()
}

/// Ramp to 250 during inspiration, hold, then decay towards 80.
fn healthy(cs: CentiSec) -> MmH2O {
    match cs {
        0..80 => 50 + (cs as MmH2O) * 5 / 2,
        80..100 => 250,
        _ => 80,
    }
}

#[test]
fn twenty_breaths_per_minute_layout() {
    let mut c = started();
    let ticks = breathe(&mut c, healthy);

    assert_eq!(c.centi_sec_per_cycle(), 300);
    assert_eq!(c.centi_sec_per_inhalation(), 100);
    assert_eq!(ticks.len(), 300);

    let count = |phase| ticks.iter().filter(|t| t.phase == phase).count();
    assert_eq!(count(CyclePhase::Inhalation), 80);
    assert_eq!(count(CyclePhase::Plateau), 20);
    assert_eq!(count(CyclePhase::Exhalation), 200);

    assert!(ticks.windows(2).all(|w| w[0].phase <= w[1].phase));

    // Nominal apertures: blower at the setting while inspiring, patient open while exhaling
    assert!(ticks[..80].iter().all(|t| t.blower == 60 && t.patient == 0));
    assert!(ticks[80..100].iter().all(|t| t.blower == 0 && t.patient == 0));
    assert!(ticks[100..].iter().all(|t| t.blower == 0 && t.patient == 90));

    assert_eq!(c.peak_pressure(), 247);
    assert_eq!(c.plateau_pressure(), 250);
    assert_eq!(c.peep(), 80);
    assert_eq!(c.safeguards().activations(SafeguardKind::PeepHold), 0);
}

#[test]
fn sustained_peak_excursion_closes_blower_within_window() {
    let mut c = started();
    let ticks = breathe(&mut c, |cs| match cs {
        20..40 => 450,
        0..80 => 150,
        80..100 => 200,
        _ => 80,
    });

    let first_closed = ticks[..80]
        .iter()
        .position(|t| t.blower == 0)
        .expect("blower closed during inspiration");
    let detect = ControllerConfig::default().safeguards.peak_pressure.detect;
    assert!(first_closed >= 20);
    assert!(first_closed - 20 <= usize::from(detect));
    assert_eq!(first_closed, 22);

    // Stays closed through the excursion and the suppress window
    assert!(ticks[22..50].iter().all(|t| t.blower == 0));
    assert!(ticks[50..80].iter().all(|t| t.blower == 60));
    assert_eq!(c.safeguards().activations(SafeguardKind::PeakPressure), 1);
}

#[test]
fn brief_peak_spike_is_ignored() {
    let mut c = started();
    let ticks = breathe(&mut c, |cs| match cs {
        20..22 => 450,
        0..80 => 150,
        80..100 => 200,
        _ => 80,
    });

    assert!(ticks[..80].iter().all(|t| t.blower == 60));
    assert_eq!(c.safeguards().activations(SafeguardKind::PeakPressure), 0);
    // The spike still counts as the inspiratory peak
    assert_eq!(c.peak_pressure(), 450);
}

#[test]
fn high_plateau_vents_through_patient_valve() {
    let mut c = started();
    let ticks = breathe(&mut c, |cs| match cs {
        0..80 => 200,
        80..100 => 320,
        _ => 80,
    });

    assert!(ticks[80..83].iter().all(|t| t.patient == 0));
    assert!(ticks[83..100].iter().all(|t| t.patient == 30 && t.blower == 0));
    // Relief never leaks into exhalation
    assert!(ticks[100..].iter().all(|t| t.patient == 90));
    assert_eq!(c.plateau_pressure(), 320);
    assert_eq!(c.safeguards().activations(SafeguardKind::PlateauPressure), 1);
}

#[test]
fn peep_defence_holds_then_maintains_then_releases() {
    let mut c = started();
    let ticks = breathe(&mut c, |cs| match cs {
        0..80 => 200,
        80..100 => 220,
        100..150 => 30,
        _ => 80,
    });

    // Exhale normally until the hold window elapses
    for t in &ticks[100..105] {
        assert_eq!((t.blower, t.patient), (0, 90));
        assert_eq!(t.sub_phase, CycleSubPhase::Exhale);
    }
    // Stage 1: patient valve closed
    for t in &ticks[105..115] {
        assert_eq!((t.blower, t.patient), (0, 0));
        assert_eq!(t.sub_phase, CycleSubPhase::HoldExhale);
    }
    // Stage 2: blower trickles in while the hold continues
    for t in &ticks[115..160] {
        assert_eq!((t.blower, t.patient), (20, 0));
        assert_eq!(t.sub_phase, CycleSubPhase::HoldExhale);
    }
    // Recovered at 150, released once the suppress window has passed
    for t in &ticks[160..] {
        assert_eq!((t.blower, t.patient), (0, 90));
        assert_eq!(t.sub_phase, CycleSubPhase::Exhale);
    }

    assert_eq!(c.peep(), 80);
    assert_eq!(c.safeguards().activations(SafeguardKind::PeepHold), 1);
    assert_eq!(c.safeguards().activations(SafeguardKind::PeepMaintain), 1);
}

#[test]
fn maintain_never_precedes_hold() {
    let mut c = started();
    for floor in [0, 10, 30, 45] {
        let ticks = breathe(&mut c, |cs| if cs < 100 { 200 } else { floor });
        let hold = ticks.iter().position(|t| t.sub_phase == CycleSubPhase::HoldExhale);
        let maintain = ticks
            .iter()
            .position(|t| t.phase == CyclePhase::Exhalation && t.blower == 20);
        match (hold, maintain) {
            (Some(h), Some(m)) => assert!(h < m),
            (None, Some(_)) => panic!("maintain without hold at floor {floor}"),
            _ => {}
        }
    }
}

#[test]
fn measurements_reset_every_breath() {
    let mut c = started();
    breathe(&mut c, healthy);
    assert_eq!(c.cycle_nb(), 1);
    assert_eq!(c.peak_pressure(), 247);

    breathe(&mut c, |cs| match cs {
        0..80 => 120,
        80..100 => 110,
        _ => 60,
    });
    assert_eq!(c.cycle_nb(), 2);
    assert_eq!(c.peak_pressure(), 120);
    assert_eq!(c.plateau_pressure(), 110);
    assert_eq!(c.peep(), 60);
}

#[test]
fn excursion_across_breath_boundary_is_debounced_continuously() {
    let mut c = started();
    breathe(&mut c, |cs| if cs == 299 { 450 } else { healthy(cs) });
    assert_eq!(c.safeguards().activations(SafeguardKind::PeakPressure), 0);

    let ticks = breathe(&mut c, |cs| if cs < 10 { 450 } else { healthy(cs) });
    // First tick of the new breath opens the blower, the next one sees the
    // excursion has lasted two ticks and closes it
    assert_eq!(ticks[0].blower, 60);
    assert_eq!(ticks[1].blower, 0);
    assert_eq!(c.safeguards().activations(SafeguardKind::PeakPressure), 1);
}

#[test]
fn adjustments_wait_for_the_next_breath() {
    let mut c = started();
    let handle = c.command_handle();

    c.init_respiratory_cycle();
    for cs in 0..150 {
        c.update_pressure(healthy(cs));
        c.compute(cs);
    }
    handle.on_cycle_plus();
    handle.on_peep_plus();
    handle.on_plateau_pressure_minus();
    handle.on_peak_pressure_minus();
    for cs in 150..300 {
        c.update_pressure(healthy(cs));
        c.compute(cs);
        assert_eq!(c.cycles_per_minute(), 20);
        assert_eq!(c.min_peep(), 50);
    }
    assert_eq!(c.centi_sec_per_cycle(), 300);

    let ticks = breathe(&mut c, healthy);
    assert_eq!(ticks.len(), 285);
    assert_eq!(c.cycles_per_minute(), 21);
    assert_eq!(c.centi_sec_per_inhalation(), 95);
    assert_eq!(c.min_peep(), 60);
    assert_eq!(c.max_plateau_pressure(), 290);
    assert_eq!(c.max_peak_pressure(), 390);
}

#[test]
fn adjustments_saturate_at_limits() {
    let c = started();
    for _ in 0..50 {
        c.on_cycle_plus();
        c.on_peep_minus();
        c.on_plateau_pressure_plus();
        c.on_peak_pressure_plus();
    }
    assert_eq!(c.cycles_per_minute_command(), 35);
    assert_eq!(c.min_peep_command(), 0);
    assert_eq!(c.max_plateau_pressure_command(), 400);
    assert_eq!(c.max_peak_pressure_command(), 700);

    for _ in 0..50 {
        c.on_cycle_minus();
    }
    assert_eq!(c.cycles_per_minute_command(), 5);
}

#[test]
fn fastest_and_slowest_rates_keep_phase_order() {
    for cpm in [5u16, 35] {
        let mut cfg = ControllerConfig::default();
        cfg.settings.cycles_per_minute = cpm;
        let mut c =
            Controller::new(cfg, IdealValve::default(), IdealValve::default()).expect("valid");
        c.setup();
        let ticks = breathe(&mut c, |_| 100);
        assert_eq!(ticks.len(), usize::from(6000 / cpm));
        let mut phases: Vec<CyclePhase> = ticks.iter().map(|t| t.phase).collect();
        phases.dedup();
        assert_eq!(
            phases,
            [CyclePhase::Inhalation, CyclePhase::Plateau, CyclePhase::Exhalation]
        );
    }
}

#[test]
fn configs_that_would_skip_a_phase_are_refused() {
    let build = |cfg: ControllerConfig| {
        Controller::new(cfg, IdealValve::default(), IdealValve::default()).is_ok()
    };

    let mut cfg = ControllerConfig::default();
    cfg.timing.plateau_onset_percent = 0;
    assert!(!build(cfg));

    let mut cfg = ControllerConfig::default();
    cfg.timing.plateau_onset_percent = 100;
    assert!(!build(cfg));

    let mut cfg = ControllerConfig::default();
    cfg.limits.cycles_per_minute.max = 2000;
    assert!(!build(cfg));

    let mut cfg = ControllerConfig::default();
    cfg.timing.plateau_onset_percent = 99;
    assert!(build(cfg));
}
