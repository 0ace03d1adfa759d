//! Closed-loop bench for the ventilator pressure controller.
//!
//! Provides:
//! - Single-compartment patient circuit fed by the blower valve and vented by the patient valve
//! - YAML scenario files with timed operator adjustments
//! - 100 Hz driver loop with per-breath records

pub mod error;
pub mod lung;
pub mod scenario;
pub mod session;

// Re-exports for public API
pub use error::{SimError, SimResult};
pub use lung::{LungModel, LungParams};
pub use scenario::{
    OperatorAction, OperatorEvent, Scenario, ValveParams, from_yaml_str, load_yaml, save_yaml,
};
pub use session::{
    Bench, BenchController, CycleRecord, SafeguardCounts, SessionReport, run_scenario,
    run_scenario_with_progress,
};
