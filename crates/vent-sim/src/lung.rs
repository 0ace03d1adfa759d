//! Single-compartment patient circuit.
//!
//! The circuit is a compliance fed through the blower valve from a constant
//! supply pressure and vented through the patient valve to atmosphere:
//!
//! ```text
//!   q_in  = blower_opening  * max(p_supply - p, 0) / R_insp
//!   q_out = patient_opening * max(p, 0) / R_exp + leak * max(p, 0)
//!   dV/dt = q_in - q_out,   p = V / C
//! ```
//!
//! Pressures are gauge pressures. Valve openings are fractions in `[0, 1]`.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use vent_core::numeric::{ensure_finite, ensure_in_range, ensure_positive, saturate_i16};
use vent_core::units::{MmH2O, Pressure, Volume, cmh2o, liters, to_cmh2o, to_liters, to_mmh2o};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LungParams {
    /// Respiratory system compliance (L/cmH2O).
    pub compliance_l_per_cmh2o: f64,
    /// Blower supply pressure (cmH2O).
    pub supply_pressure_cmh2o: f64,
    /// Inspiratory limb resistance with the blower valve fully open (cmH2O.s/L).
    pub inspiratory_resistance: f64,
    /// Expiratory limb resistance with the patient valve fully open (cmH2O.s/L).
    pub expiratory_resistance: f64,
    /// Leak conductance to atmosphere (L/s per cmH2O).
    #[serde(default)]
    pub leak_l_per_s_per_cmh2o: f64,
    /// Circuit pressure at the start of the run (cmH2O).
    #[serde(default)]
    pub initial_pressure_cmh2o: f64,
    /// Constant offset added by the pressure sensor (mmH2O).
    #[serde(default)]
    pub sensor_offset_mmh2o: f64,
}

impl Default for LungParams {
    fn default() -> Self {
        Self {
            compliance_l_per_cmh2o: 0.05,
            supply_pressure_cmh2o: 60.0,
            inspiratory_resistance: 20.0,
            expiratory_resistance: 10.0,
            leak_l_per_s_per_cmh2o: 0.0,
            initial_pressure_cmh2o: 0.0,
            sensor_offset_mmh2o: 0.0,
        }
    }
}

impl LungParams {
    pub fn validate(&self) -> SimResult<()> {
        ensure_positive(self.compliance_l_per_cmh2o, "compliance_l_per_cmh2o")?;
        ensure_positive(self.supply_pressure_cmh2o, "supply_pressure_cmh2o")?;
        ensure_positive(self.inspiratory_resistance, "inspiratory_resistance")?;
        ensure_positive(self.expiratory_resistance, "expiratory_resistance")?;
        ensure_in_range(
            self.initial_pressure_cmh2o,
            0.0,
            self.supply_pressure_cmh2o,
            "initial_pressure_cmh2o",
        )?;
        ensure_finite(self.sensor_offset_mmh2o, "sensor_offset_mmh2o")?;
        if !(self.leak_l_per_s_per_cmh2o >= 0.0) {
            return Err(SimError::NonPhysical {
                what: "leak_l_per_s_per_cmh2o must be non-negative",
            });
        }
        Ok(())
    }
}

/// State of the patient circuit.
#[derive(Debug, Clone)]
pub struct LungModel {
    params: LungParams,
    volume: Volume,
    pressure: Pressure,
}

impl LungModel {
    pub fn new(params: LungParams) -> SimResult<Self> {
        params.validate()?;
        let p0 = params.initial_pressure_cmh2o;
        Ok(Self {
            volume: liters(p0 * params.compliance_l_per_cmh2o),
            pressure: cmh2o(p0),
            params,
        })
    }

    pub fn params(&self) -> &LungParams {
        &self.params
    }

    pub fn pressure(&self) -> Pressure {
        self.pressure
    }

    /// Volume above the relaxed (zero gauge pressure) volume.
    pub fn volume(&self) -> Volume {
        self.volume
    }

    /// Sensor reading in mmH2O, as the controller receives it.
    pub fn measure(&self) -> MmH2O {
        saturate_i16(to_mmh2o(self.pressure) + self.params.sensor_offset_mmh2o)
    }

    /// Net flow into the circuit (L/s) for the given valve openings.
    pub fn net_flow(&self, blower_opening: f64, patient_opening: f64) -> f64 {
        let p = to_cmh2o(self.pressure);
        let lp = &self.params;
        let q_in = blower_opening.clamp(0.0, 1.0) * (lp.supply_pressure_cmh2o - p).max(0.0)
            / lp.inspiratory_resistance;
        let q_out = patient_opening.clamp(0.0, 1.0) * p.max(0.0) / lp.expiratory_resistance
            + lp.leak_l_per_s_per_cmh2o * p.max(0.0);
        q_in - q_out
    }

    /// Advance the circuit by `dt` seconds (explicit Euler).
    pub fn step(&mut self, blower_opening: f64, patient_opening: f64, dt: f64) -> SimResult<()> {
        if !(dt > 0.0) {
            return Err(SimError::InvalidArg {
                what: "dt must be positive",
            });
        }
        let q = ensure_finite(self.net_flow(blower_opening, patient_opening), "net flow")?;
        let v = to_liters(self.volume) + q * dt;
        let p = ensure_finite(v / self.params.compliance_l_per_cmh2o, "circuit pressure")?;
        self.volume = liters(v);
        self.pressure = cmh2o(p);
        Ok(())
    }
}
