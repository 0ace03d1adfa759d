// vent-core/src/units.rs

use uom::si::f64::{Pressure as UomPressure, Volume as UomVolume};

// Plant-side quantities (SI, f64)
pub type Pressure = UomPressure;
pub type Volume = UomVolume;

/// Sampled pressure as the controller sees it, in millimetres of water.
pub type MmH2O = i16;

/// Pascals per millimetre of water (conventional, 4 degC water, standard gravity).
pub const PA_PER_MMH2O: f64 = 9.806_65;

#[inline]
pub fn pa(v: f64) -> Pressure {
    use uom::si::pressure::pascal;
    Pressure::new::<pascal>(v)
}

#[inline]
pub fn mmh2o(v: f64) -> Pressure {
    pa(v * PA_PER_MMH2O)
}

#[inline]
pub fn cmh2o(v: f64) -> Pressure {
    mmh2o(v * 10.0)
}

/// Pressure expressed in millimetres of water.
#[inline]
pub fn to_mmh2o(p: Pressure) -> f64 {
    use uom::si::pressure::pascal;
    p.get::<pascal>() / PA_PER_MMH2O
}

#[inline]
pub fn to_cmh2o(p: Pressure) -> f64 {
    to_mmh2o(p) / 10.0
}

#[inline]
pub fn liters(v: f64) -> Volume {
    use uom::si::volume::liter;
    Volume::new::<liter>(v)
}

#[inline]
pub fn to_liters(v: Volume) -> f64 {
    use uom::si::volume::liter;
    v.get::<liter>()
}
