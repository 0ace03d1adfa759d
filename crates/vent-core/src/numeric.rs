use crate::VentError;

/// Floating point type used by the plant and actuator models
pub type Real = f64;

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, VentError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(VentError::NonFinite { what, value: v })
    }
}

pub fn ensure_positive(v: Real, what: &'static str) -> Result<Real, VentError> {
    let v = ensure_finite(v, what)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(VentError::InvalidArg { what })
    }
}

pub fn ensure_in_range(v: Real, min: Real, max: Real, what: &'static str) -> Result<Real, VentError> {
    let v = ensure_finite(v, what)?;
    if (min..=max).contains(&v) {
        Ok(v)
    } else {
        Err(VentError::OutOfRange {
            what,
            value: v,
            min,
            max,
        })
    }
}

/// Saturating conversion of a float reading to a signed 16-bit sample.
pub fn saturate_i16(v: Real) -> i16 {
    if v.is_nan() {
        return 0;
    }
    v.round().clamp(i16::MIN as Real, i16::MAX as Real) as i16
}
