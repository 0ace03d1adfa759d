//! vent-core: shared foundation for the ventilator controller.
//!
//! Contains:
//! - units (uom pressure types + mmH2O / cmH2O constructors)
//! - numeric (Real + float guards)
//! - timing (centisecond tick arithmetic, monotonic cycle clock)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod timing;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{VentError, VentResult};
pub use numeric::*;
pub use timing::{CentiSec, CycleClock, Tick};
pub use units::*;
