//! Valve actuators driven by the pressure controller.
//!
//! The controller only ever sets a target aperture; how and how fast the valve
//! gets there belongs to the actuator. [`PinchValve`] models a servo-driven
//! pinch valve as a first-order lag with rate limiting:
//! - Mechanical time constant of the servo horn
//! - Maximum angular speed
//! - Position limits of the pinch range

use crate::error::ControlResult;
use serde::{Deserialize, Serialize};
use vent_core::numeric::ensure_positive;
use vent_core::timing::TICK_SECONDS;

/// Valve opening in servo degrees, 0 meaning fully pinched.
pub type Aperture = u16;

/// A valve the controller can command.
pub trait Actuator {
    /// Bring the valve to its failsafe aperture. Called once before the first cycle.
    fn setup(&mut self);

    /// Command a new target aperture. Called once per controller tick.
    fn apply(&mut self, aperture: Aperture);

    /// Last commanded aperture.
    fn command(&self) -> Aperture;

    /// Current physical aperture, which may lag the command.
    fn position(&self) -> f64;
}

/// First-order valve motion with rate limiting.
///
/// Dynamics: `dpos/dt = (1/tau) * (cmd - pos)`, clamped to `[-rate_limit, rate_limit]`,
/// with the position kept inside `[0, full_open]`.
///
/// # Example
///
/// ```
/// use vent_controls::ValveMotion;
///
/// let motion = ValveMotion::new(0.05, 600.0, 90.0).unwrap();
/// let mut pos = 0.0;
/// for _ in 0..100 {
///     pos = motion.step(pos, 0.01, 90.0);
/// }
/// assert!(pos > 89.0);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValveMotion {
    /// Servo horn time constant in seconds.
    pub tau: f64,
    /// Maximum angular speed in degrees per second.
    pub rate_limit: f64,
    /// Aperture at which the tube is fully released, in degrees.
    pub full_open: f64,
}

impl ValveMotion {
    /// # Errors
    ///
    /// Returns error if `tau`, `rate_limit` or `full_open` are not finite and positive.
    pub fn new(tau: f64, rate_limit: f64, full_open: f64) -> ControlResult<Self> {
        let tau = ensure_positive(tau, "tau")?;
        let rate_limit = ensure_positive(rate_limit, "rate_limit")?;
        let full_open = ensure_positive(full_open, "full_open")?;
        Ok(Self {
            tau,
            rate_limit,
            full_open,
        })
    }

    /// Angular speed towards `command`, capped at `rate_limit`.
    pub fn dpdt(&self, position: f64, command: f64) -> f64 {
        let raw = (command - position) / self.tau;
        raw.clamp(-self.rate_limit, self.rate_limit)
    }

    /// Advance position by `dt` seconds towards `command` (explicit Euler).
    ///
    /// The step never overshoots the command.
    pub fn step(&self, position: f64, dt: f64, command: f64) -> f64 {
        let command = command.clamp(0.0, self.full_open);
        let next = position + self.dpdt(position, command) * dt;
        let next = if (command - position) * (command - next) < 0.0 {
            command
        } else {
            next
        };
        next.clamp(0.0, self.full_open)
    }
}

impl Default for ValveMotion {
    fn default() -> Self {
        Self {
            tau: 0.05,
            rate_limit: 600.0,
            full_open: 90.0,
        }
    }
}

/// Servo-driven pinch valve.
///
/// Each [`Actuator::apply`] call advances the servo by one controller tick.
#[derive(Clone, Debug, PartialEq)]
pub struct PinchValve {
    motion: ValveMotion,
    failsafe: Aperture,
    command: Aperture,
    position: f64,
}

impl PinchValve {
    pub fn new(motion: ValveMotion, failsafe: Aperture) -> Self {
        let failsafe = failsafe.min(motion.full_open as Aperture);
        Self {
            motion,
            failsafe,
            command: failsafe,
            position: f64::from(failsafe),
        }
    }

    pub fn motion(&self) -> &ValveMotion {
        &self.motion
    }

    pub fn failsafe(&self) -> Aperture {
        self.failsafe
    }

    /// Opening as a fraction of the fully open aperture, in `[0, 1]`.
    pub fn opening_fraction(&self) -> f64 {
        (self.position / self.motion.full_open).clamp(0.0, 1.0)
    }
}

impl Default for PinchValve {
    fn default() -> Self {
        Self::new(ValveMotion::default(), 0)
    }
}

impl Actuator for PinchValve {
    fn setup(&mut self) {
        self.command = self.failsafe;
        self.position = f64::from(self.failsafe);
    }

    fn apply(&mut self, aperture: Aperture) {
        self.command = aperture;
        self.position = self
            .motion
            .step(self.position, TICK_SECONDS, f64::from(aperture));
    }

    fn command(&self) -> Aperture {
        self.command
    }

    fn position(&self) -> f64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControlError;

    #[test]
    fn valve_moves_towards_command() {
        let motion = ValveMotion::new(0.1, 1000.0, 90.0).unwrap();
        let pos = motion.step(0.0, 0.01, 90.0);

        assert!(pos > 0.0);
        assert!(pos < 90.0);
    }

    #[test]
    fn angular_speed_is_limited() {
        let motion = ValveMotion::new(1.0, 30.0, 90.0).unwrap();
        assert!((motion.dpdt(0.0, 90.0) - 30.0).abs() < 1e-10);
        assert!((motion.dpdt(90.0, 0.0) + 30.0).abs() < 1e-10);
    }

    #[test]
    fn position_clamped() {
        let motion = ValveMotion::new(0.001, 1e6, 90.0).unwrap();
        assert!(motion.step(45.0, 0.1, 500.0) <= 90.0);
        assert!(motion.step(45.0, 0.1, -500.0) >= 0.0);
    }

    #[test]
    fn step_does_not_overshoot() {
        let motion = ValveMotion::new(0.001, 1e6, 90.0).unwrap();
        assert_eq!(motion.step(0.0, 0.01, 30.0), 30.0);
        assert_eq!(motion.step(60.0, 0.01, 30.0), 30.0);
    }

    #[test]
    fn invalid_parameters() {
        for (tau, rate_limit, full_open, field) in [
            (-0.1, 1.0, 90.0, "tau"),
            (0.1, 0.0, 90.0, "rate_limit"),
            (0.1, 1.0, 0.0, "full_open"),
            (f64::NAN, 1.0, 90.0, "tau"),
            (0.1, f64::INFINITY, 90.0, "rate_limit"),
        ] {
            match ValveMotion::new(tau, rate_limit, full_open) {
                Err(ControlError::Core { message }) => assert!(message.contains(field), "{message}"),
                other => panic!("expected core error for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn pinch_valve_lags_its_command() {
        let mut valve = PinchValve::default();
        valve.setup();
        assert_eq!(valve.command(), 0);
        assert_eq!(valve.position(), 0.0);

        valve.apply(90);
        assert_eq!(valve.command(), 90);
        assert!(valve.position() > 0.0);
        assert!(valve.position() < 90.0);

        for _ in 0..100 {
            valve.apply(90);
        }
        assert!((valve.position() - 90.0).abs() < 1e-6);
        assert!((valve.opening_fraction() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn setup_returns_to_failsafe() {
        let mut valve = PinchValve::new(ValveMotion::default(), 10);
        for _ in 0..50 {
            valve.apply(80);
        }
        valve.setup();
        assert_eq!(valve.command(), 10);
        assert_eq!(valve.position(), 10.0);
    }
}
