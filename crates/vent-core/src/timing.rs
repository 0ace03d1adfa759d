//! Centisecond tick arithmetic.
//!
//! All cycle timing is expressed in hundredths of a second. The driver loop
//! runs one tick per centisecond and passes the elapsed centiseconds since the
//! start of the current respiratory cycle; that counter restarts at zero every
//! cycle. [`CycleClock`] turns it back into a monotonic tick so that durations
//! can be measured across cycle boundaries.

/// Centiseconds elapsed since the start of a respiratory cycle.
pub type CentiSec = u16;

/// Monotonic centisecond tick since the controller started.
pub type Tick = u32;

pub const CENTISEC_PER_SECOND: u16 = 100;
pub const CENTISEC_PER_MINUTE: u16 = 6000;

/// Duration of one controller tick in seconds.
pub const TICK_SECONDS: f64 = 1.0 / CENTISEC_PER_SECOND as f64;

/// Monotonic clock built from per-cycle centisecond readings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleClock {
    cycle_origin: Tick,
    last_centisec: Option<CentiSec>,
}

impl CycleClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a cycle boundary. The next reading of 0 follows the last tick of
    /// the cycle that just ended.
    pub fn start_cycle(&mut self) {
        if let Some(last) = self.last_centisec.take() {
            self.cycle_origin = self.cycle_origin.saturating_add(Tick::from(last) + 1);
        }
    }

    /// Record a reading and return the matching monotonic tick.
    pub fn tick(&mut self, centisec: CentiSec) -> Tick {
        self.last_centisec = Some(match self.last_centisec {
            Some(last) => last.max(centisec),
            None => centisec,
        });
        self.cycle_origin.saturating_add(Tick::from(centisec))
    }

    /// Monotonic tick of the most recent reading.
    pub fn now(&self) -> Tick {
        self.cycle_origin
            .saturating_add(self.last_centisec.map_or(0, Tick::from))
    }

    pub fn cycle_origin(&self) -> Tick {
        self.cycle_origin
    }
}
