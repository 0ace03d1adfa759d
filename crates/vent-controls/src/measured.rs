//! Pressure measurement handoff between the sampling path and the tick loop.
//!
//! The sampling side may run at a different interrupt priority than the
//! controller. It publishes each conversion into a [`PressureLatch`]; the tick
//! loop reads the latch exactly once per tick and hands that single value to
//! `PressureController::update_pressure`.

use std::sync::Arc;
use std::sync::atomic::{AtomicI16, AtomicU32, Ordering};
use vent_core::units::MmH2O;

/// Latest pressure sample in mmH2O, shared between contexts.
#[derive(Debug, Default)]
pub struct PressureLatch {
    value: AtomicI16,
    samples: AtomicU32,
}

impl PressureLatch {
    pub fn new(initial: MmH2O) -> Self {
        Self {
            value: AtomicI16::new(initial),
            samples: AtomicU32::new(0),
        }
    }

    pub fn shared(initial: MmH2O) -> Arc<Self> {
        Arc::new(Self::new(initial))
    }

    /// Publish a new sample.
    pub fn store(&self, pressure: MmH2O) {
        self.value.store(pressure, Ordering::Release);
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the most recent sample.
    pub fn load(&self) -> MmH2O {
        self.value.load(Ordering::Acquire)
    }

    /// Number of samples published so far (wraps).
    pub fn sample_count(&self) -> u32 {
        self.samples.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_keeps_latest_sample() {
        let latch = PressureLatch::new(0);
        assert_eq!(latch.load(), 0);
        latch.store(120);
        latch.store(-15);
        assert_eq!(latch.load(), -15);
        assert_eq!(latch.sample_count(), 2);
    }

    #[test]
    fn latch_is_shared_across_threads() {
        let latch = PressureLatch::shared(0);
        let writer = {
            let latch = Arc::clone(&latch);
            std::thread::spawn(move || {
                for p in 0..100 {
                    latch.store(p);
                }
            })
        };
        writer.join().unwrap();
        assert_eq!(latch.load(), 99);
        assert_eq!(latch.sample_count(), 100);
    }
}
