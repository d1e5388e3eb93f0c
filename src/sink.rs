use std::time::Duration;

use softpwm_core::{Level, Pin, PinSink};
use spin_sleep::SpinSleeper;
use tracing::{debug, trace};

/// Dry-run GPIO driver: pin writes go to the log, sleeps are real.
pub struct TraceSink {
    sleeper: SpinSleeper,
}

impl TraceSink {
    pub fn new(spin_threshold_us: u32) -> Self {
        Self {
            sleeper: SpinSleeper::new(spin_threshold_us.saturating_mul(1_000)),
        }
    }
}

impl PinSink for TraceSink {
    fn configure_output(&self, pin: Pin) {
        debug!(pin, "Pin configured as output");
    }

    fn set_level(&self, pin: Pin, level: Level) {
        trace!(pin, %level, "Pin write");
    }

    fn sleep(&self, duration: Duration) {
        self.sleeper.sleep(duration);
    }
}
