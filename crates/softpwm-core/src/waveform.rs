//! Duty-cycle timing and the per-channel worker loop.

use core::time::Duration;
use std::sync::Arc;
use std::thread;

use tracing::{debug, trace};

use crate::channel::Channel;
use crate::engine::Timebase;
use crate::sink::{Level, PinSink};

/// How long the HIGH and LOW phases of one period last.
///
/// `on + off` always equals the period exactly, and neither phase is negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyTiming {
    /// Time spent HIGH.
    pub on: Duration,
    /// Time spent LOW.
    pub off: Duration,
}

impl DutyTiming {
    /// Splits `period` according to `data / range`.
    ///
    /// Returns `None` for a zero range, which means "emit nothing". A `data`
    /// larger than `range` saturates at a 100% duty cycle.
    pub fn compute(data: u32, range: u32, period: Duration) -> Option<Self> {
        if range == 0 {
            return None;
        }
        let period_ns = period.as_nanos();
        let on_ns = period_ns * u128::from(data.min(range)) / u128::from(range);
        let on = Duration::from_nanos(on_ns as u64);
        Some(DutyTiming {
            on,
            off: period - on,
        })
    }

    /// Length of the whole period.
    pub fn period(&self) -> Duration {
        self.on + self.off
    }
}

/// What a worker does while its channel has a zero range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleStrategy {
    /// Busy-poll the configuration without sleeping.
    Spin,
    /// Park the thread for up to the given duration between polls. `close()` unparks it.
    Park(Duration),
}

impl Default for IdleStrategy {
    fn default() -> Self {
        IdleStrategy::Park(Duration::from_millis(1))
    }
}

impl IdleStrategy {
    fn idle(&self) {
        match self {
            IdleStrategy::Spin => core::hint::spin_loop(),
            IdleStrategy::Park(timeout) => thread::park_timeout(*timeout),
        }
    }
}

/// The timing loop bound to one channel.
pub(crate) struct WaveformThread<S: PinSink> {
    channel: Arc<Channel>,
    timebase: Arc<Timebase>,
    sink: Arc<S>,
    idle: IdleStrategy,
}

impl<S: PinSink> WaveformThread<S> {
    pub(crate) fn new(
        channel: Arc<Channel>,
        timebase: Arc<Timebase>,
        sink: Arc<S>,
        idle: IdleStrategy,
    ) -> Self {
        Self {
            channel,
            timebase,
            sink,
            idle,
        }
    }

    /// Spawns the loop on a named OS thread.
    pub(crate) fn spawn(self) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("pwm-ch{}", self.channel.id()))
            .spawn(move || self.run())
    }

    /// Runs until the channel's run flag is cleared.
    pub(crate) fn run(self) {
        let id = self.channel.id();
        debug!(channel = id, "Waveform thread started");

        while self.channel.is_running() {
            let Some(timing) = self.channel.timing(self.timebase.period()) else {
                self.idle.idle();
                continue;
            };
            trace!(channel = id, on = ?timing.on, off = ?timing.off, "Cycle");

            // A zero-length phase is skipped so 0% never pulses HIGH and 100% never pulses LOW.
            if !timing.on.is_zero() {
                self.channel.drive(&*self.sink, Level::High);
                self.sink.sleep(timing.on);
            }
            if !timing.off.is_zero() {
                self.channel.drive(&*self.sink, Level::Low);
                self.sink.sleep(timing.off);
            }
        }

        debug!(channel = id, "Waveform thread stopped");
    }
}
