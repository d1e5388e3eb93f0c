//! Recording `PinSink` used by the unit tests.
//!
//! Each calling thread gets its own virtual clock that advances on every
//! `sleep`, so waveform timing can be checked exactly without waiting.

use core::time::Duration;
use std::collections::{HashMap, HashSet};
use std::thread::{self, ThreadId};
use std::time::Instant;

use parking_lot::Mutex;

use crate::sink::{Level, Pin, PinSink};

const MAX_RECORDED_WRITES: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Write {
    pub pin: Pin,
    pub level: Level,
    pub at: Duration,
}

#[derive(Default)]
struct Recording {
    clocks: HashMap<ThreadId, Duration>,
    configured: Vec<Pin>,
    writes: Vec<Write>,
    write_count: usize,
    sleep_count: usize,
    threads: HashSet<ThreadId>,
}

pub(crate) struct RecordingSink {
    real_sleep: bool,
    state: Mutex<Recording>,
}

impl RecordingSink {
    /// Sleeps only advance the virtual clock.
    pub fn new() -> Self {
        Self {
            real_sleep: false,
            state: Mutex::new(Recording::default()),
        }
    }

    /// Sleeps also block the calling thread for the requested time.
    pub fn with_real_sleep() -> Self {
        Self {
            real_sleep: true,
            state: Mutex::new(Recording::default()),
        }
    }

    pub fn configured(&self) -> Vec<Pin> {
        self.state.lock().configured.clone()
    }

    pub fn writes_for(&self, pin: Pin) -> Vec<Write> {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|w| w.pin == pin)
            .copied()
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().write_count
    }

    pub fn sleep_count(&self) -> usize {
        self.state.lock().sleep_count
    }

    /// Number of distinct threads that drove a pin.
    pub fn thread_count(&self) -> usize {
        self.state.lock().threads.len()
    }

    /// Forgets recorded writes, sleeps and threads. Clocks and configured pins are kept.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.writes.clear();
        state.write_count = 0;
        state.sleep_count = 0;
        state.threads.clear();
    }

    /// Polls until at least `count` writes were seen since the last reset.
    pub fn wait_for_writes(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.write_count() >= count {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    /// Fraction of virtual time `pin` spent HIGH between its first and last rising edge.
    pub fn high_fraction(&self, pin: Pin) -> Option<f64> {
        let writes = self.writes_for(pin);
        let first = writes.iter().position(|w| w.level == Level::High)?;
        let last = writes.iter().rposition(|w| w.level == Level::High)?;
        if last <= first {
            return None;
        }
        let high: Duration = writes[first..=last]
            .windows(2)
            .filter(|pair| pair[0].level == Level::High)
            .map(|pair| pair[1].at - pair[0].at)
            .sum();
        let span = writes[last].at - writes[first].at;
        Some(high.as_secs_f64() / span.as_secs_f64())
    }
}

impl PinSink for RecordingSink {
    fn configure_output(&self, pin: Pin) {
        self.state.lock().configured.push(pin);
    }

    fn set_level(&self, pin: Pin, level: Level) {
        let id = thread::current().id();
        let mut state = self.state.lock();
        let at = state.clocks.get(&id).copied().unwrap_or_default();
        if state.writes.len() < MAX_RECORDED_WRITES {
            state.writes.push(Write { pin, level, at });
        }
        state.write_count += 1;
        state.threads.insert(id);
    }

    fn sleep(&self, duration: Duration) {
        {
            let mut state = self.state.lock();
            *state.clocks.entry(thread::current().id()).or_default() += duration;
            state.sleep_count += 1;
        }
        if self.real_sleep {
            thread::sleep(duration);
        } else {
            thread::yield_now();
        }
    }
}
