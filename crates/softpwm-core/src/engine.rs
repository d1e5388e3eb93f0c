//! The engine façade: frequency, channel lifecycle and shutdown.

use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::channel::{Channel, ChannelId, ChannelRegistry};
use crate::error::{PwmError, Result};
use crate::sink::{Pin, PinSink};
use crate::waveform::{IdleStrategy, WaveformThread};

/// Frequency used when none is configured.
pub const DEFAULT_FREQUENCY_HZ: u32 = 60;

/// Highest accepted frequency. Anything above has a sub-microsecond period.
pub const MAX_FREQUENCY_HZ: u32 = 1_000_000;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Shared PWM frequency.
///
/// Only the frequency is stored; the period is derived from it on every
/// read, so the two can never be seen out of step.
#[derive(Debug)]
pub(crate) struct Timebase {
    frequency_hz: AtomicU32,
}

impl Timebase {
    fn new(hz: u32) -> Result<Self> {
        Ok(Self {
            frequency_hz: AtomicU32::new(validate_frequency(hz)?),
        })
    }

    fn set(&self, hz: u32) -> Result<()> {
        self.frequency_hz
            .store(validate_frequency(hz)?, Ordering::Relaxed);
        Ok(())
    }

    pub(crate) fn frequency(&self) -> u32 {
        self.frequency_hz.load(Ordering::Relaxed)
    }

    pub(crate) fn period(&self) -> Duration {
        // The stored frequency has already been validated.
        nanos_period(self.frequency())
    }
}

fn validate_frequency(hz: u32) -> Result<u32> {
    if hz == 0 || hz > MAX_FREQUENCY_HZ {
        return Err(PwmError::InvalidFrequency(hz));
    }
    Ok(hz)
}

/// Length of one period at `hz`.
///
/// # Errors
///
/// [`PwmError::InvalidFrequency`] for zero or anything above [`MAX_FREQUENCY_HZ`].
pub fn period_for(hz: u32) -> Result<Duration> {
    validate_frequency(hz).map(nanos_period)
}

fn nanos_period(hz: u32) -> Duration {
    Duration::from_nanos(NANOS_PER_SEC / u64::from(hz))
}

/// Startup parameters for a [`PwmEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// PWM frequency in Hz, shared by every channel.
    pub frequency_hz: u32,
    /// Behaviour of a worker whose channel has a zero range.
    pub idle: IdleStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            idle: IdleStrategy::default(),
        }
    }
}

/// Lifecycle of an engine. It only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Channels may be created and configured; no worker is running.
    Configuring,
    /// One worker per channel is running.
    Running,
    /// Workers are joined and every channel is gone. Restarting is not supported.
    Closed,
}

/// Software PWM engine.
///
/// Owns every channel and its worker thread. Configuration setters take
/// `&self` and may be called while running; changes are picked up by each
/// worker on its next cycle. Lifecycle operations take `&mut self`, so there
/// is exactly one controller.
///
/// Dropping the engine closes it.
pub struct PwmEngine<S: PinSink> {
    sink: Arc<S>,
    timebase: Arc<Timebase>,
    registry: ChannelRegistry,
    idle: IdleStrategy,
    state: EngineState,
}

impl<S: PinSink> PwmEngine<S> {
    /// Creates an engine at the default frequency.
    pub fn new(sink: Arc<S>) -> Self {
        PwmEngine {
            sink,
            timebase: Arc::new(Timebase {
                frequency_hz: AtomicU32::new(DEFAULT_FREQUENCY_HZ),
            }),
            registry: ChannelRegistry::new(),
            idle: IdleStrategy::default(),
            state: EngineState::Configuring,
        }
    }

    /// Creates an engine from explicit settings.
    pub fn with_config(sink: Arc<S>, config: EngineConfig) -> Result<Self> {
        Ok(PwmEngine {
            sink,
            timebase: Arc::new(Timebase::new(config.frequency_hz)?),
            registry: ChannelRegistry::new(),
            idle: config.idle,
            state: EngineState::Configuring,
        })
    }

    /// Sets the frequency shared by all channels.
    ///
    /// # Errors
    ///
    /// [`PwmError::InvalidFrequency`] for zero or anything above [`MAX_FREQUENCY_HZ`].
    pub fn set_frequency(&self, hz: u32) -> Result<()> {
        self.timebase.set(hz)?;
        debug!(frequency_hz = hz, period = ?self.timebase.period(), "Frequency set");
        Ok(())
    }

    /// Current frequency in Hz.
    pub fn frequency(&self) -> u32 {
        self.timebase.frequency()
    }

    /// Current period.
    pub fn period(&self) -> Duration {
        self.timebase.period()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The pin sink this engine drives.
    pub fn sink(&self) -> &Arc<S> {
        &self.sink
    }

    /// Registers a channel. Only allowed before [`start_all_channels`](Self::start_all_channels).
    pub fn create_channel(&mut self, id: ChannelId) -> Result<()> {
        match self.state {
            EngineState::Configuring => self.registry.create_channel(id).map(|_| ()),
            EngineState::Running => Err(PwmError::InvalidState(
                "channels cannot be created while running",
            )),
            EngineState::Closed => Err(PwmError::InvalidState("engine is closed")),
        }
    }

    /// Sets a channel's range. Unknown ids are ignored.
    pub fn set_range(&self, id: ChannelId, range: u32) {
        self.registry.set_range(id, range);
    }

    /// Sets a channel's data. Unknown ids are ignored.
    pub fn set_data(&self, id: ChannelId, data: u32) {
        self.registry.set_data(id, data);
    }

    /// Assigns a pin to a channel and configures it for output. Unknown ids are ignored.
    pub fn assign_pin(&self, id: ChannelId, pin: Pin) -> Result<()> {
        self.registry.assign_pin(id, pin, &*self.sink)
    }

    /// Looks up a channel.
    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.registry.lookup(id)
    }

    /// Ids of every registered channel, in creation order.
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.registry.ids()
    }

    /// Starts one worker thread per registered channel.
    ///
    /// Calling it again while running does nothing. If a worker cannot be
    /// spawned, the ones already started are stopped and the engine stays in
    /// [`EngineState::Configuring`].
    pub fn start_all_channels(&mut self) -> Result<()> {
        match self.state {
            EngineState::Configuring => {}
            EngineState::Running => {
                debug!("Channels already started");
                return Ok(());
            }
            EngineState::Closed => return Err(PwmError::InvalidState("engine is closed")),
        }

        info!(
            channels = self.registry.len(),
            frequency_hz = self.frequency(),
            "Starting channel workers"
        );
        let timebase = Arc::clone(&self.timebase);
        let sink = Arc::clone(&self.sink);
        let idle = self.idle;
        self.registry
            .start_all(|channel| {
                WaveformThread::new(channel, Arc::clone(&timebase), Arc::clone(&sink), idle)
                    .spawn()
            })
            .inspect_err(|e| error!("Failed to start channel workers: {}", e))?;

        self.state = EngineState::Running;
        Ok(())
    }

    /// Stops and joins every worker, then drops every channel.
    ///
    /// Blocks for at most about one period. Safe to call more than once.
    pub fn close(&mut self) {
        if self.state == EngineState::Closed {
            return;
        }
        info!(channels = self.registry.len(), "Closing PWM engine");
        for id in self.registry.stop_all() {
            error!(channel = id, "Waveform thread panicked");
        }
        self.registry.clear();
        self.state = EngineState::Closed;
    }
}

impl<S: PinSink> Drop for PwmEngine<S> {
    fn drop(&mut self) {
        self.close();
    }
}
