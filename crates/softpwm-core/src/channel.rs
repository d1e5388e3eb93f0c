//! Channel records and the registry that owns them.
//!
//! Configuration is written by the controlling thread and read by the
//! channel's own worker. Scalars are atomics; the pin list sits behind a
//! read/write lock that the worker only holds while driving levels.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use core::time::Duration;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{PwmError, Result};
use crate::sink::{Level, Pin, PinSink};
use crate::waveform::DutyTiming;

/// Caller-chosen channel identifier.
pub type ChannelId = u8;

/// One independent waveform generator.
#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    range: AtomicU32,
    data: AtomicU32,
    run: AtomicBool,
    pins: RwLock<Vec<Pin>>,
}

impl Channel {
    fn new(id: ChannelId) -> Self {
        Channel {
            id,
            range: AtomicU32::new(0),
            data: AtomicU32::new(0),
            run: AtomicBool::new(false),
            pins: RwLock::new(Vec::new()),
        }
    }

    /// The channel's identifier.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Duty-cycle denominator. Zero means the channel emits nothing.
    pub fn range(&self) -> u32 {
        self.range.load(Ordering::Relaxed)
    }

    /// Duty-cycle numerator.
    pub fn data(&self) -> u32 {
        self.data.load(Ordering::Relaxed)
    }

    /// Requested duty cycle `data / range`, unclamped. `None` while the range is zero.
    pub fn duty_cycle(&self) -> Option<f64> {
        let range = self.range();
        if range == 0 {
            None
        } else {
            Some(f64::from(self.data()) / f64::from(range))
        }
    }

    /// Snapshot of the assigned pins, in assignment order.
    pub fn pins(&self) -> Vec<Pin> {
        self.pins.read().clone()
    }

    /// Whether the channel's worker has been told to keep running.
    pub fn is_running(&self) -> bool {
        self.run.load(Ordering::Acquire)
    }

    pub(crate) fn set_range(&self, range: u32) {
        self.range.store(range, Ordering::Relaxed);
    }

    pub(crate) fn set_data(&self, data: u32) {
        self.data.store(data, Ordering::Relaxed);
    }

    pub(crate) fn set_running(&self, run: bool) {
        self.run.store(run, Ordering::Release);
    }

    /// Appends `pin` unless it is already assigned. Returns whether it was added.
    pub(crate) fn add_pin(&self, pin: Pin) -> Result<bool> {
        let mut pins = self.pins.write();
        if pins.contains(&pin) {
            return Ok(false);
        }
        pins.try_reserve(1)
            .map_err(|_| PwmError::OutOfMemory("pin list"))?;
        pins.push(pin);
        Ok(true)
    }

    /// On/off split for one period under the current configuration.
    pub(crate) fn timing(&self, period: Duration) -> Option<DutyTiming> {
        DutyTiming::compute(self.data(), self.range(), period)
    }

    /// Drives every assigned pin to `level`, in assignment order.
    pub(crate) fn drive<S: PinSink>(&self, sink: &S, level: Level) {
        for &pin in self.pins.read().iter() {
            trace!(channel = self.id, pin, %level, "Driving pin");
            sink.set_level(pin, level);
        }
    }
}

struct ChannelEntry {
    channel: Arc<Channel>,
    worker: Option<JoinHandle<()>>,
}

/// Owns every channel record and its worker handle.
///
/// Ids are unique: creating an id twice is rejected. Setters on an id that
/// is not registered do nothing and report nothing.
#[derive(Default)]
pub struct ChannelRegistry {
    entries: Vec<ChannelEntry>,
}

impl ChannelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new channel with zero range and data, no pins, and not running.
    pub fn create_channel(&mut self, id: ChannelId) -> Result<&Channel> {
        if self.lookup(id).is_some() {
            return Err(PwmError::DuplicateChannel(id));
        }
        self.entries
            .try_reserve(1)
            .map_err(|_| PwmError::OutOfMemory("channel registry"))?;
        self.entries.push(ChannelEntry {
            channel: Arc::new(Channel::new(id)),
            worker: None,
        });
        debug!(channel = id, "Channel created");
        Ok(&*self.entries[self.entries.len() - 1].channel)
    }

    /// Finds a channel by id.
    pub fn lookup(&self, id: ChannelId) -> Option<&Channel> {
        self.entries
            .iter()
            .find(|entry| entry.channel.id == id)
            .map(|entry| &*entry.channel)
    }

    /// Sets the duty-cycle denominator. No bounds check; zero suspends the waveform.
    pub fn set_range(&self, id: ChannelId, range: u32) {
        match self.lookup(id) {
            Some(channel) => {
                channel.set_range(range);
                debug!(channel = id, range, "Range set");
            }
            None => trace!(channel = id, "set_range on unknown channel ignored"),
        }
    }

    /// Sets the duty-cycle numerator. Values above the range mean 100%.
    pub fn set_data(&self, id: ChannelId, data: u32) {
        match self.lookup(id) {
            Some(channel) => {
                channel.set_data(data);
                trace!(channel = id, data, "Data set");
            }
            None => trace!(channel = id, "set_data on unknown channel ignored"),
        }
    }

    /// Assigns `pin` to a channel and configures it as an output the first time.
    ///
    /// Re-assigning a pin the channel already owns does nothing.
    pub fn assign_pin<S: PinSink>(&self, id: ChannelId, pin: Pin, sink: &S) -> Result<()> {
        let Some(channel) = self.lookup(id) else {
            trace!(channel = id, pin, "assign_pin on unknown channel ignored");
            return Ok(());
        };
        if channel.add_pin(pin)? {
            sink.configure_output(pin);
            debug!(channel = id, pin, "Pin assigned");
        }
        Ok(())
    }

    /// Ids of all registered channels, in creation order.
    pub fn ids(&self) -> Vec<ChannelId> {
        self.entries.iter().map(|entry| entry.channel.id).collect()
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no channel is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Marks every channel running and hands each one to `spawn`.
    ///
    /// If `spawn` fails, the workers started so far are stopped and joined
    /// before the error is returned.
    pub(crate) fn start_all<F>(&mut self, mut spawn: F) -> Result<()>
    where
        F: FnMut(Arc<Channel>) -> std::io::Result<JoinHandle<()>>,
    {
        for index in 0..self.entries.len() {
            let channel = Arc::clone(&self.entries[index].channel);
            channel.set_running(true);
            match spawn(channel) {
                Ok(handle) => self.entries[index].worker = Some(handle),
                Err(e) => {
                    self.stop_all();
                    return Err(PwmError::Spawn(e));
                }
            }
        }
        Ok(())
    }

    /// Clears every run flag, then wakes and joins every worker.
    ///
    /// Returns the ids of channels whose worker panicked.
    pub(crate) fn stop_all(&mut self) -> Vec<ChannelId> {
        for entry in &self.entries {
            entry.channel.set_running(false);
        }
        let mut panicked = Vec::new();
        for entry in &mut self.entries {
            if let Some(handle) = entry.worker.take() {
                handle.thread().unpark();
                if handle.join().is_err() {
                    panicked.push(entry.channel.id);
                }
            }
        }
        panicked
    }

    /// Drops every channel record. Workers must already be joined.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingSink;

    #[test]
    fn test_create_channel_defaults() {
        let mut registry = ChannelRegistry::new();
        let channel = registry.create_channel(3).unwrap();
        assert_eq!(channel.id(), 3);
        assert_eq!(channel.range(), 0);
        assert_eq!(channel.data(), 0);
        assert!(channel.pins().is_empty());
        assert!(!channel.is_running());
        assert_eq!(channel.duty_cycle(), None);
    }

    #[test]
    fn test_duplicate_channel_rejected() {
        let mut registry = ChannelRegistry::new();
        registry.create_channel(1).unwrap();
        let result = registry.create_channel(1);
        assert!(matches!(result, Err(PwmError::DuplicateChannel(1))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_unknown_channel() {
        let mut registry = ChannelRegistry::new();
        registry.create_channel(0).unwrap();
        assert!(registry.lookup(7).is_none());
        assert!(registry.lookup(0).is_some());
    }

    #[test]
    fn test_set_range_and_data() {
        let mut registry = ChannelRegistry::new();
        registry.create_channel(0).unwrap();
        registry.set_range(0, 1024);
        registry.set_data(0, 256);
        let channel = registry.lookup(0).unwrap();
        assert_eq!(channel.range(), 1024);
        assert_eq!(channel.data(), 256);
        assert_eq!(channel.duty_cycle(), Some(0.25));
    }

    #[test]
    fn test_data_above_range_accepted() {
        let mut registry = ChannelRegistry::new();
        registry.create_channel(0).unwrap();
        registry.set_range(0, 10);
        registry.set_data(0, 15);
        assert_eq!(registry.lookup(0).unwrap().duty_cycle(), Some(1.5));
    }

    #[test]
    fn test_setters_on_unknown_channel_are_noops() {
        let sink = RecordingSink::new();
        let mut registry = ChannelRegistry::new();
        registry.create_channel(0).unwrap();

        registry.set_range(9, 100);
        registry.set_data(9, 50);
        registry.assign_pin(9, 4, &sink).unwrap();

        let channel = registry.lookup(0).unwrap();
        assert_eq!(channel.range(), 0);
        assert_eq!(channel.data(), 0);
        assert!(channel.pins().is_empty());
        assert!(sink.configured().is_empty());
        assert_eq!(registry.ids(), vec![0]);
    }

    #[test]
    fn test_assign_pin_is_idempotent() {
        let sink = RecordingSink::new();
        let mut registry = ChannelRegistry::new();
        registry.create_channel(0).unwrap();

        registry.assign_pin(0, 12, &sink).unwrap();
        registry.assign_pin(0, 12, &sink).unwrap();

        assert_eq!(registry.lookup(0).unwrap().pins(), vec![12]);
        assert_eq!(sink.configured(), vec![12]);
    }

    #[test]
    fn test_pins_keep_assignment_order() {
        let sink = RecordingSink::new();
        let mut registry = ChannelRegistry::new();
        registry.create_channel(0).unwrap();
        for pin in [19, 12, 18, 12, 13] {
            registry.assign_pin(0, pin, &sink).unwrap();
        }
        assert_eq!(registry.lookup(0).unwrap().pins(), vec![19, 12, 18, 13]);
        assert_eq!(sink.configured(), vec![19, 12, 18, 13]);
    }

    #[test]
    fn test_ids_in_creation_order() {
        let mut registry = ChannelRegistry::new();
        assert!(registry.is_empty());
        for id in [4, 0, 2] {
            registry.create_channel(id).unwrap();
        }
        assert_eq!(registry.ids(), vec![4, 0, 2]);
        assert_eq!(registry.len(), 3);
    }

    fn idle_worker(channel: Arc<Channel>) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new().spawn(move || {
            while channel.is_running() {
                std::thread::park_timeout(Duration::from_millis(1));
            }
        })
    }

    #[test]
    fn test_spawn_failure_rolls_back_started_workers() {
        let mut registry = ChannelRegistry::new();
        for id in 0..3 {
            registry.create_channel(id).unwrap();
        }

        let mut spawned = 0;
        let result = registry.start_all(|channel| {
            spawned += 1;
            if spawned == 2 {
                Err(std::io::Error::other("no more threads"))
            } else {
                idle_worker(channel)
            }
        });

        assert!(matches!(result, Err(PwmError::Spawn(_))));
        assert_eq!(spawned, 2);
        for id in 0..3 {
            assert!(!registry.lookup(id).unwrap().is_running());
        }
        assert!(registry.entries.iter().all(|entry| entry.worker.is_none()));
    }

    #[test]
    fn test_stop_all_reports_panicked_workers() {
        let mut registry = ChannelRegistry::new();
        for id in 0..3 {
            registry.create_channel(id).unwrap();
        }

        registry
            .start_all(|channel| {
                if channel.id() == 1 {
                    std::thread::Builder::new().spawn(|| panic!("worker failure"))
                } else {
                    idle_worker(channel)
                }
            })
            .unwrap();

        assert_eq!(registry.stop_all(), vec![1]);
        assert!(registry.entries.iter().all(|entry| entry.worker.is_none()));
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear_drops_channels() {
        let mut registry = ChannelRegistry::new();
        registry.create_channel(0).unwrap();
        registry.create_channel(1).unwrap();
        assert!(registry.stop_all().is_empty());
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.lookup(0).is_none());
    }
}
