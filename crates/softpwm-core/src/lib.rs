#![warn(missing_docs)]
#![doc = "Software pulse-width modulation on arbitrary GPIO lines."]
#![doc = ""]
#![doc = "Each channel gets its own timing thread that drives the channel's pins HIGH"]
#![doc = "and LOW so that every period is split according to `data / range`. The GPIO"]
#![doc = "driver itself is supplied by the caller through the [`PinSink`] trait."]
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use softpwm_core::{Level, Pin, PinSink, PwmEngine};
//!
//! struct Driver;
//!
//! impl PinSink for Driver {
//!     fn configure_output(&self, _pin: Pin) {}
//!     fn set_level(&self, _pin: Pin, _level: Level) {}
//!     fn sleep(&self, duration: Duration) {
//!         std::thread::sleep(duration)
//!     }
//! }
//!
//! let mut engine = PwmEngine::new(Arc::new(Driver));
//! engine.create_channel(0)?;
//! engine.set_range(0, 1024);
//! engine.set_data(0, 512);
//! engine.assign_pin(0, 12)?;
//! engine.start_all_channels()?;
//! engine.close();
//! # Ok::<(), softpwm_core::PwmError>(())
//! ```

pub mod channel;
pub mod engine;
pub mod error;
pub mod sink;
pub mod waveform;

#[cfg(test)]
mod mock;

pub use channel::{Channel, ChannelId, ChannelRegistry};
pub use engine::{
    DEFAULT_FREQUENCY_HZ, EngineConfig, EngineState, MAX_FREQUENCY_HZ, PwmEngine, period_for,
};
pub use error::PwmError;
pub use sink::{Level, Pin, PinSink};
pub use waveform::{DutyTiming, IdleStrategy};
