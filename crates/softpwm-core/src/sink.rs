//! The GPIO driver boundary.

use core::fmt;
use core::time::Duration;

/// Address of a general-purpose output line, as understood by the GPIO driver.
pub type Pin = u8;

/// Electrical level of an output pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Pin driven low.
    Low,
    /// Pin driven high.
    High,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => write!(f, "LOW"),
            Level::High => write!(f, "HIGH"),
        }
    }
}

/// The GPIO driver the engine drives.
///
/// Implementations are shared between the controlling thread and every
/// channel worker, so all methods take `&self`.
pub trait PinSink: Send + Sync + 'static {
    /// Put `pin` in output mode. Called once, when the pin is first assigned to a channel.
    fn configure_output(&self, pin: Pin);

    /// Drive `pin` to `level`. Called every half-cycle for every pin on a channel.
    fn set_level(&self, pin: Pin, level: Level);

    /// Suspend the calling thread for approximately `duration`.
    fn sleep(&self, duration: Duration);
}
