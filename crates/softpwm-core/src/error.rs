//! Error types for the software PWM engine.
//!
//! Operations on a channel id that does not exist are not errors: they are
//! silently ignored. Everything in here is a failure the caller has to see.

#![warn(missing_docs)]

use crate::channel::ChannelId;

/// Errors that can occur while configuring or running the engine.
#[derive(Debug, thiserror::Error)]
pub enum PwmError {
    /// The requested frequency is zero or has a period shorter than one microsecond.
    #[error("Invalid frequency: {0} Hz (must be between 1 and 1000000)")]
    InvalidFrequency(u32),
    /// A channel with this id is already registered.
    #[error("Channel {0} already exists")]
    DuplicateChannel(ChannelId),
    /// The operation is not allowed in the engine's current lifecycle state.
    #[error("Invalid engine state: {0}")]
    InvalidState(&'static str),
    /// Growing the channel or pin list failed.
    #[error("Out of memory while growing {0}")]
    OutOfMemory(&'static str),
    /// A channel worker thread could not be started.
    #[error("Failed to spawn channel worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Shorthand result type for engine operations.
pub type Result<T> = core::result::Result<T, PwmError>;
