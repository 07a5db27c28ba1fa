//! Flow error types.
//!
//! Per the propagation policy in the core design, almost nothing on the hot
//! path (pad push, queue operations, element dispatch) returns a `Result` —
//! failures travel downstream as `DetailedEvent` packets instead. This type
//! exists for the handful of synchronous construction APIs that *can* fail
//! before any packet has been pushed: building a packet over the size limit,
//! spawning a shunt, connecting a pad pair with mismatched directions.

use thiserror::Error;

/// Crate-wide error type for fallible construction APIs.
#[derive(Error, Debug)]
pub enum FlowError {
    /// A buffer packet was constructed over `Packet::MAX_SIZE`.
    #[error("packet size {size} exceeds maximum of {max}")]
    PacketTooLarge { size: usize, max: usize },

    /// `Pad::connect` was called with two pads of the same direction.
    #[error("cannot connect two {0:?} pads to each other")]
    DirectionMismatch(crate::pad::Direction),

    /// A pad operation referenced a pad id that is no longer live (its
    /// element was dropped, or the id belongs to a different graph).
    #[error("pad id is stale or unknown")]
    StalePad,

    /// An element operation referenced a stale or unknown element id.
    #[error("element id is stale or unknown")]
    StaleElement,

    /// Underlying OS I/O failure surfaced during shunt construction.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker pool could not accept more work.
    #[error("worker pool exhausted (capacity {capacity})")]
    WorkerPoolExhausted { capacity: usize },

    /// A channel used for cross-thread shunt communication was closed.
    #[error("shunt channel closed")]
    ChannelClosed,
}

/// Result alias for fallible Flow construction APIs.
pub type Result<T> = std::result::Result<T, FlowError>;
