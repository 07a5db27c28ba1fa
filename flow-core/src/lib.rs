//! Flow Core
//!
//! The runtime-agnostic dataflow kernel: packets, events, the byte-precise
//! packet queue, the pad/element graph, and the primitives (backpressure,
//! the generational arena, the incremental serialization contract) they're
//! built from. Nothing in this crate touches an OS thread, a socket, or a
//! file descriptor — that's `flow-shunt`'s job.
//!
//! - Reference-counted packet envelope (`packet`)
//! - Event taxonomy carried by object packets (`event`)
//! - Byte-precise packet queue (`queue`)
//! - Pads and the generational graph they're wired into (`pad`, `graph`)
//! - Element behavior trait and the stock element shapes (`element`)
//! - Byte-based backpressure (`backpressure`)
//! - Incremental (de)serialization contract (`serializable`)
//! - Generational slab arena (`arena`)
//! - Error types (`error`)
//! - Tunable configuration (`config`)

#![deny(unsafe_code)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]

pub mod arena;
pub mod backpressure;
pub mod config;
pub mod element;
pub mod error;
pub mod event;
pub mod graph;
pub mod packet;
pub mod pad;
pub mod queue;
pub mod serializable;

pub mod prelude {
    pub use crate::backpressure::ByteLimiter;
    pub use crate::config::FlowConfig;
    pub use crate::element::{ElementLogic, Joiner, OutputSink, Simplex, Splitter};
    pub use crate::error::{FlowError, Result};
    pub use crate::event::{Code, DetailedEvent, Domain, Event, PropertyEvent, PropertyValue};
    pub use crate::graph::{ElementId, Graph};
    pub use crate::packet::{Packet, PacketData, PacketFormat};
    pub use crate::pad::{Direction, Pad, PadId};
    pub use crate::queue::PacketQueue;
    pub use crate::serializable::{Deserializable, Serializable, StepOutcome};
}
