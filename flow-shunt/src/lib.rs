//! # Flow Shunt
//!
//! **Internal worker-pool implementation crate for Flow.**
//!
//! This is where blocking OS I/O meets the cooperative pad/element graph.
//! A shunt wraps one file descriptor (a file, a socket, a pipe to a child
//! process) in a pair of dedicated blocking worker threads — one pumping
//! reads into a bounded channel, one pumping writes out of one — so that
//! nothing in `flow-core`'s dispatch loop ever calls into the kernel
//! directly. Use the `flow` crate for the public connector API built on
//! top of this.
//!
//! - Thread-budget enforcement (`pool`)
//! - The reader/writer worker pair and its channels (`shunt`)
//! - `block_reads`/`block_writes` gating (`gate`)
//! - Concrete OS resources: file, stdio, TCP, UDP, subprocess (`flavors`)

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod flavors;
pub mod gate;
pub mod pool;
pub mod shunt;

pub mod prelude {
    pub use crate::flavors;
    pub use crate::pool::WorkerPool;
    pub use crate::shunt::{ShuntHandle, ShuntMessage, ShuntSink, ShuntSource};
}
