//! # Flow
//!
//! An async dataflow library: packets move through a graph of elements
//! joined at typed pads, and a shunt bridges each graph-edge connector to a
//! real OS resource (a socket, a file, a pipe to a subprocess) via a small
//! pool of dedicated blocking worker threads.
//!
//! ## Architecture
//!
//! Flow is structured as a **dataflow kernel** with clean layering:
//!
//! - **`flow-core`**: packets, events, the pad/element graph, backpressure
//! - **`flow-shunt`**: the blocking worker pool and its OS-resource flavors
//! - **`flow`**: public API surface (this crate) — connectors, the
//!   connector life cycle, the mux codec, and the SSH master registry
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flow::prelude::*;
//! use flow_core::pad::Direction;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = WorkerPool::new(None);
//! let config = FlowConfig::default();
//! let mut graph = Graph::new(config.queue_limit);
//!
//! let (_sink_elem, sink_pads) =
//!     graph.add_element(Box::new(Simplex::default()), &[(Direction::Input, "in")]);
//!
//! let mut connector = flow::connectors::stdio::open(&pool, &config, sink_pads[0], sink_pads[0])?;
//! connector.write(flow::Bytes::from_static(b"hello\n"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Performance
//!
//! - **Zero-copy on the wire**: uses `bytes::Bytes` for packet buffers
//! - **Bounded recursion**: the graph's dispatch loop is trampolined, not
//!   recursive, so a long element chain never grows the call stack
//! - **Byte-scoped backpressure**: one oversized packet can't starve a
//!   pipeline (see `flow_core::backpressure`)
//!
//! ## Safety
//!
//! `unsafe` is denied in every crate in this workspace (`#![deny(unsafe_code)]`).

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

pub use bytes::Bytes;
pub use flow_core::config::FlowConfig;
pub use flow_core::error::{FlowError, Result};

pub mod collaborators;
pub mod connector;
pub mod connectors;
pub mod mux;
pub mod ssh;

/// Development helpers (benches/tests)
pub mod dev_tracing;

pub mod prelude {
    pub use crate::connector::{ConnectorError, ConnectorState, ConnectorStateMachine, ShuntConnector};
    pub use crate::mux::{Deserializer, MuxHeader, Serializer};
    pub use crate::{FlowConfig, FlowError};
    pub use flow_core::element::{ElementLogic, Simplex};
    pub use flow_core::graph::Graph;
    pub use flow_shunt::pool::WorkerPool;
}
