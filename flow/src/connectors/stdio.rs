//! Stdio connector: bridges the process's own standard input/output into
//! the graph, for pipelines acting as one stage of a shell pipe.

use std::sync::Arc;

use flow_core::config::FlowConfig;
use flow_core::pad::PadId;
use flow_shunt::flavors;
use flow_shunt::pool::WorkerPool;

use crate::connector::{ConnectorError, ShuntConnector};

/// # Errors
/// Propagates worker-pool exhaustion.
pub fn open(
    pool: &Arc<WorkerPool>,
    config: &FlowConfig,
    graph_input: PadId,
    graph_output: PadId,
) -> Result<ShuntConnector, ConnectorError> {
    let (source, sink) = flavors::stdio();
    ShuntConnector::new(
        pool,
        "stdio",
        source,
        sink,
        config.io_buffer_size,
        config.write_queue_packet_cap,
        graph_input,
        graph_output,
    )
}
