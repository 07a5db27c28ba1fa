//! TCP connector: dials out, or wraps an already-accepted stream. Both
//! cases hand a [`TcpStream`] to the same shunt flavor — the distinction
//! only matters for which side called `connect`/`accept` first.

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

use flow_core::config::FlowConfig;
use flow_core::pad::PadId;
use flow_shunt::flavors;
use flow_shunt::pool::WorkerPool;

use crate::connector::{ConnectorError, ShuntConnector};

/// Dial `addr` on a worker thread and wrap the resulting stream in a
/// connector once it connects. The connect itself never runs on the
/// dispatch thread — a slow or unreachable peer only ever stalls a pool
/// worker, never the graph.
///
/// # Errors
/// Returns an error only if the pool has no free thread permit for the
/// connect attempt; a failed connect itself surfaces later as a
/// STREAM_DENIED event through `ShuntConnector::pump`.
pub fn dial(
    pool: &Arc<WorkerPool>,
    addr: SocketAddr,
    config: &FlowConfig,
    graph_input: PadId,
    graph_output: PadId,
) -> Result<ShuntConnector, ConnectorError> {
    let label = addr.to_string();
    ShuntConnector::dial(
        pool,
        &label,
        move || {
            let stream = TcpStream::connect(addr)?;
            flavors::tcp(stream)
        },
        config.io_buffer_size,
        config.write_queue_packet_cap,
        graph_input,
        graph_output,
    )
}

/// Wrap a stream obtained from `TcpListener::accept` (or any other
/// already-connected stream) in a connector skipping the dial step.
///
/// # Errors
/// Propagates `try_clone` failure or worker-pool exhaustion.
pub fn from_stream(
    pool: &Arc<WorkerPool>,
    stream: TcpStream,
    config: &FlowConfig,
    graph_input: PadId,
    graph_output: PadId,
) -> Result<ShuntConnector, ConnectorError> {
    let label = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "tcp".to_string());
    let (source, sink) = flavors::tcp(stream)?;
    ShuntConnector::new(
        pool,
        &label,
        source,
        sink,
        config.io_buffer_size,
        config.write_queue_packet_cap,
        graph_input,
        graph_output,
    )
}
