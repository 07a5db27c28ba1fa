//! UDP connector: a bound (and optionally connected) datagram socket.
//! Oversized datagrams are reported via `Socket(OversizedPacket)` rather
//! than silently truncated — enforced by the shunt's `io_buffer_size`,
//! which a `recv` can never exceed without the OS reporting an error.

use std::net::UdpSocket;
use std::sync::Arc;

use flow_core::config::FlowConfig;
use flow_core::pad::PadId;
use flow_shunt::flavors;
use flow_shunt::pool::WorkerPool;

use crate::connector::{ConnectorError, ShuntConnector};

/// Bind a UDP socket on `local_port` (`0` for an OS-assigned port) and
/// optionally connect it to `peer`, fixing the datagram's destination.
///
/// # Errors
/// Propagates socket setup failure or worker-pool exhaustion.
pub fn bind(
    pool: &Arc<WorkerPool>,
    local_port: u16,
    peer: Option<std::net::SocketAddr>,
    config: &FlowConfig,
    graph_input: PadId,
    graph_output: PadId,
) -> Result<ShuntConnector, ConnectorError> {
    let socket = UdpSocket::bind(("0.0.0.0", local_port))?;
    if let Some(peer) = peer {
        socket.connect(peer)?;
    }
    let label = format!("udp-{local_port}");
    let (source, sink) = flavors::udp(socket)?;
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
