//! File connector: reads or writes a path on local disk, per a
//! [`flow_core::event::FileConnectOp`].

use std::path::Path;
use std::sync::Arc;

use flow_core::config::FlowConfig;
use flow_core::event::FileConnectOp;
use flow_core::pad::PadId;
use flow_shunt::flavors;
use flow_shunt::pool::WorkerPool;

use crate::connector::{ConnectorError, ShuntConnector};

/// Open `op.path` for the file connector's read/write pair.
///
/// # Errors
/// Propagates the underlying open failure (mapped to a `File*` detailed
/// event by the shunt reader, not here — this only covers the synchronous
/// open call itself) or worker-pool exhaustion.
pub fn open(
    pool: &Arc<WorkerPool>,
    op: &FileConnectOp,
    config: &FlowConfig,
    graph_input: PadId,
    graph_output: PadId,
) -> Result<ShuntConnector, ConnectorError> {
    open_path(pool, &op.path, op.create, op.truncate, config, graph_input, graph_output)
}

fn open_path(
    pool: &Arc<WorkerPool>,
    path: &Path,
    create: bool,
    truncate: bool,
    config: &FlowConfig,
    graph_input: PadId,
    graph_output: PadId,
) -> Result<ShuntConnector, ConnectorError> {
    let label = path.to_string_lossy().into_owned();
    let (source, sink) = flavors::open_file(path, create, truncate)?;
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
