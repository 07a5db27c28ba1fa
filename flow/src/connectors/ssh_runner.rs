//! SSH command runner: executes one remote command over a shared control
//! master, per [`flow_core::event::SshConnectOp`] /
//! [`flow_core::event::ShellOp`]. Consecutive `ShellOp`s against the same
//! master are queued by [`crate::ssh::submit_command`] and run strictly one
//! at a time; this module only bridges one such queued command's reply
//! channel into the graph.

use std::sync::Arc;

use flow_core::event::{Code, DetailedEvent, Event, ShellOp, SshConnectOp, StreamCode};
use flow_core::graph::Graph;
use flow_core::packet::Packet;
use flow_core::pad::PadId;
use flow_shunt::pool::WorkerPool;
use flow_shunt::shunt::ShuntMessage;

use crate::connector::{ConnectorError, ConnectorState, ConnectorStateMachine};
use crate::ssh;

/// A running SSH command: the reply channel for the queued command plus
/// the same connector life cycle every other flavor exposes (CONNECTING
/// until the command's shunt reports STREAM_BEGIN, CONNECTED while its
/// stdout streams, DISCONNECTED once the process exits).
pub struct SshRunner {
    pub state: ConnectorStateMachine,
    reply_rx: flume::Receiver<ShuntMessage>,
    graph_output: PadId,
}

/// Establish (or reuse) a master for `op`, then queue `shell.command`
/// against it.
///
/// # Errors
/// Returns [`ConnectorError::Io`] if the master fails to spawn.
pub fn run(
    pool: &Arc<WorkerPool>,
    op: &SshConnectOp,
    shell: &ShellOp,
    graph_input: PadId,
    graph_output: PadId,
) -> Result<SshRunner, ConnectorError> {
    let _ = graph_input; // no outbound writes: a ShellOp is fire-and-forget
    let master = ssh::master_for(pool, &op.host, op.user.as_deref(), op.port)?;
    let reply_rx = ssh::submit_command(&master, &shell.command);

    let mut state = ConnectorStateMachine::new();
    state.begin_connect()?;
    Ok(SshRunner {
        state,
        reply_rx,
        graph_output,
    })
}

impl SshRunner {
    /// Drain everything the queued command has produced so far, same
    /// contract as `ShuntConnector::pump`.
    pub fn pump(&mut self, graph: &mut Graph) {
        while let Ok(message) = self.reply_rx.try_recv() {
            match message {
                ShuntMessage::Data(bytes) => {
                    if let Ok(packet) = Packet::from_bytes(bytes) {
                        graph.push(self.graph_output, packet);
                    }
                }
                ShuntMessage::Event(detailed) => {
                    if self.state.state() == ConnectorState::Connecting
                        && detailed.matches(Code::Stream(StreamCode::Begin))
                    {
                        let _ = self.state.mark_connected();
                    }
                    let packet = Packet::new_take_object(Event::Detailed(detailed), 0);
                    graph.push(self.graph_output, packet);
                }
                ShuntMessage::Control(event) => {
                    let packet = Packet::new_take_object(event, 0);
                    graph.push(self.graph_output, packet);
                }
                ShuntMessage::Closed => {
                    if self.state.begin_disconnect().is_ok() {
                        self.state.mark_disconnected();
                    }
                    let packet = Packet::new_take_object(Event::Detailed(DetailedEvent::new(Code::Stream(StreamCode::End))), 0);
                    graph.push(self.graph_output, packet);
                }
            }
        }
    }
}
