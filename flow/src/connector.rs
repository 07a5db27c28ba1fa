//! The connector state machine shared by every connector flavor, plus the
//! generic bridge between a [`flow_shunt::shunt::ShuntHandle`] and the
//! cooperative graph.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use flow_core::event::{Code, DetailedEvent, Event};
use flow_core::graph::Graph;
use flow_core::packet::Packet;
use flow_core::pad::PadId;
use flow_shunt::pool::WorkerPool;
use flow_shunt::shunt::{classify_io_error, ShuntHandle, ShuntMessage, ShuntSink, ShuntSource};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("cannot {action} from state {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: ConnectorState,
    },
    #[error(transparent)]
    Flow(#[from] flow_core::error::FlowError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Enforces the one-way life cycle: `Disconnected -> Connecting ->
/// Connected -> Disconnecting -> Disconnected`. Every connector flavor goes
/// through exactly this sequence; nothing skips a state or goes backwards
/// except the final return to `Disconnected`.
#[derive(Debug, Clone, Copy)]
pub struct ConnectorStateMachine {
    state: ConnectorState,
}

impl Default for ConnectorStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectorStateMachine {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ConnectorState::Disconnected,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ConnectorState {
        self.state
    }

    pub fn begin_connect(&mut self) -> Result<(), ConnectorError> {
        self.transition(ConnectorState::Disconnected, ConnectorState::Connecting, "connect")
    }

    pub fn mark_connected(&mut self) -> Result<(), ConnectorError> {
        self.transition(ConnectorState::Connecting, ConnectorState::Connected, "complete connect")
    }

    pub fn begin_disconnect(&mut self) -> Result<(), ConnectorError> {
        match self.state {
            ConnectorState::Connected | ConnectorState::Connecting => {
                self.state = ConnectorState::Disconnecting;
                Ok(())
            }
            other => Err(ConnectorError::InvalidTransition {
                action: "disconnect",
                state: other,
            }),
        }
    }

    pub fn mark_disconnected(&mut self) {
        self.state = ConnectorState::Disconnected;
    }

    /// A shunt STREAM_DENIED may arrive from any state (a connect attempt
    /// that never reached CONNECTED, or a live connection whose peer
    /// refused further traffic) and always lands back at DISCONNECTED.
    pub fn mark_denied(&mut self) {
        self.state = ConnectorState::Disconnected;
    }

    fn transition(
        &mut self,
        expected: ConnectorState,
        next: ConnectorState,
        action: &'static str,
    ) -> Result<(), ConnectorError> {
        if self.state != expected {
            return Err(ConnectorError::InvalidTransition {
                action,
                state: self.state,
            });
        }
        self.state = next;
        Ok(())
    }
}

/// A connect that hasn't resolved yet runs on a worker thread and reports
/// back through this channel; once it resolves, the connector either spawns
/// a live shunt from the returned source/sink pair or reports STREAM_DENIED.
type DialResult = io::Result<(Box<dyn ShuntSource>, Box<dyn ShuntSink>)>;

enum Bridge {
    Pending(flume::Receiver<DialResult>),
    Live(ShuntHandle),
    Failed,
}

/// Generic bridge: one shunt plus the state machine and pad wiring every
/// connector flavor is built from. Flavor-specific constructors (TCP, UDP,
/// file, stdio, SSH) live in their own modules and produce one of these.
pub struct ShuntConnector {
    pub state: ConnectorStateMachine,
    bridge: Bridge,
    pool: Arc<WorkerPool>,
    label: String,
    io_buffer_size: usize,
    queue_limit_messages: usize,
    /// Writes arriving while the dial is still pending queue here and flush
    /// to the shunt the moment `pump` sees the connect resolve, so a caller
    /// that writes right after `dial` returns doesn't lose data to the race.
    pending_writes: Vec<Bytes>,
    pub graph_input: PadId,
    pub graph_output: PadId,
}

impl ShuntConnector {
    /// Wrap an already-open source/sink pair (file, stdio, a bound UDP
    /// socket, an already-accepted TCP stream). The shunt spawns
    /// immediately; the connector still only reaches CONNECTED once its
    /// reader observes the shunt's own STREAM_BEGIN, same as `dial`.
    pub fn new(
        pool: &Arc<WorkerPool>,
        label: &str,
        source: Box<dyn ShuntSource>,
        sink: Box<dyn ShuntSink>,
        io_buffer_size: usize,
        queue_limit_messages: usize,
        graph_input: PadId,
        graph_output: PadId,
    ) -> Result<Self, ConnectorError> {
        let shunt = ShuntHandle::spawn(pool, label, source, sink, io_buffer_size, queue_limit_messages, None)
            .map_err(ConnectorError::Flow)?;
        let mut state = ConnectorStateMachine::new();
        state.begin_connect()?;
        Ok(Self {
            state,
            bridge: Bridge::Live(shunt),
            pool: Arc::clone(pool),
            label: label.to_string(),
            io_buffer_size,
            queue_limit_messages,
            pending_writes: Vec::new(),
            graph_input,
            graph_output,
        })
    }

    /// Start a connector whose underlying resource isn't open yet (a TCP
    /// dial). `connect` runs on a worker thread rather than the caller's,
    /// so nothing blocks the dispatch loop; the connector stays CONNECTING
    /// until `pump` observes either a live shunt reaching STREAM_BEGIN or
    /// the connect attempt failing.
    ///
    /// # Errors
    /// Returns an error if the pool has no free thread permit for the
    /// connect attempt itself.
    pub fn dial<F>(
        pool: &Arc<WorkerPool>,
        label: &str,
        connect: F,
        io_buffer_size: usize,
        queue_limit_messages: usize,
        graph_input: PadId,
        graph_output: PadId,
    ) -> Result<Self, ConnectorError>
    where
        F: FnOnce() -> DialResult + Send + 'static,
    {
        let (tx, rx) = flume::bounded(1);
        pool.spawn(format!("flow-dial-{label}"), move || {
            let _ = tx.send(connect());
        })
        .map_err(ConnectorError::Flow)?;

        let mut state = ConnectorStateMachine::new();
        state.begin_connect()?;
        Ok(Self {
            state,
            bridge: Bridge::Pending(rx),
            pool: Arc::clone(pool),
            label: label.to_string(),
            io_buffer_size,
            queue_limit_messages,
            pending_writes: Vec::new(),
            graph_input,
            graph_output,
        })
    }

    /// Graph-side write: a buffer packet arriving on this connector's input
    /// pad is handed straight to the shunt's outbound channel. While the
    /// connector is still dialing, the write queues and flushes once `pump`
    /// sees the dial resolve; it's dropped only once the connector has been
    /// denied outright.
    pub fn write(&mut self, data: Bytes) {
        match &self.bridge {
            Bridge::Live(shunt) => {
                let _ = shunt.outbound_tx.send(data);
            }
            Bridge::Pending(_) => self.pending_writes.push(data),
            Bridge::Failed => {}
        }
    }

    pub fn block_reads(&self) {
        if let Bridge::Live(shunt) = &self.bridge {
            shunt.block_reads();
        }
    }
    pub fn unblock_reads(&self) {
        if let Bridge::Live(shunt) = &self.bridge {
            shunt.unblock_reads();
        }
    }
    pub fn block_writes(&self) {
        if let Bridge::Live(shunt) = &self.bridge {
            shunt.block_writes();
        }
    }
    pub fn unblock_writes(&self) {
        if let Bridge::Live(shunt) = &self.bridge {
            shunt.unblock_writes();
        }
    }

    /// Drain everything the shunt's worker threads have produced so far
    /// without blocking, converting each message into a packet pushed onto
    /// `graph_output`. Callers drive this once per turn of their own event
    /// loop (see `Graph::run_until`'s sibling on the connector side).
    pub fn pump(&mut self, graph: &mut Graph) {
        if let Bridge::Pending(rx) = &self.bridge {
            match rx.try_recv() {
                Ok(Ok((source, sink))) => {
                    match ShuntHandle::spawn(
                        &self.pool,
                        &self.label,
                        source,
                        sink,
                        self.io_buffer_size,
                        self.queue_limit_messages,
                        None,
                    ) {
                        Ok(shunt) => {
                            for data in self.pending_writes.drain(..) {
                                let _ = shunt.outbound_tx.send(data);
                            }
                            self.bridge = Bridge::Live(shunt);
                        }
                        Err(_) => {
                            self.state.mark_denied();
                            self.bridge = Bridge::Failed;
                            push_denied(graph, self.graph_output, None);
                            return;
                        }
                    }
                }
                Ok(Err(e)) => {
                    self.state.mark_denied();
                    self.bridge = Bridge::Failed;
                    push_denied(graph, self.graph_output, Some(classify_io_error(&e)));
                    return;
                }
                Err(flume::TryRecvError::Empty) => return,
                Err(flume::TryRecvError::Disconnected) => {
                    self.state.mark_denied();
                    self.bridge = Bridge::Failed;
                    push_denied(graph, self.graph_output, None);
                    return;
                }
            }
        }

        let Bridge::Live(shunt) = &self.bridge else {
            return;
        };
        while let Ok(message) = shunt.inbound_rx.try_recv() {
            match message {
                ShuntMessage::Data(bytes) => {
                    if let Ok(packet) = Packet::from_bytes(bytes) {
                        graph.push(self.graph_output, packet);
                    }
                }
                ShuntMessage::Event(detailed) => {
                    if self.state.state() == ConnectorState::Connecting
                        && detailed.matches(Code::Stream(flow_core::event::StreamCode::Begin))
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
                    let packet = Packet::new_take_object(
                        Event::Detailed(DetailedEvent::new(Code::Stream(
                            flow_core::event::StreamCode::End,
                        ))),
                        0,
                    );
                    graph.push(self.graph_output, packet);
                }
            }
        }
    }
}

fn push_denied(graph: &mut Graph, graph_output: PadId, cause: Option<Code>) {
    let mut event = DetailedEvent::new(Code::Stream(flow_core::event::StreamCode::Denied));
    if let Some(cause) = cause {
        event = event.and_code(cause);
    }
    graph.push(graph_output, Packet::new_take_object(Event::Detailed(event), 0));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_follows_monotone_sequence() {
        let mut sm = ConnectorStateMachine::new();
        assert_eq!(sm.state(), ConnectorState::Disconnected);
        sm.begin_connect().unwrap();
        assert_eq!(sm.state(), ConnectorState::Connecting);
        sm.mark_connected().unwrap();
        assert_eq!(sm.state(), ConnectorState::Connected);
        sm.begin_disconnect().unwrap();
        assert_eq!(sm.state(), ConnectorState::Disconnecting);
        sm.mark_disconnected();
        assert_eq!(sm.state(), ConnectorState::Disconnected);
    }

    #[test]
    fn skipping_a_state_is_rejected() {
        let mut sm = ConnectorStateMachine::new();
        assert!(sm.mark_connected().is_err()); // can't skip Connecting
        sm.begin_connect().unwrap();
        assert!(sm.begin_connect().is_err()); // can't connect twice
    }
}
