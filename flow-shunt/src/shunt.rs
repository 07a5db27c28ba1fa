//! The shunt itself: a pair of blocking worker threads — one pumping reads
//! off an OS resource into the graph, one pumping writes from the graph out
//! to it — fronted by bounded channels that give the graph side something
//! to apply backpressure to.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use flow_core::event::{
    Code, DetailedEvent, Event, FileCode, Position, ProcessResult, SegmentRequest, SocketCode,
    StreamCode,
};

use crate::gate::Gate;
use crate::pool::WorkerPool;

/// Anything a reader worker can pull bytes from.
pub trait ShuntSource: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// The sender of the most recently read chunk, for transports with no
    /// fixed peer (UDP). `None` for every connection-oriented source.
    fn last_sender(&self) -> Option<SocketAddr> {
        None
    }

    /// True for transports where one `read` call already returns one whole
    /// message (UDP datagrams) rather than an arbitrary-length slice of a
    /// byte stream. Each such read is bracketed in its own segment.
    fn is_datagram(&self) -> bool {
        false
    }

    /// Reposition the source, for flavors that support seeking (plain
    /// files). Unsupported by default.
    fn seek(&mut self, _pos: Position) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "seek not supported by this shunt source"))
    }
}

impl<T: Read + Send> ShuntSource for T {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }
}

/// Anything a writer worker can push bytes into.
pub trait ShuntSink: Send {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
    fn flush(&mut self) -> io::Result<()>;
}

impl<T: Write + Send> ShuntSink for T {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(self)
    }
}

/// What a shunt hands back to the graph side.
#[derive(Debug, Clone)]
pub enum ShuntMessage {
    Data(Bytes),
    Event(DetailedEvent),
    /// An event with a richer payload than a bare code list (a subprocess
    /// exit status, a UDP peer address) — kept distinct from `Event` since
    /// those carry no data beyond the matched codes.
    Control(Event),
    Closed,
}

/// What the graph side can ask a running reader to do mid-stream.
#[derive(Debug, Clone, Copy)]
pub enum ShuntControl {
    Seek(Position),
    Segment(SegmentRequest),
}

/// A running shunt: two worker threads plus the channels and gates that let
/// the graph side talk to them without ever blocking itself.
pub struct ShuntHandle {
    pub inbound_rx: flume::Receiver<ShuntMessage>,
    pub outbound_tx: flume::Sender<Bytes>,
    control_tx: flume::Sender<ShuntControl>,
    read_gate: Arc<Gate>,
    write_gate: Arc<Gate>,
}

impl ShuntHandle {
    /// Spawn the reader and writer workers for one shunt. `io_buffer_size`
    /// bounds one blocking read's chunk size; `queue_limit` (in messages)
    /// bounds the inbound channel so a stalled graph side throttles the
    /// reader thread's progress rather than growing memory without limit.
    /// `on_eof`, if given, runs once the reader observes end of stream and
    /// its return value (an exit code) is surfaced as a `ProcessResult`
    /// before `StreamCode::End` — used by subprocess-backed shunts.
    ///
    /// # Errors
    /// Returns an error if the pool has no free thread permits.
    pub fn spawn(
        pool: &Arc<WorkerPool>,
        label: &str,
        mut source: Box<dyn ShuntSource>,
        mut sink: Box<dyn ShuntSink>,
        io_buffer_size: usize,
        queue_limit_messages: usize,
        on_eof: Option<Box<dyn FnOnce() -> Option<i32> + Send>>,
    ) -> flow_core::error::Result<Self> {
        let (inbound_tx, inbound_rx) = flume::bounded(queue_limit_messages.max(1));
        let (outbound_tx, outbound_rx) = flume::unbounded::<Bytes>();
        let (control_tx, control_rx) = flume::unbounded::<ShuntControl>();
        let read_gate = Arc::new(Gate::new());
        let write_gate = Arc::new(Gate::new());

        let reader_gate = Arc::clone(&read_gate);
        let reader_label = format!("flow-shunt-read-{label}");
        pool.spawn(reader_label, move || {
            run_reader(&mut *source, &inbound_tx, &control_rx, &reader_gate, io_buffer_size, on_eof);
        })?;

        let writer_gate = Arc::clone(&write_gate);
        let writer_label = format!("flow-shunt-write-{label}");
        pool.spawn(writer_label, move || {
            run_writer(&mut *sink, &outbound_rx, &writer_gate);
        })?;

        Ok(Self {
            inbound_rx,
            outbound_tx,
            control_tx,
            read_gate,
            write_gate,
        })
    }

    pub fn block_reads(&self) {
        self.read_gate.block();
    }

    pub fn unblock_reads(&self) {
        self.read_gate.unblock();
    }

    pub fn block_writes(&self) {
        self.write_gate.block();
    }

    pub fn unblock_writes(&self) {
        self.write_gate.unblock();
    }

    /// Ask the reader to seek before its next read.
    pub fn seek(&self, pos: Position) {
        let _ = self.control_tx.send(ShuntControl::Seek(pos));
    }

    /// Ask the reader to close the current segment and open a new one of
    /// the requested length (or to EOF).
    pub fn request_segment(&self, request: SegmentRequest) {
        let _ = self.control_tx.send(ShuntControl::Segment(request));
    }
}

const GATE_POLL_INTERVAL: Duration = Duration::from_millis(200);

fn run_reader(
    source: &mut dyn ShuntSource,
    inbound_tx: &flume::Sender<ShuntMessage>,
    control_rx: &flume::Receiver<ShuntControl>,
    gate: &Gate,
    io_buffer_size: usize,
    on_eof: Option<Box<dyn FnOnce() -> Option<i32> + Send>>,
) {
    let send_event = |code: Code| inbound_tx.send(ShuntMessage::Event(DetailedEvent::new(code)));

    if send_event(Code::Stream(StreamCode::Begin)).is_err() {
        return;
    }

    let datagram_mode = source.is_datagram();
    let mut remaining: Option<u64> = None;
    let mut segment_open = false;
    if !datagram_mode {
        let _ = send_event(Code::Stream(StreamCode::SegmentBegin));
        segment_open = true;
    }

    let mut buf = vec![0u8; io_buffer_size.max(1)];
    loop {
        gate.wait_until_open(GATE_POLL_INTERVAL);
        if gate.is_blocked() {
            continue;
        }

        while let Ok(control) = control_rx.try_recv() {
            match control {
                ShuntControl::Seek(pos) => {
                    if segment_open {
                        let _ = send_event(Code::Stream(StreamCode::SegmentEnd));
                        segment_open = false;
                    }
                    match source.seek(pos) {
                        Ok(_) => {
                            remaining = None;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "shunt seek failed");
                            let _ = send_event(Code::Stream(StreamCode::SegmentDenied));
                        }
                    }
                }
                ShuntControl::Segment(request) => {
                    if segment_open {
                        let _ = send_event(Code::Stream(StreamCode::SegmentEnd));
                    }
                    remaining = request.length;
                    let _ = send_event(Code::Stream(StreamCode::SegmentBegin));
                    segment_open = true;
                }
            }
        }

        if !datagram_mode {
            if let Some(0) = remaining {
                // Current segment fully delivered; idle until the graph
                // side asks for another one.
                std::thread::sleep(GATE_POLL_INTERVAL);
                continue;
            }
        }

        if datagram_mode {
            let _ = send_event(Code::Stream(StreamCode::SegmentBegin));
        }

        let want = match remaining {
            Some(n) => buf.len().min(usize::try_from(n).unwrap_or(buf.len())),
            None => buf.len(),
        };

        match source.read(&mut buf[..want]) {
            Ok(0) => {
                tracing::debug!("shunt reader reached end of stream");
                if segment_open {
                    let _ = send_event(Code::Stream(StreamCode::SegmentEnd));
                }
                if let Some(exit_code) = on_eof.and_then(|f| f()) {
                    let _ = inbound_tx.send(ShuntMessage::Control(Event::ProcessResult(ProcessResult { exit_code })));
                }
                let _ = send_event(Code::Stream(StreamCode::End));
                let _ = inbound_tx.send(ShuntMessage::Closed);
                return;
            }
            Ok(n) => {
                if let Some(addr) = source.last_sender() {
                    let _ = inbound_tx.send(ShuntMessage::Control(Event::IpAddr(flow_core::event::IpAddr(addr.ip()))));
                }
                let chunk = Bytes::copy_from_slice(&buf[..n]);
                if inbound_tx.send(ShuntMessage::Data(chunk)).is_err() {
                    return; // graph side dropped the handle
                }
                if let Some(rem) = remaining.as_mut() {
                    *rem = rem.saturating_sub(n as u64);
                }
                if datagram_mode {
                    let _ = send_event(Code::Stream(StreamCode::SegmentEnd));
                } else if remaining == Some(0) {
                    let _ = send_event(Code::Stream(StreamCode::SegmentEnd));
                    segment_open = false;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                if segment_open {
                    let _ = send_event(Code::Stream(StreamCode::SegmentEnd));
                }
                tracing::warn!(error = %e, "shunt reader I/O error");
                let code = classify_io_error(&e);
                let _ = inbound_tx.send(ShuntMessage::Event(DetailedEvent::new(code)));
                let _ = inbound_tx.send(ShuntMessage::Closed);
                return;
            }
        }
    }
}

fn run_writer(sink: &mut dyn ShuntSink, outbound_rx: &flume::Receiver<Bytes>, gate: &Gate) {
    loop {
        gate.wait_until_open(GATE_POLL_INTERVAL);
        if gate.is_blocked() {
            continue;
        }
        match outbound_rx.recv_timeout(GATE_POLL_INTERVAL) {
            Ok(chunk) => {
                if let Err(e) = sink.write(&chunk).and_then(|_| sink.flush()) {
                    tracing::warn!(error = %e, "shunt writer I/O error");
                    return;
                }
            }
            Err(flume::RecvTimeoutError::Timeout) => {}
            Err(flume::RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Classify a blocking I/O failure into the closest matching flow-event
/// code. Exposed beyond this module so connector-level dial failures (which
/// never get as far as spawning a shunt) can report the same codes.
#[must_use]
pub fn classify_io_error(e: &io::Error) -> Code {
    match e.kind() {
        io::ErrorKind::NotFound => Code::File(FileCode::DoesNotExist),
        io::ErrorKind::PermissionDenied => Code::File(FileCode::PermissionDenied),
        io::ErrorKind::ConnectionReset => Code::Socket(SocketCode::ConnectionReset),
        io::ErrorKind::ConnectionRefused => Code::Socket(SocketCode::ConnectionRefused),
        _ => Code::Stream(StreamCode::PhysicalError),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reader_delivers_data_then_closes_on_eof() {
        let pool = WorkerPool::new(Some(4));
        let source: Box<dyn ShuntSource> = Box::new(Cursor::new(b"hello".to_vec()));
        let sink: Box<dyn ShuntSink> = Box::new(Vec::<u8>::new());

        let handle = ShuntHandle::spawn(&pool, "test", source, sink, 1024, 16, None).unwrap();

        let mut data = Vec::new();
        let mut saw_begin = false;
        let mut saw_segment_begin = false;
        let mut saw_segment_end = false;
        loop {
            match handle.inbound_rx.recv_timeout(Duration::from_secs(2)).unwrap() {
                ShuntMessage::Data(b) => data.extend_from_slice(&b),
                ShuntMessage::Event(ev) => {
                    if ev.matches(Code::Stream(StreamCode::Begin)) {
                        saw_begin = true;
                    }
                    if ev.matches(Code::Stream(StreamCode::SegmentBegin)) {
                        saw_segment_begin = true;
                    }
                    if ev.matches(Code::Stream(StreamCode::SegmentEnd)) {
                        saw_segment_end = true;
                    }
                }
                ShuntMessage::Control(_) => {}
                ShuntMessage::Closed => break,
            }
        }
        assert_eq!(data, b"hello");
        assert!(saw_begin);
        assert!(saw_segment_begin);
        assert!(saw_segment_end);
    }

    #[test]
    fn writer_forwards_bytes_to_sink() {
        let pool = WorkerPool::new(Some(4));
        let source: Box<dyn ShuntSource> = Box::new(Cursor::new(Vec::<u8>::new()));
        let collected = Arc::new(parking_lot::Mutex::new(Vec::<u8>::new()));

        struct Collecting(Arc<parking_lot::Mutex<Vec<u8>>>);
        impl Write for Collecting {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let sink: Box<dyn ShuntSink> = Box::new(Collecting(Arc::clone(&collected)));
        let handle = ShuntHandle::spawn(&pool, "test-w", source, sink, 1024, 16, None).unwrap();

        handle.outbound_tx.send(Bytes::from_static(b"ping")).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(&*collected.lock(), b"ping");
    }

    #[test]
    fn segment_request_rebrackets_a_bounded_read() {
        let pool = WorkerPool::new(Some(4));
        let source: Box<dyn ShuntSource> = Box::new(Cursor::new(b"0123456789".to_vec()));
        let sink: Box<dyn ShuntSink> = Box::new(Vec::<u8>::new());

        let handle = ShuntHandle::spawn(&pool, "test-seg", source, sink, 1024, 16, None).unwrap();
        handle.request_segment(SegmentRequest::bytes(4));

        let mut data = Vec::new();
        let mut segment_ends = 0;
        loop {
            match handle.inbound_rx.recv_timeout(Duration::from_secs(2)).unwrap() {
                ShuntMessage::Data(b) => {
                    data.extend_from_slice(&b);
                    if data.len() >= 4 {
                        break;
                    }
                }
                ShuntMessage::Event(ev) if ev.matches(Code::Stream(StreamCode::SegmentEnd)) => {
                    segment_ends += 1;
                }
                _ => {}
            }
        }
        assert_eq!(&data, b"0123");
        assert!(segment_ends >= 1);
    }

    #[test]
    fn on_eof_hook_surfaces_a_process_result() {
        let pool = WorkerPool::new(Some(4));
        let source: Box<dyn ShuntSource> = Box::new(Cursor::new(Vec::<u8>::new()));
        let sink: Box<dyn ShuntSink> = Box::new(Vec::<u8>::new());

        let on_eof: Box<dyn FnOnce() -> Option<i32> + Send> = Box::new(|| Some(7));
        let handle = ShuntHandle::spawn(&pool, "test-eof", source, sink, 1024, 16, Some(on_eof)).unwrap();

        let mut exit_code = None;
        loop {
            match handle.inbound_rx.recv_timeout(Duration::from_secs(2)).unwrap() {
                ShuntMessage::Control(Event::ProcessResult(result)) => {
                    exit_code = Some(result.exit_code);
                }
                ShuntMessage::Closed => break,
                _ => {}
            }
        }
        assert_eq!(exit_code, Some(7));
    }
}
