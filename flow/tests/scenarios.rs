//! End-to-end scenarios driving real OS resources: a file copy through a
//! file connector (S1), a TCP echo against a plain `std::net::TcpListener`
//! accept loop (S2, since the polished `Listener` wrapper is contract-only
//! per the collaborator notes), and a UDP datagram round trip (S4). Each
//! scenario wires the connector's graph-facing output into a small sink
//! element that records every buffer packet it receives, so assertions
//! read real delivered bytes rather than inferring success from timing.

use std::io::Write as _;
use std::net::{TcpListener, UdpSocket};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use flow_core::config::FlowConfig;
use flow_core::element::{ElementLogic, OutputSink};
use flow_core::event::FileConnectOp;
use flow_core::graph::Graph;
use flow_core::packet::{Packet, PacketData};
use flow_core::pad::{Direction, PadId};
use flow_shunt::pool::WorkerPool;

use flow::connectors::{file, tcp, udp};

/// Records every buffer packet delivered to its input pad.
struct RecordingSink {
    captured: Arc<Mutex<Vec<u8>>>,
}

impl ElementLogic for RecordingSink {
    fn process_input(&mut self, _input: PadId, packet: Packet, _out: &mut OutputSink) {
        if let PacketData::Buffer(data) = packet.get_data() {
            self.captured.lock().unwrap().extend_from_slice(data);
        }
    }
}

fn pump_until(
    graph: &mut Graph,
    connector: &mut flow::connector::ShuntConnector,
    captured: &Arc<Mutex<Vec<u8>>>,
    want_len: usize,
    timeout: Duration,
) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        connector.pump(graph);
        if captured.lock().unwrap().len() >= want_len {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn s1_file_copy_reads_full_contents() {
    let dir = tempfile::tempdir().unwrap();
    let src_path = dir.path().join("source.txt");
    std::fs::write(&src_path, b"the quick brown fox").unwrap();

    let pool = WorkerPool::new(Some(4));
    let config = FlowConfig::default();
    let mut graph = Graph::new(config.queue_limit);
    let captured = Arc::new(Mutex::new(Vec::new()));

    let (_sink_id, sink_pads) = graph.add_element(
        Box::new(RecordingSink {
            captured: Arc::clone(&captured),
        }),
        &[(Direction::Input, "in")],
    );
    let (_port_id, port_pads) = graph.add_element(
        Box::new(flow_core::element::Simplex::default()),
        &[(Direction::Output, "out")],
    );
    graph.connect(port_pads[0], sink_pads[0]).unwrap();

    let op = FileConnectOp {
        path: src_path,
        create: false,
        truncate: false,
    };
    let mut connector = file::open(&pool, &op, &config, port_pads[0], port_pads[0]).unwrap();

    pump_until(&mut graph, &mut connector, &captured, 20, Duration::from_secs(2));

    assert_eq!(&*captured.lock().unwrap(), b"the quick brown fox");
}

#[test]
fn s2_tcp_echo_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 64];
        let n = std::io::Read::read(&mut stream, &mut buf).unwrap();
        stream.write_all(&buf[..n]).unwrap();
    });

    let pool = WorkerPool::new(Some(4));
    let config = FlowConfig::default();
    let mut graph = Graph::new(config.queue_limit);
    let captured = Arc::new(Mutex::new(Vec::new()));

    let (_id, pads) = graph.add_element(
        Box::new(RecordingSink {
            captured: Arc::clone(&captured),
        }),
        &[(Direction::Input, "in")],
    );
    let (_port_id, port_pads) = graph.add_element(
        Box::new(flow_core::element::Simplex::default()),
        &[(Direction::Output, "out")],
    );
    graph.connect(port_pads[0], pads[0]).unwrap();

    let mut connector = tcp::dial(&pool, addr, &config, port_pads[0], port_pads[0]).unwrap();
    connector.write(bytes::Bytes::from_static(b"ping"));

    pump_until(&mut graph, &mut connector, &captured, 4, Duration::from_secs(2));
    server.join().unwrap();

    assert_eq!(&*captured.lock().unwrap(), b"ping");
}

#[test]
fn s4_udp_datagram_round_trip() {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    let server_addr = server.local_addr().unwrap();

    let responder = std::thread::spawn(move || {
        let mut buf = [0u8; 64];
        let (n, peer) = server.recv_from(&mut buf).unwrap();
        server.send_to(&buf[..n], peer).unwrap();
    });

    let pool = WorkerPool::new(Some(4));
    let config = FlowConfig::default();
    let mut graph = Graph::new(config.queue_limit);
    let captured = Arc::new(Mutex::new(Vec::new()));

    let (_id, pads) = graph.add_element(
        Box::new(RecordingSink {
            captured: Arc::clone(&captured),
        }),
        &[(Direction::Input, "in")],
    );
    let (_port_id, port_pads) = graph.add_element(
        Box::new(flow_core::element::Simplex::default()),
        &[(Direction::Output, "out")],
    );
    graph.connect(port_pads[0], pads[0]).unwrap();

    let mut connector = udp::bind(&pool, 0, Some(server_addr), &config, port_pads[0], port_pads[0]).unwrap();
    connector.write(bytes::Bytes::from_static(b"datagram"));

    pump_until(&mut graph, &mut connector, &captured, 8, Duration::from_secs(2));
    responder.join().unwrap();

    assert_eq!(&*captured.lock().unwrap(), b"datagram");
}
