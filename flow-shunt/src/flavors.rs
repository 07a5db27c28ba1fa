//! Concrete OS resources a shunt can bridge, one constructor per flavor
//! named in the connector list: file, stdio, UDP, TCP (both dialed and
//! accepted), and a subprocess pipe pair shared by shell execution and SSH
//! command/master runners.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use flow_core::event::{Position, SeekAnchor};

use crate::shunt::{ShuntSink, ShuntSource};

/// Open (or create) a file for a file connector, returning separate
/// read/write handles via two independent file descriptors onto the same
/// path so the reader and writer worker threads never contend on one `File`.
pub fn open_file(
    path: &Path,
    create: bool,
    truncate: bool,
) -> io::Result<(Box<dyn ShuntSource>, Box<dyn ShuntSink>)> {
    let reader = File::open(path)?;
    let writer = OpenOptions::new()
        .write(true)
        .create(create)
        .truncate(truncate)
        .open(path)?;
    Ok((Box::new(SeekableFile(reader)), Box::new(writer)))
}

/// A plain file wrapped so the shunt reader can honor `Position` seek
/// requests (file shunts are the one flavor spec'd as seekable).
struct SeekableFile(File);

impl ShuntSource for SeekableFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut self.0, buf)
    }

    fn seek(&mut self, pos: Position) -> io::Result<u64> {
        let from = match pos.anchor {
            SeekAnchor::Begin => SeekFrom::Start(pos.offset.max(0) as u64),
            SeekAnchor::Current => SeekFrom::Current(pos.offset),
            SeekAnchor::End => SeekFrom::End(pos.offset),
        };
        Seek::seek(&mut self.0, from)
    }
}

/// Process standard input/output, for the stdio connector.
#[must_use]
pub fn stdio() -> (Box<dyn ShuntSource>, Box<dyn ShuntSink>) {
    (Box::new(io::stdin()), Box::new(io::stdout()))
}

/// A dialed or already-accepted TCP connection. `TcpStream::try_clone`
/// duplicates the underlying descriptor so reads and writes can proceed on
/// independent threads without a shared lock.
pub fn tcp(stream: TcpStream) -> io::Result<(Box<dyn ShuntSource>, Box<dyn ShuntSink>)> {
    let writer = stream.try_clone()?;
    Ok((Box::new(stream), Box::new(writer)))
}

/// A bound UDP socket. Unlike TCP there's no `connect`/`accept` phase to
/// speak of at this layer — callers decide the peer via `UdpSocket::connect`
/// before handing the socket here, or leave it unconnected and demultiplex
/// upstream.
pub fn udp(socket: UdpSocket) -> io::Result<(Box<dyn ShuntSource>, Box<dyn ShuntSink>)> {
    let writer = socket.try_clone()?;
    Ok((
        Box::new(UdpReader { socket, last_sender: None }),
        Box::new(UdpWriter(writer)),
    ))
}

struct UdpReader {
    socket: UdpSocket,
    last_sender: Option<SocketAddr>,
}

impl ShuntSource for UdpReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (n, sender) = self.socket.recv_from(buf)?;
        self.last_sender = Some(sender);
        Ok(n)
    }

    fn last_sender(&self) -> Option<SocketAddr> {
        self.last_sender
    }

    fn is_datagram(&self) -> bool {
        true
    }
}

struct UdpWriter(UdpSocket);
impl io::Write for UdpWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.send(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A spawned child process's stdin/stdout pair, shared by the shell
/// connector and the SSH master/command runners (an SSH master is just a
/// long-lived `ssh -M` child; a command runner is a short-lived `ssh`
/// invocation against that master's control socket).
pub struct SubprocessHandle {
    pub child: Child,
}

impl SubprocessHandle {
    /// Spawn `program` with `args`, wiring its stdio as pipes.
    pub fn spawn(program: &str, args: &[String]) -> io::Result<(Self, Box<dyn ShuntSource>, Box<dyn ShuntSink>)> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");

        Ok((
            Self { child },
            Box::new(StdoutSource(stdout)),
            Box::new(StdinSink(stdin)),
        ))
    }

    pub fn wait(&mut self) -> io::Result<std::process::ExitStatus> {
        self.child.wait()
    }

    /// Consume this handle into a `ShuntHandle::spawn` `on_eof` hook: once
    /// the reader observes end of stream, this waits the child and reports
    /// its exit code as a `ProcessResult`.
    #[must_use]
    pub fn into_eof_hook(mut self) -> Box<dyn FnOnce() -> Option<i32> + Send> {
        Box::new(move || self.child.wait().ok().and_then(|status| status.code()))
    }
}

struct StdoutSource(ChildStdout);
impl io::Read for StdoutSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

struct StdinSink(ChildStdin);
impl io::Write for StdinSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_read_write_use_independent_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shunt.txt");
        std::fs::write(&path, b"seed").unwrap();

        let (mut reader, _writer) = open_file(&path, false, false).unwrap();
        let mut buf = [0u8; 4];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"seed");
    }

    #[test]
    fn subprocess_echoes_stdin_to_stdout() {
        let (mut handle, mut source, mut sink) =
            SubprocessHandle::spawn("cat", &[]).expect("cat must exist in test environment");
        sink.write(b"ping").unwrap();
        sink.flush().unwrap();
        drop(sink); // close stdin so `cat` sees EOF

        let mut buf = [0u8; 4];
        let n = source.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
        handle.wait().unwrap();
    }
}
