//! The event taxonomy: the object payload carried by control packets.
//!
//! Expressed as a sum type over the enumerated variants rather than a
//! class hierarchy, so matching on a code is exhaustive at compile time.

use std::any::TypeId;
use std::net::IpAddr as StdIpAddr;
use std::path::PathBuf;

/// An interned event-code namespace. Comparison is by string identity
/// since each domain has exactly one canonical spelling in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Domain(pub &'static str);

pub const FLOW_STREAM: Domain = Domain("flow-stream");
pub const FLOW_FILE: Domain = Domain("flow-file");
pub const FLOW_EXEC: Domain = Domain("flow-exec");
pub const FLOW_SOCKET: Domain = Domain("flow-socket");
pub const FLOW_LOOKUP: Domain = Domain("flow-lookup");
pub const FLOW_SSH: Domain = Domain("flow-ssh");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamCode {
    Begin,
    End,
    EndConverse,
    Denied,
    SegmentBegin,
    SegmentEnd,
    SegmentDenied,
    Error,
    AppError,
    PhysicalError,
    ResourceError,
    Flush,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCode {
    ReachedEnd,
    NeedRestart,
    Restart,
    PermissionDenied,
    IsNotAFile,
    TooManyLinks,
    OutOfHandles,
    PathTooLong,
    NoSpace,
    IsReadOnly,
    IsLocked,
    DoesNotExist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecCode {
    ParseError,
    RunError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketCode {
    AddressProtected,
    AddressInUse,
    AddressDoesNotExist,
    ConnectionRefused,
    ConnectionReset,
    NetworkUnreachable,
    AcceptError,
    OversizedPacket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupCode {
    TemporaryServerFailure,
    PermanentServerFailure,
    NoRecords,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SshCode {
    MasterFailed,
    MasterNotConnected,
}

/// A single (domain, code) pair. Each variant already carries its own
/// domain identity, so `Code::domain()` derives it rather than storing a
/// redundant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Stream(StreamCode),
    File(FileCode),
    Exec(ExecCode),
    Socket(SocketCode),
    Lookup(LookupCode),
    Ssh(SshCode),
}

impl Code {
    #[must_use]
    pub const fn domain(self) -> Domain {
        match self {
            Self::Stream(_) => FLOW_STREAM,
            Self::File(_) => FLOW_FILE,
            Self::Exec(_) => FLOW_EXEC,
            Self::Socket(_) => FLOW_SOCKET,
            Self::Lookup(_) => FLOW_LOOKUP,
            Self::Ssh(_) => FLOW_SSH,
        }
    }

    /// Default human-readable description, keyed by (domain, code).
    #[must_use]
    pub const fn default_description(self) -> &'static str {
        match self {
            Self::Stream(StreamCode::Begin) => "stream begin",
            Self::Stream(StreamCode::End) => "stream end",
            Self::Stream(StreamCode::EndConverse) => "stream end (converse)",
            Self::Stream(StreamCode::Denied) => "stream denied",
            Self::Stream(StreamCode::SegmentBegin) => "segment begin",
            Self::Stream(StreamCode::SegmentEnd) => "segment end",
            Self::Stream(StreamCode::SegmentDenied) => "segment denied",
            Self::Stream(StreamCode::Error) => "stream error",
            Self::Stream(StreamCode::AppError) => "application error",
            Self::Stream(StreamCode::PhysicalError) => "physical error",
            Self::Stream(StreamCode::ResourceError) => "resource error",
            Self::Stream(StreamCode::Flush) => "flush requested",
            Self::File(FileCode::ReachedEnd) => "reached end of file",
            Self::File(FileCode::NeedRestart) => "file needs restart",
            Self::File(FileCode::Restart) => "file restart",
            Self::File(FileCode::PermissionDenied) => "permission denied",
            Self::File(FileCode::IsNotAFile) => "is not a file",
            Self::File(FileCode::TooManyLinks) => "too many symbolic links",
            Self::File(FileCode::OutOfHandles) => "out of file handles",
            Self::File(FileCode::PathTooLong) => "path too long",
            Self::File(FileCode::NoSpace) => "no space left on device",
            Self::File(FileCode::IsReadOnly) => "file system is read-only",
            Self::File(FileCode::IsLocked) => "file is locked",
            Self::File(FileCode::DoesNotExist) => "file does not exist",
            Self::Exec(ExecCode::ParseError) => "could not parse command",
            Self::Exec(ExecCode::RunError) => "could not run command",
            Self::Socket(SocketCode::AddressProtected) => "address is protected",
            Self::Socket(SocketCode::AddressInUse) => "address already in use",
            Self::Socket(SocketCode::AddressDoesNotExist) => "address does not exist",
            Self::Socket(SocketCode::ConnectionRefused) => "connection refused",
            Self::Socket(SocketCode::ConnectionReset) => "connection reset",
            Self::Socket(SocketCode::NetworkUnreachable) => "network unreachable",
            Self::Socket(SocketCode::AcceptError) => "accept error",
            Self::Socket(SocketCode::OversizedPacket) => "oversized datagram",
            Self::Lookup(LookupCode::TemporaryServerFailure) => "temporary server failure",
            Self::Lookup(LookupCode::PermanentServerFailure) => "permanent server failure",
            Self::Lookup(LookupCode::NoRecords) => "no records found",
            Self::Ssh(SshCode::MasterFailed) => "ssh master connection failed",
            Self::Ssh(SshCode::MasterNotConnected) => "ssh master not connected",
        }
    }
}

/// Stream control / error event: a list of (domain, code) pairs an element
/// downstream may match against any one of, plus a free-text description.
#[derive(Debug, Clone)]
pub struct DetailedEvent {
    pub codes: Vec<Code>,
    pub description: String,
}

impl DetailedEvent {
    #[must_use]
    pub fn new(code: Code) -> Self {
        Self {
            description: code.default_description().to_string(),
            codes: vec![code],
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn and_code(mut self, code: Code) -> Self {
        self.codes.push(code);
        self
    }

    /// True if any of this event's codes belongs to `domain`.
    #[must_use]
    pub fn is_in_domain(&self, domain: Domain) -> bool {
        self.codes.iter().any(|c| c.domain() == domain)
    }

    /// True if this event carries exactly this (domain, code) combination.
    #[must_use]
    pub fn matches(&self, code: Code) -> bool {
        self.codes.contains(&code)
    }
}

/// Who a [`PropertyEvent`] is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyTarget {
    /// Every element whose logic type matches this `TypeId`.
    Class(TypeId),
    /// One specific element instance, identified by its graph index.
    Instance(crate::graph::ElementId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(bytes::Bytes),
}

/// Pipeline-wide configuration broadcast. Delivered like any other packet;
/// every element along the path that matches `target` applies `properties`
/// before forwarding it onward.
#[derive(Debug, Clone)]
pub struct PropertyEvent {
    pub target: PropertyTarget,
    pub properties: Vec<(String, PropertyValue)>,
}

impl PropertyEvent {
    #[must_use]
    pub fn for_class(type_id: TypeId, properties: Vec<(String, PropertyValue)>) -> Self {
        Self {
            target: PropertyTarget::Class(type_id),
            properties,
        }
    }

    #[must_use]
    pub fn for_instance(
        element: crate::graph::ElementId,
        properties: Vec<(String, PropertyValue)>,
    ) -> Self {
        Self {
            target: PropertyTarget::Instance(element),
            properties,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekAnchor {
    Begin,
    Current,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub anchor: SeekAnchor,
    pub offset: i64,
}

/// A read-N-bytes request; `None` means "read until EOF".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRequest {
    pub length: Option<u64>,
}

impl SegmentRequest {
    #[must_use]
    pub const fn bytes(n: u64) -> Self {
        Self { length: Some(n) }
    }

    #[must_use]
    pub const fn to_eof() -> Self {
        Self { length: None }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessResult {
    pub exit_code: i32,
}

/// Marks subsequent buffer packets as belonging to one mux sub-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxEvent {
    pub channel: u32,
}

#[derive(Debug, Clone)]
pub struct FileConnectOp {
    pub path: PathBuf,
    pub create: bool,
    pub truncate: bool,
}

#[derive(Debug, Clone)]
pub struct SshConnectOp {
    pub host: String,
    pub port: u16,
    /// Remote user to authenticate as; `None` uses the ssh client's own
    /// default (no `-l` flag).
    pub user: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UdpConnectOp {
    pub local_port: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct ShellOp {
    pub command: String,
}

#[derive(Debug, Clone)]
pub struct IpService {
    pub host: String,
    pub port: u16,
    pub addresses: Vec<StdIpAddr>,
}

#[derive(Debug, Clone, Copy)]
pub struct IpAddr(pub StdIpAddr);

/// The full event sum type — the object payload of an object [`Packet`](crate::packet::Packet).
#[derive(Debug, Clone)]
pub enum Event {
    Detailed(DetailedEvent),
    ProcessResult(ProcessResult),
    Property(PropertyEvent),
    Mux(MuxEvent),
    Position(Position),
    SegmentRequest(SegmentRequest),
    FileConnectOp(FileConnectOp),
    SshConnectOp(SshConnectOp),
    UdpConnectOp(UdpConnectOp),
    ShellOp(ShellOp),
    IpService(IpService),
    IpAddr(IpAddr),
}

impl Event {
    /// Convenience constructor for a single-code detailed event.
    #[must_use]
    pub fn detailed(code: Code) -> Self {
        Self::Detailed(DetailedEvent::new(code))
    }
}
