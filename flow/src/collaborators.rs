//! Contract-only sketches for pieces this crate deliberately does not
//! implement: name resolution, TLS, a polished accept-loop `Listener`
//! element, and an all-in-one URI-dispatching façade. Each trait/struct
//! here fixes the *shape* a real implementation would need to have so a
//! connector can be written against it today and wired up later without
//! an API break.

use std::net::IpAddr;

use flow_core::error::Result;
use flow_core::event::IpService;

/// Resolves a (host, port) pair to one or more addresses. A real
/// implementation would typically run DNS lookups on a shunt worker thread
/// and report results as [`IpService`] events, the same way every other
/// blocking resource in this crate does.
pub trait NameResolver: Send + Sync {
    fn resolve(&self, host: &str, port: u16) -> Result<IpService>;
}

/// Upgrades an established transport connector to TLS. Left unimplemented:
/// this crate carries no TLS or crypto dependency of its own (see the
/// dependency notes), so a real implementation would plug in something like
/// `rustls` at this seam rather than touching `flow-shunt` or `flow-core`.
pub trait TlsUpgrade: Send {
    fn wrap(&self, plain_fd: std::os::unix::io::RawFd) -> Result<Box<dyn flow_shunt::shunt::ShuntSource>>;
}

/// A listening socket that accepts connections and produces a fresh
/// connector element per peer. The TCP *shunt flavor* (dialed or already-
/// accepted streams) is fully implemented in `flow_shunt::flavors::tcp`;
/// this is only the higher-level wrapper that would own the `accept()`
/// loop and publish new elements into a running graph, which this crate
/// leaves as a contract for an embedding application to implement (tests
/// that need an accept loop drive `std::net::TcpListener` directly).
pub trait Listener: Send {
    fn local_addr(&self) -> Result<std::net::SocketAddr>;

    /// Accept one pending connection, if any, without blocking.
    fn try_accept(&self) -> Result<Option<std::net::TcpStream>>;
}

/// A single fixed address a [`NameResolver`] might return in place of doing
/// any actual lookup (e.g. a resolver that only handles literal IPs).
#[must_use]
pub fn literal_address(addr: IpAddr) -> flow_core::event::IpAddr {
    flow_core::event::IpAddr(addr)
}

/// An all-in-one convenience façade: a single entry point that picks a
/// connector flavor from a URI-like string and returns a ready-to-push
/// simplex element. Sketched here as a trait so an embedding application
/// can implement the dispatch table without this crate needing to depend
/// on every flavor's construction arguments up front.
pub trait FlowIoFacade {
    fn open(&self, uri: &str) -> Result<()>;
}
