//! The UDP transport and the sink seam it sits behind.

use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs as _, UdpSocket},
    sync::Mutex,
};

use tracing::debug;

/// A destination for fully formatted wire lines.
///
/// This is the seam between the metric client and the delivery pipeline:
/// the client hands over one complete line per observation and learns
/// nothing about its fate. Implementations must not block the caller
/// meaningfully and must not surface delivery failures.
pub trait MetricSink: Send + Sync {
    /// Accepts one wire line, best effort.
    fn emit(&self, line: &str);
}

/// A connectionless socket aimed at a destination resolved exactly once.
pub(crate) struct UdpTransport {
    socket: UdpSocket,
    dest: SocketAddr,
    last_error: Option<String>,
}

impl UdpTransport {
    /// Opens a datagram socket and resolves `host` once.
    ///
    /// A literal IP address is used as-is; anything else goes through a
    /// single DNS lookup whose first result is cached for the lifetime of
    /// the transport, so DNS changes after startup are not observed.
    pub(crate) fn connect(host: &str, port: u16) -> io::Result<Self> {
        let dest = resolve(host, port)?;
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        debug!(%dest, "statsd transport ready");
        Ok(UdpTransport { socket, dest, last_error: None })
    }

    /// Writes `line` as a single datagram, returning `false` on any write
    /// error. The cause is recorded in [`last_error`](Self::last_error) for
    /// the caller to log; it is never retried and never panics.
    pub(crate) fn send(&mut self, line: &str) -> bool {
        match self.socket.send_to(line.as_bytes(), self.dest) {
            Ok(_) => true,
            Err(e) => {
                self.last_error = Some(format!("send to {} failed: {e}", self.dest));
                false
            }
        }
    }

    /// The message recorded by the most recent failed send, if any.
    pub(crate) fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("no addresses resolved for {host}"))
    })
}

/// A sink that records every emitted line instead of transmitting.
///
/// The supported test double for code instrumented with this crate: wire a
/// client to one of these and assert on the produced lines.
#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    /// Creates an empty `RecordingSink`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently emitted line, if any.
    pub fn last(&self) -> Option<String> {
        self.lines.lock().unwrap().last().cloned()
    }

    /// Every line emitted so far, in emission order.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl MetricSink for RecordingSink {
    fn emit(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

/// A sink that discards every line.
pub struct NopSink;

impl MetricSink for NopSink {
    fn emit(&self, _line: &str) {}
}
