//! The asynchronous delivery pipeline: an unbounded hand-off queue, one
//! background worker thread, and a sticky health gate in front of both.

use std::sync::{Arc, OnceLock};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::error;

use crate::builder::{BuildError, StatsdBuilder};
use crate::transport::{MetricSink, UdpTransport};

static GLOBAL: OnceLock<Arc<NonBlockingSender>> = OnceLock::new();

/// Returns the process-wide sender, constructing one with the default
/// configuration on first use. Construction races resolve to exactly one
/// instance.
pub(crate) fn global() -> Arc<NonBlockingSender> {
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(StatsdBuilder::default().build())))
}

pub(crate) fn install_global(sender: Arc<NonBlockingSender>) -> Result<(), BuildError> {
    GLOBAL.set(sender).map_err(|_| BuildError::AlreadyInstalled)
}

/// A fire-and-forget delivery pipeline for wire lines.
///
/// Formatted lines are pushed onto an unbounded queue and drained by a
/// single background thread that forwards them to the UDP transport, so
/// emitting a metric costs the caller one queue insertion, nothing more.
/// Delivery failures are logged and the affected line dropped; nothing is
/// retried and no error ever reaches the emitting thread.
///
/// If the destination cannot be resolved (or the socket cannot be created)
/// at construction time, the sender is permanently unhealthy: every
/// subsequent line is dropped with a diagnostic. The flag is set once and
/// never re-evaluated.
///
/// Dropping the sender disconnects the queue; the worker drains whatever is
/// still buffered and exits. The process-wide instance lives until process
/// exit and never goes through that teardown.
pub struct NonBlockingSender {
    queue: Sender<String>,
    healthy: bool,
}

impl NonBlockingSender {
    pub(crate) fn new(host: &str, port: u16) -> Self {
        let (tx, rx) = unbounded();

        let healthy = match UdpTransport::connect(host, port) {
            Ok(transport) => spawn_worker(rx, transport),
            Err(e) => {
                error!(
                    error = %e,
                    host,
                    port,
                    "failed to set up statsd transport, metrics will be dropped"
                );
                false
            }
        };

        NonBlockingSender { queue: tx, healthy }
    }

    /// Whether the transport came up at construction time.
    ///
    /// A sender that failed to resolve its destination stays unhealthy for
    /// its whole lifetime and silently drops every line handed to it.
    pub fn is_healthy(&self) -> bool {
        self.healthy
    }
}

impl MetricSink for NonBlockingSender {
    fn emit(&self, line: &str) {
        if self.healthy {
            // Unbounded queue: insertion never blocks and only fails if the
            // worker is gone, which is not actionable from here.
            let _ = self.queue.send(line.to_string());
        } else {
            error!("statsd transport is not healthy, dropping metric");
        }
    }
}

/// Starts the single consumer thread. Returns whether the spawn succeeded;
/// a failure leaves the sender unhealthy, consistent with a transport that
/// never came up.
fn spawn_worker(rx: Receiver<String>, mut transport: UdpTransport) -> bool {
    let spawned = thread::Builder::new().name("statsd-influx-sender".to_string()).spawn(move || {
        // Blocks while the queue is empty. The iterator ends only once every
        // queue handle is dropped and the buffer is drained, so a failed
        // send never terminates the loop.
        for line in rx {
            if !transport.send(&line) {
                error!(
                    error = transport.last_error().unwrap_or("unknown"),
                    "failed to send metric"
                );
            }
        }
    });

    match spawned {
        Ok(_) => true,
        Err(e) => {
            error!(error = %e, "failed to spawn statsd sender thread, metrics will be dropped");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::UdpSocket;
    use std::time::Duration;

    use crate::transport::MetricSink as _;

    use super::NonBlockingSender;

    #[test]
    fn unresolvable_host_is_permanently_unhealthy() {
        let sender = NonBlockingSender::new("host.invalid.", 8125);
        assert!(!sender.is_healthy());

        // Dropped, logged, and invisible to the caller.
        sender.emit("key:1|c");
        assert!(!sender.is_healthy());
    }

    #[test]
    fn healthy_sender_delivers_to_the_wire() {
        let receiver = UdpSocket::bind("127.0.0.1:0").expect("bind receiver");
        receiver.set_read_timeout(Some(Duration::from_secs(5))).expect("set timeout");
        let port = receiver.local_addr().expect("receiver addr").port();

        let sender = NonBlockingSender::new("127.0.0.1", port);
        assert!(sender.is_healthy());
        sender.emit("key:10|c");

        let mut buf = [0u8; 64];
        let len = receiver.recv(&mut buf).expect("receive datagram");
        assert_eq!(&buf[..len], b"key:10|c");
    }

    #[test]
    fn dropping_the_sender_drains_the_queue() {
        let receiver = UdpSocket::bind("127.0.0.1:0").expect("bind receiver");
        receiver.set_read_timeout(Some(Duration::from_secs(5))).expect("set timeout");
        let port = receiver.local_addr().expect("receiver addr").port();

        let sender = NonBlockingSender::new("127.0.0.1", port);
        for i in 0..10 {
            sender.emit(&format!("key{i}:1|c"));
        }
        drop(sender);

        let mut buf = [0u8; 64];
        for _ in 0..10 {
            receiver.recv(&mut buf).expect("queued line must still arrive");
        }
    }
}
