//! A non-blocking StatsD client with InfluxDB-style tag extensions.
//!
//! Counters, gauges, and timers are formatted into single wire lines
//! (`[<ns>.]<key>[,<tag>=<value>...]:<value>|<type>[|@<rate>]`) and handed
//! over an unbounded queue to one background delivery thread, which pushes
//! them to a StatsD server as best-effort UDP datagrams. Emitting a metric
//! never blocks the caller and never fails: transport trouble is logged and
//! the affected lines are dropped, so instrumentation can never destabilize
//! the instrumented application.
//!
//! # Usage
//!
//! ```no_run
//! use statsd_influx::{StatsdBuilder, StatsdClient};
//!
//! // Optionally install an explicitly configured sender before first use;
//! // otherwise the first client lazily starts one aimed at 127.0.0.1:8125.
//! StatsdBuilder::default()
//!     .with_remote_address("statsd.internal:8125")
//!     .expect("failed to parse remote address")
//!     .install()
//!     .expect("failed to install statsd sender");
//!
//! let client = StatsdClient::new().with_namespace("billing");
//! client.incr("invoices.created");
//! client.time("render.duration", 12);
//!
//! // Dimensional filtering via InfluxDB-style tags.
//! let tagged = client.with_tag("region", "us-east-1");
//! tagged.gauge("queue.depth", 42.0);
//! ```
//!
//! # Delivery model
//!
//! The pipeline is multi-producer/single-consumer: any number of threads
//! may share or clone clients and emit concurrently, while one worker
//! thread drains the queue in FIFO order and writes one datagram per line.
//! Delivery is best effort with no retries. The queue is unbounded and
//! applies no back-pressure; lines still queued at process exit may be lost.
//!
//! The destination host is resolved exactly once, when the sender is
//! built. If resolution or socket setup fails, the sender is permanently
//! unhealthy and drops every line with a diagnostic; it never attempts to
//! reconnect.
//!
//! # Testing instrumented code
//!
//! [`RecordingSink`] implements the same [`MetricSink`] seam as the real
//! pipeline and records every line instead of transmitting, so tests can
//! assert on exact wire output via [`StatsdClient::from_sink`].

#![deny(missing_docs)]

mod builder;
pub use self::builder::{BuildError, StatsdBuilder};

mod client;
pub use self::client::{StatsdClient, Tag};

mod sender;
pub use self::sender::NonBlockingSender;

mod transport;
pub use self::transport::{MetricSink, NopSink, RecordingSink};

mod writer;
pub use self::writer::MetricType;
