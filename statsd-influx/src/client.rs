use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::sender;
use crate::transport::MetricSink;
use crate::writer::{self, MetricType};

/// A tag name/value pair appended to metric keys for dimensional filtering.
pub type Tag = (String, String);

/// A non-blocking statsd client with InfluxDB-style tag extensions.
///
/// A client is a cheap value composed of a sink handle, a namespace prefix,
/// and an ordered tag list. The `with_*` family returns a new client and
/// leaves `self` untouched; [`append_sub_namespace`](Self::append_sub_namespace)
/// and [`add_tag`](Self::add_tag) update the client in place for callers
/// that deliberately want the side effect. `Clone` produces an independent
/// client over the same sink.
///
/// Every metric operation is non-blocking and infallible from the caller's
/// point of view: delivery problems are logged inside the pipeline and
/// never surface here. Instrumentation must not be able to destabilize the
/// instrumented application.
///
/// Tag names and values must not contain `,` or `=` (the wire-format
/// delimiters). The client does not validate this; a violation yields a
/// malformed wire line, not an error.
#[derive(Clone)]
pub struct StatsdClient {
    sink: Arc<dyn MetricSink>,
    ns: String,
    tags: Vec<Tag>,
}

impl Default for StatsdClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsdClient {
    /// Creates a client bound to the process-wide sender, with no namespace
    /// and no tags.
    ///
    /// The first such call in the process lazily starts the sender with the
    /// default configuration unless
    /// [`StatsdBuilder::install`](crate::StatsdBuilder::install) ran first.
    pub fn new() -> Self {
        Self::from_sink(sender::global())
    }

    /// Creates a client bound to the process-wide sender with the given
    /// namespace prefix.
    pub fn with_prefix(ns: impl Into<String>) -> Self {
        let mut client = Self::new();
        client.ns = ns.into();
        client
    }

    /// Creates a client that emits into the given sink.
    ///
    /// This is how an explicitly constructed sender is wired in at a
    /// composition root, and how tests substitute a
    /// [`RecordingSink`](crate::RecordingSink).
    pub fn from_sink(sink: Arc<dyn MetricSink>) -> Self {
        StatsdClient { sink, ns: String::new(), tags: Vec::new() }
    }

    /// Returns a new client with the namespace replaced by `ns`.
    pub fn with_namespace(&self, ns: impl Into<String>) -> Self {
        StatsdClient { sink: Arc::clone(&self.sink), ns: ns.into(), tags: self.tags.clone() }
    }

    /// Returns a new client whose namespace is `<current>.<sub>`.
    ///
    /// # Panics
    ///
    /// Panics if the current namespace is empty: appending a sub-namespace
    /// requires an existing namespace.
    pub fn with_sub_namespace(&self, sub: impl AsRef<str>) -> Self {
        assert!(!self.ns.is_empty(), "appending a sub-namespace requires a non-empty namespace");
        self.with_namespace(format!("{}.{}", self.ns, sub.as_ref()))
    }

    /// Appends `sub` to this client's namespace in place.
    ///
    /// # Panics
    ///
    /// Panics if the current namespace is empty: appending a sub-namespace
    /// requires an existing namespace.
    pub fn append_sub_namespace(&mut self, sub: impl AsRef<str>) -> &mut Self {
        assert!(!self.ns.is_empty(), "appending a sub-namespace requires a non-empty namespace");
        self.ns.push('.');
        self.ns.push_str(sub.as_ref());
        self
    }

    /// Returns a new client with the tag set replaced by `tags`.
    pub fn with_tags(&self, tags: Vec<Tag>) -> Self {
        StatsdClient { sink: Arc::clone(&self.sink), ns: self.ns.clone(), tags }
    }

    /// Returns a new client with one more tag appended.
    ///
    /// Tags keep their insertion order and are never deduplicated.
    pub fn with_tag(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut tags = self.tags.clone();
        tags.push((name.into(), value.into()));
        self.with_tags(tags)
    }

    /// Appends one tag to this client in place.
    pub fn add_tag(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.tags.push((name.into(), value.into()));
        self
    }

    /// Adjusts the named counter by `value`.
    pub fn count(&self, key: &str, value: i64) {
        self.count_sampled(key, value, 1.0);
    }

    /// Adjusts the named counter by `value`, reported at `sample_rate`.
    ///
    /// A rate of 0.1 tells the downstream aggregator that only one in ten
    /// observations of this counter is actually reported.
    pub fn count_sampled(&self, key: &str, value: i64, sample_rate: f32) {
        self.send_int(key, value, MetricType::Counter, sample_rate);
    }

    /// Equivalent to `count(key, 1)`.
    pub fn incr(&self, key: &str) {
        self.count(key, 1);
    }

    /// Equivalent to `count_sampled(key, 1, sample_rate)`.
    pub fn incr_sampled(&self, key: &str, sample_rate: f32) {
        self.count_sampled(key, 1, sample_rate);
    }

    /// Equivalent to `count(key, -1)`.
    pub fn decr(&self, key: &str) {
        self.count(key, -1);
    }

    /// Equivalent to `count_sampled(key, -1, sample_rate)`.
    pub fn decr_sampled(&self, key: &str, sample_rate: f32) {
        self.count_sampled(key, -1, sample_rate);
    }

    /// Records the latest reading for the named gauge.
    ///
    /// The value is rendered with five significant digits.
    pub fn gauge(&self, key: &str, value: f64) {
        self.gauge_sampled(key, value, 1.0);
    }

    /// Sampled variant of [`gauge`](Self::gauge).
    pub fn gauge_sampled(&self, key: &str, value: f64, sample_rate: f32) {
        self.send(key, &writer::format_compact(value), MetricType::Gauge, sample_rate);
    }

    /// Records an execution time in milliseconds for the named operation.
    pub fn time(&self, key: &str, ms: i64) {
        self.time_sampled(key, ms, 1.0);
    }

    /// Sampled variant of [`time`](Self::time).
    pub fn time_sampled(&self, key: &str, ms: i64, sample_rate: f32) {
        self.send_int(key, ms, MetricType::Timer, sample_rate);
    }

    /// Records the time elapsed since `start_millis`, a Unix timestamp in
    /// milliseconds.
    ///
    /// The elapsed value saturates at zero: clock skew or a bad start value
    /// never produces a negative duration.
    pub fn time_millis_to_now(&self, key: &str, start_millis: i64) {
        self.time_millis_to_now_sampled(key, start_millis, 1.0);
    }

    /// Sampled variant of [`time_millis_to_now`](Self::time_millis_to_now).
    pub fn time_millis_to_now_sampled(&self, key: &str, start_millis: i64, sample_rate: f32) {
        let elapsed = (unix_micros() / 1000 - start_millis).max(0);
        self.time_sampled(key, elapsed, sample_rate);
    }

    /// Records the time elapsed since `start_micros`, a Unix timestamp in
    /// microseconds, reported in milliseconds and saturating at zero.
    pub fn time_micros_to_now(&self, key: &str, start_micros: i64) {
        self.time_micros_to_now_sampled(key, start_micros, 1.0);
    }

    /// Sampled variant of [`time_micros_to_now`](Self::time_micros_to_now).
    pub fn time_micros_to_now_sampled(&self, key: &str, start_micros: i64, sample_rate: f32) {
        let elapsed = ((unix_micros() - start_micros) / 1000).max(0);
        self.time_sampled(key, elapsed, sample_rate);
    }

    /// Manually sends a metric with an already-formatted value; every
    /// high-level operation funnels through here.
    pub fn send(&self, key: &str, value: &str, metric_type: MetricType, sample_rate: f32) {
        let key = self.influxed_key(key);
        let line = writer::format_line(&key, value, metric_type, sample_rate);
        self.sink.emit(&line);
    }

    /// Integer-valued variant of [`send`](Self::send).
    pub fn send_int(&self, key: &str, value: i64, metric_type: MetricType, sample_rate: f32) {
        self.send(key, &writer::format_int(value), metric_type, sample_rate);
    }

    /// Prefixes `key` with the namespace and suffixes it with the tag list,
    /// in insertion order.
    fn influxed_key(&self, key: &str) -> String {
        let mut out = String::with_capacity(self.ns.len() + key.len() + 16);
        if !self.ns.is_empty() {
            out.push_str(&self.ns);
            out.push('.');
        }
        out.push_str(key);

        for (name, value) in &self.tags {
            out.push(',');
            out.push_str(name);
            out.push('=');
            out.push_str(value);
        }

        out
    }
}

fn unix_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}
