use std::thread::sleep;
use std::time::Duration;

use statsd_influx::{StatsdBuilder, StatsdClient};

fn main() {
    tracing_subscriber::fmt::init();

    StatsdBuilder::default()
        .with_remote_address("127.0.0.1:8125")
        .expect("failed to parse remote address")
        .install()
        .expect("failed to install statsd sender");

    let client = StatsdClient::new().with_namespace("demo").with_tag("host", "local");

    // Loop for a bit, pretending to do some work.
    for i in 0..100 {
        client.incr("iterations");
        client.gauge("progress", f64::from(i) / 100.0);

        let started = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        sleep(Duration::from_millis(25));
        client.time_millis_to_now("work.duration", started);
    }
}
