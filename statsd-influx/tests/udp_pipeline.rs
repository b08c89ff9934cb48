//! End-to-end tests driving the real queue, worker, and UDP transport
//! against a loopback receiver.

use std::net::UdpSocket;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use statsd_influx::{StatsdBuilder, StatsdClient};

fn loopback_receiver() -> (UdpSocket, u16) {
    let receiver = UdpSocket::bind("127.0.0.1:0").expect("bind receiver");
    receiver.set_read_timeout(Some(Duration::from_secs(5))).expect("set timeout");
    let port = receiver.local_addr().expect("receiver addr").port();
    (receiver, port)
}

fn client_for_port(port: u16) -> StatsdClient {
    let sender = StatsdBuilder::default()
        .with_remote_address(format!("127.0.0.1:{port}"))
        .expect("loopback address must parse")
        .build();
    assert!(sender.is_healthy());
    StatsdClient::from_sink(Arc::new(sender))
}

#[test]
fn formats_wire_lines_end_to_end() {
    let (receiver, port) = loopback_receiver();
    let client = client_for_port(port).with_namespace("ns").with_tag("tag1", "value1");

    client.gauge_sampled("key", 0.01, 0.01);

    let mut buf = [0u8; 256];
    let len = receiver.recv(&mut buf).expect("receive datagram");
    assert_eq!(&buf[..len], b"ns.key,tag1=value1:0.01|g|@0.01");
}

#[test]
fn concurrent_producers_lose_nothing() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 50;

    let (receiver, port) = loopback_receiver();
    let client = client_for_port(port).with_namespace("pipeline");

    let mut producers = Vec::new();
    for p in 0..PRODUCERS {
        let client = client.clone();
        producers.push(thread::spawn(move || {
            for i in 0..PER_PRODUCER {
                client.count(&format!("producer{p}.msg{i}"), 1);
            }
        }));
    }
    for producer in producers {
        producer.join().expect("producer panicked");
    }

    let mut received = Vec::new();
    let mut buf = [0u8; 256];
    while received.len() < PRODUCERS * PER_PRODUCER {
        match receiver.recv(&mut buf) {
            Ok(len) => received.push(String::from_utf8_lossy(&buf[..len]).into_owned()),
            Err(_) => break,
        }
    }

    assert_eq!(received.len(), PRODUCERS * PER_PRODUCER, "every enqueued line must arrive");
    assert!(received
        .iter()
        .all(|line| line.starts_with("pipeline.producer") && line.ends_with(":1|c")));

    // Every key was unique, so duplicates would show up as a shrunk set.
    received.sort();
    received.dedup();
    assert_eq!(received.len(), PRODUCERS * PER_PRODUCER, "no line may be delivered twice");
}
