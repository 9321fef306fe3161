//! Integration tests for the UDP log shipper
//!
//! These tests verify:
//! - End-to-end delivery to a real UDP listener in every wire format
//! - Loss accounting against a closed port and a refusing collector
//! - Reconnect after backoff and no reconnect after shutdown
//! - Path lookups happen once per stream

use std::cell::{Cell, RefCell};
use std::io;
use std::net::UdpSocket;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use udp_log_shipper::prelude::*;
use udp_log_shipper::{record, PathResolver};

fn listener() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind listener");
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("Failed to set read timeout");
    let port = socket.local_addr().unwrap().port();
    (socket, port)
}

fn recv_string(socket: &UdpSocket) -> String {
    let mut buf = [0u8; 65_536];
    let n = socket.recv(&mut buf).expect("No datagram received");
    String::from_utf8(buf[..n].to_vec()).expect("Datagram is not UTF-8")
}

/// A port with nothing listening on it
fn closed_port() -> u16 {
    let (socket, port) = listener();
    drop(socket);
    port
}

/// Deliver the connect notification, as the event loop would
fn connected(mut shipper: Shipper) -> Shipper {
    shipper.poll(Instant::now());
    assert_eq!(shipper.transport().state(), TransportState::Ready);
    shipper
}

fn notice_record() -> Record {
    record! { "ts" => 1.0, "id.orig_h" => "10.0.0.1", "note" => "X" }
}

/// Connector whose sockets refuse every datagram, counting connects
struct RefusingConnector {
    connects: Rc<Cell<u32>>,
}

struct RefusingSocket;

impl DatagramSocket for RefusingSocket {
    fn send(&self, _payload: &[u8]) -> io::Result<usize> {
        Err(io::ErrorKind::ConnectionRefused.into())
    }

    fn take_error(&self) -> io::Result<Option<io::Error>> {
        Ok(None)
    }
}

impl Connector for RefusingConnector {
    fn connect(&self, _endpoint: &Endpoint) -> io::Result<Box<dyn DatagramSocket>> {
        self.connects.set(self.connects.get() + 1);
        Ok(Box::new(RefusingSocket))
    }
}

#[test]
fn test_raw_json_end_to_end() {
    let (receiver, port) = listener();
    let config = ShipperConfig::default()
        .with_port(port)
        .with_format(OutputFormat::RawJson);
    let mut shipper = connected(Shipper::from_config(&config, Box::new(DerivedPathRegistry::new())));

    let keep_native = shipper.handle(&notice_record(), &"Notice::LOG".into());

    assert!(!keep_native, "Shipper replaces native logging by default");
    assert_eq!(
        recv_string(&receiver),
        r#"{"ts":1.0,"id.orig_h":"10.0.0.1","note":"X"}"#
    );

    let report = shipper.shutdown();
    assert_eq!((report.total, report.sent, report.discarded), (1, 1, 0));
}

#[test]
fn test_tagged_end_to_end() {
    let (receiver, port) = listener();
    let config = ShipperConfig::default()
        .with_port(port)
        .with_priority(SyslogPriority::new(10, 5).unwrap())
        .with_cluster_node("worker-1");
    let mut shipper = connected(Shipper::builder().config(config).procid(31337).build());

    shipper.handle(&notice_record(), &"Notice::LOG".into());

    let datagram = recv_string(&receiver);
    let (header, body) = datagram
        .split_once("] ")
        .expect("Structured data terminates the header");
    let fields: Vec<&str> = header.split(' ').collect();

    assert_eq!(fields[0], "<85>1");
    assert!(fields[1].ends_with('Z') && fields[1].contains('T'));
    assert_eq!(&fields[2..6], &["worker-1", "zeek", "31337", "-"]);
    assert_eq!(fields[6], r#"[zeek_filename="notice.log""#);
    assert_eq!(body, r#"{"ts":1.0,"id.orig_h":"10.0.0.1","note":"X"}"#);
}

#[test]
fn test_zeek_filename_end_to_end() {
    let (receiver, port) = listener();
    let config = ShipperConfig::default()
        .with_port(port)
        .with_format(OutputFormat::ZeekFilename);
    let mut shipper = connected(Shipper::from_config(&config, Box::new(DerivedPathRegistry::new())));

    shipper.handle(&record! { "uid" => "C1" }, &"Known::HOSTS_LOG".into());

    assert_eq!(
        recv_string(&receiver),
        "zeek_filename=\"known_hosts.log\"{\"uid\":\"C1\"}\n"
    );
}

#[test]
fn test_continue_pipeline_flag_is_returned() {
    let (_receiver, port) = listener();
    let config = ShipperConfig::default()
        .with_port(port)
        .with_continue_pipeline(true);
    let mut shipper = Shipper::from_config(&config, Box::new(DerivedPathRegistry::new()));

    assert!(shipper.handle(&notice_record(), &"Notice::LOG".into()));
    // Unresolvable stream still answers with the flag
    assert!(shipper.handle(&notice_record(), &"nomodule".into()));
    assert_eq!(shipper.metrics().unresolved(), 1);
}

#[test]
fn test_closed_port_before_connect_discards_everything() {
    let port = closed_port();
    let config = ShipperConfig::default()
        .with_port(port)
        .with_format(OutputFormat::RawJson);
    let mut shipper = Shipper::from_config(&config, Box::new(DerivedPathRegistry::new()));

    // Three records arrive before the event loop delivers the connect
    for _ in 0..3 {
        shipper.handle(&notice_record(), &"Notice::LOG".into());
        std::thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(shipper.transport().state(), TransportState::Connecting);
    let report = shipper.shutdown();
    assert_eq!((report.total, report.sent, report.discarded), (3, 0, 3));
    assert_eq!(report.discards_by_path, vec![("notice".to_string(), 3)]);
}

#[test]
fn test_refusing_collector_discards_everything() {
    let connects = Rc::new(Cell::new(0));
    let t0 = Instant::now();
    let mut shipper = Shipper::builder()
        .config(
            ShipperConfig::default()
                .with_port(9999)
                .with_format(OutputFormat::RawJson),
        )
        .connector(Box::new(RefusingConnector {
            connects: Rc::clone(&connects),
        }))
        .build_at(t0);
    shipper.poll(t0);

    for i in 0..3 {
        shipper.handle_at(&notice_record(), &"Notice::LOG".into(), t0 + Duration::from_millis(i));
    }

    let report = shipper.shutdown();
    assert_eq!(report.total, 3);
    assert_eq!(report.sent, 0);
    assert_eq!(report.discarded, 3);
    assert!(report.errors >= 1);
    // Only the first error of the interval is logged
    assert_eq!(report.errors - report.suppressed, 1);
    assert_eq!(report.discards_by_path, vec![("notice".to_string(), 3)]);
}

#[test]
fn test_closed_port_is_detected_and_recovered() {
    let port = closed_port();
    let t0 = Instant::now();
    let shipper = Shipper::builder()
        .config(
            ShipperConfig::default()
                .with_port(port)
                .with_format(OutputFormat::RawJson)
                .with_reconnect_backoff(Duration::from_millis(20)),
        )
        .build_at(t0);
    let mut shipper = connected(shipper);

    // The first datagram leaves; the port unreachable reply arrives later
    assert!(!shipper.handle(&notice_record(), &"Notice::LOG".into()));
    assert_eq!(shipper.metrics().sent(), 1);
    std::thread::sleep(Duration::from_millis(50));

    let mut now = Instant::now();
    for _ in 0..20 {
        shipper.poll(now);
        if shipper.transport().stats().errors > 0 {
            break;
        }
        let _ = shipper.handle_at(&notice_record(), &"Notice::LOG".into(), now);
        std::thread::sleep(Duration::from_millis(10));
        now = Instant::now();
    }
    assert!(shipper.transport().stats().errors >= 1);

    let report = shipper.snapshot();
    assert_eq!(report.total, report.sent + report.discarded);

    // After the backoff a fresh socket is created and waits for its notification
    let later = Instant::now() + Duration::from_millis(20);
    shipper.poll(later);
    assert!(shipper.transport().stats().reconnects >= 1);
    assert_ne!(shipper.transport().state(), TransportState::Ready);
}

#[test]
fn test_reconnect_after_backoff_then_shutdown() {
    let connects = Rc::new(Cell::new(0));
    let t0 = Instant::now();
    let backoff = Duration::from_millis(100);
    let mut shipper = Shipper::builder()
        .config(ShipperConfig::default().with_reconnect_backoff(backoff))
        .connector(Box::new(RefusingConnector {
            connects: Rc::clone(&connects),
        }))
        .build_at(t0);
    shipper.poll(t0);

    shipper.handle_at(&notice_record(), &"Notice::LOG".into(), t0);
    assert_eq!(shipper.next_wakeup(), Some(t0 + backoff));

    shipper.poll(t0 + backoff);
    assert_eq!(connects.get(), 2);
    assert_eq!(shipper.transport().state(), TransportState::Connecting);
    shipper.poll(t0 + backoff);
    assert_eq!(shipper.transport().state(), TransportState::Ready);

    // Fail again, then shut down with the timer pending
    shipper.handle_at(&notice_record(), &"Notice::LOG".into(), t0 + backoff);
    assert_eq!(shipper.transport().state(), TransportState::Backoff);
    shipper.shutdown();
    shipper.poll(t0 + backoff * 10);

    assert_eq!(connects.get(), 2);
}

#[test]
fn test_path_lookup_once_per_stream() {
    let (_receiver, port) = listener();
    let lookups = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&lookups);
    let shipper = Shipper::builder()
        .config(ShipperConfig::default().with_port(port))
        .registry(Box::new(move |stream: &StreamId| -> Result<Filter> {
            seen.borrow_mut().push(stream.to_string());
            Ok(Filter::new("default", stream.as_str().to_lowercase().replace("::", "-")))
        }))
        .build();
    let mut shipper = connected(shipper);

    for _ in 0..5 {
        shipper.handle(&notice_record(), &"Conn::LOG".into());
        shipper.handle(&notice_record(), &"DNS::LOG".into());
    }

    assert_eq!(*lookups.borrow(), vec!["Conn::LOG", "DNS::LOG"]);
    assert_eq!(shipper.metrics().sent(), 10);
}

#[test]
fn test_resolver_returns_identical_path() {
    let mut resolver = PathResolver::new(Box::new(DerivedPathRegistry::new()), Some(".log"));
    let stream = StreamId::from("Conn::LOG");

    let first = resolver.resolve(&stream).unwrap();
    let second = resolver.resolve(&stream).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(&*first, "conn.log");
    assert_eq!(resolver.lookups(), 1);
}

#[test]
fn test_json_input_renders_like_built_record() {
    let value: serde_json::Value =
        serde_json::from_str(r#"{"ts":1.0,"id.orig_h":"10.0.0.1","note":"X"}"#).unwrap();
    let from_json = Record::from_json(&value).unwrap();

    assert_eq!(from_json.to_json().unwrap(), notice_record().to_json().unwrap());
}
