//! Record shipper
//!
//! Ties the pieces together for each record: resolve the stream's path,
//! render the message, hand it to the transport, and count the outcome.

use super::{
    config::ShipperConfig,
    metrics::ShipperMetrics,
    output_format::OutputFormat,
    path_resolver::{DerivedPathRegistry, FilterRegistry, PathResolver},
    record::{Record, StreamId},
    report::ShipperReport,
    syslog::SyslogHeader,
};
use crate::transport::{Connector, UdpConnector, UdpTransport};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct Shipper {
    resolver: PathResolver,
    transport: UdpTransport,
    format: OutputFormat,
    header: SyslogHeader,
    continue_pipeline: bool,
    metrics: ShipperMetrics,
    discards_by_path: BTreeMap<Arc<str>, u64>,
    report: Option<ShipperReport>,
}

impl Shipper {
    /// Create a shipper sending to real UDP sockets
    #[must_use]
    pub fn from_config(config: &ShipperConfig, registry: Box<dyn FilterRegistry>) -> Self {
        Self::builder()
            .config(config.clone())
            .registry(registry)
            .build()
    }

    /// Create a new builder for configuring a shipper
    #[must_use]
    pub fn builder() -> ShipperBuilder {
        ShipperBuilder::new()
    }

    /// Ship one record
    ///
    /// Returns whether the producer should continue its own logging pipeline
    /// for this record. The answer is fixed at startup and does not depend
    /// on whether the record was sent.
    ///
    /// Socket notifications are not delivered here: until the event loop
    /// calls `poll` after a connect, records are discarded.
    pub fn handle(&mut self, record: &Record, stream: &StreamId) -> bool {
        self.handle_at(record, stream, Instant::now())
    }

    /// Ship one record, with `now` as the transport's notion of time
    pub fn handle_at(&mut self, record: &Record, stream: &StreamId, now: Instant) -> bool {
        self.metrics.record_received();

        let path = match self.resolver.resolve(stream) {
            Ok(path) => path,
            Err(e) => {
                warn!(stream = %stream, "udp-logging: dropping record: {}", e);
                self.metrics.record_unresolved();
                return self.continue_pipeline;
            }
        };

        let message = match self.format.format(&path, record, &self.header, &Utc::now()) {
            Ok(message) => message,
            Err(e) => {
                warn!(path = %path, "udp-logging: failed to render record: {}", e);
                self.record_discard(path);
                return self.continue_pipeline;
            }
        };

        if self.transport.send(message.as_bytes(), now) {
            self.metrics.record_sent();
        } else {
            debug!(path = %path, state = %self.transport.state(), "udp-logging: not ready, discarding write");
            self.record_discard(path);
        }

        self.continue_pipeline
    }

    fn record_discard(&mut self, path: Arc<str>) {
        self.metrics.record_discarded();
        *self.discards_by_path.entry(path).or_insert(0) += 1;
    }

    /// Deliver socket notifications and fire a due reconnect
    ///
    /// The event loop calls this at `next_wakeup`.
    pub fn poll(&mut self, now: Instant) {
        self.transport.poll(now);
    }

    /// When `poll` should next run, if anything is pending
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.transport.next_deadline()
    }

    /// Stop reconnecting and report the final counters
    ///
    /// The report is logged once; later calls return it again without
    /// logging.
    pub fn shutdown(&mut self) -> ShipperReport {
        if let Some(report) = &self.report {
            return report.clone();
        }

        self.transport.shutdown();
        let report = self.snapshot();
        info!(discard_rate = self.metrics.discard_rate(), "{}", report);
        if report.has_discards() {
            for line in report.breakdown_lines() {
                info!("{}", line);
            }
        }
        self.report = Some(report.clone());
        report
    }

    /// Current counters as a report, without shutting down
    pub fn snapshot(&self) -> ShipperReport {
        let stats = self.transport.stats();
        ShipperReport {
            total: self.metrics.total(),
            sent: self.metrics.sent(),
            errors: stats.errors,
            discarded: self.metrics.discarded(),
            unresolved: self.metrics.unresolved(),
            reconnects: stats.reconnects,
            suppressed: stats.suppressed,
            discards_by_path: self
                .discards_by_path
                .iter()
                .map(|(path, count)| (path.to_string(), *count))
                .collect(),
        }
    }

    pub fn metrics(&self) -> &ShipperMetrics {
        &self.metrics
    }

    pub fn transport(&self) -> &UdpTransport {
        &self.transport
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn continue_pipeline(&self) -> bool {
        self.continue_pipeline
    }
}

/// Builder for `Shipper`
pub struct ShipperBuilder {
    config: ShipperConfig,
    registry: Option<Box<dyn FilterRegistry>>,
    connector: Option<Box<dyn Connector>>,
    procid: Option<u32>,
}

impl ShipperBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ShipperConfig::default(),
            registry: None,
            connector: None,
            procid: None,
        }
    }

    /// Use this configuration
    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: ShipperConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the filter registry used for path lookups
    ///
    /// Defaults to `DerivedPathRegistry`.
    #[must_use = "builder methods return a new value"]
    pub fn registry(mut self, registry: Box<dyn FilterRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the socket connector
    ///
    /// Defaults to `UdpConnector`.
    #[must_use = "builder methods return a new value"]
    pub fn connector(mut self, connector: Box<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Override the PROCID written into tagged messages
    #[must_use = "builder methods return a new value"]
    pub fn procid(mut self, procid: u32) -> Self {
        self.procid = Some(procid);
        self
    }

    /// Build the shipper, making the first connect attempt now
    pub fn build(self) -> Shipper {
        self.build_at(Instant::now())
    }

    /// Build the shipper with `now` as the time of the first connect attempt
    pub fn build_at(self, now: Instant) -> Shipper {
        let config = self.config;
        let hostname = SyslogHeader::hostname_for(config.cluster_node.as_deref());
        let procid = self.procid.unwrap_or_else(std::process::id);
        let header = SyslogHeader::with_procid(config.priority, hostname, &config.app_name, procid);

        let registry = self
            .registry
            .unwrap_or_else(|| Box::new(DerivedPathRegistry::new()));
        let connector = self.connector.unwrap_or_else(|| Box::new(UdpConnector::new()));

        info!(
            format = %config.format,
            continue_pipeline = config.continue_pipeline,
            backoff_ms = config.reconnect_backoff.as_millis() as u64,
            "udp-logging: starting shipper"
        );

        Shipper {
            resolver: PathResolver::new(registry, config.format.path_suffix()),
            transport: UdpTransport::new(
                connector,
                config.endpoint.clone(),
                config.reconnect_backoff,
                config.error_interval,
                now,
            ),
            format: config.format,
            header,
            continue_pipeline: config.continue_pipeline,
            metrics: ShipperMetrics::new(),
            discards_by_path: BTreeMap::new(),
            report: None,
        }
    }
}

impl Default for ShipperBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ShipperError;
    use crate::core::path_resolver::Filter;
    use crate::record;
    use crate::transport::{DatagramSocket, TransportState};
    use std::cell::{Cell, RefCell};
    use std::io;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Default)]
    struct Capture {
        datagrams: Vec<String>,
        refuse: bool,
    }

    struct CaptureSocket(Rc<RefCell<Capture>>);

    impl DatagramSocket for CaptureSocket {
        fn send(&self, payload: &[u8]) -> io::Result<usize> {
            let mut capture = self.0.borrow_mut();
            if capture.refuse {
                return Err(io::ErrorKind::ConnectionRefused.into());
            }
            capture.datagrams.push(String::from_utf8_lossy(payload).into_owned());
            Ok(payload.len())
        }

        fn take_error(&self) -> io::Result<Option<io::Error>> {
            Ok(None)
        }
    }

    struct CaptureConnector(Rc<RefCell<Capture>>);

    impl Connector for CaptureConnector {
        fn connect(&self, _endpoint: &crate::core::Endpoint) -> io::Result<Box<dyn DatagramSocket>> {
            Ok(Box::new(CaptureSocket(Rc::clone(&self.0))))
        }
    }

    /// A shipper whose socket has seen its connect notification
    fn shipper(config: ShipperConfig, capture: &Rc<RefCell<Capture>>) -> Shipper {
        let mut shipper = Shipper::builder()
            .config(config)
            .connector(Box::new(CaptureConnector(Rc::clone(capture))))
            .procid(4242)
            .build();
        shipper.poll(Instant::now());
        shipper
    }

    #[test]
    fn test_records_before_connect_notification_are_discarded() {
        let capture = Rc::new(RefCell::new(Capture::default()));
        let t0 = Instant::now();
        let mut shipper = Shipper::builder()
            .config(ShipperConfig::default().with_format(OutputFormat::RawJson))
            .connector(Box::new(CaptureConnector(Rc::clone(&capture))))
            .build_at(t0);
        let record = record! { "a" => 1 };

        assert_eq!(shipper.next_wakeup(), Some(t0));
        shipper.handle_at(&record, &"Conn::LOG".into(), t0);
        shipper.handle_at(&record, &"Conn::LOG".into(), t0);
        assert_eq!(shipper.metrics().discarded(), 2);
        assert!(capture.borrow().datagrams.is_empty());

        shipper.poll(t0);
        shipper.handle_at(&record, &"Conn::LOG".into(), t0);
        assert_eq!(shipper.metrics().sent(), 1);
        assert_eq!(capture.borrow().datagrams, vec![r#"{"a":1}"#]);
        assert_eq!(shipper.next_wakeup(), None);
    }

    #[test]
    fn test_ships_raw_json() {
        let capture = Rc::new(RefCell::new(Capture::default()));
        let mut shipper = shipper(
            ShipperConfig::default().with_format(OutputFormat::RawJson),
            &capture,
        );
        let record = record! { "ts" => 1.0, "id.orig_h" => "10.0.0.1", "note" => "X" };

        assert!(!shipper.handle(&record, &"Notice::LOG".into()));
        assert_eq!(
            capture.borrow().datagrams,
            vec![r#"{"ts":1.0,"id.orig_h":"10.0.0.1","note":"X"}"#]
        );
        assert_eq!(shipper.metrics().sent(), 1);
    }

    #[test]
    fn test_ships_tagged_with_log_suffix() {
        let capture = Rc::new(RefCell::new(Capture::default()));
        let mut shipper = shipper(ShipperConfig::default().with_cluster_node("worker-1"), &capture);

        shipper.handle(&record! { "uid" => "C1" }, &"Conn::LOG".into());

        let capture = capture.borrow();
        let datagram = &capture.datagrams[0];
        assert!(datagram.starts_with("<134>1 "), "{}", datagram);
        assert!(datagram.contains(" worker-1 zeek 4242 - [zeek_filename=\"conn.log\"] "));
        assert!(datagram.ends_with(r#"{"uid":"C1"}"#));
    }

    #[test]
    fn test_return_value_is_the_configured_flag() {
        let capture = Rc::new(RefCell::new(Capture {
            refuse: true,
            ..Default::default()
        }));
        let mut shipper = shipper(ShipperConfig::default().with_continue_pipeline(true), &capture);
        let record = record! { "a" => 1 };

        // Failing sends do not change the answer
        assert!(shipper.handle(&record, &"Conn::LOG".into()));
        assert!(shipper.handle(&record, &"Conn::LOG".into()));
        assert_eq!(shipper.metrics().discarded(), 2);
    }

    #[test]
    fn test_backoff_discards_one_per_record() {
        let capture = Rc::new(RefCell::new(Capture {
            refuse: true,
            ..Default::default()
        }));
        let t0 = Instant::now();
        let mut shipper = Shipper::builder()
            .config(ShipperConfig::default().with_reconnect_backoff(Duration::from_secs(60)))
            .connector(Box::new(CaptureConnector(Rc::clone(&capture))))
            .build_at(t0);
        let record = record! { "a" => 1 };
        shipper.poll(t0);

        shipper.handle_at(&record, &"Conn::LOG".into(), t0);
        assert_eq!(shipper.transport().state(), TransportState::Backoff);

        for i in 1..=4u64 {
            shipper.handle_at(&record, &"Conn::LOG".into(), t0 + Duration::from_millis(i));
            assert_eq!(shipper.metrics().discarded(), 1 + i);
        }
        assert_eq!(shipper.transport().stats().errors, 1);
    }

    #[test]
    fn test_unresolved_stream_is_discarded() {
        let capture = Rc::new(RefCell::new(Capture::default()));
        let lookups = Rc::new(Cell::new(0));
        let counter = Rc::clone(&lookups);
        let mut shipper = Shipper::builder()
            .connector(Box::new(CaptureConnector(Rc::clone(&capture))))
            .registry(Box::new(move |stream: &StreamId| {
                counter.set(counter.get() + 1);
                match stream.as_str() {
                    "Conn::LOG" => Ok(Filter::new("default", "conn")),
                    other => Err(ShipperError::filter_lookup(other, "no such stream")),
                }
            }))
            .build();
        shipper.poll(Instant::now());

        shipper.handle(&record! { "a" => 1 }, &"Missing::LOG".into());
        shipper.handle(&record! { "a" => 1 }, &"Conn::LOG".into());
        shipper.handle(&record! { "a" => 2 }, &"Conn::LOG".into());

        let report = shipper.shutdown();
        assert_eq!(report.total, 3);
        assert_eq!(report.sent, 2);
        assert_eq!(report.discarded, 1);
        assert_eq!(report.unresolved, 1);
        assert!(report.discards_by_path.is_empty());
        assert_eq!(lookups.get(), 2);
    }

    #[test]
    fn test_shutdown_report_breaks_down_discards() {
        let capture = Rc::new(RefCell::new(Capture {
            refuse: true,
            ..Default::default()
        }));
        let t0 = Instant::now();
        let mut shipper = Shipper::builder()
            .connector(Box::new(CaptureConnector(Rc::clone(&capture))))
            .build_at(t0);
        shipper.poll(t0);

        shipper.handle_at(&record! { "a" => 1 }, &"DNS::LOG".into(), t0);
        shipper.handle_at(&record! { "a" => 1 }, &"Conn::LOG".into(), t0);
        shipper.handle_at(&record! { "a" => 1 }, &"Conn::LOG".into(), t0);

        let report = shipper.shutdown();
        assert_eq!(
            report.discards_by_path,
            vec![("conn.log".to_string(), 2), ("dns.log".to_string(), 1)]
        );
        assert!(shipper.transport().is_shutdown());
        assert_eq!(shipper.next_wakeup(), None);

        // Idempotent
        assert_eq!(shipper.shutdown(), report);
    }
}
