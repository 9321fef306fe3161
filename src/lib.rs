//! # UDP Log Shipper
//!
//! A fire-and-forget UDP log shipper. Structured records from a producer are
//! rendered as JSON, optionally wrapped in an RFC 5424 style envelope, and
//! sent as one datagram each to a collector.
//!
//! ## Features
//!
//! - **Never blocks the producer**: while the socket is down, records are
//!   dropped and counted instead of queued
//! - **Reconnect backoff**: a failed socket is replaced after a fixed delay
//! - **Bounded diagnostics**: repeated socket errors are counted but logged
//!   at most once per interval
//! - **Observable loss**: total, sent, discarded, and error counters with a
//!   per-path breakdown at shutdown

pub mod core;
pub mod macros;
pub mod transport;

pub mod prelude {
    pub use crate::core::{
        AddressFamily, DerivedPathRegistry, Endpoint, FieldValue, Filter, FilterRegistry,
        OutputFormat, Record, Result, Shipper, ShipperBuilder, ShipperConfig, ShipperError,
        ShipperMetrics, ShipperReport, StreamId, SyslogPriority,
    };
    pub use crate::transport::{Connector, DatagramSocket, TransportState, UdpConnector};
}

pub use crate::core::{
    AddressFamily, DerivedPathRegistry, Endpoint, Field, FieldValue, Filter, FilterRegistry,
    OutputFormat, PathResolver, Record, Result, Shipper, ShipperBuilder, ShipperConfig,
    ShipperError, ShipperMetrics, ShipperReport, StreamId, SyslogHeader, SyslogPriority,
};
pub use crate::transport::{Connector, DatagramSocket, TransportState, UdpConnector, UdpTransport};
