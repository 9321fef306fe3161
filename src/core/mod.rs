//! Core shipper types

pub mod config;
pub mod error;
pub mod metrics;
pub mod output_format;
pub mod path_resolver;
pub mod record;
pub mod report;
pub mod shipper;
pub mod syslog;

pub use config::{parse_bool, AddressFamily, Endpoint, ShipperConfig};
pub use error::{Result, ShipperError};
pub use metrics::ShipperMetrics;
pub use output_format::OutputFormat;
pub use path_resolver::{DerivedPathRegistry, Filter, FilterRegistry, PathResolver};
pub use record::{Field, FieldValue, Record, StreamId};
pub use report::ShipperReport;
pub use shipper::{Shipper, ShipperBuilder};
pub use syslog::{SyslogHeader, SyslogPriority};
