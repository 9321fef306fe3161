//! RFC 5424 style envelope for tagged messages
//!
//! The header fields that do not change per message (PRI, hostname,
//! app name, process id) are computed once when the shipper is built.

use super::error::{Result, ShipperError};
use chrono::{DateTime, Utc};
use std::fmt;

/// Hostname used when no cluster node name is available
pub const DEFAULT_HOSTNAME: &str = "zeek";

/// Default APP-NAME field
pub const DEFAULT_APP_NAME: &str = "zeek";

/// Structured data parameter carrying the destination path
pub const FILENAME_PARAM: &str = "zeek_filename";

/// Syslog facility/severity pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyslogPriority {
    facility: u8,
    severity: u8,
}

impl SyslogPriority {
    /// local0
    pub const DEFAULT_FACILITY: u8 = 16;
    /// informational
    pub const DEFAULT_SEVERITY: u8 = 6;

    /// Create a priority, validating the RFC 5424 ranges
    ///
    /// # Errors
    ///
    /// Returns a configuration error if facility > 23 or severity > 7
    pub fn new(facility: u8, severity: u8) -> Result<Self> {
        if facility > 23 {
            return Err(ShipperError::config(
                "UDP_SYSLOG_FACILITY",
                format!("facility must be 0..=23, got {}", facility),
            ));
        }
        if severity > 7 {
            return Err(ShipperError::config(
                "UDP_SYSLOG_SEVERITY",
                format!("severity must be 0..=7, got {}", severity),
            ));
        }
        Ok(Self { facility, severity })
    }

    /// The PRI value, `facility * 8 + severity`
    #[inline]
    pub fn value(&self) -> u8 {
        self.facility * 8 + self.severity
    }
}

impl Default for SyslogPriority {
    fn default() -> Self {
        Self {
            facility: Self::DEFAULT_FACILITY,
            severity: Self::DEFAULT_SEVERITY,
        }
    }
}

impl fmt::Display for SyslogPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.value())
    }
}

/// Precomputed header fields for `tagged-rfc5424` messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyslogHeader {
    pri: String,
    hostname: String,
    app_name: String,
    procid: u32,
}

impl SyslogHeader {
    pub fn new(priority: SyslogPriority, hostname: &str, app_name: &str) -> Self {
        Self::with_procid(priority, hostname, app_name, std::process::id())
    }

    pub fn with_procid(
        priority: SyslogPriority,
        hostname: &str,
        app_name: &str,
        procid: u32,
    ) -> Self {
        Self {
            pri: priority.to_string(),
            hostname: header_token(hostname, DEFAULT_HOSTNAME),
            app_name: header_token(app_name, DEFAULT_APP_NAME),
            procid,
        }
    }

    /// Hostname from the cluster node name, falling back to the default
    pub fn hostname_for(cluster_node: Option<&str>) -> &str {
        match cluster_node {
            Some(node) if !node.trim().is_empty() => node,
            _ => DEFAULT_HOSTNAME,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn procid(&self) -> u32 {
        self.procid
    }

    /// Write `<PRI>1 TIMESTAMP HOSTNAME APP-NAME PROCID - [zeek_filename="PATH"] `
    pub fn write_prefix(&self, out: &mut String, path: &str, at: &DateTime<Utc>) {
        use std::fmt::Write;

        // Writing into a String cannot fail
        let _ = write!(
            out,
            "{}1 {} {} {} {} - [{}=\"{}\"] ",
            self.pri,
            format_timestamp(at),
            self.hostname,
            self.app_name,
            self.procid,
            FILENAME_PARAM,
            escape_param_value(path)
        );
    }
}

impl Default for SyslogHeader {
    fn default() -> Self {
        Self::new(SyslogPriority::default(), DEFAULT_HOSTNAME, DEFAULT_APP_NAME)
    }
}

/// Sortable ISO 8601 timestamp with microseconds: `2025-01-08T10:30:45.123456Z`
#[must_use]
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Escape `\`, `"` and `]` in a structured data parameter value
#[must_use]
pub fn escape_param_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// Header fields are space-delimited, so whitespace and control characters
// cannot appear in them.
fn header_token(value: &str, fallback: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return fallback.to_string();
    }
    value
        .chars()
        .map(|c| if c.is_whitespace() || c.is_control() { '_' } else { c })
        .collect()
}
