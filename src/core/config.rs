//! Startup configuration
//!
//! All settings are resolved once, before any record is handled. Values come
//! from the environment (`ShipperConfig::from_env`) and can be overridden
//! with the builder-style `with_*` methods.

use super::error::{Result, ShipperError};
use super::output_format::OutputFormat;
use super::syslog::{SyslogPriority, DEFAULT_APP_NAME};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9514;
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_millis(100);
pub const DEFAULT_ERROR_INTERVAL: Duration = Duration::from_millis(1000);

/// Socket address family of the outbound socket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    Udp4,
    Udp6,
}

impl AddressFamily {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::Udp4 => "udp4",
            AddressFamily::Udp6 => "udp6",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressFamily {
    type Err = ShipperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "udp4" => Ok(AddressFamily::Udp4),
            "udp6" => Ok(AddressFamily::Udp6),
            other => Err(ShipperError::config(
                "UDP_TYPE",
                format!("unknown socket type '{}', expected udp4 or udp6", other),
            )),
        }
    }
}

/// Destination of shipped messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub family: AddressFamily,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, family: AddressFamily) -> Self {
        Self {
            host: host.into(),
            port,
            family,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT, AddressFamily::Udp4)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Shipper configuration
///
/// # Examples
///
/// ```
/// use udp_log_shipper::{OutputFormat, ShipperConfig};
/// use std::time::Duration;
///
/// let config = ShipperConfig::default()
///     .with_port(9999)
///     .with_format(OutputFormat::RawJson)
///     .with_reconnect_backoff(Duration::from_millis(25));
///
/// assert_eq!(config.endpoint.port, 9999);
/// assert!(!config.continue_pipeline);
/// ```
#[derive(Debug, Clone)]
pub struct ShipperConfig {
    pub endpoint: Endpoint,
    pub format: OutputFormat,
    /// Delay between a socket error and the next connect attempt
    pub reconnect_backoff: Duration,
    /// Window in which repeated socket errors are counted but not logged
    pub error_interval: Duration,
    /// Whether the producer keeps running its native logging pipeline
    pub continue_pipeline: bool,
    pub priority: SyslogPriority,
    pub app_name: String,
    pub cluster_node: Option<String>,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            format: OutputFormat::default(),
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
            error_interval: DEFAULT_ERROR_INTERVAL,
            continue_pipeline: false,
            priority: SyslogPriority::default(),
            app_name: DEFAULT_APP_NAME.to_string(),
            cluster_node: None,
        }
    }
}

impl ShipperConfig {
    /// Read configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns `ShipperError::InvalidConfiguration` for any value that does
    /// not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = get("UDP_HOST") {
            config.endpoint.host = host.trim().to_string();
        }
        if let Some(port) = get("UDP_PORT") {
            config.endpoint.port = parse_number("UDP_PORT", &port)?;
        }
        if let Some(family) = get("UDP_TYPE") {
            config.endpoint.family = family.parse()?;
        }
        if let Some(format) = get("UDP_FORMAT") {
            config.format = format.parse()?;
        }
        if let Some(ms) = get("UDP_RECONNECT_MS") {
            config.reconnect_backoff = Duration::from_millis(parse_number("UDP_RECONNECT_MS", &ms)?);
        }
        if let Some(ms) = get("UDP_ERROR_INTERVAL_MS") {
            config.error_interval =
                Duration::from_millis(parse_number("UDP_ERROR_INTERVAL_MS", &ms)?);
        }
        if let Some(flag) = get("UDP_CONTINUE_LOGGING") {
            config.continue_pipeline = parse_bool("UDP_CONTINUE_LOGGING", &flag)?;
        }

        let facility = match get("UDP_SYSLOG_FACILITY") {
            Some(value) => parse_number("UDP_SYSLOG_FACILITY", &value)?,
            None => SyslogPriority::DEFAULT_FACILITY,
        };
        let severity = match get("UDP_SYSLOG_SEVERITY") {
            Some(value) => parse_number("UDP_SYSLOG_SEVERITY", &value)?,
            None => SyslogPriority::DEFAULT_SEVERITY,
        };
        config.priority = SyslogPriority::new(facility, severity)?;

        if let Some(app_name) = get("UDP_APP_NAME") {
            config.app_name = app_name;
        }
        config.cluster_node = get("CLUSTER_NODE");

        Ok(config)
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.endpoint.host = host.into();
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.endpoint.port = port;
        self
    }

    #[must_use]
    pub fn with_family(mut self, family: AddressFamily) -> Self {
        self.endpoint.family = family;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_error_interval(mut self, interval: Duration) -> Self {
        self.error_interval = interval;
        self
    }

    #[must_use]
    pub fn with_continue_pipeline(mut self, enable: bool) -> Self {
        self.continue_pipeline = enable;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: SyslogPriority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_cluster_node(mut self, node: impl Into<String>) -> Self {
        self.cluster_node = Some(node.into());
        self
    }

    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }
}

/// Parse a boolean flag
///
/// Accepts `1/0`, `true/false`, `t/f`, `yes/no`, `on/off`, ignoring case.
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "off" => Ok(false),
        other => Err(ShipperError::config(
            key,
            format!("expected a boolean, got '{}'", other),
        )),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ShipperError::config(key, format!("expected a number, got '{}'", value.trim())))
}
