//! Wire formats for shipped records
//!
//! Provides the formats a record can be rendered into:
//! - RawJson: the flattened record as a single JSON object
//! - TaggedRfc5424: a syslog style envelope carrying the destination path
//! - ZeekFilename: `zeek_filename="PATH"` followed by the JSON body

use super::error::{Result, ShipperError};
use super::record::Record;
use super::syslog::{SyslogHeader, FILENAME_PARAM};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output format for shipped records, selected once at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// The JSON object alone
    ///
    /// Example: `{"ts":1.0,"id.orig_h":"10.0.0.1","note":"X"}`
    RawJson,

    /// RFC 5424 style header with the path as structured data (default)
    ///
    /// Example: `<134>1 2025-01-08T10:30:45.123456Z zeek zeek 4242 - [zeek_filename="conn.log"] {"ts":1.0}`
    #[default]
    TaggedRfc5424,

    /// Path prefix followed by the JSON body and a newline
    ///
    /// Example: `zeek_filename="conn.log"{"ts":1.0}`
    ZeekFilename,
}

impl OutputFormat {
    /// Render a record according to this output format
    ///
    /// `path` is the resolved destination path for the record's stream.
    pub fn format(
        &self,
        path: &str,
        record: &Record,
        header: &SyslogHeader,
        at: &DateTime<Utc>,
    ) -> Result<String> {
        let body = record.to_json()?;
        Ok(match self {
            OutputFormat::RawJson => body,
            OutputFormat::TaggedRfc5424 => {
                let mut out = String::with_capacity(body.len() + 96 + path.len());
                header.write_prefix(&mut out, path, at);
                out.push_str(&body);
                out
            }
            OutputFormat::ZeekFilename => {
                format!("{}=\"{}\"{}\n", FILENAME_PARAM, path, body)
            }
        })
    }

    /// File-style suffix appended to resolved paths
    #[must_use]
    pub fn path_suffix(&self) -> Option<&'static str> {
        match self {
            OutputFormat::RawJson => None,
            OutputFormat::TaggedRfc5424 | OutputFormat::ZeekFilename => Some(".log"),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::RawJson => "raw-json",
            OutputFormat::TaggedRfc5424 => "tagged-rfc5424",
            OutputFormat::ZeekFilename => "zeek-filename",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ShipperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw-json" | "json" => Ok(OutputFormat::RawJson),
            "tagged-rfc5424" | "rfc5424" => Ok(OutputFormat::TaggedRfc5424),
            "zeek-filename" => Ok(OutputFormat::ZeekFilename),
            other => Err(ShipperError::config(
                "UDP_FORMAT",
                format!(
                    "unknown format '{}', expected raw-json, tagged-rfc5424 or zeek-filename",
                    other
                ),
            )),
        }
    }
}
