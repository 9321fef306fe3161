//! Shutdown report

use std::fmt;

/// Final counters of a shipper run
///
/// `Display` renders the one-line summary; `breakdown_lines` lists the
/// paths that had discards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShipperReport {
    pub total: u64,
    pub sent: u64,
    pub errors: u64,
    pub discarded: u64,
    pub unresolved: u64,
    pub reconnects: u64,
    pub suppressed: u64,
    /// Discards per destination path, sorted by path
    pub discards_by_path: Vec<(String, u64)>,
}

impl ShipperReport {
    pub fn has_discards(&self) -> bool {
        self.discarded > 0
    }

    /// One line per path with discards
    pub fn breakdown_lines(&self) -> Vec<String> {
        self.discards_by_path
            .iter()
            .map(|(path, count)| format!("udp-logging: discarded path={} count={}", path, count))
            .collect()
    }
}

impl fmt::Display for ShipperReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "udp-logging: total={} sent={} errors={} discarded={} unresolved={} reconnects={} suppressed={}",
            self.total,
            self.sent,
            self.errors,
            self.discarded,
            self.unresolved,
            self.reconnects,
            self.suppressed
        )
    }
}
