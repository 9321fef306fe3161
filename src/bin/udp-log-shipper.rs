//! Ship newline-delimited JSON records from stdin over UDP.
//!
//! Each input line is `{"stream": "Conn::LOG", "record": {...}}`. Every field
//! of the record object is shipped; nested objects are flattened. Settings
//! come from the `UDP_*` environment variables.

use serde::Deserialize;
use std::io::Write;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use udp_log_shipper::{DerivedPathRegistry, Record, Shipper, ShipperConfig, StreamId};

#[derive(Debug, Deserialize)]
struct InputLine {
    stream: String,
    record: serde_json::Value,
}

fn ingest(shipper: &mut Shipper, line: &str) {
    if line.trim().is_empty() {
        return;
    }

    let input: InputLine = match serde_json::from_str(line) {
        Ok(input) => input,
        Err(e) => {
            warn!("udp-logging: skipping malformed line: {}", e);
            return;
        }
    };
    let record = match Record::from_json(&input.record) {
        Ok(record) => record,
        Err(e) => {
            warn!(stream = %input.stream, "udp-logging: skipping line: {}", e);
            return;
        }
    };

    if shipper.handle(&record, &StreamId::from(input.stream)) {
        // The native pipeline keeps the record: pass it through
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", line) {
            debug!("udp-logging: pass-through write failed: {}", e);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match ShipperConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("udp-logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut shipper = Shipper::from_config(&config, Box::new(DerivedPathRegistry::new()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!(endpoint = %shipper.transport().endpoint(), "udp-logging: reading records from stdin");

    loop {
        let wakeup = shipper.next_wakeup().map(Instant::from_std);

        // Pending socket notifications go first, as on an event loop
        tokio::select! {
            biased;
            _ = sleep_until(wakeup.unwrap_or_else(Instant::now)), if wakeup.is_some() => {
                shipper.poll(std::time::Instant::now());
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => ingest(&mut shipper, &line),
                Ok(None) => break,
                Err(e) => {
                    error!("udp-logging: failed to read stdin: {}", e);
                    break;
                }
            },
        }
    }

    shipper.shutdown();
    ExitCode::SUCCESS
}
