//! UDP transport with reconnect backoff
//!
//! The transport owns at most one socket. Any socket error abandons it and
//! starts a fixed backoff; when the backoff has elapsed a fresh socket is
//! created. While no socket is ready, sends fail immediately and the message
//! is dropped, so a dead collector never makes the producer queue or block.
//!
//! State changes are driven by the caller: `send` reports synchronous
//! errors, and `poll` delivers socket notifications and fires a due
//! reconnect timer. A new socket only becomes ready when a later `poll`
//! delivers its connect notification; records sent before that are dropped.
//! Nothing here spawns threads or timers.

use super::socket::{Connector, DatagramSocket};
use super::throttle::{ErrorThrottle, ThrottleDecision};
use crate::core::{Endpoint, ShipperError};
use std::fmt;
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Connection state of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// A socket exists but its connect notification has not been delivered
    Connecting,
    /// A connected socket accepts datagrams
    Ready,
    /// No socket; waiting for the reconnect timer
    Backoff,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Connecting => write!(f, "connecting"),
            TransportState::Ready => write!(f, "ready"),
            TransportState::Backoff => write!(f, "backoff"),
        }
    }
}

/// A scheduled reconnect attempt
///
/// The epoch ties the timer to the backoff period that scheduled it; a timer
/// whose epoch is no longer current, or that fires after shutdown, does
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReconnectTimer {
    deadline: Instant,
    epoch: u64,
}

/// Transport counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Socket errors observed, logged or not
    pub errors: u64,
    /// Errors counted but not logged
    pub suppressed: u64,
    /// Connect attempts after the initial one
    pub reconnects: u64,
}

pub struct UdpTransport {
    connector: Box<dyn Connector>,
    endpoint: Endpoint,
    socket: Option<Box<dyn DatagramSocket>>,
    state: TransportState,
    connecting_since: Option<Instant>,
    backoff: Duration,
    timer: Option<ReconnectTimer>,
    epoch: u64,
    throttle: ErrorThrottle,
    errors: u64,
    reconnects: u64,
    shutdown: bool,
}

impl UdpTransport {
    /// Create a transport and make the first connect attempt
    ///
    /// A failed first attempt is not an error: the transport starts in
    /// backoff and retries like after any other socket error. A successful
    /// one leaves the transport `Connecting` until the next `poll`.
    pub fn new(
        connector: Box<dyn Connector>,
        endpoint: Endpoint,
        backoff: Duration,
        error_interval: Duration,
        now: Instant,
    ) -> Self {
        let mut transport = Self {
            connector,
            endpoint,
            socket: None,
            state: TransportState::Connecting,
            connecting_since: None,
            backoff,
            timer: None,
            epoch: 0,
            throttle: ErrorThrottle::new(error_interval),
            errors: 0,
            reconnects: 0,
            shutdown: false,
        };
        transport.connect(now);
        transport
    }

    fn connect(&mut self, now: Instant) {
        self.state = TransportState::Connecting;
        info!(endpoint = %self.endpoint, family = %self.endpoint.family, "udp-logging: connecting");

        match self.connector.connect(&self.endpoint) {
            Ok(socket) => {
                self.socket = Some(socket);
                self.connecting_since = Some(now);
            }
            Err(e) => {
                let error = self.io_error("connecting to", e);
                self.on_error(&error, now);
            }
        }
    }

    fn io_error(&self, operation: &str, source: io::Error) -> ShipperError {
        ShipperError::io_operation(operation, self.endpoint.to_string(), source)
    }

    /// Pending asynchronous error of the current socket
    fn pending_error(&self) -> Option<io::Error> {
        match self.socket.as_ref().map(|socket| socket.take_error()) {
            Some(Ok(Some(e))) | Some(Err(e)) => Some(e),
            _ => None,
        }
    }

    /// Record a socket error and move to backoff
    ///
    /// Entering backoff drops the socket and schedules exactly one reconnect
    /// timer. Calling this while already in backoff only counts the error.
    pub fn on_error(&mut self, error: &ShipperError, now: Instant) {
        self.errors += 1;
        match self.throttle.check(now) {
            ThrottleDecision::Report { suppressed: 0 } => {
                warn!(kind = ?error.io_kind(), "udp-logging: client error: {}", error);
            }
            ThrottleDecision::Report { suppressed } => {
                warn!(
                    kind = ?error.io_kind(),
                    suppressed,
                    "udp-logging: client error: {} ({} similar errors suppressed)",
                    error,
                    suppressed
                );
            }
            ThrottleDecision::Suppress => {}
        }

        if self.state == TransportState::Backoff {
            return;
        }

        self.socket = None;
        self.connecting_since = None;
        self.state = TransportState::Backoff;
        if !self.shutdown {
            self.epoch += 1;
            self.timer = Some(ReconnectTimer {
                deadline: now + self.backoff,
                epoch: self.epoch,
            });
        }
    }

    /// Deliver socket notifications and fire a due reconnect timer
    ///
    /// A connecting socket becomes ready here unless it already has an
    /// error pending. A socket created by a timer firing in this call waits
    /// for the next `poll`.
    pub fn poll(&mut self, now: Instant) {
        match self.state {
            TransportState::Connecting if !self.shutdown => match self.pending_error() {
                Some(e) => {
                    let error = self.io_error("connecting to", e);
                    self.on_error(&error, now);
                }
                None if self.socket.is_some() => {
                    self.state = TransportState::Ready;
                    self.connecting_since = None;
                    info!(endpoint = %self.endpoint, "udp-logging: ready");
                }
                None => {}
            },
            TransportState::Ready => {
                if let Some(e) = self.pending_error() {
                    let error = self.io_error("sending to", e);
                    self.on_error(&error, now);
                }
            }
            _ => {}
        }

        let due = match self.timer {
            Some(timer) if now >= timer.deadline => timer,
            _ => return,
        };
        self.timer = None;

        if self.shutdown || due.epoch != self.epoch || self.state != TransportState::Backoff {
            debug!(epoch = due.epoch, "udp-logging: stale reconnect timer ignored");
            return;
        }

        self.reconnects += 1;
        self.connect(now);
    }

    /// Send one datagram, best effort
    ///
    /// Returns `false` without any I/O unless the transport is ready. A
    /// `true` result means the datagram was handed to the OS, not that it
    /// arrived; a failure reported later does not change it.
    pub fn send(&mut self, payload: &[u8], now: Instant) -> bool {
        if !self.is_ready() {
            return false;
        }
        let result = match self.socket.as_ref() {
            Some(socket) => socket.send(payload),
            None => return false,
        };

        match result {
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                debug!("udp-logging: socket buffer full, dropping datagram");
                false
            }
            Err(e) => {
                let error = self.io_error("sending to", e);
                self.on_error(&error, now);
                false
            }
        }
    }

    /// Stop reconnecting
    ///
    /// A pending timer is left in place and ignored when it fires.
    pub fn shutdown(&mut self) {
        if !self.shutdown {
            self.shutdown = true;
            debug!(state = %self.state, "udp-logging: transport shut down");
        }
    }

    /// When `poll` next needs to run, if anything is pending
    ///
    /// A connect notification is due as soon as the socket exists; a
    /// reconnect is due when the backoff ends.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.shutdown {
            return None;
        }
        match (self.state, self.timer) {
            (TransportState::Connecting, _) => self.connecting_since,
            (_, Some(timer)) => Some(timer.deadline),
            _ => None,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == TransportState::Ready && !self.shutdown
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            errors: self.errors,
            suppressed: self.throttle.suppressed_total(),
            reconnects: self.reconnects,
        }
    }
}

impl fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdpTransport")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("timer", &self.timer)
            .field("shutdown", &self.shutdown)
            .field("stats", &self.stats())
            .finish()
    }
}
