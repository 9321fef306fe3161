//! Outbound UDP transport

pub mod socket;
pub mod throttle;
pub mod udp;

pub use socket::{Connector, DatagramSocket, UdpConnector};
pub use throttle::{ErrorThrottle, ThrottleDecision};
pub use udp::{TransportState, TransportStats, UdpTransport};
