//! Datagram socket seam
//!
//! `Connector` creates sockets for an endpoint and `DatagramSocket` is the
//! minimal surface the transport needs from one. `UdpConnector` is the real
//! implementation over `std::net::UdpSocket`.

use crate::core::{AddressFamily, Endpoint};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

/// A connected datagram socket
pub trait DatagramSocket {
    /// Hand one datagram to the OS without blocking
    fn send(&self, payload: &[u8]) -> io::Result<usize>;

    /// Take a pending asynchronous error, e.g. an ICMP port unreachable
    /// reported after an earlier send
    fn take_error(&self) -> io::Result<Option<io::Error>>;
}

/// Creates connected sockets
pub trait Connector {
    fn connect(&self, endpoint: &Endpoint) -> io::Result<Box<dyn DatagramSocket>>;
}

impl DatagramSocket for UdpSocket {
    fn send(&self, payload: &[u8]) -> io::Result<usize> {
        UdpSocket::send(self, payload)
    }

    fn take_error(&self) -> io::Result<Option<io::Error>> {
        UdpSocket::take_error(self)
    }
}

/// Connector for real UDP sockets
///
/// The socket is bound to the unspecified address of the endpoint's family,
/// connected to the first resolved address of that family, and switched to
/// non-blocking mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpConnector;

impl UdpConnector {
    pub fn new() -> Self {
        Self
    }

    fn resolve(endpoint: &Endpoint) -> io::Result<SocketAddr> {
        let wanted_v4 = endpoint.family == AddressFamily::Udp4;
        (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()?
            .find(|addr| addr.is_ipv4() == wanted_v4)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("no {} address for {}", endpoint.family, endpoint.host),
                )
            })
    }
}

impl Connector for UdpConnector {
    fn connect(&self, endpoint: &Endpoint) -> io::Result<Box<dyn DatagramSocket>> {
        let target = Self::resolve(endpoint)?;
        let local: SocketAddr = match endpoint.family {
            AddressFamily::Udp4 => (Ipv4Addr::UNSPECIFIED, 0).into(),
            AddressFamily::Udp6 => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(local)?;
        socket.connect(target)?;
        socket.set_nonblocking(true)?;
        Ok(Box::new(socket))
    }
}
