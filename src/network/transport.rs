//! Datagram transport
//!
//! `Transport` is the seam between the session and the wire. The UDP
//! implementation mirrors how the switches talk: requests go to port
//! 63322, replies come back as broadcasts to port 63321.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use super::interface::Endpoint;
use crate::config::Config;
use crate::error::Result;

/// Where a datagram is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Subnet broadcast
    Broadcast,
    /// A switch whose address is already known
    Unicast(Ipv4Addr),
}

/// A connectionless, broadcast-capable datagram channel
pub trait Transport {
    /// Send one datagram
    fn send(&mut self, datagram: &[u8], destination: Destination) -> Result<()>;

    /// Wait up to `timeout` for one datagram
    ///
    /// Returns the datagram length and sender address, or `None` once the
    /// timeout passes without traffic.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration)
        -> Result<Option<(usize, Option<Ipv4Addr>)>>;
}

/// UDP sockets bound to one interface
pub struct UdpTransport {
    /// Bound to the interface address, selects the outgoing interface
    send_socket: UdpSocket,

    /// Bound to the broadcast address, receives switch replies
    recv_socket: UdpSocket,

    broadcast: Ipv4Addr,
    switch_port: u16,
}

impl UdpTransport {
    /// Bind the send and receive sockets for `endpoint`
    pub fn bind(endpoint: &Endpoint, config: &Config) -> Result<Self> {
        let send_socket = bind_socket(SocketAddrV4::new(endpoint.ip, config.client_port))?;

        let recv_socket =
            match bind_socket(SocketAddrV4::new(Ipv4Addr::BROADCAST, config.client_port)) {
                Ok(socket) => socket,
                Err(e) => {
                    tracing::debug!(
                        "Cannot bind to broadcast address ({}), listening on all addresses",
                        e
                    );
                    bind_socket(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.client_port))?
                }
            };

        tracing::debug!(
            "Bound {}:{} (send) and port {} (receive) on {}",
            endpoint.ip,
            config.client_port,
            config.client_port,
            endpoint.name
        );

        Ok(Self {
            send_socket,
            recv_socket,
            broadcast: endpoint.broadcast,
            switch_port: config.switch_port,
        })
    }
}

fn bind_socket(addr: SocketAddrV4) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.bind(&addr.into())?;
    Ok(socket.into())
}

impl Transport for UdpTransport {
    fn send(&mut self, datagram: &[u8], destination: Destination) -> Result<()> {
        let ip = match destination {
            Destination::Broadcast => self.broadcast,
            Destination::Unicast(ip) => ip,
        };
        self.send_socket
            .send_to(datagram, SocketAddrV4::new(ip, self.switch_port))?;
        Ok(())
    }

    fn recv(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, Option<Ipv4Addr>)>> {
        // A zero read timeout means "block forever" to the OS
        if timeout.is_zero() {
            return Ok(None);
        }
        self.recv_socket.set_read_timeout(Some(timeout))?;

        match self.recv_socket.recv_from(buf) {
            Ok((len, SocketAddr::V4(addr))) => Ok(Some((len, Some(*addr.ip())))),
            Ok((len, SocketAddr::V6(_))) => Ok(Some((len, None))),
            // Unix reports WouldBlock on timeout, Windows TimedOut
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
