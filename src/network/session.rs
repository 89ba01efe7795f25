//! Session
//!
//! Owns the transport for one invocation and runs the request/response
//! state machine:
//!
//! ```text
//! Idle ──send──▶ Sent ──▶ Collecting ──┬──▶ Completed
//!                                      └──▶ TimedOut
//! ```
//!
//! One wall-clock deadline bounds each collection window. Replies are
//! handled in arrival order; datagrams that fail to parse are logged and
//! dropped without ending the window.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::time::Instant;

use rand::Rng;

use super::interface::Endpoint;
use super::transport::{Destination, Transport, UdpTransport};
use crate::attribute::{Dictionary, ValueContext};
use crate::config::Config;
use crate::error::{NsdpError, Result};
use crate::protocol::{parse_response, MacAddr, Operation, Packet, RequestKind, TlvRecord};

/// Where the session is in its current exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sent,
    Collecting,
    Completed,
    TimedOut,
}

/// How many matching replies end a collection window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Stop at the first match
    One,
    /// Wait out the whole window
    All,
}

/// A client session bound to one interface
pub struct Session<T: Transport = UdpTransport> {
    transport: T,
    config: Config,
    dictionary: Dictionary,

    /// MAC written into the client field of every request
    local_mac: MacAddr,

    sequence: u16,
    state: SessionState,

    /// Sender addresses learned from replies
    known_hosts: HashMap<MacAddr, Ipv4Addr>,

    recv_buf: Vec<u8>,
}

impl Session<UdpTransport> {
    /// Resolve the configured interface and bind its sockets
    pub fn open(config: Config) -> Result<Self> {
        let endpoint = Endpoint::resolve(&config.interface)?;
        let transport = UdpTransport::bind(&endpoint, &config)?;
        Ok(Self::with_transport(transport, endpoint.mac, config))
    }
}

impl<T: Transport> Session<T> {
    /// Create a session over an already bound transport
    pub fn with_transport(transport: T, local_mac: MacAddr, config: Config) -> Self {
        let sequence = rand::thread_rng().gen_range(100..2000);
        let recv_buf = vec![0u8; config.recv_buffer_size.max(crate::protocol::HEADER_SIZE)];

        Self {
            transport,
            config,
            dictionary: Dictionary::standard(),
            local_mac,
            sequence,
            state: SessionState::Idle,
            known_hosts: HashMap::new(),
            recv_buf,
        }
    }

    /// Replace the attribute table (for tag overrides)
    pub fn with_dictionary(mut self, dictionary: Dictionary) -> Self {
        self.dictionary = dictionary;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn local_mac(&self) -> MacAddr {
        self.local_mac
    }

    /// Port range used for validating values
    pub fn value_context(&self) -> ValueContext {
        ValueContext::from(&self.config)
    }

    /// Address a switch last replied from
    pub fn known_ip(&self, mac: &MacAddr) -> Option<Ipv4Addr> {
        self.known_hosts.get(mac).copied()
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Build a request stamped with a fresh sequence number
    pub fn request(
        &mut self,
        kind: RequestKind,
        target: MacAddr,
        records: Vec<TlvRecord>,
    ) -> Packet {
        let target = match kind {
            RequestKind::Discovery => self.config.discovery_mac,
            RequestKind::Query | RequestKind::Set => target,
        };
        self.sequence = self.sequence.wrapping_add(1);
        Packet::request(kind, self.local_mac, target, self.sequence, records)
    }

    /// Send a packet, unicast when the target's address is known
    pub fn send(&mut self, packet: &Packet) -> Result<()> {
        let destination = match self.known_hosts.get(&packet.destination_mac) {
            Some(ip) if packet.destination_mac != self.config.discovery_mac => {
                Destination::Unicast(*ip)
            }
            _ => Destination::Broadcast,
        };
        self.send_to(packet, destination)
    }

    fn send_to(&mut self, packet: &Packet, destination: Destination) -> Result<()> {
        let bytes = packet.encode()?;
        tracing::trace!("TX {} bytes: {}", bytes.len(), crate::attribute::hex(&bytes));

        self.transport.send(&bytes, destination)?;
        self.state = SessionState::Sent;

        tracing::debug!(
            "Sent {:?} seq={} to {} ({} records) via {:?}",
            packet.operation,
            packet.sequence,
            packet.destination_mac,
            packet.records.len(),
            destination
        );
        Ok(())
    }

    // =========================================================================
    // Collection
    // =========================================================================

    /// Receive replies until the timeout passes (or the first match, for
    /// `Expect::One`)
    pub fn collect<F>(&mut self, mut matcher: F, expect: Expect) -> Result<Vec<Packet>>
    where
        F: FnMut(&Packet) -> bool,
    {
        let deadline = Instant::now() + self.config.timeout;
        let mut packets = Vec::new();
        self.state = SessionState::Collecting;

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let Some((len, source)) = self.transport.recv(&mut self.recv_buf, deadline - now)?
            else {
                break;
            };

            if len == self.recv_buf.len() {
                tracing::warn!(
                    "Datagram from {:?} filled the {}-byte receive buffer and may be truncated",
                    source,
                    len
                );
            }

            let datagram = &self.recv_buf[..len];
            tracing::trace!("RX {} bytes from {:?}: {}", len, source, crate::attribute::hex(datagram));

            let packet = match parse_response(datagram) {
                Ok(packet) => packet,
                Err(e) if e.is_discardable() => {
                    tracing::warn!("Discarding datagram from {:?}: {}", source, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if !matcher(&packet) {
                tracing::debug!(
                    "Ignoring reply seq={} from {}",
                    packet.sequence,
                    packet.switch_mac()
                );
                continue;
            }

            if let Some(ip) = source {
                self.known_hosts.insert(packet.switch_mac(), ip);
            }
            packets.push(packet);

            if expect == Expect::One {
                break;
            }
        }

        self.state = if packets.is_empty() {
            SessionState::TimedOut
        } else {
            SessionState::Completed
        };
        Ok(packets)
    }

    /// Send a request to one switch and wait for its reply, resending on
    /// timeout up to `attempts` times in total
    pub fn exchange(&mut self, packet: &Packet, attempts: u32) -> Result<Packet> {
        let target = packet.destination_mac;
        let sequence = packet.sequence;
        let expected = packet.operation.response();
        let attempts = attempts.max(1);

        for attempt in 1..=attempts {
            self.send(packet)?;

            let reply = self
                .collect(
                    |p| p.sequence == sequence && p.operation == expected && p.switch_mac() == target,
                    Expect::One,
                )?
                .pop();

            if let Some(reply) = reply {
                return Ok(reply);
            }

            tracing::debug!("No reply from {} (attempt {}/{})", target, attempt, attempts);
        }

        Err(NsdpError::NoResponse {
            mac: target,
            attempts,
        })
    }

    /// Broadcast a request once and gather one reply per switch
    pub fn broadcast(&mut self, packet: &Packet) -> Result<Vec<Packet>> {
        let sequence = packet.sequence;
        let mut seen = HashSet::new();

        self.send_to(packet, Destination::Broadcast)?;
        self.collect(
            |p| {
                p.sequence == sequence
                    && p.operation == Operation::QueryResponse
                    && seen.insert(p.switch_mac())
            },
            Expect::All,
        )
    }

    /// Release the transport
    pub fn close(self) {
        tracing::debug!("Closing session ({} known switches)", self.known_hosts.len());
    }
}
