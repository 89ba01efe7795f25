//! Scripted in-memory switch
//!
//! Implements `Transport` without sockets. Every datagram the session sends
//! is recorded and handed to a responder closure; the datagrams it returns
//! are queued as replies, received in order.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::time::Duration;

use prosafe::network::{Destination, Session, Transport};
use prosafe::protocol::{MacAddr, Packet, Tag, TlvRecord};
use prosafe::{Config, Result};

pub const HOST_MAC: MacAddr = MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
pub const SWITCH_MAC: MacAddr = MacAddr::new([0x08, 0xbd, 0x43, 0x01, 0x02, 0x03]);
pub const OTHER_MAC: MacAddr = MacAddr::new([0x08, 0xbd, 0x43, 0x0a, 0x0b, 0x0c]);
pub const SWITCH_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 239);

type Responder = Box<dyn FnMut(&Packet) -> Vec<Vec<u8>>>;

/// What the stub saw, shared with the test after the session takes the
/// transport
#[derive(Default)]
pub struct StubState {
    pub sent: Vec<(Vec<u8>, Destination)>,
    pub closed: bool,
    inbox: VecDeque<Vec<u8>>,
}

impl StubState {
    /// Every request the session sent, decoded
    pub fn requests(&self) -> Vec<Packet> {
        self.sent
            .iter()
            .map(|(bytes, _)| Packet::decode(bytes).unwrap())
            .collect()
    }

    pub fn destinations(&self) -> Vec<Destination> {
        self.sent.iter().map(|(_, d)| *d).collect()
    }
}

pub struct StubTransport {
    state: Rc<RefCell<StubState>>,
    responder: Responder,
}

impl StubTransport {
    pub fn new<F>(responder: F) -> (Self, Rc<RefCell<StubState>>)
    where
        F: FnMut(&Packet) -> Vec<Vec<u8>> + 'static,
    {
        let state = Rc::new(RefCell::new(StubState::default()));
        let transport = Self {
            state: Rc::clone(&state),
            responder: Box::new(responder),
        };
        (transport, state)
    }

    /// A switch that never answers
    pub fn silent() -> (Self, Rc<RefCell<StubState>>) {
        Self::new(|_| Vec::new())
    }
}

impl Transport for StubTransport {
    fn send(&mut self, datagram: &[u8], destination: Destination) -> Result<()> {
        let request = Packet::decode(datagram)?;
        let replies = (self.responder)(&request);

        let mut state = self.state.borrow_mut();
        state.sent.push((datagram.to_vec(), destination));
        state.inbox.extend(replies);
        Ok(())
    }

    fn recv(
        &mut self,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<Option<(usize, Option<Ipv4Addr>)>> {
        match self.state.borrow_mut().inbox.pop_front() {
            Some(bytes) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok(Some((len, Some(SWITCH_IP))))
            }
            None => Ok(None),
        }
    }
}

impl Drop for StubTransport {
    fn drop(&mut self) {
        self.state.borrow_mut().closed = true;
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub fn test_config() -> Config {
    Config::builder()
        .interface("stub0")
        .timeout(Duration::from_millis(100))
        .max_attempts(3)
        .build()
}

pub fn stub_session(transport: StubTransport) -> Session<StubTransport> {
    Session::with_transport(transport, HOST_MAC, test_config())
}

pub fn stub_session_with(transport: StubTransport, config: Config) -> Session<StubTransport> {
    Session::with_transport(transport, HOST_MAC, config)
}

/// Successful reply from `switch` to `request`
pub fn reply_from(switch: MacAddr, request: &Packet, records: Vec<TlvRecord>) -> Vec<u8> {
    Packet {
        operation: request.operation.response(),
        result: 0,
        failed_tag: Tag(0),
        source_mac: request.source_mac,
        destination_mac: switch,
        sequence: request.sequence,
        records,
    }
    .encode()
    .unwrap()
}

/// Successful reply from the default switch
pub fn reply(request: &Packet, records: Vec<TlvRecord>) -> Vec<u8> {
    reply_from(SWITCH_MAC, request, records)
}

/// Rejection with a result code and failing tag
pub fn rejection(request: &Packet, result: u8, failed_tag: u16) -> Vec<u8> {
    Packet {
        operation: request.operation.response(),
        result,
        failed_tag: Tag(failed_tag),
        source_mac: request.source_mac,
        destination_mac: request.destination_mac,
        sequence: request.sequence,
        records: Vec::new(),
    }
    .encode()
    .unwrap()
}

pub fn record(tag: u16, value: &[u8]) -> TlvRecord {
    TlvRecord::new(Tag(tag), value.to_vec())
}

/// Tags requested by a packet, in order
pub fn requested_tags(packet: &Packet) -> Vec<u16> {
    packet.records.iter().map(|r| r.tag.0).collect()
}
