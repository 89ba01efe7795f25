//! Packet model
//!
//! The 32-byte NSDP header wrapped around an ordered list of TLV records.
//!
//! ## Header Format
//! ```text
//! ┌─────────┬────────┬────────┬──────┬──────────┬──────┬────────────┬────────────┐
//! │ Ver (1) │ Op (1) │ Res (1)│ (1)  │ FailTag(2)│ (2)  │ Client (6) │ Switch (6) │
//! ├─────────┴────────┴────────┴──────┴──────────┴──────┴────────────┴────────────┤
//! │ (2) │ Seq (2) │ "NSDP" (4) │ (4)                                             │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//! All multi-byte fields are big-endian.

use bytes::{BufMut, BytesMut};

use super::mac::MacAddr;
use super::tlv::{self, Tag, TlvRecord};
use crate::error::{NsdpError, Result};

/// Header size in bytes
pub const HEADER_SIZE: usize = 32;

/// Protocol version written into every request
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Signature at offset 24
pub const SIGNATURE: &[u8; 4] = b"NSDP";

// Result codes seen in set responses
pub const RESULT_SUCCESS: u8 = 0x00;
pub const RESULT_VALUE_OUT_OF_RANGE: u8 = 0x05;
pub const RESULT_PORT_OUT_OF_RANGE: u8 = 0x06;
pub const RESULT_BAD_PASSWORD: u8 = 0x07;

/// Operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Operation {
    QueryRequest = 0x01,
    QueryResponse = 0x02,
    SetRequest = 0x03,
    SetResponse = 0x04,
}

impl Operation {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Operation::QueryRequest),
            0x02 => Some(Operation::QueryResponse),
            0x03 => Some(Operation::SetRequest),
            0x04 => Some(Operation::SetResponse),
            _ => None,
        }
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Operation::QueryResponse | Operation::SetResponse)
    }

    /// Response code matching this request code
    pub fn response(&self) -> Operation {
        match self {
            Operation::QueryRequest | Operation::QueryResponse => Operation::QueryResponse,
            Operation::SetRequest | Operation::SetResponse => Operation::SetResponse,
        }
    }
}

/// Request flavour, used when building a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Broadcast query to every switch
    Discovery,
    /// Query one switch
    Query,
    /// Write to one switch
    Set,
}

/// A full NSDP datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub operation: Operation,

    /// Result byte; non-zero in a rejected set response
    pub result: u8,

    /// Tag the switch blamed for a rejection
    pub failed_tag: Tag,

    /// Client (host) MAC
    pub source_mac: MacAddr,

    /// Switch MAC (discovery MAC in a discovery request)
    pub destination_mac: MacAddr,

    pub sequence: u16,

    pub records: Vec<TlvRecord>,
}

impl Packet {
    /// Build a request packet
    ///
    /// `target` is the switch MAC for queries and sets; discovery writes
    /// `discovery_mac` instead.
    pub fn request(
        kind: RequestKind,
        source_mac: MacAddr,
        target: MacAddr,
        sequence: u16,
        records: Vec<TlvRecord>,
    ) -> Self {
        let operation = match kind {
            RequestKind::Discovery | RequestKind::Query => Operation::QueryRequest,
            RequestKind::Set => Operation::SetRequest,
        };

        Self {
            operation,
            result: RESULT_SUCCESS,
            failed_tag: Tag(0),
            source_mac,
            destination_mac: target,
            sequence,
            records,
        }
    }

    /// The switch MAC this packet is about: the destination field
    pub fn switch_mac(&self) -> MacAddr {
        self.destination_mac
    }

    /// First record carrying `tag`
    pub fn record(&self, tag: Tag) -> Option<&TlvRecord> {
        self.records.iter().find(|r| r.tag == tag)
    }

    /// All records carrying `tag`, in wire order
    pub fn records_for(&self, tag: Tag) -> impl Iterator<Item = &TlvRecord> {
        self.records.iter().filter(move |r| r.tag == tag)
    }

    pub fn is_rejection(&self) -> bool {
        self.result != RESULT_SUCCESS
    }

    // =========================================================================
    // Encoding / Decoding
    // =========================================================================

    /// Serialize header and body
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + 64);

        buf.put_u8(PROTOCOL_VERSION);
        buf.put_u8(self.operation as u8);
        buf.put_u8(self.result);
        buf.put_u8(0);
        buf.put_u16(self.failed_tag.0);
        buf.put_u16(0);
        buf.put_slice(&self.source_mac.octets());
        buf.put_slice(&self.destination_mac.octets());
        buf.put_u16(0);
        buf.put_u16(self.sequence);
        buf.put_slice(SIGNATURE);
        buf.put_u32(0);

        tlv::encode_into(&self.records, &mut buf)?;
        Ok(buf.to_vec())
    }

    /// Parse any NSDP datagram, request or response
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(NsdpError::malformed(format!(
                "incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        if &bytes[24..28] != SIGNATURE {
            return Err(NsdpError::malformed(format!(
                "bad signature {:02x?}",
                &bytes[24..28]
            )));
        }

        let operation =
            Operation::from_code(bytes[1]).ok_or(NsdpError::UnexpectedOperation(bytes[1]))?;

        // Both slices are exactly six bytes long
        let source_mac = MacAddr::from_slice(&bytes[8..14]).unwrap_or_default();
        let destination_mac = MacAddr::from_slice(&bytes[14..20]).unwrap_or_default();

        Ok(Self {
            operation,
            result: bytes[2],
            failed_tag: Tag(u16::from_be_bytes([bytes[4], bytes[5]])),
            source_mac,
            destination_mac,
            sequence: u16::from_be_bytes([bytes[22], bytes[23]]),
            records: tlv::decode(&bytes[HEADER_SIZE..])?,
        })
    }
}

/// Parse a datagram that must be a switch response
pub fn parse_response(bytes: &[u8]) -> Result<Packet> {
    let packet = Packet::decode(bytes)?;
    if !packet.operation.is_response() {
        return Err(NsdpError::UnexpectedOperation(packet.operation as u8));
    }
    Ok(packet)
}
