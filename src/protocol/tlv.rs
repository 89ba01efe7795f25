//! TLV codec
//!
//! Pure binary framing of the packet body. Knows nothing about what a tag
//! means; unknown tags decode like any other record.
//!
//! ## Record Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Tag (2)  │ Len (2)  │        Value (Len)          │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//! The body ends with the terminator record `FF FF 00 00`.

use std::fmt;

use bytes::{BufMut, BytesMut};
use serde::Serialize;

use crate::error::{NsdpError, Result};

/// Record header size: 2 bytes tag + 2 bytes length
pub const RECORD_HEADER_SIZE: usize = 4;

/// Tag marking the end of a packet body
pub const END_TAG: Tag = Tag(0xffff);

/// Wire identifier of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Tag(pub u16);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// A single tag-length-value record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlvRecord {
    pub tag: Tag,
    pub value: Vec<u8>,
}

impl TlvRecord {
    pub fn new(tag: Tag, value: Vec<u8>) -> Self {
        Self { tag, value }
    }

    /// A zero-length record, as used in query requests
    pub fn empty(tag: Tag) -> Self {
        Self { tag, value: Vec::new() }
    }

    /// Length field as written on the wire
    pub fn len(&self) -> u16 {
        self.value.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Append records followed by the terminator to `buf`
pub fn encode_into(records: &[TlvRecord], buf: &mut BytesMut) -> Result<()> {
    for record in records {
        if record.tag == END_TAG {
            return Err(NsdpError::malformed("terminator tag inside record list"));
        }
        if record.value.len() > u16::MAX as usize {
            return Err(NsdpError::malformed(format!(
                "record {} value too large: {} bytes",
                record.tag,
                record.value.len()
            )));
        }
        buf.put_u16(record.tag.0);
        buf.put_u16(record.len());
        buf.put_slice(&record.value);
    }

    buf.put_u16(END_TAG.0);
    buf.put_u16(0);
    Ok(())
}

/// Encode records followed by the terminator
pub fn encode(records: &[TlvRecord]) -> Result<Vec<u8>> {
    let size: usize = records
        .iter()
        .map(|r| RECORD_HEADER_SIZE + r.value.len())
        .sum::<usize>()
        + RECORD_HEADER_SIZE;
    let mut buf = BytesMut::with_capacity(size);
    encode_into(records, &mut buf)?;
    Ok(buf.to_vec())
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a packet body into its records, in wire order
///
/// Stops at the terminator; bytes after it are ignored. A body that ends
/// exactly on a record boundary without a terminator is accepted.
pub fn decode(bytes: &[u8]) -> Result<Vec<TlvRecord>> {
    let mut records = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let remaining = bytes.len() - pos;
        if remaining < RECORD_HEADER_SIZE {
            return Err(NsdpError::malformed(format!(
                "truncated record header at offset {}: {} byte(s) left",
                pos, remaining
            )));
        }

        let tag = Tag(u16::from_be_bytes([bytes[pos], bytes[pos + 1]]));
        let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        pos += RECORD_HEADER_SIZE;

        if tag == END_TAG {
            return Ok(records);
        }

        if len > bytes.len() - pos {
            return Err(NsdpError::malformed(format!(
                "record {} declares {} bytes but only {} remain",
                tag,
                len,
                bytes.len() - pos
            )));
        }

        records.push(TlvRecord::new(tag, bytes[pos..pos + len].to_vec()));
        pos += len;
    }

    Ok(records)
}
