//! Protocol Module
//!
//! Wire format of the Netgear Switch Discovery Protocol (NSDP).
//!
//! ## Datagram Format
//! ```text
//! ┌──────────────┬───────────────────────────────┬──────────────┐
//! │ Header (32)  │  Records: Tag(2) Len(2) Value │ FF FF 00 00  │
//! └──────────────┴───────────────────────────────┴──────────────┘
//! ```
//!
//! ### Operations
//! - 0x01: QUERY request    - records carry tags with empty values
//! - 0x02: QUERY response   - records carry values
//! - 0x03: SET request      - password record first, then assignments
//! - 0x04: SET response     - result byte + failing tag on rejection

mod mac;
mod packet;
pub mod tlv;

pub use mac::MacAddr;
pub use packet::{
    parse_response, Operation, Packet, RequestKind, HEADER_SIZE, RESULT_BAD_PASSWORD,
    RESULT_PORT_OUT_OF_RANGE, RESULT_SUCCESS, RESULT_VALUE_OUT_OF_RANGE,
};
pub use tlv::{Tag, TlvRecord, END_TAG};
