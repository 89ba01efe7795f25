//! Attribute Module
//!
//! Maps each named switch property to its wire tag and value encoding.
//!
//! ## Responsibilities
//! - Single table of every known attribute (`dictionary`)
//! - Text parsing, validation, encoding and decoding of values (`value`)
//! - Same descriptors used for building sets and reading query replies

mod dictionary;
mod value;

use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::protocol::{MacAddr, Tag};

pub use dictionary::{resolve, standard_attributes, Dictionary, DISCOVERY_ATTRIBUTES};
pub use value::{
    decode_value, encode_value, parse_value, validate_value, ValueContext, BANDWIDTH_LIMITS,
    LINK_SPEEDS, PORT_PRIORITIES, QOS_MODES, VLAN_MODES,
};

/// How an attribute may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
    WriteOnly,
    /// Never queried or assigned directly (the login password)
    Internal,
}

/// Wire encoding of an attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// UTF-8, trailing NULs trimmed on decode
    Text,
    Ipv4,
    Mac,
    U8,
    U16,
    U32,
    /// One byte, 0 or 1
    Flag,
    /// One byte 0x01, triggers an action on set
    Action,
    /// One byte code from a fixed table
    Choice(&'static [(u16, &'static str)]),
    /// port (1) + vlan (2)
    PortVlan,
    /// vlan (2) + port mask
    VlanMembers,
    /// vlan (2) + member mask + tagged mask
    Vlan802,
    /// target port (1) + 0x00 + source mask
    PortMirror,
    /// port (1) + priority code (1)
    PortPriority,
    /// port (1) + 0x0000 + limit code (2)
    PortBandwidth,
    /// port (1) + speed code (1) + flow control (1)
    PortSpeed,
    /// port (1) + six 64-bit counters
    PortStats,
    /// enabled (2) + vlan (2)
    IgmpSnooping,
    /// Raw bytes, shown as hex
    Blob,
}

/// Everything needed to encode and decode one attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub tag: Tag,
    pub name: &'static str,
    pub kind: ValueKind,
    pub access: Access,
    pub requires_auth: bool,

    /// May share a query request with other tags
    pub batchable: bool,
}

impl AttributeDescriptor {
    pub fn is_queryable(&self) -> bool {
        matches!(self.access, Access::ReadOnly | Access::ReadWrite)
    }

    pub fn is_settable(&self) -> bool {
        matches!(self.access, Access::ReadWrite | Access::WriteOnly)
    }
}

/// A decoded, human-meaningful attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Ipv4(Ipv4Addr),
    Mac(MacAddr),
    Number(u32),
    Flag(bool),
    Trigger,
    Choice(String),
    PortVlan {
        port: u8,
        vlan: u16,
    },
    VlanMembers {
        vlan: u16,
        ports: BTreeSet<u8>,
    },
    Vlan802 {
        vlan: u16,
        tagged: BTreeSet<u8>,
        untagged: BTreeSet<u8>,
    },
    /// `target == 0` with no members means mirroring is off
    PortMirror {
        target: u8,
        members: BTreeSet<u8>,
    },
    PortChoice {
        port: u8,
        choice: String,
    },
    PortSpeed {
        port: u8,
        speed: String,
        flow_control: bool,
    },
    PortStats {
        port: u8,
        rx_bytes: u64,
        tx_bytes: u64,
        packets: u64,
        broadcasts: u64,
        multicasts: u64,
        crc_errors: u64,
    },
    /// `None` means snooping is off
    IgmpSnooping(Option<u16>),
    Blob(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Ipv4(ip) => write!(f, "{}", ip),
            Value::Mac(mac) => write!(f, "{}", mac),
            Value::Number(n) => write!(f, "{}", n),
            Value::Flag(on) => write!(f, "{}", if *on { "on" } else { "off" }),
            Value::Trigger => write!(f, "trigger"),
            Value::Choice(c) => write!(f, "{}", c),
            Value::PortVlan { port, vlan } => write!(f, "{}:{}", port, vlan),
            Value::VlanMembers { vlan, ports } => write!(f, "{}:{}", vlan, join_ports(ports)),
            Value::Vlan802 {
                vlan,
                tagged,
                untagged,
            } => write!(f, "{}:{}:{}", vlan, join_ports(tagged), join_ports(untagged)),
            Value::PortMirror { target, members } => {
                if *target == 0 && members.is_empty() {
                    write!(f, "0:0")
                } else {
                    write!(f, "{}:{}", target, join_ports(members))
                }
            }
            Value::PortChoice { port, choice } => write!(f, "{}:{}", port, choice),
            Value::PortSpeed {
                port,
                speed,
                flow_control,
            } => write!(
                f,
                "port {} {} flow-control {}",
                port,
                speed,
                if *flow_control { "on" } else { "off" }
            ),
            Value::PortStats {
                port,
                rx_bytes,
                tx_bytes,
                packets,
                broadcasts,
                multicasts,
                crc_errors,
            } => write!(
                f,
                "port {} rx {} tx {} packets {} broadcast {} multicast {} crc-errors {}",
                port, rx_bytes, tx_bytes, packets, broadcasts, multicasts, crc_errors
            ),
            Value::IgmpSnooping(None) => write!(f, "none"),
            Value::IgmpSnooping(Some(vlan)) => write!(f, "{}", vlan),
            Value::Blob(bytes) => write!(f, "{}", hex(bytes)),
        }
    }
}

fn join_ports(ports: &BTreeSet<u8>) -> String {
    ports
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Lowercase hex, no separators
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
