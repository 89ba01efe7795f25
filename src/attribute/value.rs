//! Value codec
//!
//! Text syntax accepted on the command line, range validation, and the
//! byte layouts of every value kind.
//!
//! ## Text Syntax
//! - port-vlan:      `PORT:VLAN`                  e.g. `4:1`
//! - vlan members:   `VLAN:PORTS`                 e.g. `10:1,2,3`
//! - 802.1Q vlan:    `VLAN:TAGGED:UNTAGGED`       e.g. `20:1,7:2,3` or `20:7:`
//! - port mirror:    `TARGET:SOURCES`             e.g. `1:2,3,4`, `0:0` disables
//! - port priority:  `PORT:HIGH|MIDDLE|NORMAL|LOW`
//! - port bandwidth: `PORT:NONE|512K|1M|...|512M`
//! - igmp snooping:  `none` or `VLAN`
//!
//! Port masks put port 1 in the most significant bit of the first byte.

use std::collections::BTreeSet;

use bytes::{Buf, BufMut, BytesMut};

use super::{AttributeDescriptor, Value, ValueKind};
use crate::config::Config;
use crate::error::{NsdpError, Result};

/// Highest VLAN id a switch accepts
pub const MAX_VLAN_ID: u16 = 4094;

pub const VLAN_MODES: &[(u16, &str)] = &[
    (0x00, "none"),
    (0x01, "port"),
    (0x02, "id"),
    (0x03, "802.1q_id"),
    (0x04, "802.1q_extended"),
];

pub const QOS_MODES: &[(u16, &str)] = &[(0x01, "port_based"), (0x02, "802.1p")];

pub const PORT_PRIORITIES: &[(u16, &str)] =
    &[(0x01, "HIGH"), (0x02, "MIDDLE"), (0x03, "NORMAL"), (0x04, "LOW")];

pub const BANDWIDTH_LIMITS: &[(u16, &str)] = &[
    (0x0000, "NONE"),
    (0x0001, "512K"),
    (0x0002, "1M"),
    (0x0003, "2M"),
    (0x0004, "4M"),
    (0x0005, "8M"),
    (0x0006, "16M"),
    (0x0007, "32M"),
    (0x0008, "64M"),
    (0x0009, "128M"),
    (0x000a, "256M"),
    (0x000b, "512M"),
];

pub const LINK_SPEEDS: &[(u16, &str)] = &[
    (0x00, "down"),
    (0x01, "10M-half"),
    (0x02, "10M-full"),
    (0x03, "100M-half"),
    (0x04, "100M-full"),
    (0x05, "1000M"),
];

/// Switch facts that bound valid values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueContext {
    pub port_count: u8,
}

impl ValueContext {
    pub fn new(port_count: u8) -> Self {
        Self { port_count }
    }

    fn mask_len(&self) -> usize {
        (self.port_count as usize).div_ceil(8).max(1)
    }
}

impl Default for ValueContext {
    fn default() -> Self {
        Self::new(8)
    }
}

impl From<&Config> for ValueContext {
    fn from(config: &Config) -> Self {
        Self::new(config.port_count)
    }
}

// =============================================================================
// Text Parsing
// =============================================================================

/// Parse command-line text into a validated value
pub fn parse_value(
    descriptor: &AttributeDescriptor,
    text: &str,
    ctx: &ValueContext,
) -> Result<Value> {
    let trimmed = text.trim();

    let value = match descriptor.kind {
        ValueKind::Text => Value::Text(text.to_string()),
        ValueKind::Ipv4 => Value::Ipv4(trimmed.parse().map_err(|_| {
            invalid(descriptor, format!("'{}' is not an IPv4 address", trimmed))
        })?),
        ValueKind::Mac => Value::Mac(
            trimmed
                .parse()
                .map_err(|_| invalid(descriptor, format!("'{}' is not a MAC address", trimmed)))?,
        ),
        ValueKind::U8 | ValueKind::U16 | ValueKind::U32 => {
            Value::Number(trimmed.parse().map_err(|_| {
                invalid(descriptor, format!("'{}' is not a number", trimmed))
            })?)
        }
        ValueKind::Flag => Value::Flag(parse_switch(descriptor, trimmed)?),
        ValueKind::Action => {
            if !parse_switch(descriptor, trimmed)? {
                return Err(invalid(descriptor, "an action can only be triggered"));
            }
            Value::Trigger
        }
        ValueKind::Choice(table) => Value::Choice(lookup_code(descriptor, table, trimmed)?.1.to_string()),
        ValueKind::PortVlan => {
            let (port, vlan) = split_pair(descriptor, trimmed)?;
            Value::PortVlan {
                port: parse_port(descriptor, port)?,
                vlan: parse_vlan(descriptor, vlan)?,
            }
        }
        ValueKind::VlanMembers => {
            let (vlan, ports) = split_pair(descriptor, trimmed)?;
            Value::VlanMembers {
                vlan: parse_vlan(descriptor, vlan)?,
                ports: parse_port_list(descriptor, ports)?,
            }
        }
        ValueKind::Vlan802 => {
            let mut parts = trimmed.splitn(3, ':');
            let vlan = parts.next().unwrap_or_default();
            let tagged = parts.next().unwrap_or_default();
            let untagged = parts.next().unwrap_or_default();
            Value::Vlan802 {
                vlan: parse_vlan(descriptor, vlan)?,
                tagged: parse_port_list(descriptor, tagged)?,
                untagged: parse_port_list(descriptor, untagged)?,
            }
        }
        ValueKind::PortMirror => {
            if is_off(trimmed) {
                Value::PortMirror {
                    target: 0,
                    members: BTreeSet::new(),
                }
            } else {
                let (target, members) = split_pair(descriptor, trimmed)?;
                let target = parse_port(descriptor, target)?;
                let mut members = parse_port_list(descriptor, members)?;
                if target == 0 {
                    members.remove(&0);
                }
                Value::PortMirror { target, members }
            }
        }
        ValueKind::PortPriority | ValueKind::PortBandwidth => {
            let table = port_choice_table(descriptor.kind);
            let (port, choice) = split_pair(descriptor, trimmed)?;
            Value::PortChoice {
                port: parse_port(descriptor, port)?,
                choice: lookup_code(descriptor, table, choice)?.1.to_string(),
            }
        }
        ValueKind::PortSpeed | ValueKind::PortStats => {
            return Err(invalid(descriptor, "read-only attribute"));
        }
        ValueKind::IgmpSnooping => {
            if is_off(trimmed) {
                Value::IgmpSnooping(None)
            } else {
                Value::IgmpSnooping(Some(parse_vlan(descriptor, trimmed)?))
            }
        }
        ValueKind::Blob => Value::Blob(parse_hex(descriptor, trimmed)?),
    };

    validate_value(descriptor, &value, ctx)?;
    Ok(value)
}

fn split_pair<'a>(descriptor: &AttributeDescriptor, text: &'a str) -> Result<(&'a str, &'a str)> {
    text.split_once(':')
        .ok_or_else(|| invalid(descriptor, format!("expected 'A:B', got '{}'", text)))
}

fn parse_port(descriptor: &AttributeDescriptor, text: &str) -> Result<u8> {
    text.trim()
        .parse()
        .map_err(|_| invalid(descriptor, format!("non-numeric port '{}'", text.trim())))
}

fn parse_port_list(descriptor: &AttributeDescriptor, text: &str) -> Result<BTreeSet<u8>> {
    text.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| parse_port(descriptor, p))
        .collect()
}

fn parse_vlan(descriptor: &AttributeDescriptor, text: &str) -> Result<u16> {
    text.trim()
        .parse()
        .map_err(|_| invalid(descriptor, format!("non-numeric VLAN id '{}'", text.trim())))
}

fn parse_switch(descriptor: &AttributeDescriptor, text: &str) -> Result<bool> {
    match text.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" | "enable" | "enabled" => Ok(true),
        "off" | "false" | "no" | "0" | "disable" | "disabled" => Ok(false),
        _ => Err(invalid(descriptor, format!("expected on/off, got '{}'", text))),
    }
}

fn is_off(text: &str) -> bool {
    matches!(
        text.to_ascii_lowercase().as_str(),
        "none" | "off" | "disable" | "disabled"
    )
}

fn parse_hex(descriptor: &AttributeDescriptor, text: &str) -> Result<Vec<u8>> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    if digits.len() % 2 != 0 {
        return Err(invalid(descriptor, "odd number of hex digits"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| invalid(descriptor, format!("bad hex '{}'", text)))
        })
        .collect()
}

// =============================================================================
// Validation
// =============================================================================

/// Check a value against its attribute's kind and the switch's port range
pub fn validate_value(
    descriptor: &AttributeDescriptor,
    value: &Value,
    ctx: &ValueContext,
) -> Result<()> {
    match (descriptor.kind, value) {
        (ValueKind::Text, Value::Text(text)) if text.contains('\0') => {
            Err(invalid(descriptor, "text cannot contain NUL bytes"))
        }
        (ValueKind::Text, Value::Text(_))
        | (ValueKind::Ipv4, Value::Ipv4(_))
        | (ValueKind::Mac, Value::Mac(_))
        | (ValueKind::Flag, Value::Flag(_))
        | (ValueKind::Action, Value::Trigger)
        | (ValueKind::U32, Value::Number(_))
        | (ValueKind::Blob, Value::Blob(_)) => Ok(()),
        (ValueKind::U8, Value::Number(n)) if *n <= u8::MAX as u32 => Ok(()),
        (ValueKind::U16, Value::Number(n)) if *n <= u16::MAX as u32 => Ok(()),
        (ValueKind::U8 | ValueKind::U16, Value::Number(n)) => {
            Err(invalid(descriptor, format!("{} is out of range", n)))
        }
        (ValueKind::Choice(table), Value::Choice(name)) => {
            lookup_code(descriptor, table, name).map(|_| ())
        }
        (ValueKind::PortVlan, Value::PortVlan { port, vlan }) => {
            check_port(descriptor, *port, ctx)?;
            check_vlan(descriptor, *vlan)
        }
        (ValueKind::VlanMembers, Value::VlanMembers { vlan, ports }) => {
            check_vlan(descriptor, *vlan)?;
            check_ports(descriptor, ports, ctx)
        }
        (
            ValueKind::Vlan802,
            Value::Vlan802 {
                vlan,
                tagged,
                untagged,
            },
        ) => {
            check_vlan(descriptor, *vlan)?;
            check_ports(descriptor, tagged, ctx)?;
            check_ports(descriptor, untagged, ctx)?;
            if let Some(port) = tagged.intersection(untagged).next() {
                return Err(invalid(
                    descriptor,
                    format!("port {} cannot be both tagged and untagged", port),
                ));
            }
            Ok(())
        }
        (ValueKind::PortMirror, Value::PortMirror { target, members }) => {
            if *target == 0 {
                if !members.is_empty() {
                    return Err(invalid(descriptor, "source ports given without a target port"));
                }
                return Ok(());
            }
            check_port(descriptor, *target, ctx)?;
            if members.is_empty() {
                return Err(invalid(descriptor, "no source ports to mirror"));
            }
            check_ports(descriptor, members, ctx)?;
            if members.contains(target) {
                return Err(invalid(
                    descriptor,
                    format!("port {} cannot mirror to itself", target),
                ));
            }
            Ok(())
        }
        (ValueKind::PortPriority | ValueKind::PortBandwidth, Value::PortChoice { port, choice }) => {
            check_port(descriptor, *port, ctx)?;
            lookup_code(descriptor, port_choice_table(descriptor.kind), choice).map(|_| ())
        }
        (ValueKind::PortSpeed, Value::PortSpeed { port, speed, .. }) => {
            check_port(descriptor, *port, ctx)?;
            lookup_code(descriptor, LINK_SPEEDS, speed).map(|_| ())
        }
        (ValueKind::PortStats, Value::PortStats { port, .. }) => check_port(descriptor, *port, ctx),
        (ValueKind::IgmpSnooping, Value::IgmpSnooping(vlan)) => match vlan {
            Some(vlan) => check_vlan(descriptor, *vlan),
            None => Ok(()),
        },
        (kind, value) => Err(invalid(
            descriptor,
            format!("value '{}' does not fit {:?}", value, kind),
        )),
    }
}

fn check_port(descriptor: &AttributeDescriptor, port: u8, ctx: &ValueContext) -> Result<()> {
    if port == 0 || port > ctx.port_count {
        return Err(invalid(
            descriptor,
            format!("port {} outside 1..={}", port, ctx.port_count),
        ));
    }
    Ok(())
}

fn check_ports(
    descriptor: &AttributeDescriptor,
    ports: &BTreeSet<u8>,
    ctx: &ValueContext,
) -> Result<()> {
    ports.iter().try_for_each(|&p| check_port(descriptor, p, ctx))
}

fn check_vlan(descriptor: &AttributeDescriptor, vlan: u16) -> Result<()> {
    if vlan > MAX_VLAN_ID {
        return Err(invalid(
            descriptor,
            format!("VLAN id {} outside 0..={}", vlan, MAX_VLAN_ID),
        ));
    }
    Ok(())
}

// =============================================================================
// Encoding
// =============================================================================

/// Validate and encode a value into record bytes
pub fn encode_value(
    descriptor: &AttributeDescriptor,
    value: &Value,
    ctx: &ValueContext,
) -> Result<Vec<u8>> {
    validate_value(descriptor, value, ctx)?;

    let mut buf = BytesMut::new();
    match value {
        Value::Text(s) => buf.put_slice(s.as_bytes()),
        Value::Ipv4(ip) => buf.put_slice(&ip.octets()),
        Value::Mac(mac) => buf.put_slice(&mac.octets()),
        Value::Number(n) => match descriptor.kind {
            ValueKind::U8 => buf.put_u8(*n as u8),
            ValueKind::U16 => buf.put_u16(*n as u16),
            _ => buf.put_u32(*n),
        },
        Value::Flag(on) => buf.put_u8(u8::from(*on)),
        Value::Trigger => buf.put_u8(0x01),
        Value::Choice(name) => {
            if let ValueKind::Choice(table) = descriptor.kind {
                buf.put_u8(lookup_code(descriptor, table, name)?.0 as u8);
            }
        }
        Value::PortVlan { port, vlan } => {
            buf.put_u8(*port);
            buf.put_u16(*vlan);
        }
        Value::VlanMembers { vlan, ports } => {
            buf.put_u16(*vlan);
            buf.put_slice(&port_mask(ports, ctx));
        }
        Value::Vlan802 {
            vlan,
            tagged,
            untagged,
        } => {
            let members: BTreeSet<u8> = tagged.union(untagged).copied().collect();
            buf.put_u16(*vlan);
            buf.put_slice(&port_mask(&members, ctx));
            buf.put_slice(&port_mask(tagged, ctx));
        }
        Value::PortMirror { target, members } => {
            buf.put_u8(*target);
            buf.put_u8(0x00);
            buf.put_slice(&port_mask(members, ctx));
        }
        Value::PortChoice { port, choice } => {
            let code = lookup_code(descriptor, port_choice_table(descriptor.kind), choice)?.0;
            buf.put_u8(*port);
            if descriptor.kind == ValueKind::PortBandwidth {
                buf.put_u16(0x0000);
                buf.put_u16(code);
            } else {
                buf.put_u8(code as u8);
            }
        }
        Value::PortSpeed {
            port,
            speed,
            flow_control,
        } => {
            buf.put_u8(*port);
            buf.put_u8(lookup_code(descriptor, LINK_SPEEDS, speed)?.0 as u8);
            buf.put_u8(u8::from(*flow_control));
        }
        Value::PortStats {
            port,
            rx_bytes,
            tx_bytes,
            packets,
            broadcasts,
            multicasts,
            crc_errors,
        } => {
            buf.put_u8(*port);
            for counter in [rx_bytes, tx_bytes, packets, broadcasts, multicasts, crc_errors] {
                buf.put_u64(*counter);
            }
        }
        Value::IgmpSnooping(vlan) => {
            buf.put_u16(u16::from(vlan.is_some()));
            buf.put_u16(vlan.unwrap_or(0));
        }
        Value::Blob(bytes) => buf.put_slice(bytes),
    }

    Ok(buf.to_vec())
}

fn port_mask(ports: &BTreeSet<u8>, ctx: &ValueContext) -> Vec<u8> {
    let mut mask = vec![0u8; ctx.mask_len()];
    for &port in ports.iter().filter(|&&p| p > 0) {
        let index = (port - 1) as usize;
        if let Some(byte) = mask.get_mut(index / 8) {
            *byte |= 0x80 >> (index % 8);
        }
    }
    mask
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode record bytes into a value
///
/// Fails with `MalformedPacket` when the length does not fit the kind, so
/// callers can surface the raw bytes instead of a coerced value.
pub fn decode_value(descriptor: &AttributeDescriptor, bytes: &[u8]) -> Result<Value> {
    let value = match descriptor.kind {
        ValueKind::Text => {
            let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            Value::Text(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
        ValueKind::Ipv4 => {
            let b = expect_len(descriptor, bytes, 4)?;
            Value::Ipv4([b[0], b[1], b[2], b[3]].into())
        }
        ValueKind::Mac => {
            let b = expect_len(descriptor, bytes, 6)?;
            Value::Mac(crate::protocol::MacAddr::from_slice(b).unwrap_or_default())
        }
        ValueKind::U8 => Value::Number(expect_len(descriptor, bytes, 1)?[0] as u32),
        ValueKind::U16 => {
            let b = expect_len(descriptor, bytes, 2)?;
            Value::Number(u16::from_be_bytes([b[0], b[1]]) as u32)
        }
        ValueKind::U32 => {
            let b = expect_len(descriptor, bytes, 4)?;
            Value::Number(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        }
        ValueKind::Flag => Value::Flag(expect_min(descriptor, bytes, 1)?[0] != 0),
        ValueKind::Action => Value::Trigger,
        ValueKind::Choice(table) => {
            let code = expect_len(descriptor, bytes, 1)?[0] as u16;
            match name_for(table, code) {
                Some(name) => Value::Choice(name.to_string()),
                None => Value::Number(code as u32),
            }
        }
        ValueKind::PortVlan => {
            let b = expect_len(descriptor, bytes, 3)?;
            Value::PortVlan {
                port: b[0],
                vlan: u16::from_be_bytes([b[1], b[2]]),
            }
        }
        ValueKind::VlanMembers => {
            let b = expect_min(descriptor, bytes, 3)?;
            Value::VlanMembers {
                vlan: u16::from_be_bytes([b[0], b[1]]),
                ports: ports_from_mask(descriptor, &b[2..])?,
            }
        }
        ValueKind::Vlan802 => {
            let b = expect_min(descriptor, bytes, 4)?;
            if (b.len() - 2) % 2 != 0 {
                return Err(NsdpError::malformed(format!(
                    "{}: uneven port masks in {} bytes",
                    descriptor.name,
                    b.len()
                )));
            }
            let half = (b.len() - 2) / 2;
            let members = ports_from_mask(descriptor, &b[2..2 + half])?;
            let tagged = ports_from_mask(descriptor, &b[2 + half..])?;
            let untagged = members.difference(&tagged).copied().collect();
            Value::Vlan802 {
                vlan: u16::from_be_bytes([b[0], b[1]]),
                tagged,
                untagged,
            }
        }
        ValueKind::PortMirror => {
            let b = expect_min(descriptor, bytes, 3)?;
            Value::PortMirror {
                target: b[0],
                members: ports_from_mask(descriptor, &b[2..])?,
            }
        }
        ValueKind::PortPriority => {
            let b = expect_len(descriptor, bytes, 2)?;
            Value::PortChoice {
                port: b[0],
                choice: choice_name(PORT_PRIORITIES, b[1] as u16),
            }
        }
        ValueKind::PortBandwidth => {
            let b = expect_len(descriptor, bytes, 5)?;
            Value::PortChoice {
                port: b[0],
                choice: choice_name(BANDWIDTH_LIMITS, u16::from_be_bytes([b[3], b[4]])),
            }
        }
        ValueKind::PortSpeed => {
            let b = expect_min(descriptor, bytes, 2)?;
            Value::PortSpeed {
                port: b[0],
                speed: choice_name(LINK_SPEEDS, b[1] as u16),
                flow_control: b.get(2).is_some_and(|&f| f != 0),
            }
        }
        ValueKind::PortStats => {
            let b = expect_len(descriptor, bytes, 1 + 6 * 8)?;
            let mut counters = &b[1..];
            Value::PortStats {
                port: b[0],
                rx_bytes: counters.get_u64(),
                tx_bytes: counters.get_u64(),
                packets: counters.get_u64(),
                broadcasts: counters.get_u64(),
                multicasts: counters.get_u64(),
                crc_errors: counters.get_u64(),
            }
        }
        ValueKind::IgmpSnooping => {
            let b = expect_len(descriptor, bytes, 4)?;
            let enabled = u16::from_be_bytes([b[0], b[1]]);
            let vlan = u16::from_be_bytes([b[2], b[3]]);
            Value::IgmpSnooping((enabled != 0).then_some(vlan))
        }
        ValueKind::Blob => Value::Blob(bytes.to_vec()),
    };

    Ok(value)
}

/// Ports are numbered from 1 and must fit a `u8`
fn ports_from_mask(descriptor: &AttributeDescriptor, mask: &[u8]) -> Result<BTreeSet<u8>> {
    let mut ports = BTreeSet::new();
    for (i, byte) in mask.iter().enumerate() {
        for bit in 0..8 {
            if byte & (0x80 >> bit) == 0 {
                continue;
            }
            let port = u8::try_from(i * 8 + bit + 1).map_err(|_| {
                NsdpError::malformed(format!(
                    "{}: port {} in a {}-byte mask is out of range",
                    descriptor.name,
                    i * 8 + bit + 1,
                    mask.len()
                ))
            })?;
            ports.insert(port);
        }
    }
    Ok(ports)
}

fn expect_len<'a>(descriptor: &AttributeDescriptor, bytes: &'a [u8], len: usize) -> Result<&'a [u8]> {
    if bytes.len() != len {
        return Err(NsdpError::malformed(format!(
            "{}: expected {} bytes, got {}",
            descriptor.name,
            len,
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn expect_min<'a>(descriptor: &AttributeDescriptor, bytes: &'a [u8], len: usize) -> Result<&'a [u8]> {
    if bytes.len() < len {
        return Err(NsdpError::malformed(format!(
            "{}: expected at least {} bytes, got {}",
            descriptor.name,
            len,
            bytes.len()
        )));
    }
    Ok(bytes)
}

// =============================================================================
// Code Tables
// =============================================================================

fn port_choice_table(kind: ValueKind) -> &'static [(u16, &'static str)] {
    match kind {
        ValueKind::PortBandwidth => BANDWIDTH_LIMITS,
        _ => PORT_PRIORITIES,
    }
}

fn lookup_code(
    descriptor: &AttributeDescriptor,
    table: &'static [(u16, &'static str)],
    name: &str,
) -> Result<(u16, &'static str)> {
    table
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(name.trim()))
        .copied()
        .ok_or_else(|| {
            let names: Vec<&str> = table.iter().map(|(_, n)| *n).collect();
            invalid(
                descriptor,
                format!("'{}' is not one of {}", name.trim(), names.join(", ")),
            )
        })
}

fn name_for(table: &[(u16, &'static str)], code: u16) -> Option<&'static str> {
    table.iter().find(|(c, _)| *c == code).map(|(_, n)| *n)
}

fn choice_name(table: &[(u16, &'static str)], code: u16) -> String {
    name_for(table, code)
        .map(str::to_string)
        .unwrap_or_else(|| format!("unknown(0x{:02x})", code))
}

fn invalid(descriptor: &AttributeDescriptor, reason: impl Into<String>) -> NsdpError {
    NsdpError::invalid_value(descriptor.name, reason)
}
