//! Attribute table
//!
//! Tag numbers were reverse-engineered from firmware traffic and can differ
//! between switch generations; `Dictionary::with_tag_override` lets a caller
//! remap a name without touching the table.

use std::collections::HashMap;

use super::value::{QOS_MODES, VLAN_MODES};
use super::{Access, AttributeDescriptor, ValueKind};
use crate::error::{NsdpError, Result};
use crate::protocol::Tag;

/// Attributes requested by discovery
pub const DISCOVERY_ATTRIBUTES: &[&str] = &["model", "name", "mac", "dhcp", "ip"];

const fn attr(
    tag: u16,
    name: &'static str,
    kind: ValueKind,
    access: Access,
) -> AttributeDescriptor {
    AttributeDescriptor {
        tag: Tag(tag),
        name,
        kind,
        access,
        requires_auth: matches!(access, Access::ReadWrite | Access::WriteOnly | Access::Internal),
        batchable: true,
    }
}

const fn unbatched(mut descriptor: AttributeDescriptor) -> AttributeDescriptor {
    descriptor.batchable = false;
    descriptor
}

static ATTRIBUTES: &[AttributeDescriptor] = &[
    attr(0x0001, "model", ValueKind::Text, Access::ReadOnly),
    attr(0x0003, "name", ValueKind::Text, Access::ReadWrite),
    attr(0x0004, "mac", ValueKind::Mac, Access::ReadOnly),
    attr(0x0005, "location", ValueKind::Text, Access::ReadWrite),
    attr(0x0006, "ip", ValueKind::Ipv4, Access::ReadWrite),
    attr(0x0007, "netmask", ValueKind::Ipv4, Access::ReadWrite),
    attr(0x0008, "gateway", ValueKind::Ipv4, Access::ReadWrite),
    attr(0x0009, "new_password", ValueKind::Text, Access::WriteOnly),
    attr(0x000a, "password", ValueKind::Text, Access::Internal),
    attr(0x000b, "dhcp", ValueKind::Flag, Access::ReadWrite),
    attr(0x000d, "firmware_version", ValueKind::Text, Access::ReadOnly),
    attr(0x0013, "reboot", ValueKind::Action, Access::WriteOnly),
    attr(0x0400, "factory_reset", ValueKind::Action, Access::WriteOnly),
    attr(0x0c00, "speed_stat", ValueKind::PortSpeed, Access::ReadOnly),
    attr(0x1000, "port_stat", ValueKind::PortStats, Access::ReadOnly),
    attr(0x1400, "reset_port_stat", ValueKind::Action, Access::WriteOnly),
    attr(0x2000, "vlan_support", ValueKind::Choice(VLAN_MODES), Access::ReadWrite),
    unbatched(attr(0x2400, "vlan_id", ValueKind::VlanMembers, Access::ReadWrite)),
    unbatched(attr(0x2800, "vlan802_id", ValueKind::Vlan802, Access::ReadWrite)),
    attr(0x2c00, "vlan_delete", ValueKind::U16, Access::WriteOnly),
    attr(0x3000, "vlan_pvid", ValueKind::PortVlan, Access::ReadWrite),
    attr(0x3400, "qos", ValueKind::Choice(QOS_MODES), Access::ReadWrite),
    attr(0x3800, "port_based_qos", ValueKind::PortPriority, Access::ReadWrite),
    attr(0x4c00, "bandwidth_in", ValueKind::PortBandwidth, Access::ReadWrite),
    attr(0x5000, "bandwidth_out", ValueKind::PortBandwidth, Access::ReadWrite),
    attr(0x5800, "broadcast_bandwidth", ValueKind::PortBandwidth, Access::ReadWrite),
    attr(0x5c00, "port_mirror", ValueKind::PortMirror, Access::ReadWrite),
    attr(0x6000, "number_of_ports", ValueKind::U8, Access::ReadOnly),
    attr(0x6800, "igmp_snooping", ValueKind::IgmpSnooping, Access::ReadWrite),
    attr(0x6c00, "block_unknown_multicast", ValueKind::Flag, Access::ReadWrite),
    attr(0x7000, "igmp_header_validation", ValueKind::Flag, Access::ReadWrite),
    attr(0x9000, "loop_detection", ValueKind::Flag, Access::ReadWrite),
];

/// The built-in attribute table
pub fn standard_attributes() -> &'static [AttributeDescriptor] {
    ATTRIBUTES
}

/// Look up a built-in attribute by name (case-insensitive)
pub fn resolve(name: &str) -> Result<&'static AttributeDescriptor> {
    ATTRIBUTES
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| NsdpError::UnknownAttribute(name.to_string()))
}

/// Attribute table for one session, built once at startup
#[derive(Debug, Clone)]
pub struct Dictionary {
    attributes: Vec<AttributeDescriptor>,
    by_tag: HashMap<Tag, usize>,
}

impl Dictionary {
    /// The built-in table
    pub fn standard() -> Self {
        Self::from_descriptors(ATTRIBUTES.to_vec())
    }

    fn from_descriptors(attributes: Vec<AttributeDescriptor>) -> Self {
        let by_tag = attributes
            .iter()
            .enumerate()
            .map(|(i, a)| (a.tag, i))
            .collect();
        Self { attributes, by_tag }
    }

    /// Remap the tag of a named attribute
    pub fn with_tag_override(mut self, name: &str, tag: Tag) -> Result<Self> {
        let index = self
            .attributes
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| NsdpError::UnknownAttribute(name.to_string()))?;

        if let Some(other) = self
            .attributes
            .iter()
            .find(|a| a.tag == tag && a.name != self.attributes[index].name)
        {
            return Err(NsdpError::Config(format!(
                "tag {} is already used by '{}'",
                tag, other.name
            )));
        }

        tracing::debug!(
            "Overriding tag of '{}': {} -> {}",
            self.attributes[index].name,
            self.attributes[index].tag,
            tag
        );
        self.attributes[index].tag = tag;
        Ok(Self::from_descriptors(self.attributes))
    }

    /// Look up an attribute by name (case-insensitive)
    pub fn resolve(&self, name: &str) -> Result<&AttributeDescriptor> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| NsdpError::UnknownAttribute(name.to_string()))
    }

    /// Look up an attribute by wire tag
    pub fn by_tag(&self, tag: Tag) -> Option<&AttributeDescriptor> {
        self.by_tag.get(&tag).map(|&i| &self.attributes[i])
    }

    /// Attributes a query may ask for
    pub fn queryable(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.iter().filter(|a| a.is_queryable())
    }

    /// Attributes a set may assign
    pub fn settable(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.iter().filter(|a| a.is_settable())
    }

    /// The attribute carrying the login password
    pub fn password(&self) -> Result<&AttributeDescriptor> {
        self.resolve("password")
    }

    /// The attribute carrying a replacement password
    pub fn new_password(&self) -> Result<&AttributeDescriptor> {
        self.resolve("new_password")
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::standard()
    }
}
