//! Interface resolution
//!
//! Turns an interface name into the addresses a session needs: the local
//! MAC (written into every request), the IPv4 address to send from and the
//! subnet broadcast address.

use std::net::Ipv4Addr;

use ipnetwork::IpNetwork;
use pnet_datalink::{self, NetworkInterface};
use serde::Serialize;

use crate::error::{NsdpError, Result};
use crate::protocol::MacAddr;

/// Local side of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub name: String,
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub broadcast: Ipv4Addr,
}

impl Endpoint {
    /// Resolve an interface by name
    ///
    /// Fails with `InterfaceNotFound` if the interface does not exist or has
    /// no IPv4 address.
    pub fn resolve(name: &str) -> Result<Self> {
        let iface = pnet_datalink::interfaces()
            .into_iter()
            .find(|i| i.name == name)
            .ok_or_else(|| NsdpError::InterfaceNotFound(name.to_string()))?;

        let endpoint = Self::from_interface(&iface)
            .ok_or_else(|| NsdpError::InterfaceNotFound(name.to_string()))?;

        tracing::debug!(
            "Resolved {}: mac={} ip={} broadcast={}",
            endpoint.name,
            endpoint.mac,
            endpoint.ip,
            endpoint.broadcast
        );
        Ok(endpoint)
    }

    fn from_interface(iface: &NetworkInterface) -> Option<Self> {
        let network = iface.ips.iter().find_map(|ip| match ip {
            IpNetwork::V4(v4) => Some(*v4),
            IpNetwork::V6(_) => None,
        })?;

        let mac = iface
            .mac
            .map(|m| MacAddr::new([m.0, m.1, m.2, m.3, m.4, m.5]))
            .unwrap_or_default();

        Some(Self {
            name: iface.name.clone(),
            mac,
            ip: network.ip(),
            broadcast: network.broadcast(),
        })
    }
}

/// Every interface that carries an IPv4 address
pub fn list_interfaces() -> Vec<Endpoint> {
    pnet_datalink::interfaces()
        .iter()
        .filter_map(Endpoint::from_interface)
        .collect()
}
