//! Configuration for prosafe
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{NsdpError, Result};
use crate::protocol::MacAddr;

/// UDP port the client listens on (switches broadcast their replies here)
pub const DEFAULT_CLIENT_PORT: u16 = 63321;

/// UDP port switches listen on
pub const DEFAULT_SWITCH_PORT: u16 = 63322;

/// Largest UDP payload over IPv4
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Main configuration for a switch session
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Interface Configuration
    // -------------------------------------------------------------------------
    /// Network interface used to reach the switches (e.g. "eth0")
    pub interface: String,

    // -------------------------------------------------------------------------
    // Transport Configuration
    // -------------------------------------------------------------------------
    /// Receive window for one send (discovery waits this long exactly once)
    pub timeout: Duration,

    /// Total sends for a request to one known switch before `NoResponse`
    pub max_attempts: u32,

    /// Resend set requests on timeout too. Off by default: writes are
    /// at-most-once, a lost ack is reported rather than replayed.
    pub retry_writes: bool,

    /// Local port replies arrive on
    pub client_port: u16,

    /// Remote port requests are sent to
    pub switch_port: u16,

    /// Size of the datagram receive buffer. Longer datagrams are cut off
    /// by the socket and then fail to parse.
    pub recv_buffer_size: usize,

    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Number of ports assumed when validating port indices and sizing
    /// port masks
    pub port_count: u8,

    /// How passwords are embedded into packets
    pub password_mode: PasswordMode,

    /// Destination MAC written into discovery requests
    pub discovery_mac: MacAddr,
}

/// Password embedding used by the switch firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordMode {
    /// Password bytes sent as-is (early firmware)
    Plain,

    /// Password XOR-obfuscated with the vendor key
    Obfuscated,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: "eth0".to_string(),
            timeout: Duration::from_millis(100),
            max_attempts: 3,
            retry_writes: false,
            client_port: DEFAULT_CLIENT_PORT,
            switch_port: DEFAULT_SWITCH_PORT,
            recv_buffer_size: MAX_DATAGRAM_SIZE,
            port_count: 8,
            password_mode: PasswordMode::Obfuscated,
            discovery_mac: MacAddr::broadcast(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the network interface name
    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.config.interface = name.into();
        self
    }

    /// Set the receive timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the receive timeout from fractional seconds
    ///
    /// Fails on NaN, negative or unrepresentable values.
    pub fn timeout_secs(self, secs: f64) -> Result<Self> {
        let timeout = Duration::try_from_secs_f64(secs).map_err(|e| {
            NsdpError::Config(format!(
                "timeout must be a non-negative number of seconds, got {} ({})",
                secs, e
            ))
        })?;
        Ok(self.timeout(timeout))
    }

    /// Set the number of sends per request (clamped to at least one)
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts.max(1);
        self
    }

    /// Allow set requests to be resent on timeout
    pub fn retry_writes(mut self, retry: bool) -> Self {
        self.config.retry_writes = retry;
        self
    }

    /// Set the local reply port
    pub fn client_port(mut self, port: u16) -> Self {
        self.config.client_port = port;
        self
    }

    /// Set the remote switch port
    pub fn switch_port(mut self, port: u16) -> Self {
        self.config.switch_port = port;
        self
    }

    /// Set the receive buffer size (in bytes)
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size;
        self
    }

    /// Set the number of switch ports
    pub fn port_count(mut self, ports: u8) -> Self {
        self.config.port_count = ports;
        self
    }

    /// Set the password embedding
    pub fn password_mode(mut self, mode: PasswordMode) -> Self {
        self.config.password_mode = mode;
        self
    }

    /// Set the destination MAC used for discovery
    pub fn discovery_mac(mut self, mac: MacAddr) -> Self {
        self.config.discovery_mac = mac;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
