//! Error types for prosafe
//!
//! Provides a unified error type for all operations.

use std::fmt;

use thiserror::Error;

use crate::protocol::MacAddr;

/// Result type alias using NsdpError
pub type Result<T> = std::result::Result<T, NsdpError>;

/// Unified error type for prosafe operations
#[derive(Debug, Error)]
pub enum NsdpError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interface '{0}' not found or has no usable IPv4 address")]
    InterfaceNotFound(String),

    // -------------------------------------------------------------------------
    // Caller Input Errors (raised before any packet is sent)
    // -------------------------------------------------------------------------
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Invalid value for '{attribute}': {reason}")]
    InvalidValue { attribute: String, reason: String },

    // -------------------------------------------------------------------------
    // Wire Errors
    // -------------------------------------------------------------------------
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Unexpected operation code: 0x{0:02x}")]
    UnexpectedOperation(u8),

    // -------------------------------------------------------------------------
    // Switch Errors
    // -------------------------------------------------------------------------
    #[error("No response from {mac} after {attempts} attempt(s)")]
    NoResponse { mac: MacAddr, attempts: u32 },

    #[error("Switch requires a password for this request")]
    AuthenticationRequired,

    #[error("Switch rejected request: {0}")]
    SwitchRejected(Rejection),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl NsdpError {
    /// Create an invalid value error
    pub fn invalid_value(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        NsdpError::InvalidValue {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed packet error
    pub fn malformed(reason: impl Into<String>) -> Self {
        NsdpError::MalformedPacket(reason.into())
    }

    /// True for errors caused by a single bad datagram, which a receive loop
    /// discards instead of aborting
    pub fn is_discardable(&self) -> bool {
        matches!(
            self,
            NsdpError::MalformedPacket(_) | NsdpError::UnexpectedOperation(_)
        )
    }
}

/// Reason a switch gave for refusing a set request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    BadPassword,
    ValueOutOfRange,
    PortOutOfRange,
    Unknown { code: u8, tag: u16 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::BadPassword => write!(f, "bad_password"),
            Rejection::ValueOutOfRange => write!(f, "value_out_of_range"),
            Rejection::PortOutOfRange => write!(f, "port_out_of_range"),
            Rejection::Unknown { code, tag } => {
                write!(f, "unknown(code=0x{:02x},tag=0x{:04x})", code, tag)
            }
        }
    }
}
