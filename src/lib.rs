//! # prosafe
//!
//! Discover, query and configure Netgear ProSafe Plus switches over the
//! Netgear Switch Discovery Protocol (NSDP):
//! - Broadcast discovery with per-switch deduplication
//! - Named attribute queries with typed, decoded values
//! - Authenticated configuration changes
//! - Raw tag dumps for diagnosing firmware differences
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CLI (prosafe-cli)                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Operations                                │
//! │   discover / query / set / exploit / query_raw               │
//! └──────────┬──────────────────────────────┬───────────────────┘
//!            │                              │
//!            ▼                              ▼
//!   ┌─────────────────┐            ┌─────────────────┐
//!   │   Attributes    │            │     Session     │
//!   │ (name ↔ tag ↔   │            │ (send, collect, │
//!   │  typed value)   │            │  retry)         │
//!   └────────┬────────┘            └────────┬────────┘
//!            │                              │
//!            ▼                              ▼
//!   ┌─────────────────┐            ┌─────────────────┐
//!   │    Protocol     │            │    Transport    │
//!   │ (header + TLV)  │            │  (UDP 63321/2)  │
//!   └─────────────────┘            └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod attribute;
pub mod credential;
pub mod network;
pub mod operations;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{NsdpError, Rejection, Result};
pub use config::{Config, PasswordMode};
pub use network::Session;
pub use protocol::MacAddr;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of prosafe
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
