//! Network Module
//!
//! UDP transport and the request/response session.
//!
//! ## Architecture
//! - Interface resolution (local MAC, IPv4 address, broadcast address)
//! - `Transport` trait with a UDP implementation on the fixed port pair
//! - `Session` owns the transport and runs one blocking receive loop per
//!   request, bounded by a single deadline

mod interface;
mod session;
mod transport;

pub use interface::{list_interfaces, Endpoint};
pub use session::{Expect, Session, SessionState};
pub use transport::{Destination, Transport, UdpTransport};
