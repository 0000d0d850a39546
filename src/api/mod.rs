//! Venue API: transport capability, WebSocket session, and wire types.

#[cfg(test)]
pub mod mock;
mod session;
mod transport;
mod types;

pub use session::{DerivSession, SessionConfig};
pub use transport::{call, to_request, SessionError, Transport};
pub use types::*;
