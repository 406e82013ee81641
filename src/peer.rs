//! Peer wire protocol (BEP-3)
//!
//! A [`PeerSession`] owns one TCP connection to a remote peer: it performs
//! the 68-byte handshake, frames length-prefixed messages, tracks the
//! four-way choke/interest state and the remote's [`Bitfield`], and delivers
//! parsed messages to handlers registered per [`EventKind`].

mod bitfield;
mod error;
mod message;
mod peer_id;
mod session;

pub use bitfield::Bitfield;
pub use error::PeerError;
pub use message::{Handshake, Message, MessageKind, HANDSHAKE_LEN, PROTOCOL};
pub use peer_id::PeerId;
pub use session::{Event, EventKind, PeerSender, PeerSession, PeerState};

#[cfg(test)]
mod tests;
