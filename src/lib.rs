//! bitwire - the client-side core of a BitTorrent v1 library
//!
//! Four components compose bottom-up:
//!
//! - [`bencode`] - BEP-3 bencode encoding/decoding with canonical output
//! - [`metainfo`] - torrent metainfo construction, mutation, and info-hash
//! - [`tracker`] - BEP-3/15 HTTP and UDP tracker announce clients
//! - [`peer`] - BEP-3 peer wire protocol: handshake, framing, state
//!
//! The crate stops at the protocol layer: it discovers peers and speaks the
//! wire protocol, and exposes the hooks a download scheduler would drive.

pub mod bencode;
pub mod metainfo;
pub mod peer;
pub mod tracker;

pub use bencode::{decode, encode, BencodeError, Value};
pub use metainfo::{FileEntry, FileError, InfoHash, Metainfo};
pub use peer::{
    Bitfield, Event, EventKind, Handshake, Message, MessageKind, PeerError, PeerId, PeerSender,
    PeerSession, PeerState,
};
pub use tracker::{
    AnnounceRequest, AnnounceResponse, HttpTracker, Peer, TrackerClient, TrackerError,
    TrackerEvent, UdpTracker,
};
