use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use super::error::TrackerError;

/// A peer discovered through a tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// The peer's socket address.
    pub addr: SocketAddr,
    /// The peer's 20-byte id; absent in compact responses.
    pub peer_id: Option<[u8; 20]>,
}

impl Peer {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            peer_id: None,
        }
    }

    pub fn with_id(addr: SocketAddr, peer_id: [u8; 20]) -> Self {
        Self {
            addr,
            peer_id: Some(peer_id),
        }
    }

    /// Parses one 6-byte compact record: 4-byte IPv4 then 2-byte port, both
    /// big-endian.
    pub fn from_compact(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 6 {
            return None;
        }
        let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
        let port = u16::from_be_bytes([bytes[4], bytes[5]]);
        Some(Self::new(SocketAddr::new(IpAddr::V4(ip), port)))
    }
}

/// Splits a compact peer list into its 6-byte records.
///
/// A trailing partial record is dropped.
pub fn parse_compact_peers(data: &[u8]) -> Vec<Peer> {
    data.chunks_exact(6).filter_map(Peer::from_compact).collect()
}

/// The announce event reported to the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrackerEvent {
    /// A routine re-announce.
    #[default]
    None,
    Started,
    Completed,
    Stopped,
}

impl TrackerEvent {
    /// The HTTP query spelling; empty means the parameter is omitted.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerEvent::None => "",
            TrackerEvent::Started => "started",
            TrackerEvent::Completed => "completed",
            TrackerEvent::Stopped => "stopped",
        }
    }

    /// The event code in the UDP announce packet.
    pub fn as_udp_id(&self) -> u32 {
        match self {
            TrackerEvent::None => 0,
            TrackerEvent::Completed => 1,
            TrackerEvent::Started => 2,
            TrackerEvent::Stopped => 3,
        }
    }

}

impl FromStr for TrackerEvent {
    type Err = TrackerError;

    /// Parses an event name. The legacy `stoped` spelling some clients emit
    /// is accepted; [`as_str`](TrackerEvent::as_str) always produces the
    /// canonical form.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "" | "none" => Ok(TrackerEvent::None),
            "started" => Ok(TrackerEvent::Started),
            "completed" => Ok(TrackerEvent::Completed),
            "stopped" | "stoped" => Ok(TrackerEvent::Stopped),
            _ => Err(TrackerError::UnknownEvent(name.to_string())),
        }
    }
}

/// What a tracker returned for one announce.
#[derive(Debug, Clone)]
pub struct AnnounceResponse {
    /// Seconds to wait before the next announce.
    pub interval: u32,
    pub seeders: u32,
    pub leechers: u32,
    /// Discovered peers, in no particular order.
    pub peers: Vec<Peer>,
}
