use std::net::Ipv4Addr;

use super::response::TrackerEvent;

/// The statistics and options reported with one announce.
///
/// The default value is a routine announce on port 6881 with zeroed
/// counters and a compact peer list requested.
///
/// # Examples
///
/// ```
/// use bitwire::tracker::{AnnounceRequest, TrackerEvent};
///
/// let request = AnnounceRequest {
///     left: 4096,
///     event: TrackerEvent::Started,
///     ..AnnounceRequest::default()
/// };
/// assert_eq!(request.port, 6881);
/// ```
#[derive(Debug, Clone)]
pub struct AnnounceRequest {
    /// The port we accept peer connections on.
    pub port: u16,
    /// Total bytes uploaded this session.
    pub uploaded: u64,
    /// Total bytes downloaded this session.
    pub downloaded: u64,
    /// Bytes remaining until the torrent is complete.
    pub left: u64,
    pub event: TrackerEvent,
    /// Externally visible address, when the tracker cannot infer it.
    pub ip: Option<Ipv4Addr>,
    /// How many peers to ask for; the tracker picks when unset.
    pub numwant: Option<i32>,
    /// Request the 6-byte-per-peer compact list.
    pub compact: bool,
    /// Ask the tracker to omit peer ids from dictionary responses.
    pub no_peer_id: bool,
    /// Announce key letting the tracker recognize us across address changes.
    pub key: Option<u32>,
}

impl Default for AnnounceRequest {
    fn default() -> Self {
        Self {
            port: 6881,
            uploaded: 0,
            downloaded: 0,
            left: 0,
            event: TrackerEvent::None,
            ip: None,
            numwant: None,
            compact: true,
            no_peer_id: false,
            key: None,
        }
    }
}
