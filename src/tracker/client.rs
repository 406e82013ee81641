use super::error::TrackerError;
use super::http::HttpTracker;
use super::request::AnnounceRequest;
use super::response::AnnounceResponse;
use super::udp::UdpTracker;
use crate::metainfo::InfoHash;
use crate::peer::PeerId;

/// The transport an announce URL maps to. The table is closed: any scheme
/// outside it is rejected when the client is built.
enum Transport {
    Http(HttpTracker),
    Udp(String),
}

/// A tracker client bound to one torrent.
///
/// The announce URL's scheme picks the transport; the peer-id reported to
/// the tracker is generated once here and reused for every announce.
///
/// # Examples
///
/// ```no_run
/// use bitwire::metainfo::InfoHash;
/// use bitwire::tracker::{AnnounceRequest, TrackerClient, TrackerEvent};
///
/// # async fn example() -> Result<(), bitwire::tracker::TrackerError> {
/// let client = TrackerClient::new(
///     "udp://tracker.example.com:6969/announce",
///     InfoHash::from_bytes([0u8; 20]),
/// )?;
///
/// let response = client
///     .announce(&AnnounceRequest {
///         left: 1 << 20,
///         event: TrackerEvent::Started,
///         ..AnnounceRequest::default()
///     })
///     .await?;
///
/// println!("{} peers, next announce in {}s", response.peers.len(), response.interval);
/// # Ok(())
/// # }
/// ```
pub struct TrackerClient {
    info_hash: InfoHash,
    peer_id: PeerId,
    transport: Transport,
}

impl TrackerClient {
    /// Builds a client for `url`, validating the scheme up front.
    ///
    /// # Errors
    ///
    /// [`TrackerError::UnsupportedScheme`] for anything other than `http`,
    /// `https`, or `udp`.
    pub fn new(url: &str, info_hash: InfoHash) -> Result<Self, TrackerError> {
        let transport = if url.starts_with("http://") || url.starts_with("https://") {
            Transport::Http(HttpTracker::new(url)?)
        } else if url.starts_with("udp://") {
            Transport::Udp(url.to_string())
        } else {
            let scheme = url.split("://").next().unwrap_or(url);
            return Err(TrackerError::UnsupportedScheme(scheme.to_string()));
        };

        Ok(Self {
            info_hash,
            peer_id: PeerId::generate(),
            transport,
        })
    }

    /// The peer-id this client reports to trackers.
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    /// Issues one announce over the transport the URL selected.
    ///
    /// UDP announces open a fresh socket and run the connect exchange each
    /// time; HTTP announces reuse the client built at construction.
    pub async fn announce(
        &self,
        request: &AnnounceRequest,
    ) -> Result<AnnounceResponse, TrackerError> {
        match &self.transport {
            Transport::Http(http) => http.announce(&self.info_hash, &self.peer_id, request).await,
            Transport::Udp(url) => {
                let mut udp = UdpTracker::connect(url).await?;
                udp.announce(&self.info_hash, &self.peer_id, request).await
            }
        }
    }
}
