use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng as _;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::timeout;
use tracing::debug;

use super::error::TrackerError;
use super::request::AnnounceRequest;
use super::response::{parse_compact_peers, AnnounceResponse};
use crate::metainfo::InfoHash;
use crate::peer::PeerId;

const PROTOCOL_ID: u64 = 0x41727101980;
const ACTION_CONNECT: u32 = 0;
const ACTION_ANNOUNCE: u32 = 1;
const ACTION_ERROR: u32 = 3;
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// A UDP tracker transport (BEP-15).
///
/// The protocol is two request/response round trips on one connected
/// socket: a connect exchange that yields a connection id, then the
/// announce itself. Each request carries a fresh random transaction id the
/// response must echo. Nothing is retried; a missing datagram surfaces as
/// [`TrackerError::Timeout`] after 5 seconds.
pub struct UdpTracker {
    socket: UdpSocket,
    addr: SocketAddr,
    connection_id: Option<u64>,
}

impl UdpTracker {
    /// Resolves the announce URL and performs the connect exchange.
    pub async fn connect(url: &str) -> Result<Self, TrackerError> {
        let addr = resolve_udp_url(url).await?;

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        // Connecting makes the OS drop datagrams from any other source.
        socket.connect(addr).await?;

        let mut tracker = Self {
            socket,
            addr,
            connection_id: None,
        };
        tracker.exchange_connect().await?;

        Ok(tracker)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn exchange_connect(&mut self) -> Result<(), TrackerError> {
        let transaction_id: u32 = rand::rng().random();

        let mut request = Vec::with_capacity(16);
        request.extend_from_slice(&PROTOCOL_ID.to_be_bytes());
        request.extend_from_slice(&ACTION_CONNECT.to_be_bytes());
        request.extend_from_slice(&transaction_id.to_be_bytes());

        let response = self.round_trip(&request, 16).await?;

        let action = u32::from_be_bytes([response[0], response[1], response[2], response[3]]);
        let echoed = u32::from_be_bytes([response[4], response[5], response[6], response[7]]);

        if action != ACTION_CONNECT {
            return Err(TrackerError::InvalidResponse(
                "connect action mismatch".into(),
            ));
        }
        if echoed != transaction_id {
            return Err(TrackerError::InvalidResponse(
                "connect transaction id mismatch".into(),
            ));
        }

        self.connection_id = Some(u64::from_be_bytes([
            response[8],
            response[9],
            response[10],
            response[11],
            response[12],
            response[13],
            response[14],
            response[15],
        ]));

        debug!(tracker = %self.addr, "udp connect exchange complete");
        Ok(())
    }

    /// Performs the announce round trip.
    ///
    /// The request is the fixed 98-byte layout, all integers big-endian.
    /// An error action (3) surfaces the tracker's NUL-terminated message as
    /// [`TrackerError::Failure`].
    pub async fn announce(
        &mut self,
        info_hash: &InfoHash,
        peer_id: &PeerId,
        request: &AnnounceRequest,
    ) -> Result<AnnounceResponse, TrackerError> {
        let connection_id = self
            .connection_id
            .ok_or_else(|| TrackerError::InvalidResponse("not connected".into()))?;

        let transaction_id: u32 = rand::rng().random();
        let key: u32 = request.key.unwrap_or_else(|| rand::rng().random());
        let ip: u32 = request.ip.map(u32::from).unwrap_or(0);
        let numwant: i32 = request.numwant.unwrap_or(-1);

        let mut packet = Vec::with_capacity(98);
        packet.extend_from_slice(&connection_id.to_be_bytes());
        packet.extend_from_slice(&ACTION_ANNOUNCE.to_be_bytes());
        packet.extend_from_slice(&transaction_id.to_be_bytes());
        packet.extend_from_slice(info_hash.as_bytes());
        packet.extend_from_slice(peer_id.as_bytes());
        packet.extend_from_slice(&request.downloaded.to_be_bytes());
        packet.extend_from_slice(&request.left.to_be_bytes());
        packet.extend_from_slice(&request.uploaded.to_be_bytes());
        packet.extend_from_slice(&request.event.as_udp_id().to_be_bytes());
        packet.extend_from_slice(&ip.to_be_bytes());
        packet.extend_from_slice(&key.to_be_bytes());
        packet.extend_from_slice(&numwant.to_be_bytes());
        packet.extend_from_slice(&request.port.to_be_bytes());

        let response = self.round_trip(&packet, 20).await?;

        let action = u32::from_be_bytes([response[0], response[1], response[2], response[3]]);
        let echoed = u32::from_be_bytes([response[4], response[5], response[6], response[7]]);

        if action == ACTION_ERROR {
            let text: Vec<u8> = response[8..]
                .iter()
                .copied()
                .take_while(|&b| b != 0)
                .collect();
            return Err(TrackerError::Failure(
                String::from_utf8_lossy(&text).into_owned(),
            ));
        }

        if action != ACTION_ANNOUNCE {
            return Err(TrackerError::InvalidResponse(
                "announce action mismatch".into(),
            ));
        }
        if echoed != transaction_id {
            return Err(TrackerError::InvalidResponse(
                "announce transaction id mismatch".into(),
            ));
        }
        if (response.len() - 20) % 6 != 0 {
            return Err(TrackerError::InvalidResponse(
                "malformed compact peer list".into(),
            ));
        }

        let interval = u32::from_be_bytes([response[8], response[9], response[10], response[11]]);
        let leechers = u32::from_be_bytes([response[12], response[13], response[14], response[15]]);
        let seeders = u32::from_be_bytes([response[16], response[17], response[18], response[19]]);
        let peers = parse_compact_peers(&response[20..]);

        debug!(tracker = %self.addr, peers = peers.len(), "udp announce complete");

        Ok(AnnounceResponse {
            interval,
            seeders,
            leechers,
            peers,
        })
    }

    /// Sends one datagram and waits for the reply, bounded by the receive
    /// deadline.
    async fn round_trip(&self, request: &[u8], min_len: usize) -> Result<Vec<u8>, TrackerError> {
        self.socket.send(request).await?;

        let mut buf = vec![0u8; 2048];
        match timeout(RECEIVE_TIMEOUT, self.socket.recv(&mut buf)).await {
            Ok(Ok(n)) if n >= min_len => Ok(buf[..n].to_vec()),
            Ok(Ok(_)) => Err(TrackerError::InvalidResponse("datagram too short".into())),
            Ok(Err(err)) => Err(TrackerError::Io(err)),
            Err(_) => Err(TrackerError::Timeout),
        }
    }
}

async fn resolve_udp_url(url: &str) -> Result<SocketAddr, TrackerError> {
    let rest = url
        .strip_prefix("udp://")
        .ok_or_else(|| TrackerError::InvalidUrl(url.to_string()))?;

    let authority = rest.split('/').next().unwrap_or(rest);

    lookup_host(authority)
        .await
        .map_err(|_| TrackerError::InvalidUrl(url.to_string()))?
        .next()
        .ok_or_else(|| TrackerError::InvalidUrl(url.to_string()))
}
