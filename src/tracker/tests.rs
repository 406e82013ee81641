use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::net::UdpSocket;

use super::http::{build_announce_url, parse_response};
use super::*;
use crate::metainfo::InfoHash;
use crate::peer::PeerId;

fn test_info_hash() -> InfoHash {
    InfoHash::from_bytes([0xAB; 20])
}

#[test]
fn client_rejects_unknown_scheme() {
    let result = TrackerClient::new("ftp://tracker.example.com/announce", test_info_hash());
    assert!(matches!(result, Err(TrackerError::UnsupportedScheme(s)) if s == "ftp"));
}

#[test]
fn client_accepts_known_schemes() {
    for url in [
        "http://tracker.example.com/announce",
        "https://tracker.example.com/announce",
        "udp://tracker.example.com:6969/announce",
    ] {
        assert!(TrackerClient::new(url, test_info_hash()).is_ok());
    }
}

#[test]
fn client_peer_id_has_prefix_and_alphabet() {
    let client = TrackerClient::new("udp://t.example:6969", test_info_hash()).unwrap();
    let id = client.peer_id().as_bytes();

    assert_eq!(&id[..8], b"-RB0001-");
    assert!(id[8..]
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
}

#[test]
fn event_spellings() {
    assert_eq!(TrackerEvent::Stopped.as_str(), "stopped");
    assert_eq!(TrackerEvent::None.as_str(), "");

    // The legacy misspelling parses; the canonical form is what we emit.
    assert_eq!("stoped".parse::<TrackerEvent>().unwrap(), TrackerEvent::Stopped);
    assert_eq!("stopped".parse::<TrackerEvent>().unwrap(), TrackerEvent::Stopped);
    assert_eq!("started".parse::<TrackerEvent>().unwrap(), TrackerEvent::Started);
    assert_eq!("".parse::<TrackerEvent>().unwrap(), TrackerEvent::None);
    assert!(matches!(
        "bogus".parse::<TrackerEvent>(),
        Err(TrackerError::UnknownEvent(name)) if name == "bogus"
    ));
}

#[test]
fn event_udp_ids() {
    assert_eq!(TrackerEvent::None.as_udp_id(), 0);
    assert_eq!(TrackerEvent::Completed.as_udp_id(), 1);
    assert_eq!(TrackerEvent::Started.as_udp_id(), 2);
    assert_eq!(TrackerEvent::Stopped.as_udp_id(), 3);
}

#[test]
fn compact_peer_records() {
    let data = [0xC0, 0xA8, 0x01, 0x01, 0x1A, 0xE1, 10, 0, 0, 1, 0x00, 0x50];
    let peers = parse_compact_peers(&data);

    assert_eq!(peers.len(), 2);
    assert_eq!(
        peers[0].addr,
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)), 6881)
    );
    assert_eq!(peers[1].addr.port(), 80);
    assert!(peers[0].peer_id.is_none());

    // A trailing partial record is dropped.
    assert_eq!(parse_compact_peers(&data[..8]).len(), 1);
}

#[test]
fn announce_url_carries_required_parameters() {
    let request = AnnounceRequest::default();
    let peer_id = PeerId::generate();
    let url = build_announce_url(
        "http://t.example/announce",
        &test_info_hash(),
        &peer_id,
        &request,
    );

    assert!(url.starts_with("http://t.example/announce?info_hash="));
    // 0xAB is not form-safe, so all twenty bytes percent-encode.
    assert!(url.contains(&"%AB".repeat(20)));
    assert!(url.contains("&port=6881"));
    assert!(url.contains("&uploaded=0"));
    assert!(url.contains("&downloaded=0"));
    assert!(url.contains("&left=0"));
    assert!(url.contains("&compact=1"));
    assert!(!url.contains("&event="));
    assert!(!url.contains("&numwant="));
    assert!(!url.contains("&no_peer_id="));
}

#[test]
fn announce_url_optional_parameters() {
    let request = AnnounceRequest {
        event: TrackerEvent::Started,
        ip: Some(Ipv4Addr::new(10, 0, 0, 1)),
        numwant: Some(25),
        no_peer_id: true,
        key: Some(7),
        ..AnnounceRequest::default()
    };
    let url = build_announce_url(
        "http://t.example/announce",
        &test_info_hash(),
        &PeerId::generate(),
        &request,
    );

    assert!(url.contains("&event=started"));
    assert!(url.contains("&ip=10.0.0.1"));
    assert!(url.contains("&numwant=25"));
    assert!(url.contains("&no_peer_id=1"));
    assert!(url.contains("&key=7"));
}

#[test]
fn response_parsing_maps_counts_and_compact_peers() {
    let body =
        b"d8:completei10e10:incompletei5e8:intervali1800e5:peers6:\xC0\xA8\x01\x01\x1A\xE1e";
    let response = parse_response(body).unwrap();

    assert_eq!(response.interval, 1800);
    // `complete` is surfaced as leechers, `incomplete` as seeders.
    assert_eq!(response.leechers, 10);
    assert_eq!(response.seeders, 5);
    assert_eq!(response.peers.len(), 1);
    assert_eq!(response.peers[0].addr.port(), 6881);
}

#[test]
fn response_parsing_dictionary_peers() {
    let body = b"d8:intervali60e5:peersld2:ip9:127.0.0.17:peer id20:AAAAAAAAAAAAAAAAAAAA4:porti6882eeee";
    let response = parse_response(body).unwrap();

    assert_eq!(response.peers.len(), 1);
    assert_eq!(
        response.peers[0].addr,
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 6882)
    );
    assert_eq!(response.peers[0].peer_id, Some(*b"AAAAAAAAAAAAAAAAAAAA"));
}

#[test]
fn response_parsing_failure_reason() {
    let body = b"d14:failure reason13:not availablee";
    assert!(matches!(
        parse_response(body),
        Err(TrackerError::Failure(reason)) if reason == "not available"
    ));
}

#[test]
fn response_parsing_requires_interval() {
    assert!(matches!(
        parse_response(b"d5:peers0:e"),
        Err(TrackerError::InvalidResponse(_))
    ));
}

/// Binds a mock tracker socket on loopback.
async fn mock_tracker() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

/// Answers one connect exchange and returns the peer's address.
async fn serve_connect(socket: &UdpSocket, connection_id: u64) -> SocketAddr {
    let mut buf = [0u8; 1024];
    let (n, from) = socket.recv_from(&mut buf).await.unwrap();
    assert_eq!(n, 16);
    assert_eq!(&buf[..8], &0x41727101980u64.to_be_bytes());
    assert_eq!(&buf[8..12], &0u32.to_be_bytes());

    let mut reply = Vec::with_capacity(16);
    reply.extend_from_slice(&0u32.to_be_bytes());
    reply.extend_from_slice(&buf[12..16]); // echo transaction id
    reply.extend_from_slice(&connection_id.to_be_bytes());
    socket.send_to(&reply, from).await.unwrap();
    from
}

#[tokio::test]
async fn udp_announce_round_trip() {
    let (socket, addr) = mock_tracker().await;
    let info_hash = test_info_hash();
    let connection_id = 0x1122334455667788u64;

    let server = tokio::spawn(async move {
        let from = serve_connect(&socket, connection_id).await;

        let mut buf = [0u8; 1024];
        let (n, _) = socket.recv_from(&mut buf).await.unwrap();
        assert_eq!(n, 98);
        assert_eq!(&buf[..8], &connection_id.to_be_bytes());
        assert_eq!(&buf[8..12], &1u32.to_be_bytes()); // announce action
        assert_eq!(&buf[16..36], &[0xAB; 20]); // info hash
        assert_eq!(&buf[36..44], b"-RB0001-"); // peer id prefix
        assert_eq!(&buf[80..84], &2u32.to_be_bytes()); // started event
        assert_eq!(&buf[88..92], &0xDEADBEEFu32.to_be_bytes()); // key
        assert_eq!(&buf[92..96], &50i32.to_be_bytes()); // numwant
        assert_eq!(&buf[96..98], &6881u16.to_be_bytes());

        let mut reply = Vec::new();
        reply.extend_from_slice(&1u32.to_be_bytes());
        reply.extend_from_slice(&buf[12..16]); // echo transaction id
        reply.extend_from_slice(&30u32.to_be_bytes()); // interval
        reply.extend_from_slice(&5u32.to_be_bytes()); // leechers
        reply.extend_from_slice(&10u32.to_be_bytes()); // seeders
        reply.extend_from_slice(&[0xC0, 0xA8, 0x01, 0x01, 0x1A, 0xE1]);
        socket.send_to(&reply, from).await.unwrap();
    });

    let client = TrackerClient::new(&format!("udp://{}", addr), info_hash).unwrap();
    let response = client
        .announce(&AnnounceRequest {
            event: TrackerEvent::Started,
            key: Some(0xDEADBEEF),
            numwant: Some(50),
            ..AnnounceRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(response.interval, 30);
    assert_eq!(response.leechers, 5);
    assert_eq!(response.seeders, 10);
    assert_eq!(response.peers.len(), 1);
    assert_eq!(
        response.peers[0].addr,
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)), 6881)
    );

    server.await.unwrap();
}

#[tokio::test]
async fn udp_connect_transaction_mismatch_aborts() {
    let (socket, addr) = mock_tracker().await;

    let server = tokio::spawn(async move {
        let mut buf = [0u8; 1024];
        let (_, from) = socket.recv_from(&mut buf).await.unwrap();

        let sent = u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]);
        let mut reply = Vec::with_capacity(16);
        reply.extend_from_slice(&0u32.to_be_bytes());
        reply.extend_from_slice(&sent.wrapping_add(1).to_be_bytes());
        reply.extend_from_slice(&99u64.to_be_bytes());
        socket.send_to(&reply, from).await.unwrap();
    });

    // The connect exchange fails, so no announce packet is ever sent.
    let result = UdpTracker::connect(&format!("udp://{}", addr)).await;
    assert!(matches!(
        result,
        Err(TrackerError::InvalidResponse(msg)) if msg.contains("transaction id")
    ));

    server.await.unwrap();
}

#[tokio::test]
async fn udp_error_action_surfaces_message() {
    let (socket, addr) = mock_tracker().await;

    let server = tokio::spawn(async move {
        let from = serve_connect(&socket, 7).await;

        let mut buf = [0u8; 1024];
        let (_, _) = socket.recv_from(&mut buf).await.unwrap();

        let mut reply = Vec::new();
        reply.extend_from_slice(&3u32.to_be_bytes());
        reply.extend_from_slice(&buf[12..16]);
        reply.extend_from_slice(b"torrent not registered\0garbage");
        socket.send_to(&reply, from).await.unwrap();
    });

    let mut tracker = UdpTracker::connect(&format!("udp://{}", addr)).await.unwrap();
    let result = tracker
        .announce(
            &test_info_hash(),
            &PeerId::generate(),
            &AnnounceRequest::default(),
        )
        .await;

    assert!(matches!(
        result,
        Err(TrackerError::Failure(msg)) if msg == "torrent not registered"
    ));

    server.await.unwrap();
}

#[tokio::test]
async fn udp_announce_rejects_ragged_peer_list() {
    let (socket, addr) = mock_tracker().await;

    let server = tokio::spawn(async move {
        let from = serve_connect(&socket, 7).await;

        let mut buf = [0u8; 1024];
        let (_, _) = socket.recv_from(&mut buf).await.unwrap();

        let mut reply = Vec::new();
        reply.extend_from_slice(&1u32.to_be_bytes());
        reply.extend_from_slice(&buf[12..16]);
        reply.extend_from_slice(&30u32.to_be_bytes());
        reply.extend_from_slice(&0u32.to_be_bytes());
        reply.extend_from_slice(&0u32.to_be_bytes());
        reply.extend_from_slice(&[0xC0, 0xA8, 0x01]); // half a record
        socket.send_to(&reply, from).await.unwrap();
    });

    let mut tracker = UdpTracker::connect(&format!("udp://{}", addr)).await.unwrap();
    let result = tracker
        .announce(
            &test_info_hash(),
            &PeerId::generate(),
            &AnnounceRequest::default(),
        )
        .await;

    assert!(matches!(result, Err(TrackerError::InvalidResponse(_))));

    server.await.unwrap();
}
