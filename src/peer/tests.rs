use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::*;
use crate::metainfo::InfoHash;

#[test]
fn peer_id_shape() {
    let id = PeerId::generate();

    assert_eq!(&id.as_bytes()[..8], b"-RB0001-");
    assert!(id.as_bytes()[8..]
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
    assert_eq!(id.client_id(), Some("RB0001"));

    assert_ne!(PeerId::generate().0, PeerId::generate().0);
}

#[test]
fn bitfield_bit_order_is_msb_first() {
    let mut bf = Bitfield::new();
    bf.add_piece(0);
    assert_eq!(bf.as_bytes(), &[0b1000_0000]);

    bf.add_piece(7);
    assert_eq!(bf.as_bytes(), &[0b1000_0001]);
}

#[test]
fn bitfield_grows_and_never_shrinks() {
    let mut bf = Bitfield::new();
    assert!(bf.as_bytes().is_empty());

    bf.add_piece(17);
    assert_eq!(bf.as_bytes().len(), 3);
    assert!(bf.has(17));

    bf.remove_piece(17);
    assert_eq!(bf.as_bytes().len(), 3);
    assert!(!bf.has(17));
}

#[test]
fn bitfield_out_of_range_behavior() {
    let mut bf = Bitfield::from_bytes(Bytes::from_static(&[0x80]));

    assert!(bf.has(0));
    assert!(!bf.has(8));
    assert!(!bf.has(1000));

    // Clearing past the end does nothing.
    bf.remove_piece(1000);
    assert_eq!(bf.as_bytes(), &[0x80]);
}

#[test]
fn bitfield_enumerates_pieces() {
    let mut bf = Bitfield::from_bytes(Bytes::from_static(&[0b1010_0000]));
    bf.add_piece(9);

    assert_eq!(bf.pieces(), vec![0, 2, 9]);
    assert_eq!(bf.count(), 3);
    assert!(!bf.is_empty());
}

#[test]
fn handshake_roundtrip() {
    let handshake = Handshake::new([1u8; 20], [2u8; 20]);
    let encoded = handshake.encode();
    assert_eq!(encoded.len(), HANDSHAKE_LEN);
    assert_eq!(encoded[0], 19);
    assert_eq!(&encoded[1..20], PROTOCOL);

    let decoded = Handshake::decode(&encoded).unwrap();
    assert_eq!(decoded, handshake);
}

#[test]
fn handshake_rejects_garbage() {
    assert!(matches!(
        Handshake::decode(&[0u8; 10]),
        Err(PeerError::InvalidHandshake)
    ));

    let mut bad = Handshake::new([1u8; 20], [2u8; 20]).encode().to_vec();
    bad[1] = b'X';
    assert!(matches!(
        Handshake::decode(&bad),
        Err(PeerError::InvalidHandshake)
    ));
}

#[test]
fn message_roundtrips() {
    let messages = vec![
        Message::KeepAlive,
        Message::Choke,
        Message::Unchoke,
        Message::Interested,
        Message::NotInterested,
        Message::Have { piece: 42 },
        Message::Bitfield(Bytes::from_static(&[0xA0, 0x01])),
        Message::Request {
            index: 1,
            begin: 16384,
            length: 16384,
        },
        Message::Piece {
            index: 3,
            begin: 0,
            data: Bytes::from_static(b"block bytes"),
        },
        Message::Cancel {
            index: 1,
            begin: 16384,
            length: 16384,
        },
        Message::Port(6881),
        Message::Unknown {
            id: 42,
            payload: Bytes::from_static(b"future"),
        },
    ];

    for message in messages {
        let decoded = Message::decode(message.encode()).unwrap();
        assert_eq!(decoded, message);
    }
}

#[test]
fn keepalive_is_a_zero_length_frame() {
    assert_eq!(&Message::KeepAlive.encode()[..], [0, 0, 0, 0]);
    assert_eq!(
        Message::decode(Bytes::from_static(&[0, 0, 0, 0])).unwrap(),
        Message::KeepAlive
    );
}

#[test]
fn message_kinds_map_to_wire_ids() {
    assert_eq!(Message::Choke.kind(), Some(MessageKind::Choke));
    assert_eq!(Message::Port(1).kind(), Some(MessageKind::Port));
    assert_eq!(Message::KeepAlive.kind(), None);
    assert_eq!(
        Message::Unknown {
            id: 99,
            payload: Bytes::new()
        }
        .kind(),
        None
    );
    assert_eq!(MessageKind::from_id(9), Some(MessageKind::Port));
    assert_eq!(MessageKind::from_id(10), None);
}

#[test]
fn short_bodies_are_rejected() {
    // A have frame whose body holds two bytes instead of four.
    let frame = Bytes::from_static(&[0, 0, 0, 3, 4, 0, 0]);
    assert!(matches!(
        Message::decode(frame),
        Err(PeerError::InvalidMessage(_))
    ));

    // Frame length prefix promising more than is present.
    let truncated = Bytes::from_static(&[0, 0, 0, 5, 4]);
    assert!(matches!(
        Message::decode(truncated),
        Err(PeerError::InvalidMessage(_))
    ));
}

const INFO_HASH: [u8; 20] = [7u8; 20];

/// Accepts one connection and answers the handshake with `info_hash`.
async fn accept_with_handshake(listener: TcpListener, info_hash: [u8; 20]) -> TcpStream {
    let (mut stream, _) = listener.accept().await.unwrap();

    let mut buf = [0u8; HANDSHAKE_LEN];
    stream.read_exact(&mut buf).await.unwrap();
    let theirs = Handshake::decode(&buf).unwrap();
    assert_eq!(theirs.info_hash, INFO_HASH);

    let reply = Handshake::new(info_hash, [9u8; 20]);
    stream.write_all(&reply.encode()).await.unwrap();
    stream
}

async fn connect_pair() -> (PeerSession, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(accept_with_handshake(listener, INFO_HASH));
    let session = PeerSession::connect(addr, InfoHash::from_bytes(INFO_HASH), PeerId::generate())
        .await
        .unwrap();

    (session, server.await.unwrap())
}

#[tokio::test]
async fn handshake_mismatch_fails_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(accept_with_handshake(listener, [8u8; 20]));

    let result =
        PeerSession::connect(addr, InfoHash::from_bytes(INFO_HASH), PeerId::generate()).await;
    assert!(matches!(result, Err(PeerError::InfoHashMismatch)));

    drop(server);
}

#[tokio::test]
async fn dispatch_loop_fires_handlers_in_receive_order() {
    let (mut session, mut remote) = connect_pair().await;
    assert_eq!(session.remote_peer_id().as_bytes(), &[9u8; 20]);

    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let keepalives = Arc::new(AtomicUsize::new(0));

    let l = log.clone();
    session.on(EventKind::Handshake, move |event| {
        if let Event::Handshake(handshake) = event {
            assert_eq!(handshake.peer_id, [9u8; 20]);
            l.lock().unwrap().push("handshake".into());
        }
    });

    let l = log.clone();
    session.on(EventKind::Message, move |event| {
        if let Event::Message(message) = event {
            l.lock().unwrap().push(format!("msg:{:?}", message.kind()));
        }
    });

    let l = log.clone();
    session.on(EventKind::Have, move |event| {
        if let Event::Message(Message::Have { piece }) = event {
            l.lock().unwrap().push(format!("have:{}", piece));
        }
    });

    let k = keepalives.clone();
    session.on(EventKind::KeepAlive, move |_| {
        k.fetch_add(1, Ordering::SeqCst);
    });

    // bitfield, have, unchoke, keep-alive, unknown id, then EOF.
    remote
        .write_all(&Message::Bitfield(Bytes::from_static(&[0b1010_0000])).encode())
        .await
        .unwrap();
    remote
        .write_all(&Message::Have { piece: 5 }.encode())
        .await
        .unwrap();
    remote.write_all(&Message::Unchoke.encode()).await.unwrap();
    remote.write_all(&[0, 0, 0, 0]).await.unwrap();
    remote
        .write_all(
            &Message::Unknown {
                id: 42,
                payload: Bytes::from_static(b"xyz"),
            }
            .encode(),
        )
        .await
        .unwrap();
    drop(remote);

    // EOF ends the loop cleanly.
    session.run().await.unwrap();
    assert!(!session.is_open());

    let entries = log.lock().unwrap().clone();
    assert_eq!(
        entries,
        vec![
            "handshake".to_string(),
            "msg:Some(Bitfield)".to_string(),
            "msg:Some(Have)".to_string(),
            "have:5".to_string(),
            "msg:Some(Unchoke)".to_string(),
            "msg:None".to_string(), // unknown id reaches only the generic handler
        ]
    );

    // The keep-alive fired its own event exactly once and nothing else.
    assert_eq!(keepalives.load(Ordering::SeqCst), 1);

    // State transitions applied while dispatching.
    assert!(!session.state().client_choked);
    assert_eq!(session.bitfield().pieces(), vec![0, 2, 5]);
}

#[tokio::test]
async fn bitfield_message_replaces_tracked_bitfield() {
    let (mut session, mut remote) = connect_pair().await;

    remote
        .write_all(&Message::Have { piece: 31 }.encode())
        .await
        .unwrap();
    remote
        .write_all(&Message::Bitfield(Bytes::from_static(&[0x80])).encode())
        .await
        .unwrap();
    drop(remote);

    session.run().await.unwrap();

    // The bitfield frame replaced the have-grown state wholesale.
    assert_eq!(session.bitfield().pieces(), vec![0]);
}

#[tokio::test]
async fn receive_state_transitions() {
    let (mut session, mut remote) = connect_pair().await;
    assert!(session.state().client_choked);
    assert!(!session.state().peer_interested);

    remote.write_all(&Message::Unchoke.encode()).await.unwrap();
    remote
        .write_all(&Message::Interested.encode())
        .await
        .unwrap();
    remote.write_all(&Message::Choke.encode()).await.unwrap();
    remote
        .write_all(&Message::NotInterested.encode())
        .await
        .unwrap();
    drop(remote);

    session.run().await.unwrap();

    // The last transition of each pair wins.
    assert!(session.state().client_choked);
    assert!(!session.state().peer_interested);
}

#[tokio::test]
async fn send_state_transitions_and_close() {
    let (mut session, mut remote) = connect_pair().await;

    session.send_unchoke().await.unwrap();
    assert!(!session.state().peer_choked);

    session.send_interested().await.unwrap();
    assert!(session.state().client_interested);

    session.send_choke().await.unwrap();
    assert!(session.state().peer_choked);

    session.send_not_interested().await.unwrap();
    assert!(!session.state().client_interested);

    let mut frames = vec![0u8; 4 * 5];
    remote.read_exact(&mut frames).await.unwrap();

    session.close();
    assert!(!session.is_open());
    assert!(matches!(
        session.send_have(1).await,
        Err(PeerError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn malformed_frame_fails_the_session() {
    let (mut session, mut remote) = connect_pair().await;

    // A have frame with a two-byte body.
    remote.write_all(&[0, 0, 0, 3, 4, 0, 0]).await.unwrap();

    let result = session.run().await;
    assert!(matches!(result, Err(PeerError::InvalidMessage(_))));
    assert!(!session.is_open());

    drop(remote);
}

#[tokio::test]
async fn idle_poll_emits_keepalive() {
    let (mut session, mut remote) = connect_pair().await;
    session.set_timings(Duration::from_millis(20), Duration::from_millis(50));
    session.backdate_last_send(Duration::from_millis(200));

    let server = tokio::spawn(async move {
        // The only bytes the idle session writes are one keep-alive frame.
        let mut frame = [0u8; 4];
        remote.read_exact(&mut frame).await.unwrap();
        assert_eq!(frame, [0, 0, 0, 0]);
        drop(remote);
    });

    session.run().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn handlers_can_queue_outbound_messages() {
    let (mut session, mut remote) = connect_pair().await;

    let sender = session.sender();
    session.on(EventKind::Have, move |_| {
        sender.send(Message::Interested).unwrap();
    });

    let server = tokio::spawn(async move {
        remote
            .write_all(&Message::Have { piece: 0 }.encode())
            .await
            .unwrap();

        // Block until the queued reply arrives, then hang up.
        let mut frame = [0u8; 5];
        remote.read_exact(&mut frame).await.unwrap();
        assert_eq!(frame, [0, 0, 0, 1, 2]);
        drop(remote);
    });

    session.run().await.unwrap();
    server.await.unwrap();

    assert!(session.state().client_interested);
}
