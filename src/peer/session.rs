use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, trace};

use super::bitfield::Bitfield;
use super::error::PeerError;
use super::message::{Handshake, Message, MessageKind, HANDSHAKE_LEN};
use super::peer_id::PeerId;
use crate::metainfo::InfoHash;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// The fixed set of events a handler can subscribe to.
///
/// `Message` fires for every non-keep-alive frame; the kind-specific events
/// fire in addition, after it. Keep-alive frames fire only `KeepAlive`, and
/// unrecognized message ids fire only `Message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Handshake,
    Message,
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have,
    Bitfield,
    Request,
    Piece,
    Cancel,
    Port,
}

impl From<MessageKind> for EventKind {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Choke => EventKind::Choke,
            MessageKind::Unchoke => EventKind::Unchoke,
            MessageKind::Interested => EventKind::Interested,
            MessageKind::NotInterested => EventKind::NotInterested,
            MessageKind::Have => EventKind::Have,
            MessageKind::Bitfield => EventKind::Bitfield,
            MessageKind::Request => EventKind::Request,
            MessageKind::Piece => EventKind::Piece,
            MessageKind::Cancel => EventKind::Cancel,
            MessageKind::Port => EventKind::Port,
        }
    }
}

/// Payload delivered to a registered handler.
#[derive(Debug, Clone)]
pub enum Event {
    /// The remote's parsed handshake; the first event of every session.
    Handshake(Handshake),
    /// A parsed wire message.
    Message(Message),
    /// A zero-length frame arrived.
    KeepAlive,
}

type Handler = Box<dyn FnMut(&Event) + Send>;

/// The four-way choke/interest state of one connection.
///
/// `client_*` is our view of the remote (are we choked, are we interested);
/// `peer_*` is the remote's view of us (have we choked them, are they
/// interested in us). A new connection starts choked and uninterested in
/// both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerState {
    /// The remote has choked us.
    pub client_choked: bool,
    /// We are interested in the remote's pieces.
    pub client_interested: bool,
    /// We have choked the remote.
    pub peer_choked: bool,
    /// The remote is interested in our pieces.
    pub peer_interested: bool,
}

impl Default for PeerState {
    fn default() -> Self {
        Self {
            client_choked: true,
            client_interested: false,
            peer_choked: true,
            peer_interested: false,
        }
    }
}

/// Cloneable handle that queues messages for the session's dispatch loop to
/// write.
///
/// Handlers run inside the loop and cannot await, so they enqueue through
/// one of these instead; the loop drains the queue between reads and applies
/// the same state transitions as a direct send.
#[derive(Debug, Clone)]
pub struct PeerSender {
    tx: mpsc::UnboundedSender<Message>,
}

impl PeerSender {
    /// Queues a message. Fails once the session is gone.
    pub fn send(&self, message: Message) -> Result<(), PeerError> {
        self.tx
            .send(message)
            .map_err(|_| PeerError::ConnectionClosed)
    }
}

/// One TCP connection to a remote peer.
///
/// Connecting performs the handshake and verifies the info-hash; the
/// [`run`](PeerSession::run) loop then frames inbound messages, applies
/// state transitions, and fires registered handlers until the remote closes
/// the connection.
///
/// # Examples
///
/// ```no_run
/// use bitwire::peer::{Event, EventKind, PeerId, PeerSession};
/// use bitwire::metainfo::InfoHash;
///
/// # async fn example() -> Result<(), bitwire::peer::PeerError> {
/// let info_hash = InfoHash::from_bytes([0u8; 20]);
/// let mut session =
///     PeerSession::connect("127.0.0.1:6881".parse().unwrap(), info_hash, PeerId::generate())
///         .await?;
///
/// session.on(EventKind::Have, |event| {
///     if let Event::Message(msg) = event {
///         println!("peer announced {:?}", msg);
///     }
/// });
///
/// session.send_interested().await?;
/// session.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct PeerSession {
    addr: SocketAddr,
    info_hash: InfoHash,
    local_peer_id: PeerId,
    remote_peer_id: PeerId,
    remote_handshake: Option<Handshake>,
    transport: Option<Transport>,
    state: PeerState,
    bitfield: Bitfield,
    handlers: HashMap<EventKind, Vec<Handler>>,
    outbound_tx: mpsc::UnboundedSender<Message>,
    outbound_rx: mpsc::UnboundedReceiver<Message>,
    last_send: Instant,
    poll_interval: Duration,
    keepalive_interval: Duration,
}

enum Step {
    Queued(Option<Message>),
    Inbound(Result<Result<Message, PeerError>, tokio::time::error::Elapsed>),
}

impl PeerSession {
    /// Opens a TCP connection and performs the handshake.
    ///
    /// # Errors
    ///
    /// [`PeerError::Timeout`] if the connect exceeds 5 seconds,
    /// [`PeerError::InfoHashMismatch`] if the remote handshake names another
    /// torrent, or any I/O or handshake-framing error.
    pub async fn connect(
        addr: SocketAddr,
        info_hash: InfoHash,
        peer_id: PeerId,
    ) -> Result<Self, PeerError> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| PeerError::Timeout)??;

        let mut transport = Transport::new(stream);

        let local = Handshake::new(*info_hash.as_bytes(), *peer_id.as_bytes());
        transport.write_all(&local.encode()).await?;

        let remote = transport.read_handshake().await?;
        if remote.info_hash != *info_hash.as_bytes() {
            return Err(PeerError::InfoHashMismatch);
        }

        debug!(peer = %addr, "peer handshake complete");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Ok(Self {
            addr,
            info_hash,
            local_peer_id: peer_id,
            remote_peer_id: PeerId(remote.peer_id),
            remote_handshake: Some(remote),
            transport: Some(transport),
            state: PeerState::default(),
            bitfield: Bitfield::new(),
            handlers: HashMap::new(),
            outbound_tx,
            outbound_rx,
            last_send: Instant::now(),
            poll_interval: POLL_INTERVAL,
            keepalive_interval: KEEPALIVE_INTERVAL,
        })
    }

    /// Registers a handler for `event`.
    ///
    /// Handlers for the same event fire in registration order, on the
    /// dispatch loop's task.
    pub fn on<F>(&mut self, event: EventKind, handler: F)
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.handlers
            .entry(event)
            .or_default()
            .push(Box::new(handler));
    }

    /// A queued sender usable from handlers or other tasks.
    pub fn sender(&self) -> PeerSender {
        PeerSender {
            tx: self.outbound_tx.clone(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    /// The peer id the remote sent in its handshake.
    pub fn remote_peer_id(&self) -> PeerId {
        self.remote_peer_id
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    /// The pieces the remote has claimed so far.
    pub fn bitfield(&self) -> &Bitfield {
        &self.bitfield
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Releases the socket. Subsequent sends fail with
    /// [`PeerError::ConnectionClosed`].
    pub fn close(&mut self) {
        self.transport = None;
    }

    /// Writes a message and applies its outbound state transition.
    pub async fn send(&mut self, message: Message) -> Result<(), PeerError> {
        let transport = self
            .transport
            .as_mut()
            .ok_or(PeerError::ConnectionClosed)?;

        transport.write_all(&message.encode()).await?;
        self.last_send = Instant::now();

        match &message {
            Message::Choke => self.state.peer_choked = true,
            Message::Unchoke => self.state.peer_choked = false,
            Message::Interested => self.state.client_interested = true,
            Message::NotInterested => self.state.client_interested = false,
            _ => {}
        }

        Ok(())
    }

    pub async fn send_keep_alive(&mut self) -> Result<(), PeerError> {
        self.send(Message::KeepAlive).await
    }

    pub async fn send_choke(&mut self) -> Result<(), PeerError> {
        self.send(Message::Choke).await
    }

    pub async fn send_unchoke(&mut self) -> Result<(), PeerError> {
        self.send(Message::Unchoke).await
    }

    pub async fn send_interested(&mut self) -> Result<(), PeerError> {
        self.send(Message::Interested).await
    }

    pub async fn send_not_interested(&mut self) -> Result<(), PeerError> {
        self.send(Message::NotInterested).await
    }

    pub async fn send_have(&mut self, piece: u32) -> Result<(), PeerError> {
        self.send(Message::Have { piece }).await
    }

    pub async fn send_bitfield(&mut self, bitfield: &Bitfield) -> Result<(), PeerError> {
        self.send(Message::Bitfield(bitfield.to_bytes())).await
    }

    pub async fn send_request(
        &mut self,
        index: u32,
        begin: u32,
        length: u32,
    ) -> Result<(), PeerError> {
        self.send(Message::Request {
            index,
            begin,
            length,
        })
        .await
    }

    pub async fn send_piece(
        &mut self,
        index: u32,
        begin: u32,
        data: bytes::Bytes,
    ) -> Result<(), PeerError> {
        self.send(Message::Piece { index, begin, data }).await
    }

    pub async fn send_cancel(
        &mut self,
        index: u32,
        begin: u32,
        length: u32,
    ) -> Result<(), PeerError> {
        self.send(Message::Cancel {
            index,
            begin,
            length,
        })
        .await
    }

    pub async fn send_port(&mut self, port: u16) -> Result<(), PeerError> {
        self.send(Message::Port(port)).await
    }

    /// Runs the dispatch loop until the remote closes the connection.
    ///
    /// The loop delivers the handshake event, then alternates between
    /// draining queued outbound messages and reading inbound frames under a
    /// short poll. A poll that expires with the last write more than the
    /// keep-alive interval ago emits one keep-alive frame.
    ///
    /// End-of-stream and I/O failures end the loop with `Ok`; a malformed
    /// frame closes the connection and returns the error.
    pub async fn run(&mut self) -> Result<(), PeerError> {
        if let Some(handshake) = self.remote_handshake.take() {
            self.emit(EventKind::Handshake, &Event::Handshake(handshake));
        }

        loop {
            let poll = self.poll_interval;
            let step = {
                let Some(transport) = self.transport.as_mut() else {
                    return Ok(());
                };
                let queue = &mut self.outbound_rx;
                tokio::select! {
                    queued = queue.recv() => Step::Queued(queued),
                    inbound = timeout(poll, transport.read_frame()) => Step::Inbound(inbound),
                }
            };

            match step {
                Step::Queued(Some(message)) => self.send(message).await?,
                // The session holds a sender, so the queue cannot close.
                Step::Queued(None) => {}
                Step::Inbound(Err(_elapsed)) => {
                    if self.last_send.elapsed() >= self.keepalive_interval {
                        trace!(peer = %self.addr, "emitting keep-alive");
                        self.send(Message::KeepAlive).await?;
                    }
                }
                Step::Inbound(Ok(Ok(message))) => self.handle_frame(message),
                Step::Inbound(Ok(Err(PeerError::ConnectionClosed)))
                | Step::Inbound(Ok(Err(PeerError::Io(_)))) => {
                    debug!(peer = %self.addr, "peer connection ended");
                    self.close();
                    return Ok(());
                }
                Step::Inbound(Ok(Err(err))) => {
                    self.close();
                    return Err(err);
                }
            }
        }
    }

    fn handle_frame(&mut self, message: Message) {
        trace!(peer = %self.addr, message = ?message.kind(), "frame received");

        match &message {
            Message::KeepAlive => {
                self.emit(EventKind::KeepAlive, &Event::KeepAlive);
                return;
            }
            Message::Choke => self.state.client_choked = true,
            Message::Unchoke => self.state.client_choked = false,
            Message::Interested => self.state.peer_interested = true,
            Message::NotInterested => self.state.peer_interested = false,
            Message::Have { piece } => self.bitfield.add_piece(*piece as usize),
            Message::Bitfield(bits) => self.bitfield = Bitfield::from_bytes(bits.clone()),
            _ => {}
        }

        let kind = message.kind().map(EventKind::from);
        let event = Event::Message(message);
        self.emit(EventKind::Message, &event);
        if let Some(kind) = kind {
            self.emit(kind, &event);
        }
    }

    fn emit(&mut self, kind: EventKind, event: &Event) {
        if let Some(handlers) = self.handlers.get_mut(&kind) {
            for handler in handlers.iter_mut() {
                handler(event);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn set_timings(&mut self, poll: Duration, keepalive: Duration) {
        self.poll_interval = poll;
        self.keepalive_interval = keepalive;
    }

    #[cfg(test)]
    pub(crate) fn backdate_last_send(&mut self, ago: Duration) {
        self.last_send = Instant::now() - ago;
    }
}

/// Socket plus read buffer. Partially read frames stay in the buffer, so a
/// cancelled read (the 1-second poll) never corrupts framing.
struct Transport {
    stream: TcpStream,
    read_buf: BytesMut,
}

impl Transport {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(32 * 1024),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), PeerError> {
        self.stream.write_all(data).await?;
        Ok(())
    }

    async fn fill(&mut self) -> Result<(), PeerError> {
        let n = self.stream.read_buf(&mut self.read_buf).await?;
        if n == 0 {
            return Err(PeerError::ConnectionClosed);
        }
        Ok(())
    }

    async fn read_handshake(&mut self) -> Result<Handshake, PeerError> {
        while self.read_buf.len() < HANDSHAKE_LEN {
            self.fill().await?;
        }

        let data = self.read_buf.split_to(HANDSHAKE_LEN);
        Handshake::decode(&data)
    }

    async fn read_frame(&mut self) -> Result<Message, PeerError> {
        while self.read_buf.len() < 4 {
            self.fill().await?;
        }

        let length = u32::from_be_bytes([
            self.read_buf[0],
            self.read_buf[1],
            self.read_buf[2],
            self.read_buf[3],
        ]) as usize;

        if length > MAX_MESSAGE_SIZE {
            return Err(PeerError::InvalidMessage(format!(
                "frame too large: {}",
                length
            )));
        }

        let total = 4 + length;
        while self.read_buf.len() < total {
            self.fill().await?;
        }

        Message::decode(self.read_buf.split_to(total).freeze())
    }
}
