use super::error::PeerError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// The BitTorrent protocol identifier string.
pub const PROTOCOL: &[u8] = b"BitTorrent protocol";
/// Length of the handshake in bytes: 1 + 19 + 8 + 20 + 20.
pub const HANDSHAKE_LEN: usize = 68;

/// The message ids of the base protocol.
///
/// Ids outside this set are not a protocol error; they decode to
/// [`Message::Unknown`] and reach only the generic message handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
    Port = 9,
}

impl MessageKind {
    /// Maps a wire id to a known message kind.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(MessageKind::Choke),
            1 => Some(MessageKind::Unchoke),
            2 => Some(MessageKind::Interested),
            3 => Some(MessageKind::NotInterested),
            4 => Some(MessageKind::Have),
            5 => Some(MessageKind::Bitfield),
            6 => Some(MessageKind::Request),
            7 => Some(MessageKind::Piece),
            8 => Some(MessageKind::Cancel),
            9 => Some(MessageKind::Port),
            _ => None,
        }
    }
}

/// The fixed 68-byte exchange that opens a peer connection.
///
/// Both sides send: protocol-string length (19), the ASCII protocol string,
/// 8 reserved bytes, the 20-byte info-hash, and the sender's 20-byte
/// peer-id. Agreement on the info-hash is what the handshake proves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
    pub reserved: [u8; 8],
}

impl Handshake {
    /// Creates a handshake with all reserved bits clear.
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Self {
            info_hash,
            peer_id,
            reserved: [0u8; 8],
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL.len() as u8);
        buf.put_slice(PROTOCOL);
        buf.put_slice(&self.reserved);
        buf.put_slice(&self.info_hash);
        buf.put_slice(&self.peer_id);
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self, PeerError> {
        if data.len() < HANDSHAKE_LEN {
            return Err(PeerError::InvalidHandshake);
        }

        if data[0] as usize != PROTOCOL.len() || &data[1..20] != PROTOCOL {
            return Err(PeerError::InvalidHandshake);
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&data[20..28]);

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&data[28..48]);

        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[48..68]);

        Ok(Self {
            info_hash,
            peer_id,
            reserved,
        })
    }
}

/// A peer wire message.
///
/// On the wire every message is a 4-byte big-endian length followed by that
/// many payload bytes; a zero length is a keep-alive, otherwise the first
/// payload byte is the message id.
///
/// # Examples
///
/// ```
/// use bitwire::peer::Message;
///
/// let request = Message::Request { index: 0, begin: 0, length: 16384 };
/// let bytes = request.encode();
/// assert_eq!(bytes.len(), 17); // 4-byte prefix + 1-byte id + 12-byte body
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Zero-length frame that keeps an idle connection open.
    KeepAlive,
    /// The sender will not answer requests.
    Choke,
    /// The sender will answer requests again.
    Unchoke,
    /// The sender wants data from us.
    Interested,
    /// The sender no longer wants data.
    NotInterested,
    /// The sender acquired a piece.
    Have { piece: u32 },
    /// All pieces the sender has, one bit per piece.
    Bitfield(Bytes),
    /// Ask for a block of a piece.
    Request { index: u32, begin: u32, length: u32 },
    /// A block of piece data.
    Piece { index: u32, begin: u32, data: Bytes },
    /// Withdraw a pending request.
    Cancel { index: u32, begin: u32, length: u32 },
    /// The sender's DHT port.
    Port(u16),
    /// A message id outside the base protocol, carried verbatim.
    Unknown { id: u8, payload: Bytes },
}

impl Message {
    /// The known kind of this message, if it has one.
    ///
    /// Keep-alives and unknown ids have no kind.
    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            Message::KeepAlive | Message::Unknown { .. } => None,
            Message::Choke => Some(MessageKind::Choke),
            Message::Unchoke => Some(MessageKind::Unchoke),
            Message::Interested => Some(MessageKind::Interested),
            Message::NotInterested => Some(MessageKind::NotInterested),
            Message::Have { .. } => Some(MessageKind::Have),
            Message::Bitfield(_) => Some(MessageKind::Bitfield),
            Message::Request { .. } => Some(MessageKind::Request),
            Message::Piece { .. } => Some(MessageKind::Piece),
            Message::Cancel { .. } => Some(MessageKind::Cancel),
            Message::Port(_) => Some(MessageKind::Port),
        }
    }

    /// Encodes the message as a length-prefixed frame.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        match self {
            Message::KeepAlive => buf.put_u32(0),
            Message::Choke => frame_header(&mut buf, MessageKind::Choke, 0),
            Message::Unchoke => frame_header(&mut buf, MessageKind::Unchoke, 0),
            Message::Interested => frame_header(&mut buf, MessageKind::Interested, 0),
            Message::NotInterested => frame_header(&mut buf, MessageKind::NotInterested, 0),
            Message::Have { piece } => {
                frame_header(&mut buf, MessageKind::Have, 4);
                buf.put_u32(*piece);
            }
            Message::Bitfield(bits) => {
                frame_header(&mut buf, MessageKind::Bitfield, bits.len());
                buf.put_slice(bits);
            }
            Message::Request {
                index,
                begin,
                length,
            } => {
                frame_header(&mut buf, MessageKind::Request, 12);
                buf.put_u32(*index);
                buf.put_u32(*begin);
                buf.put_u32(*length);
            }
            Message::Piece { index, begin, data } => {
                frame_header(&mut buf, MessageKind::Piece, 8 + data.len());
                buf.put_u32(*index);
                buf.put_u32(*begin);
                buf.put_slice(data);
            }
            Message::Cancel {
                index,
                begin,
                length,
            } => {
                frame_header(&mut buf, MessageKind::Cancel, 12);
                buf.put_u32(*index);
                buf.put_u32(*begin);
                buf.put_u32(*length);
            }
            Message::Port(port) => {
                frame_header(&mut buf, MessageKind::Port, 2);
                buf.put_u16(*port);
            }
            Message::Unknown { id, payload } => {
                buf.put_u32(1 + payload.len() as u32);
                buf.put_u8(*id);
                buf.put_slice(payload);
            }
        }

        buf.freeze()
    }

    /// Decodes one length-prefixed frame.
    ///
    /// # Errors
    ///
    /// [`PeerError::InvalidMessage`] when the frame is incomplete or the
    /// body is too short for its message id.
    pub fn decode(mut data: Bytes) -> Result<Self, PeerError> {
        if data.len() < 4 {
            return Err(PeerError::InvalidMessage("missing length prefix".into()));
        }

        let length = data.get_u32() as usize;

        if length == 0 {
            return Ok(Message::KeepAlive);
        }

        if data.remaining() < length {
            return Err(PeerError::InvalidMessage("incomplete frame".into()));
        }

        let id = data.get_u8();
        let body_len = length - 1;

        let Some(kind) = MessageKind::from_id(id) else {
            return Ok(Message::Unknown {
                id,
                payload: data.copy_to_bytes(body_len),
            });
        };

        match kind {
            MessageKind::Choke => Ok(Message::Choke),
            MessageKind::Unchoke => Ok(Message::Unchoke),
            MessageKind::Interested => Ok(Message::Interested),
            MessageKind::NotInterested => Ok(Message::NotInterested),
            MessageKind::Have => {
                require_body(body_len, 4, "have")?;
                Ok(Message::Have {
                    piece: data.get_u32(),
                })
            }
            MessageKind::Bitfield => Ok(Message::Bitfield(data.copy_to_bytes(body_len))),
            MessageKind::Request => {
                require_body(body_len, 12, "request")?;
                Ok(Message::Request {
                    index: data.get_u32(),
                    begin: data.get_u32(),
                    length: data.get_u32(),
                })
            }
            MessageKind::Piece => {
                require_body(body_len, 8, "piece")?;
                Ok(Message::Piece {
                    index: data.get_u32(),
                    begin: data.get_u32(),
                    data: data.copy_to_bytes(body_len - 8),
                })
            }
            MessageKind::Cancel => {
                require_body(body_len, 12, "cancel")?;
                Ok(Message::Cancel {
                    index: data.get_u32(),
                    begin: data.get_u32(),
                    length: data.get_u32(),
                })
            }
            MessageKind::Port => {
                require_body(body_len, 2, "port")?;
                Ok(Message::Port(data.get_u16()))
            }
        }
    }
}

fn frame_header(buf: &mut BytesMut, kind: MessageKind, body_len: usize) {
    buf.put_u32(1 + body_len as u32);
    buf.put_u8(kind as u8);
}

fn require_body(actual: usize, expected: usize, name: &str) -> Result<(), PeerError> {
    if actual < expected {
        return Err(PeerError::InvalidMessage(format!("{} too short", name)));
    }
    Ok(())
}
