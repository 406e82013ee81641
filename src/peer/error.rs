use thiserror::Error;

/// Errors that can occur during peer communication.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Network I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote sent bytes that are not a BitTorrent handshake.
    #[error("invalid handshake")]
    InvalidHandshake,

    /// The remote's handshake names a different torrent.
    #[error("info hash mismatch")]
    InfoHashMismatch,

    /// A frame's body is too short for its message id.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The connection is closed; no further I/O is possible.
    #[error("connection closed")]
    ConnectionClosed,

    /// Connecting to the peer timed out.
    #[error("timeout")]
    Timeout,
}
