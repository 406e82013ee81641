use thiserror::Error;

/// Errors raised while announcing to a tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The tracker answered with a non-success HTTP status.
    #[error("http status {0}")]
    HttpStatus(u16),

    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    /// The tracker reported a failure (`failure reason` key or UDP error
    /// action).
    #[error("tracker failure: {0}")]
    Failure(String),

    /// The response violates the protocol (bad action, transaction id, or
    /// layout).
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// No datagram arrived within the receive deadline.
    #[error("receiving timed out")]
    Timeout,

    /// The announce URL's scheme maps to no transport.
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// An event name outside the protocol's vocabulary.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}
