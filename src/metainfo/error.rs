use crate::bencode::BencodeError;
use thiserror::Error;

/// Errors raised while reading, mutating, or writing a metainfo file.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    /// The decoded file's top level is not a dictionary.
    #[error("metainfo root is not a dictionary")]
    NotADictionary,

    /// `piece length` is missing, zero, or negative.
    #[error("piece length must be a positive integer")]
    InvalidPieceLength,

    /// The `info` dictionary is absent, so no info-hash exists.
    #[error("missing info dictionary")]
    MissingInfo,

    /// A file path could not be represented as torrent path segments.
    #[error("invalid file path: {0}")]
    InvalidPath(String),
}
