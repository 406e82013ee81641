use thiserror::Error;

/// Errors that can occur while decoding bencode.
///
/// # Examples
///
/// ```
/// use bitwire::bencode::{decode, BencodeError};
///
/// assert!(matches!(decode(b"i42"), Err(BencodeError::UnexpectedEof)));
/// assert!(matches!(decode(b"i007e"), Err(BencodeError::InvalidInteger(_))));
/// assert!(matches!(decode(b"i42eextra"), Err(BencodeError::TrailingData)));
/// ```
#[derive(Debug, Error)]
pub enum BencodeError {
    /// Input ended inside a value.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Integer body is empty, zero-padded, negative zero, or non-numeric.
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Byte-string length prefix is not a valid number.
    #[error("invalid string length")]
    InvalidStringLength,

    /// A byte that starts no production appeared where a value or key was
    /// expected.
    #[error("unexpected character: {0}")]
    UnexpectedChar(char),

    /// Bytes remain after the first complete value.
    #[error("trailing data after value")]
    TrailingData,

    /// Containers nested beyond the recursion limit.
    #[error("nesting too deep")]
    NestingTooDeep,
}
