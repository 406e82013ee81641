use sha1::{Digest, Sha1};
use std::fmt;

/// A torrent's identity: the 20-byte SHA-1 of the canonical bencoding of
/// its `info` dictionary.
///
/// Two metainfo files that decode to the same `info` tree have the same
/// info-hash no matter how their dictionaries were ordered on disk, because
/// the hash is computed over the canonical re-encoding.
///
/// # Examples
///
/// ```
/// use bitwire::metainfo::InfoHash;
///
/// let hash = InfoHash::from_info_bytes(b"d6:lengthi0e4:name1:a12:piece lengthi16384e6:pieces0:e");
/// assert_eq!(hash.to_hex().len(), 40);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash(pub [u8; 20]);

impl InfoHash {
    /// Wraps raw hash bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Hashes a canonical bencoded `info` dictionary.
    pub fn from_info_bytes(info_bytes: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(info_bytes);
        Self(hasher.finalize().into())
    }

    /// Returns the raw 20 hash bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Formats the hash as 40 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        self.0.iter().fold(String::with_capacity(40), |mut s, b| {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
            s
        })
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
