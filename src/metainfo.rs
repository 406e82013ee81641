//! Torrent metainfo (BEP-3)
//!
//! A [`Metainfo`] is a mutable view over the decoded bencode dictionary
//! stored in a `.torrent` file. It exposes the recognized top-level keys,
//! hashes files into fixed-length piece digests, and computes the info-hash
//! that identifies the torrent.

mod error;
mod info_hash;
mod torrent;

pub use error::FileError;
pub use info_hash::InfoHash;
pub use torrent::{FileEntry, Metainfo, DEFAULT_PIECE_LENGTH};
