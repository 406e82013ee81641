use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use sha1::{Digest, Sha1};

use super::error::FileError;
use super::info_hash::InfoHash;
use crate::bencode::{decode, encode, Value};

/// Default `piece length` for a freshly initialized metainfo (256 KiB).
pub const DEFAULT_PIECE_LENGTH: i64 = 262_144;

const ANNOUNCE: &[u8] = b"announce";
const COMMENT: &[u8] = b"comment";
const CREATION_DATE: &[u8] = b"creation date";
const INFO: &[u8] = b"info";
const NAME: &[u8] = b"name";
const LENGTH: &[u8] = b"length";
const FILES: &[u8] = b"files";
const PATH: &[u8] = b"path";
const PIECE_LENGTH: &[u8] = b"piece length";
const PIECES: &[u8] = b"pieces";

/// One file carried by a torrent, as torrent-relative path segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path segments relative to the torrent root.
    pub path: Vec<String>,
    /// File size in bytes.
    pub length: u64,
}

impl FileEntry {
    /// Joins the path segments with `/`, the form used to address a file in
    /// [`Metainfo::remove_file`].
    pub fn joined_path(&self) -> String {
        self.path.join("/")
    }
}

/// A mutable torrent metainfo document bound to a filesystem path.
///
/// Loading an existing `.torrent` file decodes it; loading a path that does
/// not exist yet initializes an empty document with default fields. All
/// mutations happen in memory until [`write`](Metainfo::write) serializes
/// the canonical bencoding back to the bound path.
///
/// # Examples
///
/// ```no_run
/// use bitwire::metainfo::Metainfo;
///
/// # fn main() -> Result<(), bitwire::metainfo::FileError> {
/// let mut meta = Metainfo::load("new.torrent")?;
/// meta.set_announce("http://tracker.example.com/announce");
/// meta.add_file("payload.bin")?;
/// println!("info hash: {}", meta.info_hash()?);
/// meta.write()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Metainfo {
    path: PathBuf,
    root: BTreeMap<Bytes, Value>,
}

impl Metainfo {
    /// Loads the metainfo at `path`, or initializes an empty one if the file
    /// does not exist.
    ///
    /// A fresh document starts with an empty `announce`, `creation date` set
    /// to now, and an `info` dictionary holding the default `piece length`
    /// and empty `pieces`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FileError> {
        let path = path.as_ref().to_path_buf();

        let root = if path.exists() {
            let bytes = std::fs::read(&path)?;
            decode(&bytes)?
                .into_dict()
                .ok_or(FileError::NotADictionary)?
        } else {
            let mut info = BTreeMap::new();
            info.insert(
                Bytes::from_static(PIECE_LENGTH),
                Value::Integer(DEFAULT_PIECE_LENGTH),
            );
            info.insert(Bytes::from_static(PIECES), Value::Bytes(Bytes::new()));

            let mut root = BTreeMap::new();
            root.insert(Bytes::from_static(ANNOUNCE), Value::string(""));
            root.insert(
                Bytes::from_static(CREATION_DATE),
                Value::Integer(unix_now()),
            );
            root.insert(Bytes::from_static(INFO), Value::Dict(info));
            root
        };

        Ok(Self { path, root })
    }

    /// The filesystem path this document reads from and writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tracker announce URL, if present and valid UTF-8.
    pub fn announce(&self) -> Option<&str> {
        self.root.get(ANNOUNCE).and_then(|v| v.as_str())
    }

    pub fn set_announce(&mut self, url: &str) {
        self.root
            .insert(Bytes::from_static(ANNOUNCE), Value::string(url));
    }

    /// Free-form comment, if present and valid UTF-8.
    pub fn comment(&self) -> Option<&str> {
        self.root.get(COMMENT).and_then(|v| v.as_str())
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.root
            .insert(Bytes::from_static(COMMENT), Value::string(comment));
    }

    /// Creation time in POSIX seconds.
    pub fn creation_date(&self) -> Option<i64> {
        self.root.get(CREATION_DATE).and_then(|v| v.as_integer())
    }

    pub fn set_creation_date(&mut self, posix_seconds: i64) {
        self.root.insert(
            Bytes::from_static(CREATION_DATE),
            Value::Integer(posix_seconds),
        );
    }

    /// `piece length` from the `info` dictionary.
    pub fn piece_length(&self) -> Option<i64> {
        self.info()?.get(PIECE_LENGTH).and_then(|v| v.as_integer())
    }

    pub fn set_piece_length(&mut self, piece_length: i64) {
        self.info_mut().insert(
            Bytes::from_static(PIECE_LENGTH),
            Value::Integer(piece_length),
        );
    }

    /// Top-level suggested name (file or directory), if present.
    pub fn name(&self) -> Option<&str> {
        self.info()?.get(NAME).and_then(|v| v.as_str())
    }

    /// Computes the SHA-1 of the canonical bencoding of the `info`
    /// dictionary.
    ///
    /// # Errors
    ///
    /// [`FileError::MissingInfo`] if the document has no `info` key.
    pub fn info_hash(&self) -> Result<InfoHash, FileError> {
        let info = self.root.get(INFO).ok_or(FileError::MissingInfo)?;
        Ok(InfoHash::from_info_bytes(&encode(info)))
    }

    /// Flat list of the torrent's files.
    ///
    /// Single-file torrents yield one entry whose path is `[name]`.
    pub fn files(&self) -> Vec<FileEntry> {
        let Some(info) = self.info() else {
            return Vec::new();
        };

        if let Some(list) = info.get(FILES).and_then(|v| v.as_list()) {
            return list.iter().filter_map(parse_file_entry).collect();
        }

        match (
            info.get(NAME).and_then(|v| v.as_str()),
            info.get(LENGTH).and_then(|v| v.as_integer()),
        ) {
            (Some(name), Some(length)) => vec![FileEntry {
                path: vec![name.to_string()],
                length: length.max(0) as u64,
            }],
            _ => Vec::new(),
        }
    }

    /// The 20-byte piece digests, in order.
    pub fn pieces(&self) -> Vec<[u8; 20]> {
        self.pieces_bytes()
            .chunks_exact(20)
            .map(|chunk| {
                let mut digest = [0u8; 20];
                digest.copy_from_slice(chunk);
                digest
            })
            .collect()
    }

    /// Number of piece digests.
    pub fn piece_count(&self) -> usize {
        self.pieces_bytes().len() / 20
    }

    /// Sum of all file lengths.
    pub fn total_length(&self) -> u64 {
        self.files().iter().map(|f| f.length).sum()
    }

    /// Hashes `path` into piece digests and adds it to the torrent.
    ///
    /// The file is read in `piece length` sized chunks; every chunk, the
    /// short final one included, contributes one 20-byte digest. A torrent
    /// holding no files gains the single-file shape; adding to a single-file
    /// torrent migrates it to the multi-file shape first.
    ///
    /// # Errors
    ///
    /// [`FileError::InvalidPieceLength`] if `piece length` is missing or not
    /// positive, [`FileError::InvalidPath`] if the path has no usable file
    /// name, or any I/O error from reading the file.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let path = path.as_ref();
        let piece_length = self.require_piece_length()?;

        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(String::from)
            .ok_or_else(|| FileError::InvalidPath(path.display().to_string()))?;

        let (length, digests) = hash_pieces(path, piece_length as usize)?;

        let info = self.info_mut();
        if info.contains_key(FILES) {
            push_file_entry(info, file_name, length);
        } else if info.contains_key(LENGTH) {
            // Single-file becomes multi-file: the existing name/length move
            // into files[0] before the new entry is appended.
            let old_name = info
                .remove(NAME)
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default();
            let old_length = info
                .remove(LENGTH)
                .and_then(|v| v.as_integer())
                .unwrap_or(0)
                .max(0) as u64;

            info.insert(
                Bytes::from_static(FILES),
                Value::List(vec![file_entry_value(&[old_name], old_length)]),
            );
            push_file_entry(info, file_name, length);
        } else {
            info.insert(Bytes::from_static(NAME), Value::string(&file_name));
            info.insert(Bytes::from_static(LENGTH), Value::Integer(length as i64));
        }

        append_pieces(info, &digests);
        Ok(())
    }

    /// Removes the file addressed by its `/`-joined torrent path, dropping
    /// its digest range from `pieces`.
    ///
    /// A multi-file torrent left with one entry collapses back to the
    /// single-file shape. Paths that match nothing are a silent no-op.
    pub fn remove_file(&mut self, target: &str) -> Result<(), FileError> {
        let Some(info) = self.root.get_mut(INFO).and_then(|v| v.as_dict_mut()) else {
            return Ok(());
        };

        if info.contains_key(FILES) {
            let piece_length = info
                .get(PIECE_LENGTH)
                .and_then(|v| v.as_integer())
                .filter(|&p| p > 0)
                .ok_or(FileError::InvalidPieceLength)? as u64;

            let entries: Vec<FileEntry> = info
                .get(FILES)
                .and_then(|v| v.as_list())
                .map(|list| list.iter().filter_map(parse_file_entry).collect())
                .unwrap_or_default();

            if !entries.iter().any(|e| e.joined_path() == target) {
                return Ok(());
            }

            let old_pieces = info
                .get(PIECES)
                .and_then(|v| v.as_bytes())
                .cloned()
                .unwrap_or_default();

            // Each file owns ceil(length / piece_length) digests, in file
            // order; keep the ranges of every survivor.
            let mut kept = Vec::new();
            let mut kept_pieces = Vec::new();
            let mut offset = 0usize;
            for entry in entries {
                let span = (entry.length.div_ceil(piece_length) as usize) * 20;
                let end = (offset + span).min(old_pieces.len());
                if entry.joined_path() != target {
                    kept_pieces.extend_from_slice(&old_pieces[offset.min(end)..end]);
                    kept.push(entry);
                }
                offset += span;
            }

            info.insert(
                Bytes::from_static(PIECES),
                Value::Bytes(Bytes::from(kept_pieces)),
            );

            match kept.len() {
                0 => {
                    info.remove(FILES);
                }
                1 => {
                    let survivor = &kept[0];
                    info.remove(FILES);
                    info.insert(
                        Bytes::from_static(NAME),
                        Value::string(&survivor.joined_path()),
                    );
                    info.insert(
                        Bytes::from_static(LENGTH),
                        Value::Integer(survivor.length as i64),
                    );
                }
                _ => {
                    info.insert(
                        Bytes::from_static(FILES),
                        Value::List(
                            kept.iter()
                                .map(|e| file_entry_value(&e.path, e.length))
                                .collect(),
                        ),
                    );
                }
            }
        } else if info.get(NAME).and_then(|v| v.as_str()) == Some(target) {
            info.remove(NAME);
            info.remove(LENGTH);
            info.insert(Bytes::from_static(PIECES), Value::Bytes(Bytes::new()));
        }

        Ok(())
    }

    /// Serializes the canonical bencoding to the bound path.
    pub fn write(&self) -> Result<(), FileError> {
        let bytes = encode(&Value::Dict(self.root.clone()));
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }

    fn info(&self) -> Option<&BTreeMap<Bytes, Value>> {
        self.root.get(INFO).and_then(|v| v.as_dict())
    }

    fn info_mut(&mut self) -> &mut BTreeMap<Bytes, Value> {
        // A non-dictionary info entry is replaced; mutation always has a
        // dictionary to work with.
        if !matches!(self.root.get(INFO), Some(Value::Dict(_))) {
            self.root
                .insert(Bytes::from_static(INFO), Value::Dict(BTreeMap::new()));
        }
        match self.root.get_mut(INFO) {
            Some(Value::Dict(dict)) => dict,
            _ => unreachable!("info entry was just ensured to be a dictionary"),
        }
    }

    fn pieces_bytes(&self) -> Bytes {
        self.info()
            .and_then(|info| info.get(PIECES))
            .and_then(|v| v.as_bytes())
            .cloned()
            .unwrap_or_default()
    }

    fn require_piece_length(&self) -> Result<i64, FileError> {
        self.piece_length()
            .filter(|&p| p > 0)
            .ok_or(FileError::InvalidPieceLength)
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn parse_file_entry(value: &Value) -> Option<FileEntry> {
    let dict = value.as_dict()?;
    let length = dict.get(LENGTH)?.as_integer()?.max(0) as u64;
    let path = dict
        .get(PATH)?
        .as_list()?
        .iter()
        .filter_map(|seg| seg.as_str().map(String::from))
        .collect();
    Some(FileEntry { path, length })
}

fn file_entry_value(segments: &[String], length: u64) -> Value {
    let mut dict = BTreeMap::new();
    dict.insert(Bytes::from_static(LENGTH), Value::Integer(length as i64));
    dict.insert(
        Bytes::from_static(PATH),
        Value::List(segments.iter().map(|s| Value::string(s)).collect()),
    );
    Value::Dict(dict)
}

fn push_file_entry(info: &mut BTreeMap<Bytes, Value>, name: String, length: u64) {
    if let Some(list) = info.get_mut(FILES).and_then(|v| v.as_list_mut()) {
        list.push(file_entry_value(&[name], length));
    }
}

fn append_pieces(info: &mut BTreeMap<Bytes, Value>, digests: &[u8]) {
    let mut pieces = info
        .get(PIECES)
        .and_then(|v| v.as_bytes())
        .map(|b| b.to_vec())
        .unwrap_or_default();
    pieces.extend_from_slice(digests);
    info.insert(Bytes::from_static(PIECES), Value::Bytes(Bytes::from(pieces)));
}

/// Streams `path` in `piece_length` sized reads, returning the total byte
/// count and the concatenated SHA-1 digest per read.
fn hash_pieces(path: &Path, piece_length: usize) -> Result<(u64, Vec<u8>), FileError> {
    let mut file = std::fs::File::open(path)?;
    let mut buf = vec![0u8; piece_length];
    let mut digests = Vec::new();
    let mut total = 0u64;

    loop {
        let mut filled = 0;
        while filled < piece_length {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            break;
        }

        total += filled as u64;
        let digest: [u8; 20] = Sha1::digest(&buf[..filled]).into();
        digests.extend_from_slice(&digest);

        if filled < piece_length {
            break;
        }
    }

    Ok((total, digests))
}
