use bytes::Bytes;

/// The set of pieces a peer claims to have, one bit per piece.
///
/// Bit `i` lives in byte `i / 8`, counted from the high bit of the byte
/// (piece 0 is the top bit of byte 0). The backing storage grows on demand
/// when pieces are added and never shrinks, so a session can track `have`
/// announcements without knowing the piece count up front.
///
/// # Examples
///
/// ```
/// use bitwire::peer::Bitfield;
///
/// let mut bf = Bitfield::new();
/// bf.add_piece(0);
/// bf.add_piece(9);
/// assert!(bf.has(0));
/// assert!(!bf.has(1));
/// assert_eq!(bf.as_bytes(), &[0b1000_0000, 0b0100_0000]);
/// assert_eq!(bf.pieces(), vec![0, 9]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitfield {
    bits: Vec<u8>,
}

impl Bitfield {
    /// Creates an empty bitfield.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the raw bytes of a received `bitfield` message.
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self {
            bits: bytes.to_vec(),
        }
    }

    /// Returns whether piece `index` is present.
    ///
    /// Indices past the end of the byte array are absent, not an error.
    pub fn has(&self, index: usize) -> bool {
        match self.bits.get(index / 8) {
            Some(byte) => (byte >> bit_offset(index)) & 1 == 1,
            None => false,
        }
    }

    /// Marks piece `index` as present, growing the storage if needed.
    pub fn add_piece(&mut self, index: usize) {
        let byte_index = index / 8;
        if byte_index >= self.bits.len() {
            self.bits.resize(byte_index + 1, 0);
        }
        self.bits[byte_index] |= 1 << bit_offset(index);
    }

    /// Clears piece `index`. Indices past the end are a no-op.
    pub fn remove_piece(&mut self, index: usize) {
        if let Some(byte) = self.bits.get_mut(index / 8) {
            *byte &= !(1 << bit_offset(index));
        }
    }

    /// All present piece indices, ascending.
    pub fn pieces(&self) -> Vec<usize> {
        (0..self.bits.len() * 8).filter(|&i| self.has(i)).collect()
    }

    /// Number of present pieces.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Returns whether no piece is present.
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    /// The raw backing bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Copies the backing bytes, for sending as a `bitfield` message.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.bits)
    }
}

/// Shift that selects bit `index` within its byte, high bit first.
fn bit_offset(index: usize) -> u32 {
    (7 - index % 8) as u32
}
