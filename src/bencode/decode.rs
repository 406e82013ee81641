use std::collections::BTreeMap;

use bytes::Bytes;

use super::error::BencodeError;
use super::value::Value;

/// Containers nested deeper than this are rejected to bound recursion.
const MAX_DEPTH: usize = 64;

/// Decodes a single bencode value from a byte slice.
///
/// The input must contain exactly one complete value; trailing bytes are an
/// error. Integers are parsed strictly: `i-0e`, leading zeros, and empty or
/// non-numeric bodies are all rejected.
///
/// # Errors
///
/// Returns a [`BencodeError`] for truncated input, an unknown leading byte,
/// malformed integers or string lengths, nesting beyond 64 levels, or
/// trailing data after the value.
///
/// # Examples
///
/// ```
/// use bitwire::bencode::decode;
///
/// assert_eq!(decode(b"i42e").unwrap().as_integer(), Some(42));
/// assert_eq!(decode(b"4:spam").unwrap().as_str(), Some("spam"));
///
/// let dict = decode(b"d8:announce4:http4:porti6881ee").unwrap();
/// assert_eq!(dict.get(b"port").and_then(|v| v.as_integer()), Some(6881));
/// ```
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let mut cursor = Cursor::new(data);
    let value = cursor.value(0)?;

    if !cursor.at_end() {
        return Err(BencodeError::TrailingData);
    }

    Ok(value)
}

/// Single-pass cursor over the input.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos == self.data.len()
    }

    fn peek(&self) -> Result<u8, BencodeError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEof)
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    /// Advances past bytes until `stop` and returns the span before it.
    fn take_until(&mut self, stop: u8) -> Result<&'a [u8], BencodeError> {
        let start = self.pos;
        while self.peek()? != stop {
            self.bump();
        }
        let span = &self.data[start..self.pos];
        self.bump();
        Ok(span)
    }

    fn value(&mut self, depth: usize) -> Result<Value, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::NestingTooDeep);
        }

        match self.peek()? {
            b'i' => self.integer(),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            b'0'..=b'9' => self.byte_string().map(Value::Bytes),
            c => Err(BencodeError::UnexpectedChar(c as char)),
        }
    }

    fn integer(&mut self) -> Result<Value, BencodeError> {
        self.bump();
        let body = self.take_until(b'e')?;

        let text = std::str::from_utf8(body)
            .map_err(|_| BencodeError::InvalidInteger("non-ascii body".into()))?;

        if text.is_empty() {
            return Err(BencodeError::InvalidInteger("empty".into()));
        }

        // i-0e and any zero-padded form are not canonical.
        if text.starts_with("-0") || (text.len() > 1 && text.starts_with('0')) {
            return Err(BencodeError::InvalidInteger(text.into()));
        }

        text.parse()
            .map(Value::Integer)
            .map_err(|_| BencodeError::InvalidInteger(text.into()))
    }

    fn byte_string(&mut self) -> Result<Bytes, BencodeError> {
        let len_digits = self.take_until(b':')?;
        let len: usize = std::str::from_utf8(len_digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(BencodeError::InvalidStringLength)?;

        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(BencodeError::UnexpectedEof)?;

        let bytes = Bytes::copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(bytes)
    }

    fn list(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.bump();
        let mut items = Vec::new();

        while self.peek()? != b'e' {
            items.push(self.value(depth + 1)?);
        }
        self.bump();

        Ok(Value::List(items))
    }

    fn dict(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.bump();
        let mut entries = BTreeMap::new();

        while self.peek()? != b'e' {
            if !self.peek()?.is_ascii_digit() {
                return Err(BencodeError::UnexpectedChar(self.peek()? as char));
            }
            let key = self.byte_string()?;
            let value = self.value(depth + 1)?;
            entries.insert(key, value);
        }
        self.bump();

        Ok(Value::Dict(entries))
    }
}
