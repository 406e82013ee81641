use bytes::{BufMut, BytesMut};

use super::value::Value;

/// Encodes a value into its canonical bencode form.
///
/// Dictionary entries are emitted in ascending raw-byte key order, so
/// encoding the result of [`decode`](super::decode) always yields the
/// canonical bytes regardless of the order the source was written in. This
/// is the property the info-hash depends on.
///
/// # Examples
///
/// ```
/// use bitwire::bencode::{decode, encode};
///
/// let value = decode(b"d3:cow3:moo4:spam4:eggse").unwrap();
/// assert_eq!(encode(&value), b"d3:cow3:moo4:spam4:eggse");
/// ```
pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_into(value, &mut buf);
    buf.to_vec()
}

fn encode_into(value: &Value, buf: &mut BytesMut) {
    match value {
        Value::Integer(i) => {
            buf.put_u8(b'i');
            buf.put_slice(i.to_string().as_bytes());
            buf.put_u8(b'e');
        }
        Value::Bytes(b) => {
            buf.put_slice(b.len().to_string().as_bytes());
            buf.put_u8(b':');
            buf.put_slice(b);
        }
        Value::List(items) => {
            buf.put_u8(b'l');
            for item in items {
                encode_into(item, buf);
            }
            buf.put_u8(b'e');
        }
        Value::Dict(entries) => {
            buf.put_u8(b'd');
            // BTreeMap iteration order is the canonical key order.
            for (key, val) in entries {
                buf.put_slice(key.len().to_string().as_bytes());
                buf.put_u8(b':');
                buf.put_slice(key);
                encode_into(val, buf);
            }
            buf.put_u8(b'e');
        }
    }
}
