use bytes::{BufMut, Bytes};
use ethereum_types::{Address, Bloom, H64, H128, H256, H512, U256};

use super::{
    constants::{LONG_LIST_BASE, LONG_STRING_BASE, RLP_EMPTY_LIST, RLP_NULL, SHORT_PAYLOAD_LIMIT},
    error::RLPEncodeError,
};

/// Function for encoding a value to RLP.
/// For encoding the value into a buffer directly, use [`RLPEncode::encode`].
pub fn encode<T: RLPEncode>(value: T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.encode(&mut buf);
    buf
}

pub trait RLPEncode {
    fn encode(&self, buf: &mut dyn BufMut);

    /// Size in bytes of the encoding of `self`.
    fn length(&self) -> usize {
        self.encode_to_vec().len()
    }

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

/// Computes the length needed for a list with the given payload length
#[inline]
pub const fn list_length(payload_len: usize) -> usize {
    if payload_len < SHORT_PAYLOAD_LIMIT {
        1 + payload_len
    } else {
        1 + be_len(payload_len) + payload_len
    }
}

/// Computes the length needed for a byte-string of the given length and first byte
#[inline]
pub const fn bytes_length(bytes_len: usize, first_byte: u8) -> usize {
    if bytes_len == 1 && first_byte < RLP_NULL {
        return 1;
    }
    if bytes_len < SHORT_PAYLOAD_LIMIT {
        return 1 + bytes_len;
    }
    1 + be_len(bytes_len) + bytes_len
}

/// Number of bytes of `len` written big endian without leading zeros.
#[inline]
const fn be_len(len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (len.ilog2() / 8 + 1) as usize
}

fn put_length_prefix(short_base: u8, long_base: u8, len: usize, buf: &mut dyn BufMut) {
    if len < SHORT_PAYLOAD_LIMIT {
        buf.put_u8(short_base + len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let start = bytes.len() - be_len(len);
        buf.put_u8(long_base + be_len(len) as u8);
        buf.put_slice(&bytes[start..]);
    }
}

/// Writes the prefix of a list whose encoded items add up to `payload_len` bytes.
#[inline]
pub fn encode_length(payload_len: usize, buf: &mut dyn BufMut) {
    put_length_prefix(RLP_EMPTY_LIST, LONG_LIST_BASE, payload_len, buf);
}

impl RLPEncode for bool {
    #[inline(always)]
    fn encode(&self, buf: &mut dyn BufMut) {
        if *self {
            buf.put_u8(0x01);
        } else {
            buf.put_u8(RLP_NULL);
        }
    }

    fn length(&self) -> usize {
        1
    }
}

/// Encodes the big endian representation of an unsigned integer, stripping leading zeros.
#[inline]
fn encode_uint_be(value_be: &[u8], buf: &mut dyn BufMut) {
    let start = value_be
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(value_be.len());
    value_be[start..].encode(buf)
}

fn uint_be_length(value_be: &[u8]) -> usize {
    match value_be.iter().position(|&b| b != 0) {
        None => 1,
        Some(start) => bytes_length(value_be.len() - start, value_be[start]),
    }
}

macro_rules! impl_encode_uint {
    ($($t:ty),*) => {
        $(
            impl RLPEncode for $t {
                fn encode(&self, buf: &mut dyn BufMut) {
                    encode_uint_be(&self.to_be_bytes(), buf)
                }

                fn length(&self) -> usize {
                    uint_be_length(&self.to_be_bytes())
                }
            }
        )*
    };
}

impl_encode_uint!(u8, u16, u32, u64, usize, u128);

impl RLPEncode for U256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_uint_be(&self.to_big_endian(), buf)
    }

    fn length(&self) -> usize {
        uint_be_length(&self.to_big_endian())
    }
}

impl RLPEncode for () {
    fn encode(&self, buf: &mut dyn BufMut) {
        buf.put_u8(RLP_NULL);
    }

    fn length(&self) -> usize {
        1
    }
}

impl RLPEncode for [u8] {
    #[inline(always)]
    fn encode(&self, buf: &mut dyn BufMut) {
        if self.len() == 1 && self[0] < RLP_NULL {
            buf.put_u8(self[0]);
            return;
        }
        put_length_prefix(RLP_NULL, LONG_STRING_BASE, self.len(), buf);
        buf.put_slice(self);
    }

    fn length(&self) -> usize {
        match self.first() {
            None => 1,
            Some(first) => bytes_length(self.len(), *first),
        }
    }
}

impl<const N: usize> RLPEncode for [u8; N] {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_slice().encode(buf)
    }

    fn length(&self) -> usize {
        self.as_slice().length()
    }
}

impl RLPEncode for Bytes {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_ref().encode(buf)
    }

    fn length(&self) -> usize {
        self.as_ref().length()
    }
}

impl RLPEncode for str {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }

    fn length(&self) -> usize {
        self.as_bytes().length()
    }
}

impl RLPEncode for &str {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }

    fn length(&self) -> usize {
        self.as_bytes().length()
    }
}

impl RLPEncode for String {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }

    fn length(&self) -> usize {
        self.as_bytes().length()
    }
}

macro_rules! impl_encode_fixed_hash {
    ($($t:ty),*) => {
        $(
            impl RLPEncode for $t {
                fn encode(&self, buf: &mut dyn BufMut) {
                    self.as_bytes().encode(buf)
                }

                fn length(&self) -> usize {
                    self.as_bytes().length()
                }
            }
        )*
    };
}

impl_encode_fixed_hash!(H64, H128, Address, H256, H512, Bloom);

// A Vec<T> is a list of elements of the same type. Byte strings should be
// encoded through `Bytes` or `[u8]` instead of `Vec<u8>`.
impl<T: RLPEncode> RLPEncode for Vec<T> {
    fn encode(&self, buf: &mut dyn BufMut) {
        if self.is_empty() {
            buf.put_u8(RLP_EMPTY_LIST);
            return;
        }
        let payload_len: usize = self.iter().map(RLPEncode::length).sum();
        encode_length(payload_len, buf);
        for item in self {
            item.encode(buf);
        }
    }

    fn length(&self) -> usize {
        list_length(self.iter().map(RLPEncode::length).sum())
    }
}

macro_rules! impl_encode_tuple {
    ($($name:ident $var:ident),+) => {
        impl<$($name: RLPEncode),+> RLPEncode for ($($name,)+) {
            fn encode(&self, buf: &mut dyn BufMut) {
                let ($($var,)+) = self;
                let payload_len = 0 $(+ $var.length())+;
                encode_length(payload_len, buf);
                $($var.encode(buf);)+
            }

            fn length(&self) -> usize {
                let ($($var,)+) = self;
                list_length(0 $(+ $var.length())+)
            }
        }
    };
}

impl_encode_tuple!(A a, B b);
impl_encode_tuple!(A a, B b, C c);
impl_encode_tuple!(A a, B b, C c, D d);
impl_encode_tuple!(A a, B b, C c, D d, E e);

/// Encodes a loosely typed JSON value: `0x`-prefixed hex strings become byte strings,
/// non-negative integers become RLP integers and arrays become lists.
/// Anything else has no RLP representation.
pub fn encode_json_value(
    value: &serde_json::Value,
    buf: &mut dyn BufMut,
) -> Result<(), RLPEncodeError> {
    use serde_json::Value;

    match value {
        Value::String(s) => {
            let hex_str = s
                .strip_prefix("0x")
                .ok_or_else(|| RLPEncodeError::InvalidHex(s.clone()))?;
            let bytes = hex::decode(hex_str).map_err(|_| RLPEncodeError::InvalidHex(s.clone()))?;
            bytes.as_slice().encode(buf);
            Ok(())
        }
        Value::Number(n) => {
            let n = n
                .as_u64()
                .ok_or_else(|| RLPEncodeError::UnsupportedType(format!("number {n}")))?;
            n.encode(buf);
            Ok(())
        }
        Value::Array(items) => {
            let mut payload = Vec::new();
            for item in items {
                encode_json_value(item, &mut payload)?;
            }
            encode_length(payload.len(), buf);
            buf.put_slice(&payload);
            Ok(())
        }
        Value::Null => Err(RLPEncodeError::UnsupportedType("null".into())),
        Value::Bool(_) => Err(RLPEncodeError::UnsupportedType("bool".into())),
        Value::Object(_) => Err(RLPEncodeError::UnsupportedType("object".into())),
    }
}
