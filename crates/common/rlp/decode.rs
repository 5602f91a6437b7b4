use super::{
    constants::{LONG_LIST_BASE, LONG_STRING_BASE, RLP_EMPTY_LIST, RLP_NULL, SHORT_PAYLOAD_LIMIT},
    error::RLPDecodeError,
};
use bytes::Bytes;
use ethereum_types::{Bloom, H64, H128, H160, H256, H512, U256};

/// Max payload size accepted when decoding.
/// No well-formed block, transaction or trie node comes anywhere near it.
const MAX_RLP_BYTES: usize = 1024 * 1024 * 1024;

/// Trait for decoding RLP encoded slices of data.
///
/// Implementors provide [`decode_unfinished`](RLPDecode::decode_unfinished), which
/// returns the decoded value along with the bytes following it. Consumers usually call
/// [`decode`](RLPDecode::decode), which additionally rejects trailing bytes.
pub trait RLPDecode: Sized {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError>;

    fn decode(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        let (decoded, remaining) = Self::decode_unfinished(rlp)?;
        if !remaining.is_empty() {
            return Err(RLPDecodeError::InvalidLength(Some("trailing bytes")));
        }
        Ok(decoded)
    }
}

impl RLPDecode for bool {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let first = buf.first().ok_or(RLPDecodeError::invalid_length())?;
        let value = match *first {
            RLP_NULL => false,
            0x01 => true,
            b => return Err(RLPDecodeError::MalformedBoolean(b)),
        };
        Ok((value, &buf[1..]))
    }
}

macro_rules! impl_decode_uint {
    ($($t:ty),*) => {
        $(
            impl RLPDecode for $t {
                fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
                    let (bytes, rest) = decode_bytes(rlp)?;
                    let padded = static_left_pad(bytes)?;
                    Ok((<$t>::from_be_bytes(padded), rest))
                }
            }
        )*
    };
}

impl_decode_uint!(u8, u16, u32, u64, usize, u128);

impl RLPDecode for U256 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest) = decode_bytes(rlp)?;
        let padded: [u8; 32] = static_left_pad(bytes)?;
        Ok((U256::from_big_endian(&padded), rest))
    }
}

// Decodes a byte string of a fixed size. Lists are decoded through the
// `Vec<T>` implementation or through tuples.
impl<const N: usize> RLPDecode for [u8; N] {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (decoded_bytes, rest) = decode_bytes(rlp)?;
        let value = decoded_bytes
            .try_into()
            .map_err(|_| RLPDecodeError::invalid_length())?;
        Ok((value, rest))
    }
}

impl RLPDecode for Bytes {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (decoded, rest) = decode_bytes(rlp)?;
        Ok((Bytes::copy_from_slice(decoded), rest))
    }
}

impl RLPDecode for String {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (str_bytes, rest) = decode_bytes(rlp)?;
        let value = String::from_utf8(str_bytes.to_vec())
            .map_err(|_| RLPDecodeError::MalformedData(Some("utf-8 string")))?;
        Ok((value, rest))
    }
}

macro_rules! impl_decode_fixed_hash {
    ($($t:ident),*) => {
        $(
            impl RLPDecode for $t {
                fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
                    let (value, rest) = RLPDecode::decode_unfinished(rlp)?;
                    Ok(($t(value), rest))
                }
            }
        )*
    };
}

impl_decode_fixed_hash!(H64, H128, H160, H256, H512, Bloom);

// A Vec<T> is a list of elements of the same type.
impl<T: RLPDecode> RLPDecode for Vec<T> {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, input_rest) = decode_rlp_item(rlp)?;
        if !is_list {
            return Err(RLPDecodeError::unexpected_string());
        }

        let mut result = Vec::new();
        let mut current = payload;
        while !current.is_empty() {
            let (item, rest) = T::decode_unfinished(current)?;
            result.push(item);
            current = rest;
        }
        Ok((result, input_rest))
    }
}

macro_rules! impl_decode_tuple {
    ($($name:ident $var:ident),+) => {
        impl<$($name: RLPDecode),+> RLPDecode for ($($name,)+) {
            fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
                let (is_list, payload, input_rest) = decode_rlp_item(rlp)?;
                if !is_list {
                    return Err(RLPDecodeError::unexpected_string());
                }
                let rest = payload;
                $(let ($var, rest) = $name::decode_unfinished(rest)?;)+
                if !rest.is_empty() {
                    return Err(RLPDecodeError::MalformedData(Some("tuple with extra items")));
                }
                Ok((($($var,)+), input_rest))
            }
        }
    };
}

impl_decode_tuple!(A a, B b);
impl_decode_tuple!(A a, B b, C c);
impl_decode_tuple!(A a, B b, C c, D d);
impl_decode_tuple!(A a, B b, C c, D d, E e);

/// Reads a long-form length field, rejecting every encoding the encoder would not produce.
fn read_long_length(data: &[u8], length_of_length: usize) -> Result<usize, RLPDecodeError> {
    let length_bytes = data
        .get(1..length_of_length + 1)
        .ok_or(RLPDecodeError::invalid_length())?;
    if length_bytes.first() == Some(&0) {
        return Err(RLPDecodeError::NonCanonicalSize(
            "leading zero in length field",
        ));
    }
    let length = usize::from_be_bytes(static_left_pad(length_bytes)?);
    if length < SHORT_PAYLOAD_LIMIT {
        return Err(RLPDecodeError::NonCanonicalSize(
            "long form used for short payload",
        ));
    }
    Ok(length)
}

/// Splits `data` in prefix length, payload length and list flag for the first item.
fn item_bounds(data: &[u8]) -> Result<(bool, usize, usize), RLPDecodeError> {
    let first_byte = *data.first().ok_or(RLPDecodeError::invalid_length())?;

    let (is_list, header_len, payload_len) = match first_byte {
        0..=0x7f => (false, 0, 1),
        RLP_NULL..=LONG_STRING_BASE => {
            let length = (first_byte - RLP_NULL) as usize;
            if length == 1 && data.get(1).is_some_and(|b| *b < RLP_NULL) {
                return Err(RLPDecodeError::NonCanonicalSize(
                    "single byte below 0x80 encoded as string",
                ));
            }
            (false, 1, length)
        }
        0xb8..=0xbf => {
            let length_of_length = (first_byte - LONG_STRING_BASE) as usize;
            (
                false,
                1 + length_of_length,
                read_long_length(data, length_of_length)?,
            )
        }
        RLP_EMPTY_LIST..=LONG_LIST_BASE => (true, 1, (first_byte - RLP_EMPTY_LIST) as usize),
        0xf8..=0xff => {
            let length_of_length = (first_byte - LONG_LIST_BASE) as usize;
            (
                true,
                1 + length_of_length,
                read_long_length(data, length_of_length)?,
            )
        }
    };

    if payload_len > MAX_RLP_BYTES || data.len() < header_len + payload_len {
        return Err(RLPDecodeError::invalid_length());
    }
    Ok((is_list, header_len, payload_len))
}

/// Decodes an RLP item from a slice of bytes.
/// It returns a 3-element tuple with the following elements:
/// - A boolean indicating if the item is a list or not.
/// - The payload of the item, without its prefix.
/// - The remaining bytes after the item.
pub fn decode_rlp_item(data: &[u8]) -> Result<(bool, &[u8], &[u8]), RLPDecodeError> {
    let (is_list, header_len, payload_len) = item_bounds(data)?;
    let end = header_len + payload_len;
    Ok((is_list, &data[header_len..end], &data[end..]))
}

/// Splits an RLP item in two: the item including its prefix, and the bytes after it.
pub fn get_item_with_prefix(data: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let (_, header_len, payload_len) = item_bounds(data)?;
    Ok(data.split_at(header_len + payload_len))
}

/// Decodes the payload of an RLP byte string.
/// It returns the payload and the remaining bytes after the item.
pub fn decode_bytes(data: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let (is_list, payload, rest) = decode_rlp_item(data)?;
    if is_list {
        return Err(RLPDecodeError::unexpected_list());
    }
    Ok((payload, rest))
}

/// Pads a slice of bytes with zeros on the left to make it a fixed size array.
/// Leading zeros in `data` are rejected, as canonical integers never carry them.
#[inline]
pub fn static_left_pad<const N: usize>(data: &[u8]) -> Result<[u8; N], RLPDecodeError> {
    let mut result = [0; N];

    if data.is_empty() {
        return Ok(result);
    }
    if data[0] == 0 {
        return Err(RLPDecodeError::MalformedData(Some("integer with leading zeros")));
    }
    if data.len() > N {
        return Err(RLPDecodeError::invalid_length());
    }
    result[N - data.len()..].copy_from_slice(data);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::RLPEncode;
    use hex_literal::hex;
    use proptest::{collection::vec, prelude::*};

    #[test]
    fn can_decode_integers() {
        assert_eq!(u64::decode(&[RLP_NULL]).unwrap(), 0);
        assert_eq!(u8::decode(&[0x7f]).unwrap(), 0x7f);
        assert_eq!(u8::decode(&[0x81, 0x80]).unwrap(), 0x80);
        assert_eq!(u16::decode(&[0x82, 0x04, 0x00]).unwrap(), 1024);
        assert_eq!(
            U256::decode(&hex!("8401020304")).unwrap(),
            U256::from(0x01020304)
        );
    }

    #[test]
    fn rejects_integers_with_leading_zeros() {
        assert!(u64::decode(&[0x00]).is_err());
        assert!(u64::decode(&[0x82, 0x00, 0x01]).is_err());
        assert!(U256::decode(&hex!("820001")).is_err());
    }

    #[test]
    fn rejects_integer_overflow() {
        assert_eq!(
            u8::decode(&[0x82, 0x01, 0x00]),
            Err(RLPDecodeError::invalid_length())
        );
    }

    #[test]
    fn rejects_wrapped_single_byte() {
        assert_eq!(
            Bytes::decode(&[0x81, 0x05]),
            Err(RLPDecodeError::NonCanonicalSize(
                "single byte below 0x80 encoded as string"
            ))
        );
        // 0x81 0x80 is the canonical encoding of the byte 0x80
        assert_eq!(
            Bytes::decode(&[0x81, 0x80]).unwrap(),
            Bytes::from_static(&[0x80])
        );
    }

    #[test]
    fn rejects_long_form_for_short_payloads() {
        let mut data = vec![0xb8, 0x03];
        data.extend(b"dog");
        assert!(matches!(
            Bytes::decode(&data),
            Err(RLPDecodeError::NonCanonicalSize(_))
        ));

        let data = hex!("f803c0c0c0");
        assert!(matches!(
            Vec::<Vec<u8>>::decode(&data),
            Err(RLPDecodeError::NonCanonicalSize(_))
        ));
    }

    #[test]
    fn rejects_leading_zeros_in_length_field() {
        let mut data = vec![0xb9, 0x00, 0x38];
        data.extend([0xaa; 56]);
        assert_eq!(
            Bytes::decode(&data),
            Err(RLPDecodeError::NonCanonicalSize(
                "leading zero in length field"
            ))
        );
    }

    #[test]
    fn rejects_truncated_and_trailing_input() {
        assert_eq!(
            Bytes::decode(&[0x83, b'd', b'o']),
            Err(RLPDecodeError::invalid_length())
        );
        assert!(Bytes::decode(&[0x83, b'd', b'o', b'g', 0x00]).is_err());
        assert!(Bytes::decode(&[]).is_err());
    }

    #[test]
    fn can_decode_lists() {
        let decoded = Vec::<String>::decode(&hex!("c88363617483646f67")).unwrap();
        assert_eq!(decoded, vec!["cat".to_string(), "dog".to_string()]);

        let encoded = (7u8, Bytes::from_static(b"x"), vec![1u64, 2]).encode_to_vec();
        let (a, b, c) = <(u8, Bytes, Vec<u64>)>::decode(&encoded).unwrap();
        assert_eq!(a, 7);
        assert_eq!(b, Bytes::from_static(b"x"));
        assert_eq!(c, vec![1, 2]);
    }

    #[test]
    fn tuple_rejects_extra_items() {
        let encoded = (1u8, 2u8, 3u8).encode_to_vec();
        assert!(<(u8, u8)>::decode(&encoded).is_err());
    }

    #[test]
    fn list_and_string_mismatch() {
        assert_eq!(
            Bytes::decode(&[RLP_EMPTY_LIST]),
            Err(RLPDecodeError::unexpected_list())
        );
        assert_eq!(
            Vec::<u8>::decode(&[RLP_NULL]),
            Err(RLPDecodeError::unexpected_string())
        );
    }

    #[test]
    fn item_with_prefix_splits_items() {
        let data = hex!("83646f67c0");
        let (item, rest) = get_item_with_prefix(&data).unwrap();
        assert_eq!(item, &hex!("83646f67"));
        assert_eq!(rest, &[RLP_EMPTY_LIST]);
    }

    proptest! {
        #[test]
        fn u256_roundtrip(limbs in any::<[u64; 4]>()) {
            let value = U256(limbs);
            prop_assert_eq!(U256::decode(&value.encode_to_vec()).unwrap(), value);
        }

        #[test]
        fn nested_bytes_roundtrip(items in vec(vec(any::<u8>(), 0..80), 0..20)) {
            let items: Vec<Bytes> = items.into_iter().map(Bytes::from).collect();
            let encoded = items.encode_to_vec();
            prop_assert_eq!(encoded.len(), items.length());
            prop_assert_eq!(Vec::<Bytes>::decode(&encoded).unwrap(), items);
        }
    }
}
