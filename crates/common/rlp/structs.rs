use super::{
    decode::{RLPDecode, decode_rlp_item, get_item_with_prefix},
    encode::{RLPEncode, encode_length},
    error::RLPDecodeError,
};
use bytes::BufMut;

/// # Struct decoding helper
///
/// Used to decode a struct from RLP format.
/// The struct's fields must implement [`RLPDecode`].
/// The struct is expected as a list, with its values being the fields
/// in the order they are passed to [`Decoder::decode_field`].
///
/// # Examples
///
/// ```
/// # use keel_rlp::structs::Decoder;
/// # use keel_rlp::error::RLPDecodeError;
/// # use keel_rlp::decode::RLPDecode;
/// #[derive(Debug, PartialEq, Eq)]
/// struct Simple {
///     pub a: u8,
///     pub b: u16,
/// }
///
/// impl RLPDecode for Simple {
///     fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
///         let decoder = Decoder::new(buf)?;
///         let (a, decoder) = decoder.decode_field("a")?;
///         let (b, decoder) = decoder.decode_field("b")?;
///         let rest = decoder.finish()?;
///         Ok((Simple { a, b }, rest))
///     }
/// }
///
/// let decoded = Simple::decode(&[0xc2, 61, 75]).unwrap();
/// assert_eq!(decoded, Simple { a: 61, b: 75 });
/// ```
#[derive(Debug)]
#[must_use = "`Decoder` must be consumed with `finish` to perform decoding checks"]
pub struct Decoder<'a> {
    payload: &'a [u8],
    remaining: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Result<Self, RLPDecodeError> {
        match decode_rlp_item(buf)? {
            (true, payload, remaining) => Ok(Self { payload, remaining }),
            (false, _, _) => Err(RLPDecodeError::unexpected_string()),
        }
    }

    /// Decodes the next field. Failures keep the inner error as their source.
    pub fn decode_field<T: RLPDecode>(self, name: &str) -> Result<(T, Self), RLPDecodeError> {
        let (field, rest) =
            <T as RLPDecode>::decode_unfinished(self.payload).map_err(|err| err.in_field::<T>(name))?;
        Ok((
            field,
            Self {
                payload: rest,
                ..self
            },
        ))
    }

    /// Returns the next field without decoding it, prefix included.
    pub fn get_encoded_item(self) -> Result<(Vec<u8>, Self), RLPDecodeError> {
        let (field, rest) = get_item_with_prefix(self.payload)?;
        Ok((
            field.to_vec(),
            Self {
                payload: rest,
                ..self
            },
        ))
    }

    /// Decodes the next field if there is one left.
    /// Used for trailing fields added by later forks.
    pub fn decode_optional_field<T: RLPDecode>(self) -> Result<(Option<T>, Self), RLPDecodeError> {
        if self.payload.is_empty() {
            return Ok((None, self));
        }
        let (field, rest) = <T as RLPDecode>::decode_unfinished(self.payload)
            .map_err(|err| err.in_field::<T>("optional field"))?;
        Ok((
            Some(field),
            Self {
                payload: rest,
                ..self
            },
        ))
    }

    /// Finishes decoding the struct and returns the bytes after the item.
    /// Fails if there are fields left to decode.
    pub const fn finish(self) -> Result<&'a [u8], RLPDecodeError> {
        if self.payload.is_empty() {
            Ok(self.remaining)
        } else {
            Err(RLPDecodeError::MalformedData(Some("struct with extra fields")))
        }
    }

    pub const fn is_done(&self) -> bool {
        self.payload.is_empty()
    }
}

/// # Struct encoding helper
///
/// Used to encode a struct into RLP format.
/// The struct is encoded as a list, with its values being the fields
/// in the order they are passed to [`Encoder::encode_field`].
///
/// # Examples
///
/// ```
/// # use keel_rlp::structs::Encoder;
/// # use keel_rlp::encode::RLPEncode;
/// # use bytes::BufMut;
/// struct Simple {
///     pub a: u8,
///     pub b: u16,
/// }
///
/// impl RLPEncode for Simple {
///     fn encode(&self, buf: &mut dyn BufMut) {
///         Encoder::new(buf)
///             .encode_field(&self.a)
///             .encode_field(&self.b)
///             .finish();
///     }
/// }
///
/// assert_eq!(Simple { a: 61, b: 75 }.encode_to_vec(), vec![0xc2, 61, 75]);
/// ```
#[must_use = "`Encoder` must be consumed with `finish` to perform the encoding"]
pub struct Encoder<'a> {
    buf: &'a mut dyn BufMut,
    temp_buf: Vec<u8>,
}

impl core::fmt::Debug for Encoder<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Encoder")
            .field("buf", &"...")
            .field("temp_buf", &self.temp_buf)
            .finish()
    }
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut dyn BufMut) -> Self {
        Self {
            buf,
            temp_buf: Vec::new(),
        }
    }

    pub fn encode_field<T: RLPEncode + ?Sized>(mut self, value: &T) -> Self {
        value.encode(&mut self.temp_buf);
        self
    }

    /// If `Some`, stores a field to be encoded, else does nothing.
    pub fn encode_optional_field<T: RLPEncode>(mut self, opt_value: &Option<T>) -> Self {
        if let Some(value) = opt_value {
            value.encode(&mut self.temp_buf);
        }
        self
    }

    /// Stores a field to be encoded as a byte string.
    /// Avoids the list encoding `Vec<u8>` would get.
    pub fn encode_bytes(mut self, value: &[u8]) -> Self {
        value.encode(&mut self.temp_buf);
        self
    }

    /// Adds an already encoded item.
    pub fn encode_raw(mut self, value: &[u8]) -> Self {
        self.temp_buf.put_slice(value);
        self
    }

    pub fn finish(self) {
        encode_length(self.temp_buf.len(), self.buf);
        self.buf.put_slice(&self.temp_buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[derive(Debug, PartialEq, Eq)]
    struct Simple {
        pub a: u8,
        pub b: u16,
    }

    #[test]
    fn decoder_simple_struct() {
        let expected = Simple { a: 61, b: 75 };
        let buf = (expected.a, expected.b).encode_to_vec();

        let decoder = Decoder::new(&buf).unwrap();
        let (a, decoder) = decoder.decode_field("a").unwrap();
        let (b, decoder) = decoder.decode_field("b").unwrap();
        let rest = decoder.finish().unwrap();

        assert!(rest.is_empty());
        assert_eq!(Simple { a, b }, expected);
    }

    #[test]
    fn encoder_simple_struct() {
        let mut buf = Vec::new();
        Encoder::new(&mut buf)
            .encode_field(&61u8)
            .encode_field(&75u16)
            .finish();
        assert_eq!(buf, vec![0xc2, 61, 75]);
        assert_eq!(buf, (61u8, 75u16).encode_to_vec());
    }

    #[test]
    fn optional_trailing_fields() {
        let mut buf = Vec::new();
        Encoder::new(&mut buf)
            .encode_field(&1u8)
            .encode_optional_field(&None::<u64>)
            .finish();

        let decoder = Decoder::new(&buf).unwrap();
        let (a, decoder): (u8, _) = decoder.decode_field("a").unwrap();
        let (b, decoder) = decoder.decode_optional_field::<u64>().unwrap();
        assert!(decoder.is_done());
        decoder.finish().unwrap();
        assert_eq!((a, b), (1, None));
    }

    #[test]
    fn field_errors_chain_their_cause() {
        // second field is a list where an integer is expected
        let buf = (1u8, Vec::<u8>::new()).encode_to_vec();
        let decoder = Decoder::new(&buf).unwrap();
        let (_, decoder): (u8, _) = decoder.decode_field("nonce").unwrap();
        let err = decoder.decode_field::<u64>("balance").unwrap_err();

        assert!(err.to_string().contains("balance"));
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), RLPDecodeError::unexpected_list().to_string());
        assert_eq!(err.root_cause(), &RLPDecodeError::unexpected_list());
    }

    #[test]
    fn finish_rejects_leftover_fields() {
        let buf = (1u8, 2u8).encode_to_vec();
        let decoder = Decoder::new(&buf).unwrap();
        let (_, decoder): (u8, _) = decoder.decode_field("a").unwrap();
        assert!(decoder.finish().is_err());
    }
}
