//! Recursive Length Prefix serialization.
//!
//! Encoding goes through [`encode::RLPEncode`], decoding through [`decode::RLPDecode`].
//! Structs are usually (de)serialized with the helpers in [`structs`].

pub mod constants;
pub mod decode;
pub mod encode;
pub mod error;
pub mod structs;
