/// Encoding of the empty byte string (and of the integer zero).
pub const RLP_NULL: u8 = 0x80;
/// Encoding of the empty list.
pub const RLP_EMPTY_LIST: u8 = 0xc0;

/// Payloads shorter than this use the single-byte prefix form.
pub const SHORT_PAYLOAD_LIMIT: usize = 56;

/// Prefix base for long byte strings (`0xb7 + len(len)`).
pub const LONG_STRING_BASE: u8 = 0xb7;
/// Prefix base for long lists (`0xf7 + len(len)`).
pub const LONG_LIST_BASE: u8 = 0xf7;
