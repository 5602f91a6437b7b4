use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use hex::FromHexError;

use crate::constants::DELEGATION_PREFIX;

/// Converts a big endian slice of at most 32 bytes to a U256.
pub fn u256_from_big_endian(slice: &[u8]) -> U256 {
    let mut padded = [0u8; 32];
    let start = 32usize.saturating_sub(slice.len());
    padded[start..].copy_from_slice(&slice[slice.len().saturating_sub(32)..]);
    U256::from_big_endian(&padded)
}

#[inline(always)]
pub fn u256_to_big_endian(value: U256) -> [u8; 32] {
    value.to_big_endian()
}

#[inline(always)]
pub fn u256_to_h256(value: U256) -> H256 {
    H256(value.to_big_endian())
}

#[inline(always)]
pub fn h256_to_u256(value: H256) -> U256 {
    U256::from_big_endian(value.as_bytes())
}

/// Last 20 bytes of a word, as used by opcodes that take an address operand.
pub fn word_to_address(word: U256) -> Address {
    Address::from_slice(&word.to_big_endian()[12..])
}

pub fn address_to_word(address: Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

/// Account the code delegates to, when it is a delegation designator (EIP-7702).
pub fn delegated_address(code: &[u8]) -> Option<Address> {
    match code.strip_prefix(&DELEGATION_PREFIX) {
        Some(address) if address.len() == 20 => Some(Address::from_slice(address)),
        _ => None,
    }
}

/// Designator code for `address`. Delegating to the zero address clears the code.
pub fn delegation_code(address: Address) -> Bytes {
    if address.is_zero() {
        return Bytes::new();
    }
    [DELEGATION_PREFIX.as_slice(), address.as_bytes()].concat().into()
}

pub fn decode_hex(hex: &str) -> Result<Vec<u8>, FromHexError> {
    let trimmed = hex.strip_prefix("0x").unwrap_or(hex);
    if trimmed.len() % 2 == 1 {
        return hex::decode(format!("0{trimmed}"));
    }
    hex::decode(trimmed)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn big_endian_conversions() {
        assert_eq!(u256_from_big_endian(&[]), U256::zero());
        assert_eq!(u256_from_big_endian(&[1, 0]), U256::from(256));
        assert_eq!(
            u256_from_big_endian(&u256_to_big_endian(U256::MAX)),
            U256::MAX
        );
        assert_eq!(h256_to_u256(u256_to_h256(U256::from(42))), U256::from(42));
    }

    #[test]
    fn address_words() {
        let address = Address::repeat_byte(0xaa);
        let word = address_to_word(address);
        assert_eq!(word_to_address(word), address);
        assert_eq!(word_to_address(word | (U256::one() << 200)), address);
    }

    #[test]
    fn delegation_designators() {
        let target = Address::repeat_byte(0x42);
        let code = delegation_code(target);
        assert_eq!(code.len(), 23);
        assert_eq!(delegated_address(&code), Some(target));
        assert!(delegation_code(Address::zero()).is_empty());
        // a longer code with the same prefix is a regular contract
        let mut longer = code.to_vec();
        longer.push(0);
        assert_eq!(delegated_address(&longer), None);
        assert_eq!(delegated_address(&[0xef, 0x01]), None);
    }

    #[test]
    fn odd_length_hex() {
        assert_eq!(decode_hex("0x1").unwrap(), vec![1]);
        assert_eq!(decode_hex("0x0102").unwrap(), vec![1, 2]);
        assert!(decode_hex("0xzz").is_err());
    }
}
