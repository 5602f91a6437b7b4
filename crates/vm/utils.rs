use bytes::Bytes;
use ethereum_types::{Address, U256};
use keel_crypto::keccak::{keccak, keccak_concat};
use keel_rlp::structs::Encoder;

use crate::errors::{ExceptionalHalt, VMError};

/// Address of a contract deployed by `sender` with `CREATE` or a creation transaction.
pub fn calculate_create_address(sender: Address, nonce: u64) -> Address {
    let mut encoded = Vec::new();
    Encoder::new(&mut encoded)
        .encode_field(&sender)
        .encode_field(&nonce)
        .finish();
    Address::from_slice(&keccak(encoded)[12..])
}

/// Address of a contract deployed with `CREATE2` (EIP-1014).
pub fn calculate_create2_address(sender: Address, init_code: &[u8], salt: U256) -> Address {
    let init_code_hash = keccak(init_code);
    let hash = keccak_concat(&[
        &[0xff],
        sender.as_bytes(),
        &salt.to_big_endian(),
        init_code_hash.as_bytes(),
    ]);
    Address::from_slice(&hash[12..])
}

/// Converts a memory offset. Offsets that do not fit cannot be paid for.
pub fn u256_to_usize(value: U256) -> Result<usize, VMError> {
    usize::try_from(value).map_err(|_| ExceptionalHalt::OutOfGas.into())
}

/// Converts a `(size, offset)` pair. The offset is ignored when the size is zero.
pub fn size_offset_to_usize(size: U256, offset: U256) -> Result<(usize, usize), VMError> {
    if size.is_zero() {
        return Ok((0, 0));
    }
    Ok((u256_to_usize(size)?, u256_to_usize(offset)?))
}

/// `size` bytes of `data` from `offset`, zero padded past its end.
pub fn read_padded(data: &[u8], offset: U256, size: usize) -> Bytes {
    let mut chunk = vec![0u8; size];
    if let Ok(offset) = usize::try_from(offset) {
        if let Some(available) = data.get(offset..) {
            let copied = available.len().min(size);
            chunk[..copied].copy_from_slice(&available[..copied]);
        }
    }
    chunk.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn create_address_of_known_deployer() {
        let sender = Address::from(hex!("6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0"));
        assert_eq!(
            calculate_create_address(sender, 0),
            Address::from(hex!("cd234a471b72ba2f1ccf0a70fcaba648a5eecd8d"))
        );
        assert_eq!(
            calculate_create_address(sender, 1),
            Address::from(hex!("343c43a37d37dff08ae8c4a11544c718abb4fcf8"))
        );
    }

    #[test]
    fn create2_address_is_deterministic() {
        // EIP-1014 example 5
        let sender = Address::from(hex!("00000000000000000000000000000000deadbeef"));
        let salt = U256::from(0xcafebabeu64);
        let init_code = hex!("deadbeef");
        let address = calculate_create2_address(sender, &init_code, salt);
        assert_eq!(
            address,
            Address::from(hex!("60f3f640a8508fc6a86d45df051962668e1e8ac7"))
        );
        assert_eq!(calculate_create2_address(sender, &init_code, salt), address);
        assert_ne!(
            calculate_create2_address(sender, &init_code, salt + 1),
            address
        );
    }

    #[test]
    fn zero_size_ignores_offset() {
        assert_eq!(size_offset_to_usize(U256::zero(), U256::MAX).unwrap(), (0, 0));
        assert!(size_offset_to_usize(U256::one(), U256::MAX).is_err());
    }

    #[test]
    fn padded_reads() {
        assert_eq!(read_padded(&[1, 2, 3], U256::one(), 4).as_ref(), &[2, 3, 0, 0]);
        assert_eq!(read_padded(&[1, 2, 3], U256::MAX, 2).as_ref(), &[0, 0]);
    }
}
