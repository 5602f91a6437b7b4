use crate::provider::CryptoError;
use sha2::{Digest, Sha256};

pub const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;

/// Field modulus of BLS12-381 scalars, returned by the point evaluation precompile.
pub const BLS_MODULUS: [u8; 32] =
    hex_literal::hex!("73eda753299d7d483339d80809a1d80553bda402fffe5bfeffffffff00000001");
pub const FIELD_ELEMENTS_PER_BLOB: u64 = 4096;

/// Versioned hash of a blob commitment (EIP-4844).
pub fn kzg_to_versioned_hash(commitment: &[u8; 48]) -> [u8; 32] {
    let mut hash: [u8; 32] = Sha256::digest(commitment).into();
    hash[0] = VERSIONED_HASH_VERSION_KZG;
    hash
}

/// Verifies that p(z) = y given a commitment to p(x) and a KZG proof.
pub fn verify_kzg_proof(
    commitment: [u8; 48],
    z: [u8; 32],
    y: [u8; 32],
    proof: [u8; 48],
) -> Result<bool, CryptoError> {
    kzg_rs::KzgProof::verify_kzg_proof(
        &kzg_rs::Bytes48(commitment),
        &kzg_rs::Bytes32(z),
        &kzg_rs::Bytes32(y),
        &kzg_rs::Bytes48(proof),
        &kzg_rs::get_kzg_settings(),
    )
    .map_err(|err| CryptoError::Other(format!("kzg: {err:?}")))
}
