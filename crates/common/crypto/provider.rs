use ethereum_types::{Address, H256};

/// Errors from crypto operations. They never carry library-specific types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid recovery id")]
    InvalidRecoveryId,
    #[error("recovery failed")]
    RecoveryFailed,
    #[error("invalid point: {0}")]
    InvalidPoint(&'static str),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("{0}")]
    Other(String),
}

/// BLS12-381 G1 point as its unpadded x and y coordinates.
pub type Bls12G1 = ([u8; 48], [u8; 48]);
/// BLS12-381 G2 point as x_0, x_1, y_0, y_1, where x = x_0 + x_1 * u.
pub type Bls12G2 = ([u8; 48], [u8; 48], [u8; 48], [u8; 48]);

/// All cryptographic operations the execution layer needs.
///
/// The interpreter and the state transition depend only on this trait.
/// Methods take `&self` so implementations can be used as `&dyn Crypto`.
pub trait Crypto: Send + Sync + core::fmt::Debug {
    fn keccak256(&self, input: &[u8]) -> H256 {
        crate::keccak::keccak(input)
    }

    /// Recovers the keccak hash of the public key that produced `sig` (r || s) over `msg`.
    /// The address is the last 20 bytes. Used by the ECRECOVER precompile.
    fn secp256k1_ecrecover(
        &self,
        sig: &[u8; 64],
        recid: u8,
        msg: &[u8; 32],
    ) -> Result<[u8; 32], CryptoError>;

    /// Recovers the signer of a transaction from r || s || y_parity.
    /// Rejects high-s signatures (EIP-2).
    fn recover_signer(&self, sig: &[u8; 65], msg: &[u8; 32]) -> Result<Address, CryptoError>;

    fn sha256(&self, input: &[u8]) -> [u8; 32];

    /// RIPEMD-160 digest left padded to 32 bytes.
    fn ripemd160(&self, input: &[u8]) -> [u8; 32];

    /// Adds two uncompressed G1 points (x || y, 64 bytes each).
    fn bn254_g1_add(&self, p1: &[u8], p2: &[u8]) -> Result<[u8; 64], CryptoError>;

    /// Multiplies an uncompressed G1 point by a 32 byte big-endian scalar.
    fn bn254_g1_mul(&self, point: &[u8], scalar: &[u8]) -> Result<[u8; 64], CryptoError>;

    /// Checks that the product of the pairings of (G1 64 bytes, G2 128 bytes) pairs is one.
    fn bn254_pairing_check(&self, pairs: &[(&[u8], &[u8])]) -> Result<bool, CryptoError>;

    /// `base ^ exp % modulus`, left padded to the modulus length.
    fn modexp(&self, base: &[u8], exp: &[u8], modulus: &[u8]) -> Result<Vec<u8>, CryptoError>;

    fn blake2_compress(&self, rounds: u32, h: &mut [u64; 8], m: [u64; 16], t: [u64; 2], f: bool);

    /// KZG point evaluation, `Ok(false)` when the proof does not hold.
    fn verify_kzg_proof(
        &self,
        commitment: &[u8; 48],
        z: &[u8; 32],
        y: &[u8; 32],
        proof: &[u8; 48],
    ) -> Result<bool, CryptoError>;

    // BLS12-381 (EIP-2537). Points are big-endian and the all zero encoding is the
    // point at infinity.

    /// Adds two G1 points. Points only need to be on the curve.
    fn bls12_381_g1_add(&self, a: Bls12G1, b: Bls12G1) -> Result<[u8; 96], CryptoError>;

    /// Sum of scalar multiplications. Points must be in the subgroup.
    fn bls12_381_g1_msm(&self, pairs: &[(Bls12G1, [u8; 32])]) -> Result<[u8; 96], CryptoError>;

    fn bls12_381_g2_add(&self, a: Bls12G2, b: Bls12G2) -> Result<[u8; 192], CryptoError>;

    fn bls12_381_g2_msm(&self, pairs: &[(Bls12G2, [u8; 32])])
    -> Result<[u8; 192], CryptoError>;

    /// Checks that the product of the pairings is one. An empty input fails.
    fn bls12_381_pairing_check(&self, pairs: &[(Bls12G1, Bls12G2)]) -> Result<bool, CryptoError>;

    /// Maps a base field element to G1 (SSWU map followed by cofactor clearing).
    fn bls12_381_fp_to_g1(&self, fp: &[u8; 48]) -> Result<[u8; 96], CryptoError>;

    /// Maps an Fp2 element given as (c0, c1) to G2.
    fn bls12_381_fp2_to_g2(&self, fp2: ([u8; 48], [u8; 48])) -> Result<[u8; 192], CryptoError>;

    /// secp256r1 signature check over a prehashed message (EIP-7951).
    /// `sig` is r || s and `pk` is the uncompressed x || y.
    fn secp256r1_verify(&self, msg: &[u8; 32], sig: &[u8; 64], pk: &[u8; 64]) -> bool;
}
