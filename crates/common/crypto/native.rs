use ethereum_types::Address;
use sha2::Digest as _;

use crate::bls12;
use crate::provider::{Bls12G1, Bls12G2, Crypto, CryptoError};

/// secp256k1n / 2, the highest `s` accepted in transaction signatures.
const SECP256K1_N_HALF: [u8; 32] =
    hex_literal::hex!("7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0");

/// Order of the secp256r1 group.
const P256_N: [u8; 32] =
    hex_literal::hex!("ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551");

/// Native crypto implementation backed by the system libraries.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeCrypto;

fn recover_public_key_hash(
    sig: &[u8],
    recid: u8,
    msg: &[u8; 32],
) -> Result<[u8; 32], CryptoError> {
    let recovery_id = secp256k1::ecdsa::RecoveryId::from_i32(recid as i32)
        .map_err(|_| CryptoError::InvalidRecoveryId)?;
    let signature = secp256k1::ecdsa::RecoverableSignature::from_compact(sig, recovery_id)
        .map_err(|_| CryptoError::InvalidSignature)?;
    let message = secp256k1::Message::from_digest(*msg);
    let public_key = secp256k1::SECP256K1
        .recover_ecdsa(&message, &signature)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(crate::keccak::keccak_hash(
        &public_key.serialize_uncompressed()[1..],
    ))
}

/// Signs `msg` with `secret_key`, returning r || s and the recovery id.
pub fn sign_recoverable(
    secret_key: &[u8; 32],
    msg: &[u8; 32],
) -> Result<([u8; 64], u8), CryptoError> {
    let secret_key = secp256k1::SecretKey::from_slice(secret_key)
        .map_err(|_| CryptoError::InvalidInput("secret key"))?;
    let message = secp256k1::Message::from_digest(*msg);
    let (recovery_id, signature) = secp256k1::SECP256K1
        .sign_ecdsa_recoverable(&message, &secret_key)
        .serialize_compact();
    Ok((signature, recovery_id.to_i32() as u8))
}

/// Address controlled by `secret_key`.
pub fn address_from_secret_key(secret_key: &[u8; 32]) -> Result<Address, CryptoError> {
    let secret_key = secp256k1::SecretKey::from_slice(secret_key)
        .map_err(|_| CryptoError::InvalidInput("secret key"))?;
    let public_key = secret_key.public_key(secp256k1::SECP256K1);
    let hash = crate::keccak::keccak_hash(&public_key.serialize_uncompressed()[1..]);
    Ok(Address::from_slice(&hash[12..]))
}

mod bn254 {
    use super::CryptoError;
    use ark_bn254::{Fq, Fq2, G1Affine, G2Affine};
    use ark_ec::AffineRepr;
    use ark_ff::{BigInt, BigInteger, PrimeField, Zero};

    /// Reads a big-endian base field element, rejecting values not below the modulus.
    pub(super) fn read_fq(bytes: &[u8]) -> Result<Fq, CryptoError> {
        let bytes: &[u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidInput("field element must be 32 bytes"))?;
        let mut limbs = [0u64; 4];
        for (i, limb) in limbs.iter_mut().enumerate() {
            let end = 32 - 8 * i;
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[end - 8..end]);
            *limb = u64::from_be_bytes(word);
        }
        Fq::from_bigint(BigInt::new(limbs)).ok_or(CryptoError::InvalidPoint(
            "coordinate not in field",
        ))
    }

    pub(super) fn read_g1(bytes: &[u8]) -> Result<G1Affine, CryptoError> {
        if bytes.len() != 64 {
            return Err(CryptoError::InvalidInput("G1 point must be 64 bytes"));
        }
        let x = read_fq(&bytes[..32])?;
        let y = read_fq(&bytes[32..])?;
        if x.is_zero() && y.is_zero() {
            return Ok(G1Affine::zero());
        }
        let point = G1Affine::new_unchecked(x, y);
        if !point.is_on_curve() {
            return Err(CryptoError::InvalidPoint("G1 point not on curve"));
        }
        Ok(point)
    }

    // EVM encodes G2 coordinates imaginary part first: x_im || x_re || y_im || y_re
    pub(super) fn read_g2(bytes: &[u8]) -> Result<G2Affine, CryptoError> {
        if bytes.len() != 128 {
            return Err(CryptoError::InvalidInput("G2 point must be 128 bytes"));
        }
        let x_im = read_fq(&bytes[..32])?;
        let x_re = read_fq(&bytes[32..64])?;
        let y_im = read_fq(&bytes[64..96])?;
        let y_re = read_fq(&bytes[96..])?;
        if [x_im, x_re, y_im, y_re].iter().all(Zero::is_zero) {
            return Ok(G2Affine::zero());
        }
        let point = G2Affine::new_unchecked(Fq2::new(x_re, x_im), Fq2::new(y_re, y_im));
        if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
            return Err(CryptoError::InvalidPoint("G2 point not in subgroup"));
        }
        Ok(point)
    }

    pub(super) fn write_g1(point: G1Affine) -> [u8; 64] {
        let mut out = [0u8; 64];
        if let Some((x, y)) = point.xy() {
            out[..32].copy_from_slice(&x.into_bigint().to_bytes_be());
            out[32..].copy_from_slice(&y.into_bigint().to_bytes_be());
        }
        out
    }
}

impl Crypto for NativeCrypto {
    fn secp256k1_ecrecover(
        &self,
        sig: &[u8; 64],
        recid: u8,
        msg: &[u8; 32],
    ) -> Result<[u8; 32], CryptoError> {
        recover_public_key_hash(sig, recid, msg)
    }

    fn recover_signer(&self, sig: &[u8; 65], msg: &[u8; 32]) -> Result<Address, CryptoError> {
        if sig[32..64] > SECP256K1_N_HALF[..] {
            return Err(CryptoError::InvalidSignature);
        }
        let hash = recover_public_key_hash(&sig[..64], sig[64], msg)?;
        Ok(Address::from_slice(&hash[12..]))
    }

    fn sha256(&self, input: &[u8]) -> [u8; 32] {
        sha2::Sha256::digest(input).into()
    }

    fn ripemd160(&self, input: &[u8]) -> [u8; 32] {
        let digest = ripemd::Ripemd160::digest(input);
        let mut output = [0u8; 32];
        output[12..].copy_from_slice(&digest);
        output
    }

    fn bn254_g1_add(&self, p1: &[u8], p2: &[u8]) -> Result<[u8; 64], CryptoError> {
        use ark_ec::CurveGroup;

        let sum = (bn254::read_g1(p1)? + bn254::read_g1(p2)?).into_affine();
        Ok(bn254::write_g1(sum))
    }

    fn bn254_g1_mul(&self, point: &[u8], scalar: &[u8]) -> Result<[u8; 64], CryptoError> {
        use ark_ec::CurveGroup;
        use ark_ff::PrimeField;
        use std::ops::Mul as _;

        if scalar.len() != 32 {
            return Err(CryptoError::InvalidInput("scalar must be 32 bytes"));
        }
        let point = bn254::read_g1(point)?;
        let scalar = ark_bn254::Fr::from_be_bytes_mod_order(scalar);
        Ok(bn254::write_g1(point.mul(scalar).into_affine()))
    }

    fn bn254_pairing_check(&self, pairs: &[(&[u8], &[u8])]) -> Result<bool, CryptoError> {
        use ark_ec::pairing::Pairing;
        use ark_ff::One;

        let mut g1_points = Vec::with_capacity(pairs.len());
        let mut g2_points = Vec::with_capacity(pairs.len());
        for (g1, g2) in pairs {
            g1_points.push(bn254::read_g1(g1)?);
            g2_points.push(bn254::read_g2(g2)?);
        }
        Ok(ark_bn254::Bn254::multi_pairing(g1_points, g2_points)
            .0
            .is_one())
    }

    fn modexp(&self, base: &[u8], exp: &[u8], modulus: &[u8]) -> Result<Vec<u8>, CryptoError> {
        use malachite::base::num::arithmetic::traits::ModPow as _;
        use malachite::base::num::basic::traits::Zero as _;
        use malachite::{Natural, base::num::conversion::traits::*};

        let base = Natural::from_power_of_2_digits_desc(8u64, base.iter().cloned())
            .ok_or(CryptoError::InvalidInput("base"))?;
        let exp = Natural::from_power_of_2_digits_desc(8u64, exp.iter().cloned())
            .ok_or(CryptoError::InvalidInput("exponent"))?;
        let modulus_nat = Natural::from_power_of_2_digits_desc(8u64, modulus.iter().cloned())
            .ok_or(CryptoError::InvalidInput("modulus"))?;

        let result = if modulus_nat == Natural::ZERO {
            Natural::ZERO
        } else if exp == Natural::ZERO {
            Natural::from(1_u8) % &modulus_nat
        } else {
            (base % &modulus_nat).mod_pow(&exp, &modulus_nat)
        };

        let digits: Vec<u8> = result.to_power_of_2_digits_desc(8);
        let mut out = vec![0u8; modulus.len()];
        let offset = modulus.len().saturating_sub(digits.len());
        let skip = digits.len().saturating_sub(modulus.len());
        out[offset..].copy_from_slice(&digits[skip..]);
        Ok(out)
    }

    fn blake2_compress(&self, rounds: u32, h: &mut [u64; 8], m: [u64; 16], t: [u64; 2], f: bool) {
        crate::blake2f::blake2b_f(rounds as usize, h, &m, &t, f);
    }

    fn verify_kzg_proof(
        &self,
        commitment: &[u8; 48],
        z: &[u8; 32],
        y: &[u8; 32],
        proof: &[u8; 48],
    ) -> Result<bool, CryptoError> {
        crate::kzg::verify_kzg_proof(*commitment, *z, *y, *proof)
    }

    fn bls12_381_g1_add(&self, a: Bls12G1, b: Bls12G1) -> Result<[u8; 96], CryptoError> {
        bls12::g1_add(a, b)
    }

    fn bls12_381_g1_msm(&self, pairs: &[(Bls12G1, [u8; 32])]) -> Result<[u8; 96], CryptoError> {
        bls12::g1_msm(pairs)
    }

    fn bls12_381_g2_add(&self, a: Bls12G2, b: Bls12G2) -> Result<[u8; 192], CryptoError> {
        bls12::g2_add(a, b)
    }

    fn bls12_381_g2_msm(
        &self,
        pairs: &[(Bls12G2, [u8; 32])],
    ) -> Result<[u8; 192], CryptoError> {
        bls12::g2_msm(pairs)
    }

    fn bls12_381_pairing_check(&self, pairs: &[(Bls12G1, Bls12G2)]) -> Result<bool, CryptoError> {
        bls12::pairing_check(pairs)
    }

    fn bls12_381_fp_to_g1(&self, fp: &[u8; 48]) -> Result<[u8; 96], CryptoError> {
        bls12::fp_to_g1(fp)
    }

    fn bls12_381_fp2_to_g2(&self, fp2: ([u8; 48], [u8; 48])) -> Result<[u8; 192], CryptoError> {
        bls12::fp2_to_g2(fp2)
    }

    fn secp256r1_verify(&self, msg: &[u8; 32], sig: &[u8; 64], pk: &[u8; 64]) -> bool {
        use p256::{
            EncodedPoint, FieldBytes,
            ecdsa::{Signature, VerifyingKey, signature::hazmat::PrehashVerifier},
        };

        let (r, s) = sig.split_at(32);
        let in_range = |scalar: &[u8]| scalar.iter().any(|b| *b != 0) && scalar < &P256_N[..];
        if !in_range(r) || !in_range(s) {
            return false;
        }

        let (x, y) = pk.split_at(32);
        let point = EncodedPoint::from_affine_coordinates(
            FieldBytes::from_slice(x),
            FieldBytes::from_slice(y),
            false,
        );
        let Ok(verifier) = VerifyingKey::from_encoded_point(&point) else {
            return false;
        };
        let Ok(signature) =
            Signature::from_scalars(*FieldBytes::from_slice(r), *FieldBytes::from_slice(s))
        else {
            return false;
        };
        verifier.verify_prehash(msg, &signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn ecrecover_known_vector() {
        let msg = hex!("456e9aea5e197a1f1af7a3e85a3212fa4049a3ba34c2289b4c860fc0b0c64ef3");
        let sig = hex!(
            "9242685bf161793cc25603c231bc2f568eb630ea16aa137d2664ac8038825608"
            "4f8ae3bd7535248d0bd448298cc2e2071e56992d0774dc340c368ae950852ada"
        );
        let hash = NativeCrypto.secp256k1_ecrecover(&sig, 1, &msg).unwrap();
        assert_eq!(hash[12..], hex!("7156526fbd7a3c72969b54f64e42c10fbb768c8a"));
    }

    #[test]
    fn sign_then_recover() {
        let secret = [0x42u8; 32];
        let msg = crate::keccak::keccak_hash(b"transfer");
        let (sig, recid) = sign_recoverable(&secret, &msg).unwrap();
        let mut full = [0u8; 65];
        full[..64].copy_from_slice(&sig);
        full[64] = recid;
        let signer = NativeCrypto.recover_signer(&full, &msg).unwrap();
        assert_eq!(signer, address_from_secret_key(&secret).unwrap());
    }

    #[test]
    fn recover_signer_rejects_high_s() {
        let mut sig = [0u8; 65];
        sig[0] = 1;
        sig[32..64].copy_from_slice(&[0xff; 32]);
        assert_eq!(
            NativeCrypto.recover_signer(&sig, &[1; 32]),
            Err(CryptoError::InvalidSignature)
        );
    }

    #[test]
    fn hash_vectors() {
        assert_eq!(
            NativeCrypto.sha256(b""),
            hex!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
        assert_eq!(
            NativeCrypto.ripemd160(b"")[12..],
            hex!("9c1185a5c5e9fc54612808977ee8f548b2258d31")
        );
    }

    #[test]
    fn modexp_small_values() {
        assert_eq!(NativeCrypto.modexp(&[3], &[5], &[7]).unwrap(), vec![5]);
        assert_eq!(NativeCrypto.modexp(&[3], &[], &[0, 7]).unwrap(), vec![0, 1]);
        assert_eq!(NativeCrypto.modexp(&[3], &[5], &[]).unwrap(), Vec::<u8>::new());
        assert_eq!(NativeCrypto.modexp(&[3], &[5], &[0]).unwrap(), vec![0]);
    }

    #[test]
    fn bn254_add_generator_twice() {
        let mut g = [0u8; 64];
        g[31] = 1;
        g[63] = 2;
        let doubled = NativeCrypto.bn254_g1_add(&g, &g).unwrap();
        assert_eq!(
            doubled,
            hex!(
                "030644e72e131a029b85045b68181585d97816a916871ca8d3c208c16d87cfd3"
                "15ed738c0e0a7c92e7845f96b2ae9c0a68a6a449e3538fc7ff3ebf7a5a18a2c4"
            )
        );
        let mut two = [0u8; 32];
        two[31] = 2;
        assert_eq!(NativeCrypto.bn254_g1_mul(&g, &two).unwrap(), doubled);
    }

    #[test]
    fn bn254_rejects_points_off_curve() {
        let mut p = [0u8; 64];
        p[31] = 1;
        p[63] = 3;
        assert!(NativeCrypto.bn254_g1_add(&p, &[0u8; 64]).is_err());
    }

    #[test]
    fn empty_pairing_holds() {
        assert!(NativeCrypto.bn254_pairing_check(&[]).unwrap());
    }

    fn p256_signature(msg: &[u8; 32]) -> ([u8; 64], [u8; 64]) {
        use p256::ecdsa::{Signature, SigningKey, signature::hazmat::PrehashSigner};

        let key = SigningKey::from_slice(&[0x11; 32]).unwrap();
        let signature: Signature = key.sign_prehash(msg).unwrap();
        let point = key.verifying_key().to_encoded_point(false);
        let mut pk = [0u8; 64];
        pk[..32].copy_from_slice(point.x().unwrap());
        pk[32..].copy_from_slice(point.y().unwrap());
        let mut sig = [0u8; 64];
        sig.copy_from_slice(&signature.to_bytes());
        (sig, pk)
    }

    #[test]
    fn secp256r1_accepts_a_valid_signature() {
        let msg = NativeCrypto.sha256(b"p256");
        let (sig, pk) = p256_signature(&msg);
        assert!(NativeCrypto.secp256r1_verify(&msg, &sig, &pk));

        let other = NativeCrypto.sha256(b"another message");
        assert!(!NativeCrypto.secp256r1_verify(&other, &sig, &pk));
    }

    #[test]
    fn secp256r1_rejects_out_of_range_scalars_and_bad_keys() {
        let msg = NativeCrypto.sha256(b"p256");
        let (sig, pk) = p256_signature(&msg);

        let mut zero_r = sig;
        zero_r[..32].copy_from_slice(&[0u8; 32]);
        assert!(!NativeCrypto.secp256r1_verify(&msg, &zero_r, &pk));

        let mut big_s = sig;
        big_s[32..].copy_from_slice(&P256_N);
        assert!(!NativeCrypto.secp256r1_verify(&msg, &big_s, &pk));

        let mut off_curve = pk;
        off_curve[63] ^= 1;
        assert!(!NativeCrypto.secp256r1_verify(&msg, &sig, &off_curve));
        assert!(!NativeCrypto.secp256r1_verify(&msg, &sig, &[0u8; 64]));
    }

    #[test]
    fn bls12_identity_through_the_provider() {
        let infinity = ([0u8; 48], [0u8; 48]);
        assert_eq!(
            NativeCrypto.bls12_381_g1_add(infinity, infinity).unwrap(),
            [0u8; 96]
        );
        assert!(NativeCrypto.bls12_381_pairing_check(&[]).is_err());
    }
}
