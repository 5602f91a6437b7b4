//! BLS12-381 operations behind the EIP-2537 precompiles.
//!
//! Coordinates come in unpadded, 48 bytes each. The `bls12_381` crate serializes
//! G2 as x_1 || x_0 || y_1 || y_0 while the precompiles use x_0 || x_1 || y_0 || y_1.

use bls12_381::{
    Fp, Fp2, G1Affine, G1Projective, G2Affine, G2Prepared, G2Projective, Gt, Scalar,
    hash_to_curve::MapToCurve, multi_miller_loop,
};

use crate::provider::{Bls12G1, Bls12G2, CryptoError};

const ZERO: [u8; 48] = [0u8; 48];

/// The top three bits carry the serialization flags of the `bls12_381` crate.
/// A canonical field element never has them set.
fn check_flags(coordinates: &[&[u8; 48]]) -> Result<(), CryptoError> {
    if coordinates.iter().any(|coordinate| coordinate[0] & 0xe0 != 0) {
        return Err(CryptoError::InvalidPoint("coordinate not in field"));
    }
    Ok(())
}

/// Reads a G1 point. `subgroup` also asks for membership in the prime order subgroup.
fn read_g1((x, y): Bls12G1, subgroup: bool) -> Result<G1Affine, CryptoError> {
    if x == ZERO && y == ZERO {
        return Ok(G1Affine::identity());
    }
    check_flags(&[&x, &y])?;
    let mut bytes = [0u8; 96];
    bytes[..48].copy_from_slice(&x);
    bytes[48..].copy_from_slice(&y);
    let point = if subgroup {
        G1Affine::from_uncompressed(&bytes).into_option()
    } else {
        G1Affine::from_uncompressed_unchecked(&bytes)
            .into_option()
            .filter(|point| bool::from(point.is_on_curve()))
    };
    point.ok_or(CryptoError::InvalidPoint("invalid BLS12-381 G1 point"))
}

fn read_g2((x0, x1, y0, y1): Bls12G2, subgroup: bool) -> Result<G2Affine, CryptoError> {
    if [x0, x1, y0, y1].iter().all(|coordinate| *coordinate == ZERO) {
        return Ok(G2Affine::identity());
    }
    check_flags(&[&x0, &x1, &y0, &y1])?;
    let mut bytes = [0u8; 192];
    bytes[..48].copy_from_slice(&x1);
    bytes[48..96].copy_from_slice(&x0);
    bytes[96..144].copy_from_slice(&y1);
    bytes[144..].copy_from_slice(&y0);
    let point = if subgroup {
        G2Affine::from_uncompressed(&bytes).into_option()
    } else {
        G2Affine::from_uncompressed_unchecked(&bytes)
            .into_option()
            .filter(|point| bool::from(point.is_on_curve()))
    };
    point.ok_or(CryptoError::InvalidPoint("invalid BLS12-381 G2 point"))
}

/// Big-endian scalar, reduced modulo the group order.
fn read_scalar(bytes: &[u8; 32]) -> Scalar {
    let mut limbs = [0u64; 4];
    for (limb, chunk) in limbs.iter_mut().rev().zip(bytes.chunks_exact(8)) {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        *limb = u64::from_be_bytes(word);
    }
    Scalar::from_raw(limbs)
}

fn read_fp(bytes: &[u8; 48]) -> Result<Fp, CryptoError> {
    Fp::from_bytes(bytes)
        .into_option()
        .ok_or(CryptoError::InvalidInput("field element not below the modulus"))
}

fn write_g1(point: G1Affine) -> [u8; 96] {
    if bool::from(point.is_identity()) {
        return [0u8; 96];
    }
    point.to_uncompressed()
}

fn write_g2(point: G2Affine) -> [u8; 192] {
    if bool::from(point.is_identity()) {
        return [0u8; 192];
    }
    let raw = point.to_uncompressed();
    let mut out = [0u8; 192];
    out[..48].copy_from_slice(&raw[48..96]);
    out[48..96].copy_from_slice(&raw[..48]);
    out[96..144].copy_from_slice(&raw[144..]);
    out[144..].copy_from_slice(&raw[96..144]);
    out
}

pub(crate) fn g1_add(a: Bls12G1, b: Bls12G1) -> Result<[u8; 96], CryptoError> {
    let sum = G1Projective::from(read_g1(a, false)?) + G1Projective::from(read_g1(b, false)?);
    Ok(write_g1(G1Affine::from(sum)))
}

pub(crate) fn g1_msm(pairs: &[(Bls12G1, [u8; 32])]) -> Result<[u8; 96], CryptoError> {
    let mut sum = G1Projective::identity();
    for (point, scalar) in pairs {
        let point = read_g1(*point, true)?;
        let scalar = read_scalar(scalar);
        if scalar != Scalar::zero() {
            sum += G1Projective::from(point) * scalar;
        }
    }
    Ok(write_g1(G1Affine::from(sum)))
}

pub(crate) fn g2_add(a: Bls12G2, b: Bls12G2) -> Result<[u8; 192], CryptoError> {
    let sum = G2Projective::from(read_g2(a, false)?) + G2Projective::from(read_g2(b, false)?);
    Ok(write_g2(G2Affine::from(sum)))
}

pub(crate) fn g2_msm(pairs: &[(Bls12G2, [u8; 32])]) -> Result<[u8; 192], CryptoError> {
    let mut sum = G2Projective::identity();
    for (point, scalar) in pairs {
        let point = read_g2(*point, true)?;
        let scalar = read_scalar(scalar);
        if scalar != Scalar::zero() {
            sum += G2Projective::from(point) * scalar;
        }
    }
    Ok(write_g2(G2Affine::from(sum)))
}

pub(crate) fn pairing_check(pairs: &[(Bls12G1, Bls12G2)]) -> Result<bool, CryptoError> {
    if pairs.is_empty() {
        return Err(CryptoError::InvalidInput("empty pairing input"));
    }
    let mut points = Vec::with_capacity(pairs.len());
    for (g1, g2) in pairs {
        points.push((read_g1(*g1, true)?, G2Prepared::from(read_g2(*g2, true)?)));
    }
    let terms: Vec<(&G1Affine, &G2Prepared)> = points.iter().map(|(g1, g2)| (g1, g2)).collect();
    Ok(multi_miller_loop(&terms).final_exponentiation() == Gt::identity())
}

pub(crate) fn fp_to_g1(fp: &[u8; 48]) -> Result<[u8; 96], CryptoError> {
    let point = G1Projective::map_to_curve(&read_fp(fp)?).clear_h();
    Ok(write_g1(G1Affine::from(point)))
}

pub(crate) fn fp2_to_g2((c0, c1): ([u8; 48], [u8; 48])) -> Result<[u8; 192], CryptoError> {
    let element = Fp2 {
        c0: read_fp(&c0)?,
        c1: read_fp(&c1)?,
    };
    let point = G2Projective::map_to_curve(&element).clear_h();
    Ok(write_g2(G2Affine::from(point)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator_g1() -> Bls12G1 {
        let raw = G1Affine::generator().to_uncompressed();
        let mut x = [0u8; 48];
        let mut y = [0u8; 48];
        x.copy_from_slice(&raw[..48]);
        y.copy_from_slice(&raw[48..]);
        (x, y)
    }

    fn split_g1(bytes: [u8; 96]) -> Bls12G1 {
        let mut x = [0u8; 48];
        let mut y = [0u8; 48];
        x.copy_from_slice(&bytes[..48]);
        y.copy_from_slice(&bytes[48..]);
        (x, y)
    }

    fn split_g2(bytes: [u8; 192]) -> Bls12G2 {
        let mut parts = [[0u8; 48]; 4];
        for (part, chunk) in parts.iter_mut().zip(bytes.chunks_exact(48)) {
            part.copy_from_slice(chunk);
        }
        (parts[0], parts[1], parts[2], parts[3])
    }

    fn scalar(value: u8) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes[31] = value;
        bytes
    }

    #[test]
    fn doubling_matches_multiplication_by_two() {
        let g = generator_g1();
        let doubled = g1_add(g, g).unwrap();
        assert_eq!(g1_msm(&[(g, scalar(2))]).unwrap(), doubled);
        assert_eq!(
            g1_msm(&[(g, scalar(1)), (g, scalar(1))]).unwrap(),
            doubled
        );
    }

    #[test]
    fn infinity_is_the_identity() {
        let g = generator_g1();
        let infinity = (ZERO, ZERO);
        assert_eq!(split_g1(g1_add(g, infinity).unwrap()), g);
        assert_eq!(g1_msm(&[(g, scalar(0))]).unwrap(), [0u8; 96]);
    }

    #[test]
    fn g2_roundtrips_through_the_swapped_layout() {
        let raw = G2Affine::generator();
        let g = split_g2(write_g2(raw));
        assert_eq!(read_g2(g, true).unwrap(), raw);
        let doubled = g2_add(g, g).unwrap();
        assert_eq!(g2_msm(&[(g, scalar(2))]).unwrap(), doubled);
    }

    #[test]
    fn pairing_of_inverse_points_is_one() {
        let g1 = generator_g1();
        let g2 = split_g2(write_g2(G2Affine::generator()));
        let neg_g1 = split_g1(write_g1(-G1Affine::generator()));
        assert!(pairing_check(&[(g1, g2), (neg_g1, g2)]).unwrap());
        assert!(!pairing_check(&[(g1, g2)]).unwrap());
        assert!(pairing_check(&[]).is_err());
    }

    #[test]
    fn rejects_points_off_the_curve_and_flagged_coordinates() {
        let (x, mut y) = generator_g1();
        y[47] ^= 1;
        assert!(g1_add((x, y), (x, y)).is_err());

        let mut flagged = ZERO;
        flagged[0] = 0x40;
        assert!(g1_add((flagged, ZERO), (ZERO, ZERO)).is_err());
    }

    #[test]
    fn map_to_curve_rejects_non_canonical_elements() {
        assert!(fp_to_g1(&[0xff; 48]).is_err());
        let mapped = fp_to_g1(&ZERO).unwrap();
        assert!(read_g1(split_g1(mapped), true).is_ok());
        let mapped = fp2_to_g2((ZERO, ZERO)).unwrap();
        assert!(read_g2(split_g2(mapped), true).is_ok());
    }
}
