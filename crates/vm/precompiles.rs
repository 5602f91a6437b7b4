//! Precompiled contracts at `0x01..=0x11` and `0x100`.
//!
//! Every precompile charges its gas from `gas_remaining` before doing any work.
//! A returned error makes the call fail and consumes all the gas it was given.

use bytes::{Buf, Bytes};
use ethereum_types::{Address, H160, U256};
use keel_crypto::{
    Bls12G1, Bls12G2, Crypto,
    kzg::{BLS_MODULUS, FIELD_ELEMENTS_PER_BLOB, kzg_to_versioned_hash},
};

use crate::{
    constants::P256_VERIFY_ADDRESS,
    errors::{ExceptionalHalt, VMError},
    fork_config::ForkConfig,
    gas_cost::{
        self, BLAKE2F_ROUND_COST, BLS12_381_G1_K_DISCOUNT, BLS12_381_G1ADD_COST,
        BLS12_381_G2_K_DISCOUNT, BLS12_381_G2ADD_COST, BLS12_381_MAP_FP_TO_G1_COST,
        BLS12_381_MAP_FP2_TO_G2_COST, ECADD_COST, ECADD_COST_BYZANTIUM, ECMUL_COST,
        ECMUL_COST_BYZANTIUM, ECRECOVER_COST, G1_MUL_COST, G2_MUL_COST, ModexpPricing,
        P256_VERIFY_COST, POINT_EVALUATION_COST,
    },
};

pub const ECRECOVER_ADDRESS: Address = precompile_address(0x01);
pub const SHA2_256_ADDRESS: Address = precompile_address(0x02);
pub const RIPEMD_160_ADDRESS: Address = precompile_address(0x03);
pub const IDENTITY_ADDRESS: Address = precompile_address(0x04);
pub const MODEXP_ADDRESS: Address = precompile_address(0x05);
pub const ECADD_ADDRESS: Address = precompile_address(0x06);
pub const ECMUL_ADDRESS: Address = precompile_address(0x07);
pub const ECPAIRING_ADDRESS: Address = precompile_address(0x08);
pub const BLAKE2F_ADDRESS: Address = precompile_address(0x09);
pub const POINT_EVALUATION_ADDRESS: Address = precompile_address(0x0a);
pub const BLS12_G1ADD_ADDRESS: Address = precompile_address(0x0b);
pub const BLS12_G1MSM_ADDRESS: Address = precompile_address(0x0c);
pub const BLS12_G2ADD_ADDRESS: Address = precompile_address(0x0d);
pub const BLS12_G2MSM_ADDRESS: Address = precompile_address(0x0e);
pub const BLS12_PAIRING_CHECK_ADDRESS: Address = precompile_address(0x0f);
pub const BLS12_MAP_FP_TO_G1_ADDRESS: Address = precompile_address(0x10);
pub const BLS12_MAP_FP2_TO_G2_ADDRESS: Address = precompile_address(0x11);

/// Upper bound of each MODEXP length since Osaka (EIP-7823).
const MODEXP_MAX_LENGTH: u64 = 1024;

const BN254_PAIR_LENGTH: usize = 192;
const BLAKE2F_INPUT_LENGTH: usize = 213;
const POINT_EVALUATION_INPUT_LENGTH: usize = 192;

const BLS12_FP_LENGTH: usize = 64;
const BLS12_G1_LENGTH: usize = 128;
const BLS12_G2_LENGTH: usize = 256;
const BLS12_SCALAR_LENGTH: usize = 32;
const P256_VERIFY_INPUT_LENGTH: usize = 160;

const fn precompile_address(index: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = index;
    H160(bytes)
}

fn failure() -> VMError {
    ExceptionalHalt::PrecompileFailure.into()
}

fn increase_precompile_consumed_gas(gas_cost: u64, gas_remaining: &mut u64) -> Result<(), VMError> {
    *gas_remaining = gas_remaining
        .checked_sub(gas_cost)
        .ok_or(ExceptionalHalt::OutOfGas)?;
    Ok(())
}

/// `calldata` right padded with zeros up to `length` bytes.
fn fill_with_zeros(calldata: &[u8], length: usize) -> Vec<u8> {
    let mut padded = calldata.to_vec();
    if padded.len() < length {
        padded.resize(length, 0);
    }
    padded
}

/// `size` bytes of `data` starting at `offset`, zero padded.
fn padded_slice(data: &[u8], offset: usize, size: usize) -> Vec<u8> {
    let mut slice = vec![0u8; size];
    if let Some(available) = data.get(offset..) {
        let copied = available.len().min(size);
        slice[..copied].copy_from_slice(&available[..copied]);
    }
    slice
}

/// Runs the precompile at `address`, which must belong to the active set.
pub fn execute_precompile(
    address: Address,
    calldata: &Bytes,
    gas_remaining: &mut u64,
    config: &ForkConfig,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    if !config.precompiles.contains(&address) {
        return Err(failure());
    }
    match address.to_low_u64_be() {
        0x01 => ecrecover(calldata, gas_remaining, crypto),
        0x02 => sha2_256(calldata, gas_remaining, crypto),
        0x03 => ripemd_160(calldata, gas_remaining, crypto),
        0x04 => identity(calldata, gas_remaining),
        0x05 => modexp(calldata, gas_remaining, config, crypto),
        0x06 => ecadd(calldata, gas_remaining, config, crypto),
        0x07 => ecmul(calldata, gas_remaining, config, crypto),
        0x08 => ecpairing(calldata, gas_remaining, config, crypto),
        0x09 => blake2f(calldata, gas_remaining, crypto),
        0x0a => point_evaluation(calldata, gas_remaining, crypto),
        0x0b => bls12_g1add(calldata, gas_remaining, crypto),
        0x0c => bls12_g1msm(calldata, gas_remaining, crypto),
        0x0d => bls12_g2add(calldata, gas_remaining, crypto),
        0x0e => bls12_g2msm(calldata, gas_remaining, crypto),
        0x0f => bls12_pairing_check(calldata, gas_remaining, crypto),
        0x10 => bls12_map_fp_to_g1(calldata, gas_remaining, crypto),
        0x11 => bls12_map_fp2_to_g2(calldata, gas_remaining, crypto),
        P256_VERIFY_ADDRESS => p256_verify(calldata, gas_remaining, crypto),
        _ => Err(failure()),
    }
}

/// Recovers the address that signed a message hash. Invalid signatures return
/// empty output rather than failing.
pub fn ecrecover(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(ECRECOVER_COST, gas_remaining)?;

    let input = fill_with_zeros(calldata, 128);
    let (hash, rest) = input.split_at(32);
    let (v, rest) = rest.split_at(32);
    let recovery_id = match U256::from_big_endian(v).low_u64() {
        27 if v[..31].iter().all(|byte| *byte == 0) => 0,
        28 if v[..31].iter().all(|byte| *byte == 0) => 1,
        _ => return Ok(Bytes::new()),
    };

    let mut message = [0u8; 32];
    message.copy_from_slice(hash);
    let mut signature = [0u8; 64];
    signature.copy_from_slice(&rest[..64]);

    let Ok(public_key_hash) = crypto.secp256k1_ecrecover(&signature, recovery_id, &message)
    else {
        return Ok(Bytes::new());
    };
    let mut output = [0u8; 32];
    output[12..].copy_from_slice(&public_key_hash[12..]);
    Ok(Bytes::copy_from_slice(&output))
}

pub fn sha2_256(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(gas_cost::sha2_256(calldata.len())?, gas_remaining)?;
    Ok(Bytes::copy_from_slice(&crypto.sha256(calldata)))
}

pub fn ripemd_160(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(gas_cost::ripemd_160(calldata.len())?, gas_remaining)?;
    Ok(Bytes::copy_from_slice(&crypto.ripemd160(calldata)))
}

pub fn identity(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(gas_cost::identity(calldata.len())?, gas_remaining)?;
    Ok(calldata.clone())
}

/// Arbitrary precision modular exponentiation (EIP-198).
pub fn modexp(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    config: &ForkConfig,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    let header = fill_with_zeros(calldata, 96);
    let base_size = U256::from_big_endian(&header[0..32]);
    let exponent_size = U256::from_big_endian(&header[32..64]);
    let modulus_size = U256::from_big_endian(&header[64..96]);

    if config.eips.eip7823
        && [base_size, exponent_size, modulus_size]
            .iter()
            .any(|size| *size > U256::from(MODEXP_MAX_LENGTH))
    {
        return Err(failure());
    }

    // The exponent head is only read when its offset fits, a larger base can
    // never be paid for anyway.
    let exponent_head = match (usize::try_from(base_size), usize::try_from(exponent_size)) {
        (Ok(base), Ok(exponent)) => {
            let head_size = exponent.min(32);
            let offset = base.saturating_add(96);
            U256::from_big_endian(&padded_slice(calldata, offset, head_size))
        }
        _ => U256::zero(),
    };

    let pricing = if config.eips.eip7883 {
        ModexpPricing::Osaka
    } else if config.eips.eip2565 {
        ModexpPricing::Berlin
    } else {
        ModexpPricing::Byzantium
    };
    let gas_cost = gas_cost::modexp(
        base_size,
        exponent_size,
        modulus_size,
        exponent_head,
        pricing,
    );
    let gas_cost = u64::try_from(gas_cost).map_err(|_| ExceptionalHalt::OutOfGas)?;
    increase_precompile_consumed_gas(gas_cost, gas_remaining)?;

    if base_size.is_zero() && modulus_size.is_zero() {
        return Ok(Bytes::new());
    }

    let base_size = usize::try_from(base_size).map_err(|_| ExceptionalHalt::OutOfGas)?;
    let exponent_size = usize::try_from(exponent_size).map_err(|_| ExceptionalHalt::OutOfGas)?;
    let modulus_size = usize::try_from(modulus_size).map_err(|_| ExceptionalHalt::OutOfGas)?;

    let exponent_offset = base_size.saturating_add(96);
    let modulus_offset = exponent_offset.saturating_add(exponent_size);
    let base = padded_slice(calldata, 96, base_size);
    let exponent = padded_slice(calldata, exponent_offset, exponent_size);
    let modulus = padded_slice(calldata, modulus_offset, modulus_size);

    let result = crypto
        .modexp(&base, &exponent, &modulus)
        .map_err(|_| failure())?;
    Ok(Bytes::from(result))
}

/// Point addition on alt_bn128 (EIP-196).
pub fn ecadd(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    config: &ForkConfig,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    let gas_cost = if config.eips.eip1108 {
        ECADD_COST
    } else {
        ECADD_COST_BYZANTIUM
    };
    increase_precompile_consumed_gas(gas_cost, gas_remaining)?;

    let input = fill_with_zeros(calldata, 128);
    let sum = crypto
        .bn254_g1_add(&input[..64], &input[64..128])
        .map_err(|_| failure())?;
    Ok(Bytes::copy_from_slice(&sum))
}

/// Scalar multiplication on alt_bn128 (EIP-196).
pub fn ecmul(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    config: &ForkConfig,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    let gas_cost = if config.eips.eip1108 {
        ECMUL_COST
    } else {
        ECMUL_COST_BYZANTIUM
    };
    increase_precompile_consumed_gas(gas_cost, gas_remaining)?;

    let input = fill_with_zeros(calldata, 96);
    let product = crypto
        .bn254_g1_mul(&input[..64], &input[64..96])
        .map_err(|_| failure())?;
    Ok(Bytes::copy_from_slice(&product))
}

/// Pairing check on alt_bn128 (EIP-197). Outputs 1 when the pairing product is one.
pub fn ecpairing(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    config: &ForkConfig,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    let groups = calldata.len() / BN254_PAIR_LENGTH;
    increase_precompile_consumed_gas(
        gas_cost::ecpairing(groups, config.eips.eip1108)?,
        gas_remaining,
    )?;
    if calldata.len() % BN254_PAIR_LENGTH != 0 {
        return Err(failure());
    }

    let pairs: Vec<(&[u8], &[u8])> = calldata
        .chunks_exact(BN254_PAIR_LENGTH)
        .map(|pair| pair.split_at(64))
        .collect();
    let holds = crypto.bn254_pairing_check(&pairs).map_err(|_| failure())?;

    let mut output = [0u8; 32];
    output[31] = u8::from(holds);
    Ok(Bytes::copy_from_slice(&output))
}

/// BLAKE2 compression function F (EIP-152).
pub fn blake2f(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    if calldata.len() != BLAKE2F_INPUT_LENGTH {
        return Err(failure());
    }
    let mut input = calldata.clone();
    let rounds = input.get_u32();
    increase_precompile_consumed_gas(
        u64::from(rounds).saturating_mul(BLAKE2F_ROUND_COST),
        gas_remaining,
    )?;

    let mut h: [u64; 8] = std::array::from_fn(|_| input.get_u64_le());
    let m: [u64; 16] = std::array::from_fn(|_| input.get_u64_le());
    let t: [u64; 2] = std::array::from_fn(|_| input.get_u64_le());
    let f = match input.get_u8() {
        0 => false,
        1 => true,
        _ => return Err(failure()),
    };

    crypto.blake2_compress(rounds, &mut h, m, t, f);
    Ok(h.iter().flat_map(|word| word.to_le_bytes()).collect())
}

/// KZG point evaluation (EIP-4844).
pub fn point_evaluation(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    if calldata.len() != POINT_EVALUATION_INPUT_LENGTH {
        return Err(failure());
    }
    increase_precompile_consumed_gas(POINT_EVALUATION_COST, gas_remaining)?;

    let read = |range: std::ops::Range<usize>| calldata.get(range).ok_or_else(failure);
    let versioned_hash = read(0..32)?;
    let z: [u8; 32] = read(32..64)?.try_into().map_err(|_| failure())?;
    let y: [u8; 32] = read(64..96)?.try_into().map_err(|_| failure())?;
    let commitment: [u8; 48] = read(96..144)?.try_into().map_err(|_| failure())?;
    let proof: [u8; 48] = read(144..192)?.try_into().map_err(|_| failure())?;

    if kzg_to_versioned_hash(&commitment) != versioned_hash {
        return Err(failure());
    }
    if !crypto
        .verify_kzg_proof(&commitment, &z, &y, &proof)
        .map_err(|_| failure())?
    {
        return Err(failure());
    }

    let mut output = Vec::with_capacity(64);
    output.extend_from_slice(&U256::from(FIELD_ELEMENTS_PER_BLOB).to_big_endian());
    output.extend_from_slice(&BLS_MODULUS);
    Ok(output.into())
}

/// A 64 byte field element whose top 16 bytes must be zero.
fn bls12_fp(chunk: &[u8]) -> Result<[u8; 48], VMError> {
    let (padding, value) = chunk.split_at(BLS12_FP_LENGTH - 48);
    if padding.iter().any(|byte| *byte != 0) {
        return Err(failure());
    }
    let mut fp = [0u8; 48];
    fp.copy_from_slice(value);
    Ok(fp)
}

fn bls12_g1(chunk: &[u8]) -> Result<Bls12G1, VMError> {
    let (x, y) = chunk.split_at(BLS12_FP_LENGTH);
    Ok((bls12_fp(x)?, bls12_fp(y)?))
}

fn bls12_g2(chunk: &[u8]) -> Result<Bls12G2, VMError> {
    let (x, y) = chunk.split_at(2 * BLS12_FP_LENGTH);
    let (x0, x1) = x.split_at(BLS12_FP_LENGTH);
    let (y0, y1) = y.split_at(BLS12_FP_LENGTH);
    Ok((bls12_fp(x0)?, bls12_fp(x1)?, bls12_fp(y0)?, bls12_fp(y1)?))
}

fn bls12_scalar(chunk: &[u8]) -> [u8; 32] {
    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(chunk);
    scalar
}

/// Pads every 48 byte coordinate of an encoded point back to 64 bytes.
fn bls12_output(point: &[u8]) -> Bytes {
    let mut output = Vec::with_capacity(point.len() / 48 * BLS12_FP_LENGTH);
    for coordinate in point.chunks_exact(48) {
        output.extend_from_slice(&[0u8; BLS12_FP_LENGTH - 48]);
        output.extend_from_slice(coordinate);
    }
    output.into()
}

/// Splits an input made of at least one `length` sized item.
fn bls12_items(calldata: &[u8], length: usize) -> Result<std::slice::ChunksExact<'_, u8>, VMError> {
    if calldata.is_empty() || calldata.len() % length != 0 {
        return Err(failure());
    }
    Ok(calldata.chunks_exact(length))
}

/// G1 point addition (EIP-2537). Points need not be in the subgroup.
pub fn bls12_g1add(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(BLS12_381_G1ADD_COST, gas_remaining)?;
    if calldata.len() != 2 * BLS12_G1_LENGTH {
        return Err(failure());
    }
    let (a, b) = calldata.split_at(BLS12_G1_LENGTH);
    let sum = crypto
        .bls12_381_g1_add(bls12_g1(a)?, bls12_g1(b)?)
        .map_err(|_| failure())?;
    Ok(bls12_output(&sum))
}

pub fn bls12_g1msm(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    let items = bls12_items(calldata, BLS12_G1_LENGTH + BLS12_SCALAR_LENGTH)?;
    increase_precompile_consumed_gas(
        gas_cost::bls12_msm(items.len(), &BLS12_381_G1_K_DISCOUNT, G1_MUL_COST)?,
        gas_remaining,
    )?;
    let pairs = items
        .map(|item| {
            let (point, scalar) = item.split_at(BLS12_G1_LENGTH);
            Ok((bls12_g1(point)?, bls12_scalar(scalar)))
        })
        .collect::<Result<Vec<_>, VMError>>()?;
    let result = crypto.bls12_381_g1_msm(&pairs).map_err(|_| failure())?;
    Ok(bls12_output(&result))
}

pub fn bls12_g2add(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(BLS12_381_G2ADD_COST, gas_remaining)?;
    if calldata.len() != 2 * BLS12_G2_LENGTH {
        return Err(failure());
    }
    let (a, b) = calldata.split_at(BLS12_G2_LENGTH);
    let sum = crypto
        .bls12_381_g2_add(bls12_g2(a)?, bls12_g2(b)?)
        .map_err(|_| failure())?;
    Ok(bls12_output(&sum))
}

pub fn bls12_g2msm(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    let items = bls12_items(calldata, BLS12_G2_LENGTH + BLS12_SCALAR_LENGTH)?;
    increase_precompile_consumed_gas(
        gas_cost::bls12_msm(items.len(), &BLS12_381_G2_K_DISCOUNT, G2_MUL_COST)?,
        gas_remaining,
    )?;
    let pairs = items
        .map(|item| {
            let (point, scalar) = item.split_at(BLS12_G2_LENGTH);
            Ok((bls12_g2(point)?, bls12_scalar(scalar)))
        })
        .collect::<Result<Vec<_>, VMError>>()?;
    let result = crypto.bls12_381_g2_msm(&pairs).map_err(|_| failure())?;
    Ok(bls12_output(&result))
}

/// Outputs 1 when the product of the pairings of the (G1, G2) pairs is one.
pub fn bls12_pairing_check(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    let items = bls12_items(calldata, BLS12_G1_LENGTH + BLS12_G2_LENGTH)?;
    increase_precompile_consumed_gas(gas_cost::bls12_pairing_check(items.len())?, gas_remaining)?;
    let pairs = items
        .map(|item| {
            let (g1, g2) = item.split_at(BLS12_G1_LENGTH);
            Ok((bls12_g1(g1)?, bls12_g2(g2)?))
        })
        .collect::<Result<Vec<_>, VMError>>()?;
    let holds = crypto.bls12_381_pairing_check(&pairs).map_err(|_| failure())?;

    let mut output = [0u8; 32];
    output[31] = u8::from(holds);
    Ok(Bytes::copy_from_slice(&output))
}

pub fn bls12_map_fp_to_g1(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(BLS12_381_MAP_FP_TO_G1_COST, gas_remaining)?;
    if calldata.len() != BLS12_FP_LENGTH {
        return Err(failure());
    }
    let point = crypto
        .bls12_381_fp_to_g1(&bls12_fp(calldata)?)
        .map_err(|_| failure())?;
    Ok(bls12_output(&point))
}

pub fn bls12_map_fp2_to_g2(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(BLS12_381_MAP_FP2_TO_G2_COST, gas_remaining)?;
    if calldata.len() != 2 * BLS12_FP_LENGTH {
        return Err(failure());
    }
    let (c0, c1) = calldata.split_at(BLS12_FP_LENGTH);
    let point = crypto
        .bls12_381_fp2_to_g2((bls12_fp(c0)?, bls12_fp(c1)?))
        .map_err(|_| failure())?;
    Ok(bls12_output(&point))
}

/// secp256r1 signature check (EIP-7951). Never fails: a bad input or signature
/// returns empty output.
pub fn p256_verify(
    calldata: &Bytes,
    gas_remaining: &mut u64,
    crypto: &dyn Crypto,
) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(P256_VERIFY_COST, gas_remaining)?;
    if calldata.len() != P256_VERIFY_INPUT_LENGTH {
        return Ok(Bytes::new());
    }
    let mut message = [0u8; 32];
    let mut signature = [0u8; 64];
    let mut public_key = [0u8; 64];
    message.copy_from_slice(&calldata[..32]);
    signature.copy_from_slice(&calldata[32..96]);
    public_key.copy_from_slice(&calldata[96..]);
    if !crypto.secp256r1_verify(&message, &signature, &public_key) {
        return Ok(Bytes::new());
    }
    let mut output = [0u8; 32];
    output[31] = 1;
    Ok(Bytes::copy_from_slice(&output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use keel_common::types::Fork;
    use keel_crypto::NativeCrypto;

    fn run(address: Address, input: &[u8], gas: u64, fork: Fork) -> (Result<Bytes, VMError>, u64) {
        let config = ForkConfig::new(fork);
        let mut gas_remaining = gas;
        let result = execute_precompile(
            address,
            &Bytes::copy_from_slice(input),
            &mut gas_remaining,
            &config,
            &NativeCrypto,
        );
        (result, gas - gas_remaining)
    }

    #[test]
    fn sha256_of_empty_input() {
        let (output, gas_used) = run(SHA2_256_ADDRESS, &[], 100, Fork::Cancun);
        assert_eq!(
            output.unwrap().as_ref(),
            hex!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
        assert_eq!(gas_used, 60);
    }

    #[test]
    fn identity_echoes_and_charges_per_word() {
        let input = [7u8; 33];
        let (output, gas_used) = run(IDENTITY_ADDRESS, &input, 100, Fork::Frontier);
        assert_eq!(output.unwrap().as_ref(), input);
        assert_eq!(gas_used, 15 + 3 * 2);
        let (output, _) = run(IDENTITY_ADDRESS, &input, 20, Fork::Frontier);
        assert!(matches!(
            output,
            Err(VMError::ExceptionalHalt(ExceptionalHalt::OutOfGas))
        ));
    }

    #[test]
    fn ripemd_is_left_padded() {
        let (output, gas_used) = run(RIPEMD_160_ADDRESS, &[], 1000, Fork::Cancun);
        assert_eq!(
            output.unwrap().as_ref(),
            hex!("0000000000000000000000009c1185a5c5e9fc54612808977ee8f548b2258d31")
        );
        assert_eq!(gas_used, 600);
    }

    #[test]
    fn ecrecover_known_signature() {
        let input = hex!(
            "456e9aea5e197a1f1af7a3e85a3212fa4049a3ba34c2289b4c860fc0b0c64ef3"
            "000000000000000000000000000000000000000000000000000000000000001c"
            "9242685bf161793cc25603c231bc2f568eb630ea16aa137d2664ac8038825608"
            "4f8ae3bd7535248d0bd448298cc2e2071e56992d0774dc340c368ae950852ada"
        );
        let (output, gas_used) = run(ECRECOVER_ADDRESS, &input, 3000, Fork::Cancun);
        assert_eq!(
            output.unwrap().as_ref(),
            hex!("0000000000000000000000007156526fbd7a3c72969b54f64e42c10fbb768c8a")
        );
        assert_eq!(gas_used, 3000);

        let mut bad_v = input;
        bad_v[63] = 29;
        let (output, _) = run(ECRECOVER_ADDRESS, &bad_v, 3000, Fork::Cancun);
        assert!(output.unwrap().is_empty());
    }

    #[test]
    fn modexp_small_numbers() {
        let mut input = Vec::new();
        input.extend_from_slice(&U256::one().to_big_endian());
        input.extend_from_slice(&U256::one().to_big_endian());
        input.extend_from_slice(&U256::one().to_big_endian());
        input.extend_from_slice(&[3, 5, 7]);
        let (output, gas_used) = run(MODEXP_ADDRESS, &input, 1000, Fork::Cancun);
        assert_eq!(output.unwrap().as_ref(), [5]);
        assert_eq!(gas_used, 200);

        let (output, gas_used) = run(MODEXP_ADDRESS, &[], 1000, Fork::Byzantium);
        assert!(output.unwrap().is_empty());
        assert_eq!(gas_used, 0);
    }

    #[test]
    fn ecadd_prices_and_invalid_points() {
        let mut doubled = [0u8; 128];
        doubled[31] = 1;
        doubled[63] = 2;
        doubled[95] = 1;
        doubled[127] = 2;
        let (output, gas_used) = run(ECADD_ADDRESS, &doubled, 1000, Fork::Istanbul);
        assert_eq!(output.unwrap().len(), 64);
        assert_eq!(gas_used, 150);
        let (_, gas_used) = run(ECADD_ADDRESS, &[], 1000, Fork::Byzantium);
        assert_eq!(gas_used, 500);

        let mut off_curve = [0u8; 128];
        off_curve[31] = 1;
        off_curve[63] = 3;
        let (output, _) = run(ECADD_ADDRESS, &off_curve, 1000, Fork::Istanbul);
        assert!(matches!(
            output,
            Err(VMError::ExceptionalHalt(ExceptionalHalt::PrecompileFailure))
        ));
    }

    #[test]
    fn empty_pairing_holds() {
        let (output, gas_used) = run(ECPAIRING_ADDRESS, &[], 100_000, Fork::Istanbul);
        assert_eq!(output.unwrap()[31], 1);
        assert_eq!(gas_used, 45000);
        let (output, _) = run(ECPAIRING_ADDRESS, &[0u8; 100], 200_000, Fork::Istanbul);
        assert!(output.is_err());
    }

    #[test]
    fn blake2f_eip152_vector() {
        let mut input = Vec::with_capacity(213);
        input.extend_from_slice(&12u32.to_be_bytes());
        input.extend_from_slice(&hex!(
            "48c9bdf267e6096a3ba7ca8485ae67bb2bf894fe72f36e3cf1361d5f3af54fa5"
            "d182e6ad7f520e511f6c3e2b8c68059b6bbd41fbabd9831f79217e1319cde05b"
        ));
        let mut message = [0u8; 128];
        message[..3].copy_from_slice(b"abc");
        input.extend_from_slice(&message);
        input.extend_from_slice(&3u64.to_le_bytes());
        input.extend_from_slice(&0u64.to_le_bytes());
        input.push(1);
        let (output, gas_used) = run(BLAKE2F_ADDRESS, &input, 100, Fork::Istanbul);
        assert_eq!(
            output.unwrap().as_ref(),
            hex!("ba80a53f981c4d0d6a2797b69f12f6e94c212f14685ac4b74b12bb6fdbffa2d17d87c5392aab792dc252d5de4533cc9518d38aa8dbf1925ab92386edd4009923")
        );
        assert_eq!(gas_used, 12);

        let mut bad_flag = input.clone();
        bad_flag[212] = 2;
        let (output, _) = run(BLAKE2F_ADDRESS, &bad_flag, 100, Fork::Istanbul);
        assert!(output.is_err());
    }

    #[test]
    fn point_evaluation_rejects_bad_input() {
        let (output, _) = run(POINT_EVALUATION_ADDRESS, &[0u8; 191], 100_000, Fork::Cancun);
        assert!(output.is_err());
        let (output, gas_used) = run(POINT_EVALUATION_ADDRESS, &[0u8; 192], 100_000, Fork::Cancun);
        assert!(output.is_err());
        assert_eq!(gas_used, 50000);
    }

    const G1_X: [u8; 48] = hex!(
        "17f1d3a73197d7942695638c4fa9ac0fc3688c4f9774b905a14e3a3f171bac586c55e83ff97a1aeffb3af00adb22c6bb"
    );
    const G1_Y: [u8; 48] = hex!(
        "08b3f481e3aaa0f1a09e30ed741d8ae4fcf5e095d5d00af600db18cb2c04b3edd03cc744a2888ae40caa232946c5e7e1"
    );

    fn padded(coordinate: &[u8; 48]) -> Vec<u8> {
        let mut fp = vec![0u8; 16];
        fp.extend_from_slice(coordinate);
        fp
    }

    fn g1_generator() -> Vec<u8> {
        [padded(&G1_X), padded(&G1_Y)].concat()
    }

    fn bls(index: u64) -> Address {
        Address::from_low_u64_be(index)
    }

    #[test]
    fn bls12_g1_add_and_msm_agree() {
        let g = g1_generator();
        let (sum, gas_used) = run(BLS12_G1ADD_ADDRESS, &[g.clone(), g.clone()].concat(), 1000, Fork::Prague);
        let sum = sum.unwrap();
        assert_eq!(sum.len(), 128);
        assert_eq!(gas_used, 375);

        let mut two = [0u8; 32];
        two[31] = 2;
        let (product, gas_used) =
            run(BLS12_G1MSM_ADDRESS, &[g.clone(), two.to_vec()].concat(), 20_000, Fork::Prague);
        assert_eq!(product.unwrap(), sum);
        assert_eq!(gas_used, 12000);

        let infinity = vec![0u8; 128];
        let (same, _) = run(BLS12_G1ADD_ADDRESS, &[g.clone(), infinity].concat(), 1000, Fork::Prague);
        assert_eq!(same.unwrap().as_ref(), g.as_slice());
    }

    #[test]
    fn bls12_rejects_malformed_inputs() {
        let g = g1_generator();
        // padding bytes of a field element must be zero
        let mut dirty = g.clone();
        dirty[0] = 1;
        let (output, gas_used) =
            run(BLS12_G1ADD_ADDRESS, &[dirty, g.clone()].concat(), 1000, Fork::Prague);
        assert!(output.is_err());
        assert_eq!(gas_used, 375);

        let (output, _) = run(BLS12_G1ADD_ADDRESS, &g, 1000, Fork::Prague);
        assert!(output.is_err());
        let (output, _) = run(BLS12_G1MSM_ADDRESS, &[], 100_000, Fork::Prague);
        assert!(output.is_err());
        let (output, _) = run(BLS12_PAIRING_CHECK_ADDRESS, &[], 100_000, Fork::Prague);
        assert!(output.is_err());
        let (output, _) = run(BLS12_MAP_FP_TO_G1_ADDRESS, &[0u8; 63], 10_000, Fork::Prague);
        assert!(output.is_err());
    }

    #[test]
    fn bls12_pairing_of_infinity_holds() {
        let (output, gas_used) =
            run(BLS12_PAIRING_CHECK_ADDRESS, &[0u8; 384], 100_000, Fork::Prague);
        assert_eq!(output.unwrap()[31], 1);
        assert_eq!(gas_used, 37700 + 32600);
    }

    #[test]
    fn bls12_map_lands_in_the_group() {
        let (point, gas_used) = run(BLS12_MAP_FP_TO_G1_ADDRESS, &[0u8; 64], 10_000, Fork::Prague);
        let point = point.unwrap();
        assert_eq!(gas_used, 5500);
        // a mapped point is valid MSM input
        let input = [point.to_vec(), vec![0u8; 32]].concat();
        let (product, _) = run(BLS12_G1MSM_ADDRESS, &input, 20_000, Fork::Prague);
        assert_eq!(product.unwrap().as_ref(), [0u8; 128]);

        let (point, gas_used) =
            run(BLS12_MAP_FP2_TO_G2_ADDRESS, &[0u8; 128], 30_000, Fork::Prague);
        assert_eq!(point.unwrap().len(), 256);
        assert_eq!(gas_used, 23800);
    }

    #[test]
    fn bls12_precompiles_need_prague() {
        let (output, _) = run(bls(0x0b), &[0u8; 256], 1000, Fork::Cancun);
        assert!(output.is_err());
        let (output, _) = run(bls(0x0b), &[0u8; 256], 1000, Fork::Prague);
        assert_eq!(output.unwrap().as_ref(), [0u8; 128]);
    }

    #[test]
    fn p256_verify_returns_empty_on_bad_input() {
        let (output, gas_used) = run(bls(0x100), &[0u8; 159], 10_000, Fork::Osaka);
        assert!(output.unwrap().is_empty());
        assert_eq!(gas_used, 6900);
        let (output, _) = run(bls(0x100), &[0u8; 160], 10_000, Fork::Osaka);
        assert!(output.unwrap().is_empty());
        let (output, _) = run(bls(0x100), &[0u8; 160], 10_000, Fork::Prague);
        assert!(output.is_err());
    }

    #[test]
    fn osaka_bounds_modexp_lengths() {
        let mut input = Vec::new();
        input.extend_from_slice(&U256::from(1025).to_big_endian());
        input.extend_from_slice(&U256::one().to_big_endian());
        input.extend_from_slice(&U256::one().to_big_endian());
        let (output, _) = run(MODEXP_ADDRESS, &input, 10_000_000, Fork::Osaka);
        assert!(matches!(
            output,
            Err(VMError::ExceptionalHalt(ExceptionalHalt::PrecompileFailure))
        ));

        let mut small = Vec::new();
        small.extend_from_slice(&U256::one().to_big_endian());
        small.extend_from_slice(&U256::one().to_big_endian());
        small.extend_from_slice(&U256::one().to_big_endian());
        small.extend_from_slice(&[3, 5, 7]);
        let (output, gas_used) = run(MODEXP_ADDRESS, &small, 1000, Fork::Osaka);
        assert_eq!(output.unwrap().as_ref(), [5]);
        assert_eq!(gas_used, 500);
    }
}
