//! Gas costs of the EVM instructions and precompiles.
//!
//! Constant prices live here. Prices that changed across forks are read from the
//! [`GasSchedule`] passed in by the caller.

use ethereum_types::U256;

use crate::{
    constants::WORD_SIZE_U64,
    errors::{ExceptionalHalt, VMError},
    gas_schedule::GasSchedule,
    memory,
};
use ExceptionalHalt::OutOfGas;

// Opcodes cost
pub const ADD: u64 = 3;
pub const MUL: u64 = 5;
pub const SUB: u64 = 3;
pub const DIV: u64 = 5;
pub const SDIV: u64 = 5;
pub const MOD: u64 = 5;
pub const SMOD: u64 = 5;
pub const ADDMOD: u64 = 8;
pub const MULMOD: u64 = 8;
pub const EXP_STATIC: u64 = 10;
pub const SIGNEXTEND: u64 = 5;
pub const LT: u64 = 3;
pub const GT: u64 = 3;
pub const SLT: u64 = 3;
pub const SGT: u64 = 3;
pub const EQ: u64 = 3;
pub const ISZERO: u64 = 3;
pub const AND: u64 = 3;
pub const OR: u64 = 3;
pub const XOR: u64 = 3;
pub const NOT: u64 = 3;
pub const BYTE: u64 = 3;
pub const SHL: u64 = 3;
pub const SHR: u64 = 3;
pub const SAR: u64 = 3;
pub const CLZ: u64 = 5;
pub const KECCAK256_STATIC: u64 = 30;
pub const KECCAK256_DYNAMIC_BASE: u64 = 6;
pub const CALLDATALOAD: u64 = 3;
pub const CALLDATASIZE: u64 = 2;
pub const CALLDATACOPY_STATIC: u64 = 3;
pub const RETURNDATASIZE: u64 = 2;
pub const RETURNDATACOPY_STATIC: u64 = 3;
pub const COPY_DYNAMIC_BASE: u64 = 3;
pub const ADDRESS: u64 = 2;
pub const ORIGIN: u64 = 2;
pub const CALLER: u64 = 2;
pub const CALLVALUE: u64 = 2;
pub const CODESIZE: u64 = 2;
pub const CODECOPY_STATIC: u64 = 3;
pub const GASPRICE: u64 = 2;
pub const BLOCKHASH: u64 = 20;
pub const COINBASE: u64 = 2;
pub const TIMESTAMP: u64 = 2;
pub const NUMBER: u64 = 2;
pub const PREVRANDAO: u64 = 2;
pub const GASLIMIT: u64 = 2;
pub const CHAINID: u64 = 2;
pub const SELFBALANCE: u64 = 5;
pub const BASEFEE: u64 = 2;
pub const BLOBHASH: u64 = 3;
pub const BLOBBASEFEE: u64 = 2;
pub const POP: u64 = 2;
pub const MLOAD_STATIC: u64 = 3;
pub const MSTORE_STATIC: u64 = 3;
pub const MSTORE8_STATIC: u64 = 3;
pub const JUMP: u64 = 8;
pub const JUMPI: u64 = 10;
pub const PC: u64 = 2;
pub const MSIZE: u64 = 2;
pub const GAS: u64 = 2;
pub const JUMPDEST: u64 = 1;
pub const TLOAD: u64 = 100;
pub const TSTORE: u64 = 100;
pub const MCOPY_STATIC: u64 = 3;
pub const PUSH0: u64 = 2;
pub const PUSHN: u64 = 3;
pub const DUPN: u64 = 3;
pub const SWAPN: u64 = 3;
pub const LOGN_STATIC: u64 = 375;
pub const LOGN_DYNAMIC_BASE: u64 = 375;
pub const LOGN_DYNAMIC_BYTE_BASE: u64 = 8;

/// Remaining gas an SSTORE needs to proceed (EIP-2200).
pub const SSTORE_STIPEND: u64 = 2300;

pub const CALL_POSITIVE_VALUE: u64 = 9000;
pub const CALL_POSITIVE_VALUE_STIPEND: u64 = 2300;

// Create opcodes
pub const CREATE_BASE_COST: u64 = 32000;
pub const INIT_CODE_WORD_COST: u64 = 2;
pub const CREATE2_HASH_WORD_COST: u64 = 6;
pub const CODE_DEPOSIT_COST: u64 = 200;

// Access lists costs
pub const ACCESS_LIST_ADDRESS_COST: u64 = 2400;
pub const ACCESS_LIST_STORAGE_KEY_COST: u64 = 1900;

// Precompile costs
pub const ECRECOVER_COST: u64 = 3000;
pub const SHA2_256_STATIC_COST: u64 = 60;
pub const SHA2_256_DYNAMIC_BASE: u64 = 12;
pub const RIPEMD_160_STATIC_COST: u64 = 600;
pub const RIPEMD_160_DYNAMIC_BASE: u64 = 120;
pub const IDENTITY_STATIC_COST: u64 = 15;
pub const IDENTITY_DYNAMIC_BASE: u64 = 3;
pub const MODEXP_STATIC_COST: u64 = 200;
pub const MODEXP_DYNAMIC_QUOTIENT: u64 = 3;
pub const MODEXP_DYNAMIC_QUOTIENT_PRE_BERLIN: u64 = 20;
pub const MODEXP_EXPONENT_FACTOR: u64 = 8;
pub const MODEXP_STATIC_COST_OSAKA: u64 = 500;
pub const MODEXP_EXPONENT_FACTOR_OSAKA: u64 = 16;
pub const ECADD_COST_BYZANTIUM: u64 = 500;
pub const ECADD_COST: u64 = 150;
pub const ECMUL_COST_BYZANTIUM: u64 = 40000;
pub const ECMUL_COST: u64 = 6000;
pub const ECPAIRING_BASE_COST_BYZANTIUM: u64 = 100000;
pub const ECPAIRING_GROUP_COST_BYZANTIUM: u64 = 80000;
pub const ECPAIRING_BASE_COST: u64 = 45000;
pub const ECPAIRING_GROUP_COST: u64 = 34000;
pub const BLAKE2F_ROUND_COST: u64 = 1;
pub const POINT_EVALUATION_COST: u64 = 50000;
pub const BLS12_381_G1ADD_COST: u64 = 375;
pub const BLS12_381_G2ADD_COST: u64 = 600;
pub const BLS12_381_MAP_FP_TO_G1_COST: u64 = 5500;
pub const BLS12_381_MAP_FP2_TO_G2_COST: u64 = 23800;
pub const BLS12_PAIRING_CHECK_MUL_COST: u64 = 32600;
pub const BLS12_PAIRING_CHECK_FIXED_COST: u64 = 37700;
pub const P256_VERIFY_COST: u64 = 6900;

pub const BLS12_381_MSM_MULTIPLIER: u64 = 1000;
pub const G1_MUL_COST: u64 = 12000;
pub const G2_MUL_COST: u64 = 22500;
pub const BLS12_381_G1_K_DISCOUNT: [u64; 128] = [
    1000, 949, 848, 797, 764, 750, 738, 728, 719, 712, 705, 698, 692, 687, 682, 677, 673, 669, 665,
    661, 658, 654, 651, 648, 645, 642, 640, 637, 635, 632, 630, 627, 625, 623, 621, 619, 617, 615,
    613, 611, 609, 608, 606, 604, 603, 601, 599, 598, 596, 595, 593, 592, 591, 589, 588, 586, 585,
    584, 582, 581, 580, 579, 577, 576, 575, 574, 573, 572, 570, 569, 568, 567, 566, 565, 564, 563,
    562, 561, 560, 559, 558, 557, 556, 555, 554, 553, 552, 551, 550, 549, 548, 547, 547, 546, 545,
    544, 543, 542, 541, 540, 540, 539, 538, 537, 536, 536, 535, 534, 533, 532, 532, 531, 530, 529,
    528, 528, 527, 526, 525, 525, 524, 523, 522, 522, 521, 520, 520, 519,
];
pub const BLS12_381_G2_K_DISCOUNT: [u64; 128] = [
    1000, 1000, 923, 884, 855, 832, 812, 796, 782, 770, 759, 749, 740, 732, 724, 717, 711, 704,
    699, 693, 688, 683, 679, 674, 670, 666, 663, 659, 655, 652, 649, 646, 643, 640, 637, 634, 632,
    629, 627, 624, 622, 620, 618, 615, 613, 611, 609, 607, 606, 604, 602, 600, 598, 597, 595, 593,
    592, 590, 589, 587, 586, 584, 583, 582, 580, 579, 578, 576, 575, 574, 573, 571, 570, 569, 568,
    567, 566, 565, 563, 562, 561, 560, 559, 558, 557, 556, 555, 554, 553, 552, 552, 551, 550, 549,
    548, 547, 546, 545, 545, 544, 543, 542, 541, 541, 540, 539, 538, 537, 537, 536, 535, 535, 534,
    533, 532, 532, 531, 530, 530, 529, 528, 528, 527, 526, 526, 525, 524, 524,
];

/// Which MODEXP price formula applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModexpPricing {
    /// EIP-198
    Byzantium,
    /// EIP-2565
    Berlin,
    /// EIP-7883
    Osaka,
}

fn words(size: usize) -> Result<u64, VMError> {
    let size = u64::try_from(size).map_err(|_| OutOfGas)?;
    Ok(size.div_ceil(WORD_SIZE_U64))
}

fn per_word(size: usize, word_cost: u64) -> Result<u64, VMError> {
    words(size)?
        .checked_mul(word_cost)
        .ok_or(OutOfGas.into())
}

fn sum(costs: &[u64]) -> Result<u64, VMError> {
    costs
        .iter()
        .try_fold(0u64, |total, cost| total.checked_add(*cost))
        .ok_or(OutOfGas.into())
}

/// Static cost plus the memory expansion up to `new_memory_size`.
pub fn memory_access(
    static_cost: u64,
    new_memory_size: usize,
    current_memory_size: usize,
) -> Result<u64, VMError> {
    sum(&[
        static_cost,
        memory::expansion_cost(new_memory_size, current_memory_size)?,
    ])
}

/// Copying `size` bytes into memory: static cost, 3 per word and expansion.
pub fn copy(
    static_cost: u64,
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
) -> Result<u64, VMError> {
    sum(&[
        static_cost,
        per_word(size, COPY_DYNAMIC_BASE)?,
        memory::expansion_cost(new_memory_size, current_memory_size)?,
    ])
}

pub fn exp(exponent: U256, schedule: &GasSchedule) -> Result<u64, VMError> {
    let exponent_bytes = u64::try_from(exponent.bits().div_ceil(8)).map_err(|_| OutOfGas)?;
    sum(&[
        EXP_STATIC,
        schedule
            .exp_byte
            .checked_mul(exponent_bytes)
            .ok_or(OutOfGas)?,
    ])
}

pub fn keccak256(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
) -> Result<u64, VMError> {
    sum(&[
        KECCAK256_STATIC,
        per_word(size, KECCAK256_DYNAMIC_BASE)?,
        memory::expansion_cost(new_memory_size, current_memory_size)?,
    ])
}

pub fn log(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
    number_of_topics: usize,
) -> Result<u64, VMError> {
    let topics = u64::try_from(number_of_topics).map_err(|_| OutOfGas)?;
    let size = u64::try_from(size).map_err(|_| OutOfGas)?;
    sum(&[
        LOGN_STATIC,
        LOGN_DYNAMIC_BASE.checked_mul(topics).ok_or(OutOfGas)?,
        LOGN_DYNAMIC_BYTE_BASE.checked_mul(size).ok_or(OutOfGas)?,
        memory::expansion_cost(new_memory_size, current_memory_size)?,
    ])
}

/// Cost and refund change of an SSTORE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SStoreCost {
    pub gas: u64,
    pub refund: i64,
}

/// Prices an SSTORE writing `new` over `current`, where `original` is the value
/// at the start of the transaction.
///
/// Net gas metering (EIP-1283, EIP-2200, EIP-2929) prices a write by comparing
/// against the original value. Without it, setting a zero slot costs
/// `sstore_set` and anything else `sstore_reset`.
pub fn sstore(
    original: U256,
    current: U256,
    new: U256,
    net_metering: bool,
    schedule: &GasSchedule,
) -> SStoreCost {
    let clears_refund = i64::try_from(schedule.sstore_clears_refund).unwrap_or(i64::MAX);
    if !net_metering {
        let gas = if !new.is_zero() && current.is_zero() {
            schedule.sstore_set
        } else {
            schedule.sstore_reset
        };
        let refund = if !current.is_zero() && new.is_zero() {
            clears_refund
        } else {
            0
        };
        return SStoreCost { gas, refund };
    }

    let dirty = schedule.sload;
    if current == new {
        return SStoreCost {
            gas: dirty,
            refund: 0,
        };
    }
    if original == current {
        let gas = if original.is_zero() {
            schedule.sstore_set
        } else {
            schedule.sstore_reset
        };
        let refund = if new.is_zero() { clears_refund } else { 0 };
        return SStoreCost { gas, refund };
    }

    let mut refund = 0i64;
    if !original.is_zero() {
        if current.is_zero() {
            refund -= clears_refund;
        } else if new.is_zero() {
            refund += clears_refund;
        }
    }
    if original == new {
        let restored = if original.is_zero() {
            schedule.sstore_set
        } else {
            schedule.sstore_reset
        };
        refund += i64::try_from(restored.saturating_sub(dirty)).unwrap_or(i64::MAX);
    }
    SStoreCost { gas: dirty, refund }
}

/// All but one 64th of `gas` (EIP-150).
pub fn max_message_call_gas(gas: u64) -> u64 {
    gas.saturating_sub(gas / 64)
}

/// Gas forwarded to a child call. With EIP-150 the request is capped at all but
/// one 64th of what is left after paying `extra_gas` and the memory expansion.
pub fn call_child_gas(
    requested: U256,
    gas_left: u64,
    memory_cost: u64,
    extra_gas: u64,
    eip150: bool,
) -> Result<u64, VMError> {
    if !eip150 {
        return u64::try_from(requested).map_err(|_| OutOfGas.into());
    }
    let available = gas_left
        .checked_sub(memory_cost)
        .and_then(|gas| gas.checked_sub(extra_gas))
        .ok_or(OutOfGas)?;
    let cap = max_message_call_gas(available);
    Ok(u64::try_from(requested).map_or(cap, |requested| requested.min(cap)))
}

/// Upfront cost of CREATE and CREATE2, before the init code runs.
pub fn create(
    new_memory_size: usize,
    current_memory_size: usize,
    init_code_size: usize,
    is_create2: bool,
    charge_init_code: bool,
) -> Result<u64, VMError> {
    let init_code_cost = if charge_init_code {
        per_word(init_code_size, INIT_CODE_WORD_COST)?
    } else {
        0
    };
    let hash_cost = if is_create2 {
        per_word(init_code_size, CREATE2_HASH_WORD_COST)?
    } else {
        0
    };
    sum(&[
        CREATE_BASE_COST,
        init_code_cost,
        hash_cost,
        memory::expansion_cost(new_memory_size, current_memory_size)?,
    ])
}

pub fn code_deposit(code_size: usize) -> Result<u64, VMError> {
    u64::try_from(code_size)
        .ok()
        .and_then(|size| size.checked_mul(CODE_DEPOSIT_COST))
        .ok_or(OutOfGas.into())
}

fn precompile(data_size: usize, static_cost: u64, dynamic_base: u64) -> Result<u64, VMError> {
    sum(&[static_cost, per_word(data_size, dynamic_base)?])
}

pub fn sha2_256(data_size: usize) -> Result<u64, VMError> {
    precompile(data_size, SHA2_256_STATIC_COST, SHA2_256_DYNAMIC_BASE)
}

pub fn ripemd_160(data_size: usize) -> Result<u64, VMError> {
    precompile(data_size, RIPEMD_160_STATIC_COST, RIPEMD_160_DYNAMIC_BASE)
}

pub fn identity(data_size: usize) -> Result<u64, VMError> {
    precompile(data_size, IDENTITY_STATIC_COST, IDENTITY_DYNAMIC_BASE)
}

/// MODEXP price (EIP-198, repriced by EIP-2565 and EIP-7883). Lengths come straight
/// from the input, so the arithmetic saturates and the caller compares against the gas it has.
pub fn modexp(
    base_size: U256,
    exponent_size: U256,
    modulus_size: U256,
    exponent_head: U256,
    pricing: ModexpPricing,
) -> U256 {
    let max_length = base_size.max(modulus_size);
    let words = max_length.saturating_add(U256::from(7)) / 8;
    let multiplication_complexity = match pricing {
        ModexpPricing::Osaka if max_length <= U256::from(32) => U256::from(16),
        ModexpPricing::Osaka => words.saturating_mul(words).saturating_mul(U256::from(2)),
        ModexpPricing::Berlin => words.saturating_mul(words),
        ModexpPricing::Byzantium => {
            let square = max_length.saturating_mul(max_length);
            if max_length <= U256::from(64) {
                square
            } else if max_length <= U256::from(1024) {
                (square / 4)
                    .saturating_add(max_length.saturating_mul(U256::from(96)))
                    .saturating_sub(U256::from(3072))
            } else {
                (square / 16)
                    .saturating_add(max_length.saturating_mul(U256::from(480)))
                    .saturating_sub(U256::from(199680))
            }
        }
    };

    let exponent_factor = match pricing {
        ModexpPricing::Osaka => MODEXP_EXPONENT_FACTOR_OSAKA,
        _ => MODEXP_EXPONENT_FACTOR,
    };
    let head_bits = U256::from(exponent_head.bits().saturating_sub(1));
    let iteration_count = if exponent_size <= U256::from(32) {
        head_bits
    } else {
        exponent_size
            .saturating_sub(U256::from(32))
            .saturating_mul(U256::from(exponent_factor))
            .saturating_add(head_bits)
    }
    .max(U256::one());

    let complexity = multiplication_complexity.saturating_mul(iteration_count);
    match pricing {
        ModexpPricing::Byzantium => complexity / MODEXP_DYNAMIC_QUOTIENT_PRE_BERLIN,
        ModexpPricing::Berlin => {
            (complexity / MODEXP_DYNAMIC_QUOTIENT).max(U256::from(MODEXP_STATIC_COST))
        }
        ModexpPricing::Osaka => complexity.max(U256::from(MODEXP_STATIC_COST_OSAKA)),
    }
}

/// Multi scalar multiplication over `pairs` points with a per point price of `mul_cost`,
/// discounted as the batch grows (EIP-2537).
pub fn bls12_msm(pairs: usize, discount_table: &[u64; 128], mul_cost: u64) -> Result<u64, VMError> {
    if pairs == 0 {
        return Ok(0);
    }
    let discount = discount_table
        .get(pairs - 1)
        .or(discount_table.last())
        .copied()
        .ok_or(OutOfGas)?;
    let pairs = u64::try_from(pairs).map_err(|_| OutOfGas)?;
    let cost = pairs
        .checked_mul(mul_cost)
        .and_then(|cost| cost.checked_mul(discount))
        .ok_or(OutOfGas)?;
    Ok(cost / BLS12_381_MSM_MULTIPLIER)
}

pub fn bls12_pairing_check(pairs: usize) -> Result<u64, VMError> {
    let pairs = u64::try_from(pairs).map_err(|_| OutOfGas)?;
    sum(&[
        BLS12_PAIRING_CHECK_FIXED_COST,
        pairs
            .checked_mul(BLS12_PAIRING_CHECK_MUL_COST)
            .ok_or(OutOfGas)?,
    ])
}

pub fn ecpairing(groups: usize, eip1108: bool) -> Result<u64, VMError> {
    let groups = u64::try_from(groups).map_err(|_| OutOfGas)?;
    let (base, per_group) = if eip1108 {
        (ECPAIRING_BASE_COST, ECPAIRING_GROUP_COST)
    } else {
        (ECPAIRING_BASE_COST_BYZANTIUM, ECPAIRING_GROUP_COST_BYZANTIUM)
    };
    sum(&[base, per_group.checked_mul(groups).ok_or(OutOfGas)?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gas_schedule::{BERLIN, ISTANBUL, LONDON, SPURIOUS_DRAGON};

    fn u(value: u64) -> U256 {
        U256::from(value)
    }

    #[test]
    fn legacy_sstore() {
        let set = sstore(u(0), u(0), u(1), false, &SPURIOUS_DRAGON);
        assert_eq!(set, SStoreCost { gas: 20000, refund: 0 });
        let clear = sstore(u(1), u(1), u(0), false, &SPURIOUS_DRAGON);
        assert_eq!(clear, SStoreCost { gas: 5000, refund: 15000 });
    }

    #[test]
    fn net_metered_sstore() {
        // EIP-2200 test cases with original value 1
        assert_eq!(sstore(u(1), u(1), u(1), true, &ISTANBUL).gas, 800);
        assert_eq!(sstore(u(1), u(1), u(0), true, &ISTANBUL), SStoreCost { gas: 5000, refund: 15000 });
        assert_eq!(sstore(u(1), u(0), u(1), true, &ISTANBUL), SStoreCost { gas: 800, refund: -15000 + 4200 });
        assert_eq!(sstore(u(0), u(1), u(0), true, &ISTANBUL), SStoreCost { gas: 800, refund: 19200 });
        assert_eq!(sstore(u(0), u(0), u(1), true, &SPURIOUS_DRAGON).gas, 20000);
        assert_eq!(sstore(u(1), u(2), u(1), true, &SPURIOUS_DRAGON), SStoreCost { gas: 200, refund: 4800 });
    }

    #[test]
    fn berlin_and_london_sstore_refunds() {
        assert_eq!(sstore(u(1), u(1), u(2), true, &BERLIN).gas, 2900);
        assert_eq!(sstore(u(1), u(2), u(1), true, &BERLIN), SStoreCost { gas: 100, refund: 2800 });
        assert_eq!(sstore(u(1), u(1), u(0), true, &LONDON), SStoreCost { gas: 2900, refund: 4800 });
    }

    #[test]
    fn call_gas_is_capped() {
        assert_eq!(call_child_gas(U256::MAX, 6400, 0, 0, true).unwrap(), 6300);
        assert_eq!(call_child_gas(u(100), 6400, 0, 0, true).unwrap(), 100);
        assert_eq!(call_child_gas(u(5000), 100, 0, 0, false).unwrap(), 5000);
        assert!(call_child_gas(u(1), 100, 60, 50, true).is_err());
    }

    #[test]
    fn modexp_pricing() {
        // EIP-2565 example: 32 byte base, exponent and modulus, exponent 2^256 - 1
        let berlin = modexp(u(32), u(32), u(32), U256::MAX, ModexpPricing::Berlin);
        assert_eq!(berlin, u(16 * 255 / 3));
        assert_eq!(modexp(u(1), u(1), u(1), u(3), ModexpPricing::Berlin), u(200));
        assert_eq!(
            modexp(u(64), u(32), u(64), U256::MAX, ModexpPricing::Byzantium),
            u(64 * 64 * 255 / 20)
        );
        assert_eq!(
            modexp(U256::MAX, u(0), U256::MAX, u(0), ModexpPricing::Berlin),
            U256::MAX / 3
        );
    }

    #[test]
    fn osaka_modexp_pricing() {
        // small operands cost a flat complexity of 16 per iteration
        assert_eq!(modexp(u(32), u(32), u(32), U256::MAX, ModexpPricing::Osaka), u(16 * 255));
        assert_eq!(modexp(u(1), u(1), u(1), u(3), ModexpPricing::Osaka), u(500));
        // 64 byte operands: 2 * 8^2 per iteration
        assert_eq!(modexp(u(64), u(32), u(64), U256::MAX, ModexpPricing::Osaka), u(128 * 255));
        // long exponents count 16 iterations per extra byte
        assert_eq!(
            modexp(u(64), u(40), u(64), U256::one(), ModexpPricing::Osaka),
            u(128 * 8 * 16)
        );
    }

    #[test]
    fn bls12_costs() {
        assert_eq!(bls12_msm(0, &BLS12_381_G1_K_DISCOUNT, G1_MUL_COST).unwrap(), 0);
        assert_eq!(bls12_msm(1, &BLS12_381_G1_K_DISCOUNT, G1_MUL_COST).unwrap(), 12000);
        assert_eq!(
            bls12_msm(2, &BLS12_381_G1_K_DISCOUNT, G1_MUL_COST).unwrap(),
            2 * 12000 * 949 / 1000
        );
        assert_eq!(
            bls12_msm(200, &BLS12_381_G2_K_DISCOUNT, G2_MUL_COST).unwrap(),
            200 * 22500 * 524 / 1000
        );
        assert_eq!(bls12_pairing_check(2).unwrap(), 37700 + 2 * 32600);
    }

    #[test]
    fn create_costs() {
        assert_eq!(create(0, 0, 64, false, false).unwrap(), 32000);
        assert_eq!(create(0, 0, 64, true, true).unwrap(), 32000 + 4 + 12);
        assert_eq!(ecpairing(2, true).unwrap(), 113000);
        assert_eq!(ecpairing(0, false).unwrap(), 100000);
    }
}
