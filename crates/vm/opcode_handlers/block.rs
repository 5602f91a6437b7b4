use ethereum_types::U256;
use keel_common::utils::{address_to_word, h256_to_u256};

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::VM,
};

// Block Information (11)
// Opcodes: BLOCKHASH, COINBASE, TIMESTAMP, NUMBER, PREVRANDAO, GASLIMIT, CHAINID,
// SELFBALANCE, BASEFEE, BLOBHASH, BLOBBASEFEE

fn push_value(vm: &mut VM<'_>, gas: u64, value: U256) -> Result<OpcodeResult, VMError> {
    let frame = &mut vm.current_call_frame;
    frame.increase_consumed_gas(gas)?;
    frame.stack.push(value)?;
    Ok(OpcodeResult::Continue)
}

pub struct OpBlockHashHandler;
impl OpcodeHandler for OpBlockHashHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::BLOCKHASH)?;
        let number = frame.stack.pop1()?;
        frame.stack.push(h256_to_u256(vm.env.block_hash(number)))?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpCoinbaseHandler;
impl OpcodeHandler for OpCoinbaseHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let coinbase = address_to_word(vm.env.coinbase);
        push_value(vm, gas_cost::COINBASE, coinbase)
    }
}

pub struct OpTimestampHandler;
impl OpcodeHandler for OpTimestampHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let timestamp = U256::from(vm.env.timestamp);
        push_value(vm, gas_cost::TIMESTAMP, timestamp)
    }
}

pub struct OpNumberHandler;
impl OpcodeHandler for OpNumberHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let number = U256::from(vm.env.block_number);
        push_value(vm, gas_cost::NUMBER, number)
    }
}

/// `DIFFICULTY` before the merge, `PREVRANDAO` after it.
pub struct OpPrevRandaoHandler;
impl OpcodeHandler for OpPrevRandaoHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let value = match vm.env.prev_randao {
            Some(randao) => h256_to_u256(randao),
            None => vm.env.difficulty,
        };
        push_value(vm, gas_cost::PREVRANDAO, value)
    }
}

pub struct OpGasLimitHandler;
impl OpcodeHandler for OpGasLimitHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let gas_limit = U256::from(vm.env.block_gas_limit);
        push_value(vm, gas_cost::GASLIMIT, gas_limit)
    }
}

pub struct OpChainIdHandler;
impl OpcodeHandler for OpChainIdHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let chain_id = U256::from(vm.env.chain_id);
        push_value(vm, gas_cost::CHAINID, chain_id)
    }
}

pub struct OpSelfBalanceHandler;
impl OpcodeHandler for OpSelfBalanceHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let balance = vm.db.get_account(&vm.current_call_frame.to)?.balance;
        push_value(vm, gas_cost::SELFBALANCE, balance)
    }
}

pub struct OpBaseFeeHandler;
impl OpcodeHandler for OpBaseFeeHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let base_fee = vm.env.base_fee_per_gas;
        push_value(vm, gas_cost::BASEFEE, base_fee)
    }
}

pub struct OpBlobHashHandler;
impl OpcodeHandler for OpBlobHashHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::BLOBHASH)?;
        let index = frame.stack.pop1()?;
        let hash = usize::try_from(index)
            .ok()
            .and_then(|index| vm.env.tx_blob_hashes.get(index))
            .map(|hash| h256_to_u256(*hash))
            .unwrap_or_default();
        frame.stack.push(hash)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpBlobBaseFeeHandler;
impl OpcodeHandler for OpBlobBaseFeeHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let blob_base_fee = vm.env.blob_base_fee;
        push_value(vm, gas_cost::BLOBBASEFEE, blob_base_fee)
    }
}
