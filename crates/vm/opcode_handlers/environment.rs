use ethereum_types::U256;
use keel_common::utils::{address_to_word, h256_to_u256, word_to_address};

use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    opcode_handlers::OpcodeHandler,
    utils::{read_padded, size_offset_to_usize},
    vm::VM,
};

// Environmental Information (16)
// Opcodes: ADDRESS, BALANCE, ORIGIN, CALLER, CALLVALUE, CALLDATALOAD, CALLDATASIZE,
// CALLDATACOPY, CODESIZE, CODECOPY, GASPRICE, EXTCODESIZE, EXTCODECOPY,
// RETURNDATASIZE, RETURNDATACOPY, EXTCODEHASH

fn push_value(vm: &mut VM<'_>, gas: u64, value: U256) -> Result<OpcodeResult, VMError> {
    let frame = &mut vm.current_call_frame;
    frame.increase_consumed_gas(gas)?;
    frame.stack.push(value)?;
    Ok(OpcodeResult::Continue)
}

fn usize_word(value: usize) -> U256 {
    U256::from(value as u64)
}

/// Pops `dest_offset, offset, size`, charges the copy and writes `data[offset..]`
/// into memory, zero padded.
fn copy_to_memory(
    vm: &mut VM<'_>,
    static_cost: u64,
    data: &[u8],
    dest_offset: U256,
    offset: U256,
    size: U256,
) -> Result<OpcodeResult, VMError> {
    let frame = &mut vm.current_call_frame;
    let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;
    frame.increase_consumed_gas(gas_cost::copy(
        static_cost,
        calculate_memory_size(dest_offset, size)?,
        frame.memory.len(),
        size,
    )?)?;
    if size > 0 {
        frame
            .memory
            .store_data(dest_offset, &read_padded(data, offset, size))?;
    }
    Ok(OpcodeResult::Continue)
}

pub struct OpAddressHandler;
impl OpcodeHandler for OpAddressHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let address = vm.current_call_frame.to;
        push_value(vm, gas_cost::ADDRESS, address_to_word(address))
    }
}

pub struct OpBalanceHandler;
impl OpcodeHandler for OpBalanceHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(vm.current_call_frame.stack.pop1()?);
        let gas = vm.account_access_cost(address, vm.config.gas.balance);
        vm.current_call_frame.increase_consumed_gas(gas)?;
        let balance = vm.db.get_account(&address)?.balance;
        vm.current_call_frame.stack.push(balance)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpOriginHandler;
impl OpcodeHandler for OpOriginHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let origin = vm.env.origin;
        push_value(vm, gas_cost::ORIGIN, address_to_word(origin))
    }
}

pub struct OpCallerHandler;
impl OpcodeHandler for OpCallerHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let caller = vm.current_call_frame.msg_sender;
        push_value(vm, gas_cost::CALLER, address_to_word(caller))
    }
}

pub struct OpCallValueHandler;
impl OpcodeHandler for OpCallValueHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let value = vm.current_call_frame.msg_value;
        push_value(vm, gas_cost::CALLVALUE, value)
    }
}

pub struct OpCallDataLoadHandler;
impl OpcodeHandler for OpCallDataLoadHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::CALLDATALOAD)?;
        let offset = frame.stack.pop1()?;
        let word = read_padded(&frame.calldata, offset, 32);
        frame.stack.push(U256::from_big_endian(&word))?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpCallDataSizeHandler;
impl OpcodeHandler for OpCallDataSizeHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let size = usize_word(vm.current_call_frame.calldata.len());
        push_value(vm, gas_cost::CALLDATASIZE, size)
    }
}

pub struct OpCallDataCopyHandler;
impl OpcodeHandler for OpCallDataCopyHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [dest_offset, offset, size] = vm.current_call_frame.stack.pop()?;
        let calldata = vm.current_call_frame.calldata.clone();
        copy_to_memory(
            vm,
            gas_cost::CALLDATACOPY_STATIC,
            &calldata,
            dest_offset,
            offset,
            size,
        )
    }
}

pub struct OpCodeSizeHandler;
impl OpcodeHandler for OpCodeSizeHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let size = usize_word(vm.current_call_frame.bytecode.len());
        push_value(vm, gas_cost::CODESIZE, size)
    }
}

pub struct OpCodeCopyHandler;
impl OpcodeHandler for OpCodeCopyHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [dest_offset, offset, size] = vm.current_call_frame.stack.pop()?;
        let code = vm.current_call_frame.bytecode.clone();
        copy_to_memory(
            vm,
            gas_cost::CODECOPY_STATIC,
            &code,
            dest_offset,
            offset,
            size,
        )
    }
}

pub struct OpGasPriceHandler;
impl OpcodeHandler for OpGasPriceHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let gas_price = vm.env.gas_price;
        push_value(vm, gas_cost::GASPRICE, gas_price)
    }
}

pub struct OpExtCodeSizeHandler;
impl OpcodeHandler for OpExtCodeSizeHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(vm.current_call_frame.stack.pop1()?);
        let gas = vm.account_access_cost(address, vm.config.gas.extcodesize);
        vm.current_call_frame.increase_consumed_gas(gas)?;
        let size = usize_word(vm.db.get_account(&address)?.code.len());
        vm.current_call_frame.stack.push(size)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpExtCodeCopyHandler;
impl OpcodeHandler for OpExtCodeCopyHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [address, dest_offset, offset, size] = vm.current_call_frame.stack.pop()?;
        let address = word_to_address(address);
        let access_cost = vm.account_access_cost(address, vm.config.gas.extcodecopy_base);
        let code = vm.db.get_account(&address)?.code;
        copy_to_memory(vm, access_cost, &code, dest_offset, offset, size)
    }
}

pub struct OpReturnDataSizeHandler;
impl OpcodeHandler for OpReturnDataSizeHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let size = usize_word(vm.current_call_frame.sub_return_data.len());
        push_value(vm, gas_cost::RETURNDATASIZE, size)
    }
}

pub struct OpReturnDataCopyHandler;
impl OpcodeHandler for OpReturnDataCopyHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        let [dest_offset, offset, size] = frame.stack.pop()?;
        let (copy_size, dest) = size_offset_to_usize(size, dest_offset)?;
        frame.increase_consumed_gas(gas_cost::copy(
            gas_cost::RETURNDATACOPY_STATIC,
            calculate_memory_size(dest, copy_size)?,
            frame.memory.len(),
            copy_size,
        )?)?;

        let end = offset
            .checked_add(size)
            .ok_or(ExceptionalHalt::OutOfBoundsRead)?;
        if end > usize_word(frame.sub_return_data.len()) {
            return Err(ExceptionalHalt::OutOfBoundsRead.into());
        }
        if copy_size > 0 {
            let start = offset.low_u64() as usize;
            let data = frame.sub_return_data.slice(start..start + copy_size);
            frame.memory.store_data(dest, &data)?;
        }
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpExtCodeHashHandler;
impl OpcodeHandler for OpExtCodeHashHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(vm.current_call_frame.stack.pop1()?);
        let gas = vm.account_access_cost(address, vm.config.gas.extcodehash);
        vm.current_call_frame.increase_consumed_gas(gas)?;
        // dead accounts hash to zero
        let hash = match vm.db.get_account_optional(&address)? {
            Some(account) if !account.is_empty() => h256_to_u256(account.code_hash()),
            _ => U256::zero(),
        };
        vm.current_call_frame.stack.push(hash)?;
        Ok(OpcodeResult::Continue)
    }
}
