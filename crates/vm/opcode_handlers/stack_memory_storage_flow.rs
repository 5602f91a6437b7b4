use ethereum_types::U256;
use keel_common::utils::u256_to_h256;

use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    opcode_handlers::OpcodeHandler,
    utils::{size_offset_to_usize, u256_to_usize},
    vm::VM,
};

// Stack, Memory, Storage and Flow Operations (15)
// Opcodes: POP, MLOAD, MSTORE, MSTORE8, SLOAD, SSTORE, JUMP, JUMPI, PC, MSIZE, GAS,
// JUMPDEST, TLOAD, TSTORE, MCOPY

pub struct OpPopHandler;
impl OpcodeHandler for OpPopHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::POP)?;
        frame.stack.pop1()?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpMLoadHandler;
impl OpcodeHandler for OpMLoadHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        let offset = u256_to_usize(frame.stack.pop1()?)?;
        frame.increase_consumed_gas(gas_cost::memory_access(
            gas_cost::MLOAD_STATIC,
            calculate_memory_size(offset, 32)?,
            frame.memory.len(),
        )?)?;
        let word = frame.memory.load_word(offset)?;
        frame.stack.push(word)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpMStoreHandler;
impl OpcodeHandler for OpMStoreHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        let [offset, value] = frame.stack.pop()?;
        let offset = u256_to_usize(offset)?;
        frame.increase_consumed_gas(gas_cost::memory_access(
            gas_cost::MSTORE_STATIC,
            calculate_memory_size(offset, 32)?,
            frame.memory.len(),
        )?)?;
        frame.memory.store_word(offset, value)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpMStore8Handler;
impl OpcodeHandler for OpMStore8Handler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        let [offset, value] = frame.stack.pop()?;
        let offset = u256_to_usize(offset)?;
        frame.increase_consumed_gas(gas_cost::memory_access(
            gas_cost::MSTORE8_STATIC,
            calculate_memory_size(offset, 1)?,
            frame.memory.len(),
        )?)?;
        frame.memory.store_data(offset, &[value.byte(0)])?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpSLoadHandler;
impl OpcodeHandler for OpSLoadHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let address = vm.current_call_frame.to;
        let key = u256_to_h256(vm.current_call_frame.stack.pop1()?);
        let is_cold = vm.substate.add_accessed_slot(address, key);
        let gas = vm.config.gas.sload_cost(is_cold, vm.config.eips.eip2929);
        vm.current_call_frame.increase_consumed_gas(gas)?;
        let value = vm.db.get_storage(&address, &key)?;
        vm.current_call_frame.stack.push(value)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpSStoreHandler;
impl OpcodeHandler for OpSStoreHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let config = vm.config;
        let address = vm.current_call_frame.to;
        let [key, new_value] = vm.current_call_frame.stack.pop()?;
        if config.eips.eip2200 && vm.current_call_frame.gas_remaining <= gas_cost::SSTORE_STIPEND
        {
            return Err(ExceptionalHalt::OutOfGas.into());
        }

        let key = u256_to_h256(key);
        let original = vm.db.get_storage_original(&address, &key)?;
        let current = vm.db.get_storage(&address, &key)?;
        let cost = gas_cost::sstore(
            original,
            current,
            new_value,
            config.eips.net_gas_metering(),
            config.gas,
        );
        let mut gas = cost.gas;
        if config.eips.eip2929 && vm.substate.add_accessed_slot(address, key) {
            gas = gas.saturating_add(config.gas.cold_sload);
        }
        vm.current_call_frame.increase_consumed_gas(gas)?;
        if vm.current_call_frame.is_static {
            return Err(ExceptionalHalt::WriteInStaticContext.into());
        }

        vm.substate.refunded_gas = vm.substate.refunded_gas.saturating_add(cost.refund);
        vm.db.set_storage(address, key, new_value)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpJumpHandler;
impl OpcodeHandler for OpJumpHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::JUMP)?;
        let target = frame.stack.pop1()?;
        frame.jump(target)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpJumpIHandler;
impl OpcodeHandler for OpJumpIHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::JUMPI)?;
        let [target, condition] = frame.stack.pop()?;
        if !condition.is_zero() {
            frame.jump(target)?;
        }
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpPcHandler;
impl OpcodeHandler for OpPcHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::PC)?;
        // pc already points past this opcode
        let pc = frame.pc.saturating_sub(1);
        frame.stack.push(U256::from(pc as u64))?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpMSizeHandler;
impl OpcodeHandler for OpMSizeHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::MSIZE)?;
        let size = frame.memory.len();
        frame.stack.push(U256::from(size as u64))?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpGasHandler;
impl OpcodeHandler for OpGasHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::GAS)?;
        let remaining = frame.gas_remaining;
        frame.stack.push(U256::from(remaining))?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpJumpDestHandler;
impl OpcodeHandler for OpJumpDestHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::JUMPDEST)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpTLoadHandler;
impl OpcodeHandler for OpTLoadHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::TLOAD)?;
        let key = frame.stack.pop1()?;
        let value = vm
            .substate
            .transient_storage
            .get(&(frame.to, key))
            .copied()
            .unwrap_or_default();
        frame.stack.push(value)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpTStoreHandler;
impl OpcodeHandler for OpTStoreHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::TSTORE)?;
        if frame.is_static {
            return Err(ExceptionalHalt::WriteInStaticContext.into());
        }
        let [key, value] = frame.stack.pop()?;
        vm.substate.transient_storage.insert((frame.to, key), value);
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpMCopyHandler;
impl OpcodeHandler for OpMCopyHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        let [dest_offset, src_offset, size] = frame.stack.pop()?;
        let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;
        let src_offset = if size == 0 {
            0
        } else {
            u256_to_usize(src_offset)?
        };
        let new_memory_size = calculate_memory_size(dest_offset, size)?
            .max(calculate_memory_size(src_offset, size)?);
        frame.increase_consumed_gas(gas_cost::copy(
            gas_cost::MCOPY_STATIC,
            new_memory_size,
            frame.memory.len(),
            size,
        )?)?;
        frame.memory.copy_within(src_offset, dest_offset, size)?;
        Ok(OpcodeResult::Continue)
    }
}
