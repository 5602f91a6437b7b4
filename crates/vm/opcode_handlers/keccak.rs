use keel_common::utils::h256_to_u256;

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    opcode_handlers::OpcodeHandler,
    utils::size_offset_to_usize,
    vm::VM,
};

pub struct OpKeccak256Handler;
impl OpcodeHandler for OpKeccak256Handler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let crypto = vm.crypto;
        let frame = &mut vm.current_call_frame;
        let [offset, size] = frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;
        frame.increase_consumed_gas(gas_cost::keccak256(
            calculate_memory_size(offset, size)?,
            frame.memory.len(),
            size,
        )?)?;
        let data = frame.memory.load_range(offset, size)?;
        frame.stack.push(h256_to_u256(crypto.keccak256(&data)))?;
        Ok(OpcodeResult::Continue)
    }
}
