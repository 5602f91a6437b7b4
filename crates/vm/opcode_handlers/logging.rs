use bytes::Bytes;
use keel_common::{types::Log, utils::u256_to_h256};

use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    opcode_handlers::OpcodeHandler,
    utils::size_offset_to_usize,
    vm::VM,
};

// Logging Operations (5)
// Opcodes: LOG0 ... LOG4

pub struct OpLogHandler<const N: usize>;
impl<const N: usize> OpcodeHandler for OpLogHandler<N> {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        if frame.is_static {
            return Err(ExceptionalHalt::WriteInStaticContext.into());
        }
        let [offset, size] = frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;
        let topics = frame.stack.pop::<N>()?.map(u256_to_h256);
        frame.increase_consumed_gas(gas_cost::log(
            calculate_memory_size(offset, size)?,
            frame.memory.len(),
            size,
            N,
        )?)?;

        let data: Bytes = frame.memory.load_range(offset, size)?;
        vm.substate.logs.push(Log {
            address: frame.to,
            topics: topics.to_vec(),
            data,
        });
        Ok(OpcodeResult::Continue)
    }
}
