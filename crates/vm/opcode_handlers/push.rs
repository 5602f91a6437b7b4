use ethereum_types::U256;

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::VM,
};

// Push Operations
// Opcodes: PUSH0, PUSH1 ... PUSH32

pub struct OpPushHandler<const N: usize>;
impl<const N: usize> OpcodeHandler for OpPushHandler<N> {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::PUSHN)?;
        let value = U256::from_big_endian(&frame.immediate::<N>());
        frame.stack.push(value)?;
        frame.pc = frame.pc.saturating_add(N);
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpPush0Handler;
impl OpcodeHandler for OpPush0Handler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::PUSH0)?;
        frame.stack.push_zero()?;
        Ok(OpcodeResult::Continue)
    }
}
