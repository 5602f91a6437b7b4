use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::VM,
};

// Duplication Operation (16)
// Opcodes: DUP1 ... DUP16

/// `DUPn`, copies the `n`th word onto the top of the stack.
pub struct OpDupHandler<const N: usize>;
impl<const N: usize> OpcodeHandler for OpDupHandler<N> {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::DUPN)?;
        let value = frame.stack.peek(N - 1)?;
        frame.stack.push(value)?;
        Ok(OpcodeResult::Continue)
    }
}
