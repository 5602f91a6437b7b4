use bytes::Bytes;

use crate::{
    constants::{INVALID_CONTRACT_PREFIX, MAX_CODE_SIZE},
    errors::{ContextResult, ExceptionalHalt, TxResult, VMError},
    gas_cost,
    vm::VM,
};

impl VM<'_> {
    /// Result of a frame that halted normally. Creations deposit their code here.
    pub(crate) fn handle_opcode_result(&mut self) -> Result<ContextResult, VMError> {
        if self.current_call_frame.is_create {
            if let Err(error) = self.deposit_code() {
                if error.should_propagate() {
                    return Err(error);
                }
                let frame = &mut self.current_call_frame;
                frame.gas_remaining = 0;
                frame.output = Bytes::new();
                return Ok(ContextResult {
                    result: TxResult::Revert(error),
                    gas_used: frame.gas_limit,
                    output: Bytes::new(),
                });
            }
        }
        let frame = &self.current_call_frame;
        Ok(ContextResult {
            result: TxResult::Success,
            gas_used: frame.gas_used(),
            output: frame.output.clone(),
        })
    }

    /// Result of a frame that reverted or halted exceptionally. Only `REVERT`
    /// keeps its output and unused gas.
    pub(crate) fn handle_opcode_error(&mut self, error: VMError) -> ContextResult {
        let frame = &mut self.current_call_frame;
        if !error.is_revert_opcode() {
            frame.gas_remaining = 0;
            frame.output = Bytes::new();
        }
        ContextResult {
            result: TxResult::Revert(error),
            gas_used: frame.gas_used(),
            output: frame.output.clone(),
        }
    }

    /// Validates and stores the code returned by an init code frame.
    fn deposit_code(&mut self) -> Result<(), VMError> {
        let eips = self.config.eips;
        let frame = &mut self.current_call_frame;
        let code = frame.output.clone();
        if eips.eip3541 && code.first() == Some(&INVALID_CONTRACT_PREFIX) {
            return Err(ExceptionalHalt::InvalidContractPrefix.into());
        }
        if eips.eip170 && code.len() > MAX_CODE_SIZE {
            return Err(ExceptionalHalt::ContractSizeExceeded.into());
        }
        let cost = gas_cost::code_deposit(code.len())?;
        if frame.increase_consumed_gas(cost).is_err() {
            if eips.homestead {
                return Err(ExceptionalHalt::OutOfGas.into());
            }
            // Frontier leaves an empty account and keeps the gas
            frame.output = Bytes::new();
            return Ok(());
        }
        self.db.set_code(frame.to, code)?;
        Ok(())
    }
}
