use bytes::Bytes;
use ethereum_types::{Address, U256};
use keel_common::utils::word_to_address;

use crate::{
    call_frame::CallFrame,
    constants::{FAIL, INIT_CODE_MAX_SIZE, STACK_DEPTH_LIMIT},
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    memory::{self, calculate_memory_size},
    opcode_handlers::OpcodeHandler,
    utils::{calculate_create_address, calculate_create2_address, size_offset_to_usize},
    vm::VM,
};

// System Operations (10)
// Opcodes: CREATE, CALL, CALLCODE, RETURN, DELEGATECALL, CREATE2, STATICCALL, REVERT,
// INVALID, SELFDESTRUCT

/// Input and output regions of a message call.
#[derive(Debug, Clone, Copy)]
struct CallMemory {
    args_offset: usize,
    args_size: usize,
    ret_offset: usize,
    ret_size: usize,
    new_memory_size: usize,
}

impl CallMemory {
    fn new(
        args_offset: U256,
        args_size: U256,
        ret_offset: U256,
        ret_size: U256,
    ) -> Result<Self, VMError> {
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = size_offset_to_usize(ret_size, ret_offset)?;
        let new_memory_size = calculate_memory_size(args_offset, args_size)?
            .max(calculate_memory_size(ret_offset, ret_size)?);
        Ok(Self {
            args_offset,
            args_size,
            ret_offset,
            ret_size,
            new_memory_size,
        })
    }
}

/// Message call parameters shared by the `CALL` family.
struct CallParams {
    gas_limit: u64,
    value: U256,
    msg_sender: Address,
    to: Address,
    code_address: Address,
    should_transfer_value: bool,
    is_static: bool,
    memory: CallMemory,
}

impl VM<'_> {
    /// Charges the expansion, `extra_gas` and the forwarded gas of a call, and
    /// returns the gas the child frame receives, stipend excluded.
    fn charge_call(
        &mut self,
        requested: U256,
        extra_gas: u64,
        memory: &CallMemory,
    ) -> Result<u64, VMError> {
        let eip150 = self.config.eips.eip150;
        let frame = &mut self.current_call_frame;
        let memory_cost = memory::expansion_cost(memory.new_memory_size, frame.memory.len())?;
        let child_gas = gas_cost::call_child_gas(
            requested,
            frame.gas_remaining,
            memory_cost,
            extra_gas,
            eip150,
        )?;
        let total = memory_cost
            .checked_add(extra_gas)
            .and_then(|gas| gas.checked_add(child_gas))
            .ok_or(ExceptionalHalt::OutOfGas)?;
        frame.increase_consumed_gas(total)?;
        frame.memory.expand(memory.new_memory_size);
        Ok(child_gas)
    }

    /// Whether sending `value` to `address` creates a new account.
    fn creates_account(&self, address: &Address, value: U256) -> Result<bool, VMError> {
        if self.config.eips.eip158 {
            Ok(!value.is_zero() && self.db.is_account_empty(address)?)
        } else {
            Ok(!self.db.account_exists(address)?)
        }
    }

    /// Starts a child message call. Depth overflows and missing funds fail
    /// softly: the child gas goes back to the caller and `0` is pushed.
    fn generic_call(&mut self, params: CallParams) -> Result<OpcodeResult, VMError> {
        let depth = self.current_call_frame.depth.saturating_add(1);
        let insufficient_balance = params.should_transfer_value
            && !params.value.is_zero()
            && self.db.get_account(&params.msg_sender)?.balance < params.value;

        let frame = &mut self.current_call_frame;
        frame.sub_return_data = Bytes::new();
        if depth > STACK_DEPTH_LIMIT || insufficient_balance {
            frame.gas_remaining = frame.gas_remaining.saturating_add(params.gas_limit);
            frame.stack.push(FAIL)?;
            return Ok(OpcodeResult::Continue);
        }

        let calldata = frame
            .memory
            .load_range(params.memory.args_offset, params.memory.args_size)?;
        let is_static = params.is_static || frame.is_static;
        let (code_address, bytecode) = self.load_code(params.code_address)?;
        let mut child = CallFrame::new(
            params.msg_sender,
            params.to,
            code_address,
            bytecode,
            params.value,
            calldata,
            is_static,
            params.gas_limit,
            depth,
            params.should_transfer_value,
            false,
        );
        child.ret_offset = params.memory.ret_offset;
        child.ret_size = params.memory.ret_size;
        self.push_frame(child);
        if let Some(result) = self.start_frame()? {
            self.handle_return(result)?;
        }
        Ok(OpcodeResult::Continue)
    }

    /// Shared by `CREATE` and `CREATE2`, which passes its salt.
    fn generic_create(
        &mut self,
        value: U256,
        offset: U256,
        size: U256,
        salt: Option<U256>,
    ) -> Result<OpcodeResult, VMError> {
        let eips = self.config.eips;
        let frame = &mut self.current_call_frame;
        let (size, offset) = size_offset_to_usize(size, offset)?;
        frame.increase_consumed_gas(gas_cost::create(
            calculate_memory_size(offset, size)?,
            frame.memory.len(),
            size,
            salt.is_some(),
            eips.eip3860,
        )?)?;
        if eips.eip3860 && size > INIT_CODE_MAX_SIZE {
            return Err(ExceptionalHalt::OutOfGas.into());
        }
        if frame.is_static {
            return Err(ExceptionalHalt::WriteInStaticContext.into());
        }
        let init_code = frame.memory.load_range(offset, size)?;

        let sender = frame.to;
        let sender_account = self.db.get_account(&sender)?;
        let address = match salt {
            Some(salt) => calculate_create2_address(sender, &init_code, salt),
            None => calculate_create_address(sender, sender_account.nonce),
        };
        self.substate.add_accessed_address(address);

        let frame = &mut self.current_call_frame;
        let child_gas = if eips.eip150 {
            gas_cost::max_message_call_gas(frame.gas_remaining)
        } else {
            frame.gas_remaining
        };
        frame.increase_consumed_gas(child_gas)?;
        frame.sub_return_data = Bytes::new();

        let depth = frame.depth.saturating_add(1);
        if sender_account.balance < value
            || sender_account.nonce == u64::MAX
            || depth > STACK_DEPTH_LIMIT
        {
            frame.gas_remaining = frame.gas_remaining.saturating_add(child_gas);
            frame.stack.push(FAIL)?;
            return Ok(OpcodeResult::Continue);
        }

        // the creator pays a nonce for a colliding address and loses the child gas
        self.db.increment_nonce(sender)?;
        if self.db.create_would_collide(&address)? {
            self.current_call_frame.stack.push(FAIL)?;
            return Ok(OpcodeResult::Continue);
        }

        let child = CallFrame::new(
            sender,
            address,
            address,
            init_code,
            value,
            Bytes::new(),
            false,
            child_gas,
            depth,
            true,
            true,
        );
        self.push_frame(child);
        if let Some(result) = self.start_frame()? {
            self.handle_return(result)?;
        }
        Ok(OpcodeResult::Continue)
    }

    /// Charges the memory of `RETURN` and `REVERT` and stores the frame output.
    fn load_output(&mut self) -> Result<(), VMError> {
        let frame = &mut self.current_call_frame;
        let [offset, size] = frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;
        frame.increase_consumed_gas(gas_cost::memory_access(
            0,
            calculate_memory_size(offset, size)?,
            frame.memory.len(),
        )?)?;
        frame.output = frame.memory.load_range(offset, size)?;
        Ok(())
    }
}

pub struct OpCallHandler;
impl OpcodeHandler for OpCallHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, to, value, args_offset, args_size, ret_offset, ret_size] =
            vm.current_call_frame.stack.pop()?;
        let to = word_to_address(to);
        let memory = CallMemory::new(args_offset, args_size, ret_offset, ret_size)?;

        let mut extra_gas = vm
            .account_access_cost(to, vm.config.gas.call)
            .saturating_add(vm.delegation_access_cost(to)?);
        if vm.creates_account(&to, value)? {
            extra_gas = extra_gas.saturating_add(vm.config.gas.call_new_account);
        }
        if !value.is_zero() {
            extra_gas = extra_gas.saturating_add(gas_cost::CALL_POSITIVE_VALUE);
        }
        let child_gas = vm.charge_call(gas, extra_gas, &memory)?;
        if vm.current_call_frame.is_static && !value.is_zero() {
            return Err(ExceptionalHalt::WriteInStaticContext.into());
        }

        let stipend = if value.is_zero() {
            0
        } else {
            gas_cost::CALL_POSITIVE_VALUE_STIPEND
        };
        let msg_sender = vm.current_call_frame.to;
        vm.generic_call(CallParams {
            gas_limit: child_gas.saturating_add(stipend),
            value,
            msg_sender,
            to,
            code_address: to,
            should_transfer_value: true,
            is_static: false,
            memory,
        })
    }
}

/// Runs the code of another account on the storage of the current one.
pub struct OpCallCodeHandler;
impl OpcodeHandler for OpCallCodeHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, code_address, value, args_offset, args_size, ret_offset, ret_size] =
            vm.current_call_frame.stack.pop()?;
        let code_address = word_to_address(code_address);
        let memory = CallMemory::new(args_offset, args_size, ret_offset, ret_size)?;

        let mut extra_gas = vm
            .account_access_cost(code_address, vm.config.gas.call)
            .saturating_add(vm.delegation_access_cost(code_address)?);
        let stipend = if value.is_zero() {
            0
        } else {
            extra_gas = extra_gas.saturating_add(gas_cost::CALL_POSITIVE_VALUE);
            gas_cost::CALL_POSITIVE_VALUE_STIPEND
        };
        let child_gas = vm.charge_call(gas, extra_gas, &memory)?;

        let current = vm.current_call_frame.to;
        vm.generic_call(CallParams {
            gas_limit: child_gas.saturating_add(stipend),
            value,
            msg_sender: current,
            to: current,
            code_address,
            should_transfer_value: true,
            is_static: false,
            memory,
        })
    }
}

pub struct OpDelegateCallHandler;
impl OpcodeHandler for OpDelegateCallHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, code_address, args_offset, args_size, ret_offset, ret_size] =
            vm.current_call_frame.stack.pop()?;
        let code_address = word_to_address(code_address);
        let memory = CallMemory::new(args_offset, args_size, ret_offset, ret_size)?;

        let extra_gas = vm
            .account_access_cost(code_address, vm.config.gas.call)
            .saturating_add(vm.delegation_access_cost(code_address)?);
        let child_gas = vm.charge_call(gas, extra_gas, &memory)?;

        let frame = &vm.current_call_frame;
        let (value, msg_sender, to) = (frame.msg_value, frame.msg_sender, frame.to);
        vm.generic_call(CallParams {
            gas_limit: child_gas,
            value,
            msg_sender,
            to,
            code_address,
            should_transfer_value: false,
            is_static: false,
            memory,
        })
    }
}

pub struct OpStaticCallHandler;
impl OpcodeHandler for OpStaticCallHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, to, args_offset, args_size, ret_offset, ret_size] =
            vm.current_call_frame.stack.pop()?;
        let to = word_to_address(to);
        let memory = CallMemory::new(args_offset, args_size, ret_offset, ret_size)?;

        let extra_gas = vm
            .account_access_cost(to, vm.config.gas.call)
            .saturating_add(vm.delegation_access_cost(to)?);
        let child_gas = vm.charge_call(gas, extra_gas, &memory)?;

        let msg_sender = vm.current_call_frame.to;
        vm.generic_call(CallParams {
            gas_limit: child_gas,
            value: U256::zero(),
            msg_sender,
            to,
            code_address: to,
            should_transfer_value: true,
            is_static: true,
            memory,
        })
    }
}

pub struct OpCreateHandler;
impl OpcodeHandler for OpCreateHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [value, offset, size] = vm.current_call_frame.stack.pop()?;
        vm.generic_create(value, offset, size, None)
    }
}

pub struct OpCreate2Handler;
impl OpcodeHandler for OpCreate2Handler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [value, offset, size, salt] = vm.current_call_frame.stack.pop()?;
        vm.generic_create(value, offset, size, Some(salt))
    }
}

pub struct OpReturnHandler;
impl OpcodeHandler for OpReturnHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.load_output()?;
        Ok(OpcodeResult::Halt)
    }
}

pub struct OpRevertHandler;
impl OpcodeHandler for OpRevertHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.load_output()?;
        Err(VMError::RevertOpcode)
    }
}

pub struct OpSelfDestructHandler;
impl OpcodeHandler for OpSelfDestructHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let config = vm.config;
        let eips = config.eips;
        let beneficiary = word_to_address(vm.current_call_frame.stack.pop1()?);
        let originator = vm.current_call_frame.to;
        let balance = vm.db.get_account(&originator)?.balance;

        let mut gas = config.gas.selfdestruct;
        if eips.eip2929 && vm.substate.add_accessed_address(beneficiary) {
            gas = gas.saturating_add(config.gas.cold_account_access);
        }
        let creates_account = if eips.eip158 {
            !balance.is_zero() && vm.db.is_account_empty(&beneficiary)?
        } else {
            eips.eip150 && !vm.db.account_exists(&beneficiary)?
        };
        if creates_account {
            gas = gas.saturating_add(config.gas.selfdestruct_new_account);
        }
        vm.current_call_frame.increase_consumed_gas(gas)?;
        if vm.current_call_frame.is_static {
            return Err(ExceptionalHalt::WriteInStaticContext.into());
        }

        if config.gas.selfdestruct_refund > 0 && !vm.substate.selfdestruct_set.contains(&originator)
        {
            let refund = i64::try_from(config.gas.selfdestruct_refund).unwrap_or(i64::MAX);
            vm.substate.refunded_gas = vm.substate.refunded_gas.saturating_add(refund);
        }

        if eips.eip6780 {
            // only contracts created in this transaction are deleted
            vm.db.move_ether(originator, beneficiary, balance)?;
            if vm.db.is_account_created(&originator) {
                vm.db.set_balance(originator, U256::zero())?;
                vm.substate.selfdestruct_set.insert(originator);
            }
        } else {
            let beneficiary_balance = vm.db.get_account(&beneficiary)?.balance;
            vm.db
                .set_balance(beneficiary, beneficiary_balance.overflowing_add(balance).0)?;
            vm.db.set_balance(originator, U256::zero())?;
            vm.substate.selfdestruct_set.insert(originator);
        }

        if eips.eip158 && vm.db.account_exists_and_is_empty(&beneficiary)? {
            vm.substate.touched_accounts.insert(beneficiary);
        }
        Ok(OpcodeResult::Halt)
    }
}
