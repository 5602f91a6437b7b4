use std::collections::{BTreeSet, HashMap, HashSet};

use bytes::Bytes;
use derive_more::derive::Debug;
use ethereum_types::{Address, H256, U256};
use keel_common::{
    types::{Log, TxKind},
    utils::{address_to_word, delegated_address},
};
use keel_crypto::Crypto;
use keel_storage::WorldState;

use crate::{
    call_frame::CallFrame,
    constants::{FAIL, SUCCESS},
    environment::Environment,
    errors::{
        ContextResult, ExceptionalHalt, ExecutionReport, InternalError, OpcodeResult, TxResult,
        VMError,
    },
    fork_config::ForkConfig,
    precompiles::{self, execute_precompile},
    tracer::{Step, Tracer},
};

/// Information that changes during transaction execution and is rolled back
/// with the frame that produced it.
#[derive(Debug, Clone, Default)]
pub struct Substate {
    pub accessed_addresses: HashSet<Address>,
    pub accessed_storage_keys: HashSet<(Address, H256)>,
    pub selfdestruct_set: BTreeSet<Address>,
    pub touched_accounts: BTreeSet<Address>,
    pub logs: Vec<Log>,
    pub refunded_gas: i64,
    pub transient_storage: HashMap<(Address, U256), U256>,
}

impl Substate {
    /// Marks `address` as accessed, returning whether it was cold.
    pub fn add_accessed_address(&mut self, address: Address) -> bool {
        self.accessed_addresses.insert(address)
    }

    /// Marks a storage slot as accessed, returning whether it was cold.
    pub fn add_accessed_slot(&mut self, address: Address, key: H256) -> bool {
        self.accessed_storage_keys.insert((address, key))
    }
}

/// Top level message of a transaction.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub caller: Address,
    pub target: TxKind,
    /// Recipient, or the address being created.
    pub current_target: Address,
    pub value: U256,
    /// Calldata, or the init code of a creation.
    pub data: Bytes,
    /// Gas left after the intrinsic cost.
    pub gas: u64,
    /// Addresses warm before execution starts (EIP-2929).
    pub accessed_addresses: HashSet<Address>,
    pub accessed_storage_keys: HashSet<(Address, H256)>,
}

#[derive(Debug)]
pub struct VM<'a> {
    /// Parents of the current frame, outermost first.
    pub call_frames: Vec<CallFrame>,
    pub current_call_frame: CallFrame,
    pub env: Environment,
    pub substate: Substate,
    substate_backups: Vec<Substate>,
    #[debug(skip)]
    pub db: &'a mut WorldState,
    pub config: &'a ForkConfig,
    #[debug(skip)]
    pub crypto: &'a dyn Crypto,
    #[debug(skip)]
    pub tracer: &'a mut dyn Tracer,
}

impl<'a> VM<'a> {
    pub fn new(
        env: Environment,
        db: &'a mut WorldState,
        config: &'a ForkConfig,
        crypto: &'a dyn Crypto,
        tracer: &'a mut dyn Tracer,
    ) -> Self {
        Self {
            call_frames: Vec::new(),
            current_call_frame: CallFrame::default(),
            env,
            substate: Substate::default(),
            substate_backups: Vec::new(),
            db,
            config,
            crypto,
            tracer,
        }
    }

    /// Runs a top level message to completion.
    ///
    /// Frame failures are reported in the [`ExecutionReport`]. An `Err` means the
    /// state could not be read or written and the transaction has to be dropped.
    pub fn execute(&mut self, message: Message) -> Result<ExecutionReport, VMError> {
        self.substate = Substate {
            accessed_addresses: message.accessed_addresses,
            accessed_storage_keys: message.accessed_storage_keys,
            ..Default::default()
        };
        let is_create = matches!(message.target, TxKind::Create);
        let to = message.current_target;

        if is_create && self.db.create_would_collide(&to)? {
            return Ok(ExecutionReport {
                result: TxResult::Revert(ExceptionalHalt::AddressCollision.into()),
                gas_used: message.gas,
                gas_refunded: 0,
                output: Bytes::new(),
                logs: Vec::new(),
                accounts_to_delete: BTreeSet::new(),
                touched_accounts: BTreeSet::new(),
                created_address: None,
            });
        }

        let (code_address, bytecode, calldata) = if is_create {
            (to, message.data, Bytes::new())
        } else {
            let (code_address, bytecode) = self.load_code(to)?;
            (code_address, bytecode, message.data)
        };
        self.current_call_frame = CallFrame::new(
            message.caller,
            to,
            code_address,
            bytecode,
            message.value,
            calldata,
            false,
            message.gas,
            0,
            true,
            is_create,
        );

        if let Some(result) = self.start_frame()? {
            if let Some(report) = self.handle_return(result)? {
                return Ok(report);
            }
        }
        self.run_execution()
    }

    /// Main loop, until the top level frame returns.
    fn run_execution(&mut self) -> Result<ExecutionReport, VMError> {
        loop {
            let frame = &self.current_call_frame;
            let opcode = frame.current_opcode();
            let depth = frame.depth;
            let gas_before = frame.gas_remaining;
            self.tracer.op_start(&Step {
                pc: frame.pc,
                opcode,
                gas: gas_before,
                depth,
                stack: frame.stack.as_slice(),
                memory_size: frame.memory.len(),
                refund: self.substate.refunded_gas,
            });

            self.current_call_frame.next_opcode();
            let handler = self.config.opcodes[usize::from(opcode)];
            let op_result = handler.call(self);

            // a call that entered a child frame is charged on its parent
            let gas_after = if self.current_call_frame.depth == depth {
                self.current_call_frame.gas_remaining
            } else {
                self.call_frames
                    .last()
                    .map_or(gas_before, |parent| parent.gas_remaining)
            };
            self.tracer.gas_and_refund(
                gas_before.saturating_sub(gas_after),
                self.substate.refunded_gas,
            );

            let result = match op_result {
                Ok(OpcodeResult::Continue) => {
                    self.tracer.op_end();
                    continue;
                }
                Ok(OpcodeResult::Halt) => {
                    self.tracer.op_end();
                    self.handle_opcode_result()?
                }
                Err(error) => {
                    if error.should_propagate() {
                        return Err(error);
                    }
                    if error.is_revert_opcode() {
                        self.tracer.op_end();
                    } else {
                        self.tracer.op_exception(&error);
                    }
                    self.handle_opcode_error(error)
                }
            };

            if let Some(report) = self.handle_return(result)? {
                return Ok(report);
            }
        }
    }

    /// Makes `frame` the current frame, keeping the caller on the frame stack.
    pub(crate) fn push_frame(&mut self, frame: CallFrame) {
        let parent = std::mem::replace(&mut self.current_call_frame, frame);
        self.call_frames.push(parent);
    }

    /// Opens the state transaction of the current frame, moves its value and
    /// runs it when its target is a precompile.
    ///
    /// Returns the frame result when the frame already finished.
    pub(crate) fn start_frame(&mut self) -> Result<Option<ContextResult>, VMError> {
        self.db.begin_transaction();
        if !self.call_frames.is_empty() {
            self.substate_backups.push(self.substate.clone());
        }

        let eips = self.config.eips;
        let frame = &self.current_call_frame;
        let (to, sender, value) = (frame.to, frame.msg_sender, frame.msg_value);
        if frame.is_create {
            self.db.destroy_storage(to)?;
            self.db.mark_account_created(to);
            if eips.eip158 {
                self.db.increment_nonce(to)?;
            }
        }
        self.db.touch_account(to)?;
        if self.current_call_frame.should_transfer_value && !value.is_zero() {
            self.db.move_ether(sender, to, value)?;
        }

        let frame = &mut self.current_call_frame;
        if frame.is_create || !self.config.precompiles.contains(&frame.code_address) {
            return Ok(None);
        }

        let mut gas_remaining = frame.gas_remaining;
        self.tracer
            .precompile_start(frame.code_address, gas_remaining, &frame.calldata);
        let result = execute_precompile(
            frame.code_address,
            &frame.calldata,
            &mut gas_remaining,
            self.config,
            self.crypto,
        );
        let context = match result {
            Ok(output) => {
                frame.gas_remaining = gas_remaining;
                frame.output = output.clone();
                ContextResult {
                    result: TxResult::Success,
                    gas_used: frame.gas_used(),
                    output,
                }
            }
            Err(error) if error.should_propagate() => return Err(error),
            Err(error) => {
                frame.gas_remaining = 0;
                ContextResult {
                    result: TxResult::Revert(error),
                    gas_used: frame.gas_limit,
                    output: Bytes::new(),
                }
            }
        };
        self.tracer
            .precompile_end(context.gas_used, &context.output, context.is_success());
        Ok(Some(context))
    }

    /// Closes the current frame.
    ///
    /// The state changes of the frame are committed or rolled back. A child hands
    /// its result and unused gas to its parent and `None` is returned. The top
    /// level frame produces the execution report.
    pub(crate) fn handle_return(
        &mut self,
        result: ContextResult,
    ) -> Result<Option<ExecutionReport>, VMError> {
        let success = result.is_success();
        if success {
            self.db.commit_transaction()?;
        } else {
            self.db.rollback_transaction()?;
        }

        let Some(parent) = self.call_frames.pop() else {
            return self.top_level_report(result).map(Some);
        };
        let child = std::mem::replace(&mut self.current_call_frame, parent);
        let backup = self
            .substate_backups
            .pop()
            .ok_or(InternalError::CallFrame)?;

        let eip158 = self.config.eips.eip158;
        if success {
            if eip158 && self.db.account_exists_and_is_empty(&child.to)? {
                self.substate.touched_accounts.insert(child.to);
            }
        } else {
            let touched_ripemd = self
                .substate
                .touched_accounts
                .contains(&precompiles::RIPEMD_160_ADDRESS);
            self.substate = backup;
            // mainnet block 2675119 cleared an empty RIPEMD-160 account touched by a failed call
            if eip158
                && (touched_ripemd
                    || (child.to == precompiles::RIPEMD_160_ADDRESS
                        && self.db.account_exists_and_is_empty(&child.to)?))
            {
                self.substate
                    .touched_accounts
                    .insert(precompiles::RIPEMD_160_ADDRESS);
            }
        }

        let parent = &mut self.current_call_frame;
        parent.gas_remaining = parent.gas_remaining.saturating_add(child.gas_remaining);
        if child.is_create {
            if success {
                parent.stack.push(address_to_word(child.to))?;
                parent.sub_return_data = Bytes::new();
            } else {
                parent.stack.push(FAIL)?;
                parent.sub_return_data = result.output;
            }
        } else {
            let written = child.ret_size.min(result.output.len());
            if let Some(data) = result.output.get(..written) {
                parent.memory.store_data(child.ret_offset, data)?;
            }
            parent.stack.push(if success { SUCCESS } else { FAIL })?;
            parent.sub_return_data = result.output;
        }
        Ok(None)
    }

    fn top_level_report(&mut self, result: ContextResult) -> Result<ExecutionReport, VMError> {
        let frame = &self.current_call_frame;
        let success = result.is_success();
        if !success {
            return Ok(ExecutionReport {
                result: result.result,
                gas_used: frame.gas_used(),
                gas_refunded: 0,
                output: result.output,
                logs: Vec::new(),
                accounts_to_delete: BTreeSet::new(),
                touched_accounts: BTreeSet::new(),
                created_address: None,
            });
        }

        let mut touched_accounts = std::mem::take(&mut self.substate.touched_accounts);
        if self.config.eips.eip158
            && !frame.is_create
            && self.db.account_exists_and_is_empty(&frame.to)?
        {
            touched_accounts.insert(frame.to);
        }
        Ok(ExecutionReport {
            result: result.result,
            gas_used: frame.gas_used(),
            gas_refunded: u64::try_from(self.substate.refunded_gas).unwrap_or_default(),
            output: result.output,
            logs: std::mem::take(&mut self.substate.logs),
            accounts_to_delete: std::mem::take(&mut self.substate.selfdestruct_set),
            touched_accounts,
            created_address: frame.is_create.then_some(frame.to),
        })
    }

    /// Address and code a call to `address` runs, following a delegation
    /// designator. The delegate is warmed. A delegation to a precompile runs
    /// empty code.
    pub(crate) fn load_code(&mut self, address: Address) -> Result<(Address, Bytes), VMError> {
        let code = self.db.get_account(&address)?.code;
        let delegate = match delegated_address(&code) {
            Some(delegate) if self.config.eips.eip7702 => delegate,
            _ => return Ok((address, code)),
        };
        self.substate.add_accessed_address(delegate);
        if self.config.precompiles.contains(&delegate) {
            return Ok((address, Bytes::new()));
        }
        Ok((delegate, self.db.get_account(&delegate)?.code))
    }

    /// Extra access cost of calling an account that delegates its code.
    pub(crate) fn delegation_access_cost(&mut self, address: Address) -> Result<u64, VMError> {
        if !self.config.eips.eip7702 {
            return Ok(0);
        }
        match delegated_address(&self.db.get_account(&address)?.code) {
            Some(delegate) => Ok(self.account_access_cost(delegate, 0)),
            None => Ok(0),
        }
    }

    /// Access cost of an account read, warming the address.
    pub(crate) fn account_access_cost(&mut self, address: Address, base: u64) -> u64 {
        let is_cold = self.substate.add_accessed_address(address);
        self.config
            .gas
            .account_access_cost(base, is_cold, self.config.eips.eip2929)
    }
}
