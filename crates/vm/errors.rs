use std::collections::BTreeSet;

use bytes::Bytes;
use ethereum_types::Address;
use keel_common::types::Log;
use keel_storage::StoreError;
use thiserror::Error;

/// Errors that stop the current frame.
///
/// `RevertOpcode` and `ExceptionalHalt` end the frame and are reported to its
/// parent. `Internal` aborts the whole execution.
#[derive(Debug, Error)]
pub enum VMError {
    #[error("Revert opcode")]
    RevertOpcode,
    #[error("Exceptional halt: {0}")]
    ExceptionalHalt(#[from] ExceptionalHalt),
    #[error("Internal error: {0}")]
    Internal(#[from] InternalError),
}

impl VMError {
    /// Whether the error has to abort execution instead of ending the frame.
    pub fn should_propagate(&self) -> bool {
        matches!(self, VMError::Internal(_))
    }

    pub fn is_revert_opcode(&self) -> bool {
        matches!(self, VMError::RevertOpcode)
    }
}

impl From<StoreError> for VMError {
    fn from(error: StoreError) -> Self {
        VMError::Internal(InternalError::Store(error))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExceptionalHalt {
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Out of gas")]
    OutOfGas,
    #[error("Invalid opcode")]
    InvalidOpcode,
    #[error("Invalid jump destination")]
    InvalidJumpDest,
    #[error("Call depth limit reached")]
    StackDepthLimit,
    #[error("State modification in static context")]
    WriteInStaticContext,
    #[error("Read out of bounds of the return data buffer")]
    OutOfBoundsRead,
    #[error("Contract code starts with 0xEF")]
    InvalidContractPrefix,
    #[error("Contract address already in use")]
    AddressCollision,
    #[error("Contract code exceeds the maximum size")]
    ContractSizeExceeded,
    #[error("Precompile execution failed")]
    PrecompileFailure,
}

#[derive(Debug, Error)]
pub enum InternalError {
    #[error("Arithmetic overflow")]
    Overflow,
    #[error("Arithmetic underflow")]
    Underflow,
    #[error("Type conversion failed")]
    TypeConversion,
    #[error("No call frame to return to")]
    CallFrame,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Custom(String),
}

/// Outcome of a single opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeResult {
    Continue,
    Halt,
}

#[derive(Debug)]
pub enum TxResult {
    Success,
    Revert(VMError),
}

impl TxResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TxResult::Success)
    }
}

/// Result of a frame, handed back to its parent.
#[derive(Debug)]
pub struct ContextResult {
    pub result: TxResult,
    pub gas_used: u64,
    pub output: Bytes,
}

impl ContextResult {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

/// Result of running a top level message.
#[derive(Debug)]
pub struct ExecutionReport {
    pub result: TxResult,
    /// Gas used out of the message gas, before refunds.
    pub gas_used: u64,
    /// Refund counter at the end of execution, zero on failure.
    pub gas_refunded: u64,
    pub output: Bytes,
    pub logs: Vec<Log>,
    /// Accounts that self-destructed and are deleted when the transaction ends.
    pub accounts_to_delete: BTreeSet<Address>,
    /// Touched accounts, pruned when empty from Spurious Dragon on.
    pub touched_accounts: BTreeSet<Address>,
    pub created_address: Option<Address>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}
