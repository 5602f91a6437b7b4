//! Calls made by the system address around the transactions of a block.
//!
//! EIP-4788 and EIP-2935 run before the first transaction and their outcome is
//! ignored. EIP-7002 and EIP-7251 run at the end of the block, and an empty or
//! failing predeploy makes the block invalid.

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use keel_common::{
    constants::{
        BEACON_ROOTS_ADDRESS, CONSOLIDATION_REQUEST_PREDEPLOY_ADDRESS, HISTORY_STORAGE_ADDRESS,
        SYSTEM_ADDRESS, SYSTEM_CALL_GAS_LIMIT, WITHDRAWAL_REQUEST_PREDEPLOY_ADDRESS,
    },
    types::{EncodedRequests, Receipt, RequestType, TxKind, deposit_requests},
};
use keel_crypto::Crypto;
use keel_storage::WorldState;
use keel_vm::{ExecutionReport, ForkConfig, Message, Tracer, VM};
use tracing::debug;

use crate::{
    BlockEnv,
    error::{ChainError, InvalidBlockError},
};

/// Inputs shared by every system call of a block.
pub(crate) struct SystemCallContext<'a> {
    pub env: &'a BlockEnv,
    pub config: &'a ForkConfig,
    pub crypto: &'a dyn Crypto,
}

/// Runs `data` against `contract` from the system address, outside any gas
/// accounting. The call sees the block base fee as its gas price.
fn system_call(
    state: &mut WorldState,
    ctx: &SystemCallContext<'_>,
    tracer: &mut dyn Tracer,
    contract: Address,
    data: Bytes,
) -> Result<ExecutionReport, ChainError> {
    let message = Message {
        caller: SYSTEM_ADDRESS,
        target: TxKind::Call(contract),
        current_target: contract,
        data,
        gas: SYSTEM_CALL_GAS_LIMIT,
        ..Default::default()
    };
    let gas_price = U256::from(ctx.env.base_fee_per_gas.unwrap_or_default());
    let vm_env = ctx.env.vm_environment(SYSTEM_ADDRESS, gas_price, Vec::new());

    state.begin_transaction();
    let execution = VM::new(vm_env, state, ctx.config, ctx.crypto, tracer).execute(message);
    let report = match execution {
        Ok(report) => report,
        Err(error) => {
            state.rollback_transaction()?;
            return Err(error.into());
        }
    };
    state.destroy_touched_empty_accounts(&report.touched_accounts)?;
    state.commit_transaction()?;
    Ok(report)
}

/// Like [`system_call`], for the request predeploys whose failure invalidates the block.
fn checked_system_call(
    state: &mut WorldState,
    ctx: &SystemCallContext<'_>,
    tracer: &mut dyn Tracer,
    contract: Address,
) -> Result<Bytes, ChainError> {
    if !state.get_account(&contract)?.has_code() {
        return Err(InvalidBlockError::SystemContractEmpty(contract).into());
    }
    let report = system_call(state, ctx, tracer, contract, Bytes::new())?;
    if !report.is_success() {
        return Err(InvalidBlockError::SystemCallFailed(contract).into());
    }
    Ok(report.output)
}

/// Stores the parent beacon block root (EIP-4788).
pub(crate) fn process_beacon_root(
    state: &mut WorldState,
    ctx: &SystemCallContext<'_>,
    tracer: &mut dyn Tracer,
    parent_beacon_block_root: H256,
) -> Result<(), ChainError> {
    let data = Bytes::copy_from_slice(parent_beacon_block_root.as_bytes());
    let report = system_call(state, ctx, tracer, BEACON_ROOTS_ADDRESS, data)?;
    debug!(
        success = report.is_success(),
        "Stored parent beacon block root {parent_beacon_block_root:#x}"
    );
    Ok(())
}

/// Stores the parent hash in the history contract (EIP-2935).
pub(crate) fn process_block_hash_history(
    state: &mut WorldState,
    ctx: &SystemCallContext<'_>,
    tracer: &mut dyn Tracer,
) -> Result<(), ChainError> {
    let parent_hash = ctx.env.parent_hash;
    let data = Bytes::copy_from_slice(parent_hash.as_bytes());
    let report = system_call(state, ctx, tracer, HISTORY_STORAGE_ADDRESS, data)?;
    debug!(
        success = report.is_success(),
        "Stored parent hash {parent_hash:#x}"
    );
    Ok(())
}

/// Deposit, withdrawal and consolidation requests of the block (EIP-7685), in
/// request type order. Withdrawals and consolidations are dequeued from their
/// predeploys.
pub(crate) fn extract_all_requests(
    state: &mut WorldState,
    ctx: &SystemCallContext<'_>,
    tracer: &mut dyn Tracer,
    receipts: &[Receipt],
) -> Result<Vec<EncodedRequests>, ChainError> {
    let deposits = deposit_requests(receipts).map_err(InvalidBlockError::from)?;
    let withdrawals =
        checked_system_call(state, ctx, tracer, WITHDRAWAL_REQUEST_PREDEPLOY_ADDRESS)?;
    let consolidations =
        checked_system_call(state, ctx, tracer, CONSOLIDATION_REQUEST_PREDEPLOY_ADDRESS)?;
    Ok(vec![
        EncodedRequests::new(RequestType::Deposit, &deposits),
        EncodedRequests::new(RequestType::Withdrawal, &withdrawals),
        EncodedRequests::new(RequestType::Consolidation, &consolidations),
    ])
}
