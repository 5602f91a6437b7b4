use std::collections::HashSet;

use ethereum_types::{Address, H256, U256};
use keel_common::{
    types::{Fork, Receipt, Transaction, TxKind},
    utils::{delegated_address, delegation_code},
};
use keel_crypto::Crypto;
use keel_storage::WorldState;
use keel_vm::{
    ExecutionReport, ForkConfig, Message, Tracer, TxResult, VM,
    constants::AUTHORIZATION_EXISTING_ACCOUNT_REFUND,
};
use tracing::debug;

use crate::{
    BlockEnv, add_balance,
    error::{ChainError, InvalidTransaction},
    validation::{blob_gas_used, created_address, validate_transaction},
};

/// What a single applied transaction produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    /// Position in the list handed to the block executor.
    pub index: usize,
    pub hash: H256,
    pub sender: Address,
    /// Gas charged to the sender, after refunds.
    pub gas_used: u64,
    pub blob_gas_used: u64,
    /// Address derived for a creation, whether or not the deployment succeeded.
    pub contract_address: Option<Address>,
    /// Why execution failed, for reverted and halted transactions.
    pub error: Option<String>,
    pub receipt: Receipt,
}

/// Block wide inputs of a transaction besides the transaction itself.
pub(crate) struct TransactionContext<'a> {
    pub env: &'a BlockEnv,
    pub config: &'a ForkConfig,
    pub crypto: &'a dyn Crypto,
    pub gas_available: u64,
    pub blob_gas_available: u64,
    pub cumulative_gas_used: u64,
}

/// Addresses and slots warm before the first opcode (EIP-2929, EIP-2930, EIP-3651).
fn initial_access_sets(
    tx: &Transaction,
    sender: Address,
    target: Address,
    env: &BlockEnv,
    config: &ForkConfig,
) -> (HashSet<Address>, HashSet<(Address, H256)>) {
    let mut addresses = HashSet::new();
    let mut slots = HashSet::new();
    if !config.eips.eip2929 {
        return (addresses, slots);
    }
    addresses.insert(sender);
    addresses.insert(target);
    addresses.extend(config.precompiles.addresses());
    if config.eips.eip3651 {
        addresses.insert(env.coinbase);
    }
    for (address, keys) in tx.access_list() {
        addresses.insert(*address);
        slots.extend(keys.iter().map(|key| (*address, *key)));
    }
    (addresses, slots)
}

/// Applies the authorizations of a set code transaction (EIP-7702). Authorizations
/// that don't apply are skipped. Recovered authorities are added to `warm`.
///
/// Returns the refund owed for authorities that already existed.
fn set_delegation(
    state: &mut WorldState,
    ctx: &TransactionContext<'_>,
    tx: &Transaction,
    warm: &mut HashSet<Address>,
) -> Result<u64, ChainError> {
    let Some(authorizations) = tx.authorization_list() else {
        return Ok(0);
    };
    let chain_id = U256::from(ctx.env.chain_id);
    let mut refund = 0u64;
    for authorization in authorizations {
        if !authorization.chain_id.is_zero() && authorization.chain_id != chain_id {
            continue;
        }
        if authorization.nonce == u64::MAX {
            continue;
        }
        let Some(authority) = authorization.authority(ctx.crypto) else {
            continue;
        };
        warm.insert(authority);

        let account = state.get_account(&authority)?;
        if account.has_code() && delegated_address(&account.code).is_none() {
            continue;
        }
        if account.nonce != authorization.nonce {
            continue;
        }
        if state.account_exists(&authority)? {
            refund = refund.saturating_add(AUTHORIZATION_EXISTING_ACCOUNT_REFUND);
        }
        state.set_code(authority, delegation_code(authorization.address))?;
        state.increment_nonce(authority)?;
        debug!(
            "Authority {authority:#x} delegates to {:#x}",
            authorization.address
        );
    }
    Ok(refund)
}

/// Validates and applies `tx`, leaving no transaction open on `state`.
///
/// Invalid transactions fail with [`ChainError::InvalidTransaction`] before any
/// state is written.
pub(crate) fn process_transaction(
    state: &mut WorldState,
    ctx: &TransactionContext<'_>,
    tracer: &mut dyn Tracer,
    index: usize,
    tx: &Transaction,
    sender: Address,
) -> Result<TransactionOutcome, ChainError> {
    let env = ctx.env;
    let config = ctx.config;
    let (intrinsic_gas, floor_gas) = validate_transaction(
        state,
        env,
        config,
        tx,
        sender,
        ctx.gas_available,
        ctx.blob_gas_available,
    )?;

    let effective_gas_price = tx
        .effective_gas_price(env.base_fee_per_gas)
        .ok_or(InvalidTransaction::MaxFeeBelowBaseFee)?;
    let blob_gas_used = blob_gas_used(tx);
    let upfront_cost = U256::from(tx.gas_limit())
        .checked_mul(effective_gas_price)
        .zip(U256::from(blob_gas_used).checked_mul(env.blob_base_fee()))
        .and_then(|(gas_fee, blob_fee)| gas_fee.checked_add(blob_fee));
    let hash = tx.hash();

    state.begin_transaction();
    let balance = state.get_account(&sender)?.balance;
    let Some(remaining) = upfront_cost.and_then(|cost| balance.checked_sub(cost)) else {
        state.rollback_transaction()?;
        return Err(InvalidTransaction::InsufficientAccountFunds {
            sender,
            balance,
            required: upfront_cost.unwrap_or(U256::MAX),
        }
        .into());
    };
    state.set_balance(sender, remaining)?;
    state.increment_nonce(sender)?;

    let contract_address = created_address(tx, sender);
    let target = match tx.to() {
        TxKind::Call(address) => address,
        TxKind::Create => contract_address.unwrap_or_default(),
    };
    let (mut accessed_addresses, accessed_storage_keys) =
        initial_access_sets(tx, sender, target, env, config);
    // delegations stay in place even when execution reverts
    let authorization_refund = match set_delegation(state, ctx, tx, &mut accessed_addresses) {
        Ok(refund) => refund,
        Err(error) => {
            state.rollback_transaction()?;
            return Err(error);
        }
    };
    let message = Message {
        caller: sender,
        target: tx.to(),
        current_target: target,
        value: tx.value(),
        data: tx.data().clone(),
        gas: tx.gas_limit() - intrinsic_gas,
        accessed_addresses,
        accessed_storage_keys,
    };

    tracer.transaction_start(index, hash);
    let vm_env = env.vm_environment(
        sender,
        effective_gas_price,
        tx.blob_versioned_hashes().to_vec(),
    );
    let execution = VM::new(vm_env, state, config, ctx.crypto, tracer).execute(message);
    let report = match execution {
        Ok(report) => report,
        Err(error) => {
            state.rollback_transaction()?;
            return Err(error.into());
        }
    };

    let gas_used = settle_gas(
        state,
        ctx,
        tx,
        sender,
        GasCharges {
            intrinsic: intrinsic_gas,
            floor: floor_gas,
            authorization_refund,
        },
        effective_gas_price,
        &report,
    )?;

    for address in &report.accounts_to_delete {
        state.destroy_account(*address)?;
    }
    if config.eips.eip158 {
        state.destroy_touched_empty_accounts(&report.touched_accounts)?;
    }
    state.commit_transaction()?;

    let error = match &report.result {
        TxResult::Success => None,
        TxResult::Revert(error) => Some(error),
    };
    tracer.transaction_end(gas_used, &report.output, error);
    let error = error.map(ToString::to_string);

    let cumulative_gas_used = ctx.cumulative_gas_used + gas_used;
    let mut receipt = Receipt::new(
        tx.tx_type(),
        report.is_success(),
        cumulative_gas_used,
        report.logs,
    );
    if config.fork < Fork::Byzantium {
        receipt = receipt.with_post_state(state.state_root()?);
    }

    debug!(
        index,
        gas_used,
        success = receipt.succeeded,
        "Applied transaction {hash:#x}"
    );
    Ok(TransactionOutcome {
        index,
        hash,
        sender,
        gas_used,
        blob_gas_used,
        contract_address,
        error,
        receipt,
    })
}

/// Gas a transaction owes besides what execution reports.
struct GasCharges {
    intrinsic: u64,
    /// Calldata floor (EIP-7623), zero before Prague.
    floor: u64,
    authorization_refund: u64,
}

/// Applies the refund, returns unused gas to the sender and pays the coinbase.
/// Returns the gas charged for the transaction.
fn settle_gas(
    state: &mut WorldState,
    ctx: &TransactionContext<'_>,
    tx: &Transaction,
    sender: Address,
    charges: GasCharges,
    effective_gas_price: U256,
    report: &ExecutionReport,
) -> Result<u64, ChainError> {
    let config = ctx.config;
    let gas_used_before_refund = charges.intrinsic.saturating_add(report.gas_used);
    let refund = report
        .gas_refunded
        .saturating_add(charges.authorization_refund)
        .min(gas_used_before_refund / config.gas.refund_quotient);
    let gas_used = (gas_used_before_refund - refund).max(charges.floor);
    let gas_left = tx.gas_limit().saturating_sub(gas_used);
    // both products are bounded by the upfront cost already taken from the sender
    add_balance(
        state,
        sender,
        U256::from(gas_left).saturating_mul(effective_gas_price),
    )?;

    let priority_fee_per_gas = if config.eips.eip1559 {
        let base_fee = U256::from(ctx.env.base_fee_per_gas.unwrap_or_default());
        effective_gas_price.saturating_sub(base_fee)
    } else {
        effective_gas_price
    };
    let coinbase_fee = U256::from(gas_used).saturating_mul(priority_fee_per_gas);
    let coinbase = ctx.env.coinbase;
    if !coinbase_fee.is_zero() || !config.eips.eip158 {
        add_balance(state, coinbase, coinbase_fee)?;
    } else if state.account_exists_and_is_empty(&coinbase)? {
        state.destroy_account(coinbase)?;
    }
    Ok(gas_used)
}
