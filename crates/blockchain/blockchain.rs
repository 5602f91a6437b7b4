//! # keel-blockchain
//!
//! The block level state transition: transaction validation and application,
//! miner rewards, withdrawals, the system calls around them and the requests
//! handed to the consensus layer, plus the header checks done before and after
//! executing a block.
//!
//! [`apply_body`] mutates a [`WorldState`] in place. [`execute_block`] wraps it
//! with the validation needed to accept or reject a block.

pub mod constants;
pub mod error;
mod system_contracts;
mod transaction;
pub mod validation;

use std::collections::BTreeMap;

use ethereum_types::{Address, Bloom, H256, U256};
use keel_common::types::{
    Block, BlockHeader, ChainConfig, EncodedRequests, Fork, Receipt, Transaction, Withdrawal,
    compute_receipts_root, compute_requests_hash, compute_transactions_root,
    compute_withdrawals_root, get_blob_base_fee,
};
use keel_crypto::{Crypto, CryptoError, NativeCrypto};
use keel_storage::WorldState;
use keel_vm::{Environment, ForkConfig, NoopTracer, Tracer, constants::BLOCKHASH_WINDOW};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use constants::{
    BYZANTIUM_BLOCK_REWARD, CONSTANTINOPLE_BLOCK_REWARD, FRONTIER_BLOCK_REWARD, WEI_PER_GWEI,
};
use error::{ChainError, InvalidBlockError, InvalidTransaction};
use system_contracts::{
    SystemCallContext, extract_all_requests, process_beacon_root, process_block_hash_history,
};
use transaction::{TransactionContext, process_transaction};
use validation::{
    validate_blob_gas_used, validate_block, validate_gas_used, validate_logs_bloom,
    validate_ommers, validate_receipts_root, validate_requests_hash, validate_state_root,
};

pub use transaction::TransactionOutcome;

/// Block context shared by every transaction of a body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockEnv {
    pub fork: Fork,
    pub chain_id: u64,
    /// Stored by the history contract from Prague on.
    pub parent_hash: H256,
    pub coinbase: Address,
    pub number: u64,
    pub timestamp: u64,
    pub gas_limit: u64,
    pub base_fee_per_gas: Option<u64>,
    pub difficulty: U256,
    /// Only set from the merge on.
    pub prev_randao: Option<H256>,
    pub excess_blob_gas: Option<u64>,
    pub parent_beacon_block_root: Option<H256>,
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// Hashes of recent ancestors, for BLOCKHASH.
    pub block_hashes: BTreeMap<u64, H256>,
    /// Reward for the miner, `None` when no rewards are paid.
    pub block_reward: Option<U256>,
}

/// Static reward of the block miner, `None` from the merge on.
pub fn block_reward(fork: Fork) -> Option<U256> {
    let ether = match fork {
        fork if fork >= Fork::Paris => return None,
        fork if fork >= Fork::Constantinople => CONSTANTINOPLE_BLOCK_REWARD,
        fork if fork >= Fork::Byzantium => BYZANTIUM_BLOCK_REWARD,
        _ => FRONTIER_BLOCK_REWARD,
    };
    Some(U256::from(ether) * U256::exp10(18))
}

impl BlockEnv {
    /// Context of the block with `header`, under `chain_config`.
    pub fn from_header(
        header: &BlockHeader,
        withdrawals: Option<Vec<Withdrawal>>,
        chain_config: &ChainConfig,
        block_hashes: BTreeMap<u64, H256>,
    ) -> Self {
        let fork = chain_config.fork(header.number, header.timestamp);
        Self {
            fork,
            chain_id: chain_config.chain_id,
            parent_hash: header.parent_hash,
            coinbase: header.coinbase,
            number: header.number,
            timestamp: header.timestamp,
            gas_limit: header.gas_limit,
            base_fee_per_gas: header.base_fee_per_gas,
            difficulty: header.difficulty,
            prev_randao: (fork >= Fork::Paris).then_some(header.prev_randao),
            excess_blob_gas: header.excess_blob_gas,
            parent_beacon_block_root: header.parent_beacon_block_root,
            withdrawals,
            block_hashes,
            block_reward: block_reward(fork),
        }
    }

    pub fn blob_base_fee(&self) -> U256 {
        get_blob_base_fee(self.excess_blob_gas.unwrap_or_default(), self.fork)
    }

    /// Interpreter context for a transaction sent by `origin` in this block.
    pub fn vm_environment(
        &self,
        origin: Address,
        gas_price: U256,
        tx_blob_hashes: Vec<H256>,
    ) -> Environment {
        Environment {
            origin,
            gas_price,
            coinbase: self.coinbase,
            block_number: self.number,
            timestamp: self.timestamp,
            block_gas_limit: self.gas_limit,
            difficulty: self.difficulty,
            prev_randao: self.prev_randao,
            chain_id: self.chain_id,
            base_fee_per_gas: U256::from(self.base_fee_per_gas.unwrap_or_default()),
            blob_base_fee: self.blob_base_fee(),
            tx_blob_hashes,
            block_hashes: self.block_hashes.clone(),
        }
    }
}

/// A transaction left out of the body, with the reason.
#[derive(Debug, PartialEq, Eq)]
pub struct RejectedTransaction {
    pub index: usize,
    pub error: InvalidTransaction,
}

/// Everything derived from applying a block body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyExecutionResult {
    pub gas_used: u64,
    pub blob_gas_used: u64,
    pub receipts: Vec<Receipt>,
    pub receipts_root: H256,
    /// Root of the transactions that were applied.
    pub transactions_root: H256,
    pub logs_bloom: Bloom,
    pub withdrawals_root: Option<H256>,
    /// Requests for the consensus layer, from Prague on.
    pub requests: Vec<EncodedRequests>,
    pub requests_hash: Option<H256>,
    /// One entry per applied transaction, in the same order as `receipts`.
    pub transactions: Vec<TransactionOutcome>,
}

/// Applies a block body to `state`, failing on the first invalid transaction.
///
/// On success `state` holds the post state of the block.
pub fn apply_body(
    state: &mut WorldState,
    env: &BlockEnv,
    transactions: &[Transaction],
    ommers: &[BlockHeader],
    crypto: &dyn Crypto,
    tracer: &mut dyn Tracer,
) -> Result<BodyExecutionResult, ChainError> {
    let (result, _) = run_body(state, env, transactions, ommers, crypto, tracer, false)?;
    Ok(result)
}

/// Like [`apply_body`], but invalid transactions are skipped and reported instead
/// of failing the body.
pub fn apply_body_skipping_invalid(
    state: &mut WorldState,
    env: &BlockEnv,
    transactions: &[Transaction],
    ommers: &[BlockHeader],
    crypto: &dyn Crypto,
    tracer: &mut dyn Tracer,
) -> Result<(BodyExecutionResult, Vec<RejectedTransaction>), ChainError> {
    run_body(state, env, transactions, ommers, crypto, tracer, true)
}

fn run_body(
    state: &mut WorldState,
    env: &BlockEnv,
    transactions: &[Transaction],
    ommers: &[BlockHeader],
    crypto: &dyn Crypto,
    tracer: &mut dyn Tracer,
    skip_invalid: bool,
) -> Result<(BodyExecutionResult, Vec<RejectedTransaction>), ChainError> {
    let config = ForkConfig::new(env.fork);
    debug!(
        number = env.number,
        fork = %env.fork,
        transactions = transactions.len(),
        "Applying block body"
    );

    let system = SystemCallContext {
        env,
        config: &config,
        crypto,
    };
    if config.eips.eip4788 {
        if let Some(root) = env.parent_beacon_block_root {
            process_beacon_root(state, &system, tracer, root)?;
        }
    }
    if config.eips.eip2935 {
        process_block_hash_history(state, &system, tracer)?;
    }

    // signatures are independent of each other, only their application is sequential
    let senders: Vec<Result<Address, CryptoError>> = transactions
        .par_iter()
        .map(|tx| tx.sender(crypto))
        .collect();

    let max_blob_gas = env.fork.blob_schedule().max_blob_gas();
    let mut result = BodyExecutionResult::default();
    let mut rejected = Vec::new();
    let mut applied = Vec::new();
    for (index, (tx, sender)) in transactions.iter().zip(senders).enumerate() {
        let outcome = sender
            .map_err(|error| ChainError::from(InvalidTransaction::InvalidSignature(error)))
            .and_then(|sender| {
                let ctx = TransactionContext {
                    env,
                    config: &config,
                    crypto,
                    gas_available: env.gas_limit.saturating_sub(result.gas_used),
                    blob_gas_available: max_blob_gas.saturating_sub(result.blob_gas_used),
                    cumulative_gas_used: result.gas_used,
                };
                process_transaction(state, &ctx, tracer, index, tx, sender)
            });
        match outcome {
            Ok(outcome) => {
                result.gas_used += outcome.gas_used;
                result.blob_gas_used += outcome.blob_gas_used;
                result.logs_bloom.accrue_bloom(&outcome.receipt.bloom);
                result.receipts.push(outcome.receipt.clone());
                result.transactions.push(outcome);
                applied.push(tx.clone());
            }
            Err(ChainError::InvalidTransaction(error)) if skip_invalid => {
                warn!(index, "Skipping invalid transaction: {error}");
                rejected.push(RejectedTransaction { index, error });
            }
            Err(ChainError::InvalidTransaction(error)) => {
                return Err(InvalidBlockError::InvalidTransaction(index, error).into());
            }
            Err(error) => return Err(error),
        }
    }

    if let Some(reward) = env.block_reward {
        pay_rewards(state, env, ommers, reward)?;
    }

    if let Some(withdrawals) = &env.withdrawals {
        apply_withdrawals(state, withdrawals)?;
        result.withdrawals_root = Some(compute_withdrawals_root(withdrawals));
    }

    if config.eips.eip7685 {
        result.requests = extract_all_requests(state, &system, tracer, &result.receipts)?;
        result.requests_hash = Some(compute_requests_hash(&result.requests));
    }

    result.receipts_root = compute_receipts_root(&result.receipts);
    result.transactions_root = compute_transactions_root(&applied);
    info!(
        number = env.number,
        gas_used = result.gas_used,
        applied = result.transactions.len(),
        rejected = rejected.len(),
        "Applied block body"
    );
    Ok((result, rejected))
}

pub(crate) fn add_balance(
    state: &mut WorldState,
    address: Address,
    amount: U256,
) -> Result<(), ChainError> {
    let balance = state.get_account(&address)?.balance;
    state.set_balance(address, balance.saturating_add(amount))?;
    Ok(())
}

/// Pays the block reward to the miner and to the miners of the included ommers.
pub fn pay_rewards(
    state: &mut WorldState,
    env: &BlockEnv,
    ommers: &[BlockHeader],
    block_reward: U256,
) -> Result<(), ChainError> {
    let inclusion_reward = U256::from(ommers.len()).saturating_mul(block_reward / 32);
    let miner_reward = block_reward.saturating_add(inclusion_reward);
    add_balance(state, env.coinbase, miner_reward)?;
    for ommer in ommers {
        let ommer_age = env.number.saturating_sub(ommer.number);
        let ommer_reward = U256::from(8u64.saturating_sub(ommer_age)).saturating_mul(block_reward) / 8;
        add_balance(state, ommer.coinbase, ommer_reward)?;
    }
    Ok(())
}

/// Credits withdrawals (EIP-4895). Amounts are in gwei.
pub fn apply_withdrawals(
    state: &mut WorldState,
    withdrawals: &[Withdrawal],
) -> Result<(), ChainError> {
    for withdrawal in withdrawals {
        let amount = U256::from(withdrawal.amount) * U256::from(WEI_PER_GWEI);
        add_balance(state, withdrawal.address, amount)?;
        if state.account_exists_and_is_empty(&withdrawal.address)? {
            state.destroy_account(withdrawal.address)?;
        }
    }
    Ok(())
}

/// Validates `block` against its ancestors, applies it on top of `state` and checks
/// the results against the header.
///
/// `ancestors` are the canonical blocks before `block`, oldest first and ending
/// with its parent. `state` must hold the post state of the parent. On error it may
/// be left partially updated.
pub fn execute_block(
    state: &mut WorldState,
    ancestors: &[Block],
    block: &Block,
    chain_config: &ChainConfig,
) -> Result<BodyExecutionResult, ChainError> {
    let parent = ancestors.last().ok_or(InvalidBlockError::MissingParent)?;
    validate_block(block, &parent.header, chain_config)?;
    validate_ommers(block, ancestors, chain_config)?;

    let block_hashes = ancestors
        .iter()
        .rev()
        .take(BLOCKHASH_WINDOW as usize)
        .map(|ancestor| (ancestor.header.number, ancestor.hash()))
        .collect();
    let env = BlockEnv::from_header(
        &block.header,
        block.body.withdrawals.clone(),
        chain_config,
        block_hashes,
    );
    let result = apply_body(
        state,
        &env,
        &block.body.transactions,
        &block.body.ommers,
        &NativeCrypto,
        &mut NoopTracer,
    )?;

    validate_gas_used(result.gas_used, &block.header)?;
    validate_receipts_root(&block.header, &result.receipts)?;
    validate_logs_bloom(&result.logs_bloom, &block.header)?;
    validate_blob_gas_used(result.blob_gas_used, &block.header)?;
    validate_requests_hash(&block.header, result.requests_hash)?;
    validate_state_root(&block.header, state.state_root()?)?;

    info!(
        number = block.header.number,
        gas_used = result.gas_used,
        "Executed block {:#x}",
        block.hash()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewards_shrink_across_forks() {
        let ether = U256::exp10(18);
        assert_eq!(block_reward(Fork::Frontier), Some(ether * 5));
        assert_eq!(block_reward(Fork::SpuriousDragon), Some(ether * 5));
        assert_eq!(block_reward(Fork::Byzantium), Some(ether * 3));
        assert_eq!(block_reward(Fork::Petersburg), Some(ether * 2));
        assert_eq!(block_reward(Fork::London), Some(ether * 2));
        assert_eq!(block_reward(Fork::Paris), None);
    }

    #[test]
    fn ommer_rewards() {
        let mut state = WorldState::new(Box::new(keel_storage::InMemoryBackend::new()));
        let env = BlockEnv {
            number: 10,
            coinbase: Address::repeat_byte(1),
            ..Default::default()
        };
        let ommer = BlockHeader {
            number: 9,
            coinbase: Address::repeat_byte(2),
            ..Default::default()
        };
        let reward = U256::from(32_000);
        pay_rewards(&mut state, &env, &[ommer], reward).unwrap();
        assert_eq!(
            state.get_account(&env.coinbase).unwrap().balance,
            U256::from(33_000)
        );
        assert_eq!(
            state.get_account(&Address::repeat_byte(2)).unwrap().balance,
            U256::from(28_000)
        );
    }

    #[test]
    fn zero_withdrawal_leaves_no_account() {
        let mut state = WorldState::new(Box::new(keel_storage::InMemoryBackend::new()));
        let withdrawals = [
            Withdrawal {
                address: Address::repeat_byte(3),
                amount: 2,
                ..Default::default()
            },
            Withdrawal {
                index: 1,
                address: Address::repeat_byte(4),
                amount: 0,
                ..Default::default()
            },
        ];
        apply_withdrawals(&mut state, &withdrawals).unwrap();
        assert_eq!(
            state.get_account(&Address::repeat_byte(3)).unwrap().balance,
            U256::from(2_000_000_000u64)
        );
        assert!(!state.account_exists(&Address::repeat_byte(4)).unwrap());
    }
}
