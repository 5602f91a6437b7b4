//! Checks run before a transaction or a block is executed, and the header
//! comparisons run after.

use std::collections::{HashMap, HashSet};

use ethereum_types::{Address, Bloom, H256, U256};
use keel_common::{
    constants::{
        DEFAULT_OMMERS_HASH, ELASTICITY_MULTIPLIER, GAS_LIMIT_ADJUSTMENT_FACTOR,
        GAS_LIMIT_MINIMUM, GAS_PER_BLOB, INITIAL_BASE_FEE, MAX_BLOBS_PER_TX,
        MAX_EXTRA_DATA_SIZE, TX_MAX_GAS_LIMIT,
    },
    types::{
        Block, BlockHeader, ChainConfig, Fork, Receipt, Transaction, TxKind, TxType,
        calc_excess_blob_gas, calculate_base_fee_per_gas, compute_ommers_hash,
        compute_receipts_root, compute_transactions_root, compute_withdrawals_root,
    },
    utils::delegated_address,
};
use keel_crypto::{CryptoError, kzg::VERSIONED_HASH_VERSION_KZG};
use keel_storage::WorldState;
use keel_vm::{
    ForkConfig,
    constants::INIT_CODE_MAX_SIZE,
    gas_cost::{ACCESS_LIST_ADDRESS_COST, ACCESS_LIST_STORAGE_KEY_COST, INIT_CODE_WORD_COST},
};

use crate::{
    BlockEnv,
    constants::{MAX_OMMER_DEPTH, MAX_OMMERS},
    error::{
        ChainError, InvalidBlockError, InvalidBlockHeaderError, InvalidOmmerError,
        InvalidTransaction,
    },
};

fn calldata_bytes(data: &[u8]) -> (u64, u64) {
    let zero_bytes = data.iter().filter(|byte| **byte == 0).count() as u64;
    (zero_bytes, data.len() as u64 - zero_bytes)
}

/// Gas charged before the first opcode runs.
pub fn intrinsic_gas(tx: &Transaction, config: &ForkConfig) -> u64 {
    let schedule = config.gas;
    let data = tx.data();
    let (zero_bytes, non_zero_bytes) = calldata_bytes(data);
    let mut gas = schedule
        .tx_base
        .saturating_add(zero_bytes.saturating_mul(schedule.tx_data_zero))
        .saturating_add(non_zero_bytes.saturating_mul(schedule.tx_data_nonzero));

    if tx.is_contract_creation() {
        gas = gas.saturating_add(schedule.tx_create);
        if config.eips.eip3860 {
            let words = (data.len() as u64).div_ceil(32);
            gas = gas.saturating_add(words.saturating_mul(INIT_CODE_WORD_COST));
        }
    }

    for (_, keys) in tx.access_list() {
        gas = gas
            .saturating_add(ACCESS_LIST_ADDRESS_COST)
            .saturating_add((keys.len() as u64).saturating_mul(ACCESS_LIST_STORAGE_KEY_COST));
    }

    let authorizations = tx.authorization_list().map_or(0, <[_]>::len) as u64;
    gas.saturating_add(authorizations.saturating_mul(schedule.tx_authorization))
}

/// Least gas a transaction is charged for its calldata (EIP-7623), zero
/// before Prague. A zero byte is one token, any other byte four.
pub fn calldata_floor_gas(tx: &Transaction, config: &ForkConfig) -> u64 {
    if !config.eips.eip7623 {
        return 0;
    }
    let (zero_bytes, non_zero_bytes) = calldata_bytes(tx.data());
    let tokens = zero_bytes.saturating_add(non_zero_bytes.saturating_mul(4));
    config
        .gas
        .tx_base
        .saturating_add(tokens.saturating_mul(config.gas.tx_data_floor_token))
}

/// Blob gas consumed by a transaction.
pub fn blob_gas_used(tx: &Transaction) -> u64 {
    GAS_PER_BLOB * tx.blob_versioned_hashes().len() as u64
}

fn tx_type_supported(tx_type: TxType, config: &ForkConfig) -> bool {
    match tx_type {
        TxType::Legacy => true,
        TxType::EIP2930 => config.eips.eip2930,
        TxType::EIP1559 => config.eips.eip1559,
        TxType::EIP4844 => config.eips.eip4844,
        TxType::EIP7702 => config.eips.eip7702,
    }
}

/// Most the sender may have to pay: the whole gas limit at the max fee, the value and
/// the blob gas at its max fee. `None` when that does not fit in 256 bits.
fn max_cost(tx: &Transaction) -> Option<U256> {
    let gas_price = tx.max_fee_per_gas().unwrap_or_else(|| tx.gas_price());
    let blob_cost = match tx.max_fee_per_blob_gas() {
        Some(max_fee) => U256::from(blob_gas_used(tx)).checked_mul(max_fee)?,
        None => U256::zero(),
    };
    U256::from(tx.gas_limit())
        .checked_mul(gas_price)?
        .checked_add(tx.value())?
        .checked_add(blob_cost)
}

/// Validates `tx` against the current state and block, returning its intrinsic gas
/// and its calldata floor.
///
/// Only reads state. `gas_available` and `blob_gas_available` are what is left in
/// the block after the transactions already applied.
pub fn validate_transaction(
    state: &WorldState,
    env: &BlockEnv,
    config: &ForkConfig,
    tx: &Transaction,
    sender: Address,
    gas_available: u64,
    blob_gas_available: u64,
) -> Result<(u64, u64), ChainError> {
    if !tx_type_supported(tx.tx_type(), config) {
        return Err(InvalidTransaction::UnsupportedTxType(tx.tx_type()).into());
    }

    match (tx.tx_type(), tx.chain_id()) {
        // a legacy replay protected signature only exists from Spurious Dragon on
        (TxType::Legacy, Some(_)) if !config.eips.eip155 => {
            return Err(
                InvalidTransaction::InvalidSignature(CryptoError::InvalidRecoveryId).into(),
            );
        }
        (_, Some(chain_id)) if chain_id != env.chain_id => {
            return Err(InvalidTransaction::ChainIdMismatch {
                expected: env.chain_id,
                actual: chain_id,
            }
            .into());
        }
        _ => {}
    }

    let intrinsic = intrinsic_gas(tx, config);
    let floor = calldata_floor_gas(tx, config);
    if intrinsic.max(floor) > tx.gas_limit() {
        return Err(InvalidTransaction::IntrinsicGasTooLow {
            intrinsic: intrinsic.max(floor),
            gas_limit: tx.gas_limit(),
        }
        .into());
    }

    if config.eips.eip7825 && tx.gas_limit() > TX_MAX_GAS_LIMIT {
        return Err(InvalidTransaction::GasLimitAboveCap(tx.gas_limit()).into());
    }

    if tx.nonce() == u64::MAX {
        return Err(InvalidTransaction::NonceIsMax.into());
    }

    if config.eips.eip3860 && tx.is_contract_creation() && tx.data().len() > INIT_CODE_MAX_SIZE
    {
        return Err(InvalidTransaction::InitCodeTooLarge(tx.data().len()).into());
    }

    if tx.gas_limit() > gas_available {
        return Err(InvalidTransaction::GasAllowanceExceeded {
            gas_limit: tx.gas_limit(),
            available: gas_available,
        }
        .into());
    }

    let base_fee = U256::from(env.base_fee_per_gas.unwrap_or_default());
    match (tx.max_fee_per_gas(), tx.max_priority_fee()) {
        (Some(max_fee), Some(priority_fee)) => {
            if priority_fee > max_fee {
                return Err(InvalidTransaction::PriorityFeeGreaterThanMaxFee.into());
            }
            if max_fee < base_fee {
                return Err(InvalidTransaction::MaxFeeBelowBaseFee.into());
            }
        }
        _ if tx.gas_price() < base_fee => {
            return Err(InvalidTransaction::MaxFeeBelowBaseFee.into());
        }
        _ => {}
    }

    if tx.tx_type() == TxType::EIP4844 {
        validate_blob_transaction(env, config, tx, blob_gas_available)?;
    }
    if tx
        .authorization_list()
        .is_some_and(|authorizations| authorizations.is_empty())
    {
        return Err(InvalidTransaction::EmptyAuthorizationList.into());
    }

    let account = state.get_account(&sender)?;
    if account.nonce != tx.nonce() {
        return Err(InvalidTransaction::NonceMismatch {
            expected: account.nonce,
            actual: tx.nonce(),
        }
        .into());
    }
    match max_cost(tx) {
        Some(required) if account.balance >= required => {}
        required => {
            return Err(InvalidTransaction::InsufficientAccountFunds {
                sender,
                balance: account.balance,
                required: required.unwrap_or(U256::MAX),
            }
            .into());
        }
    }
    // an account delegating its code still sends transactions (EIP-7702)
    let delegates = config.eips.eip7702 && delegated_address(&account.code).is_some();
    if account.has_code() && !delegates {
        return Err(InvalidTransaction::SenderNotEoa(sender).into());
    }

    Ok((intrinsic, floor))
}

fn validate_blob_transaction(
    env: &BlockEnv,
    config: &ForkConfig,
    tx: &Transaction,
    blob_gas_available: u64,
) -> Result<(), ChainError> {
    let hashes = tx.blob_versioned_hashes();
    if hashes.is_empty() {
        return Err(InvalidTransaction::NoBlobs.into());
    }
    if let Some(hash) = hashes
        .iter()
        .find(|hash| hash.as_bytes()[0] != VERSIONED_HASH_VERSION_KZG)
    {
        return Err(InvalidTransaction::InvalidBlobVersionedHash(*hash).into());
    }
    if config.eips.eip7594 && hashes.len() as u64 > MAX_BLOBS_PER_TX {
        return Err(InvalidTransaction::TooManyBlobs(hashes.len()).into());
    }
    if hashes.len() as u64 > env.fork.blob_schedule().max
        || blob_gas_used(tx) > blob_gas_available
    {
        return Err(InvalidTransaction::BlobGasLimitExceeded.into());
    }
    if tx
        .max_fee_per_blob_gas()
        .is_some_and(|max_fee| max_fee < env.blob_base_fee())
    {
        return Err(InvalidTransaction::InsufficientMaxFeePerBlobGas.into());
    }
    Ok(())
}

/// Performs pre-execution validation of the block's header values in reference to
/// the parent header, and checks the roots committing to the body.
pub fn validate_block(
    block: &Block,
    parent_header: &BlockHeader,
    chain_config: &ChainConfig,
) -> Result<(), ChainError> {
    let header = &block.header;
    let fork = chain_config.fork(header.number, header.timestamp);
    validate_block_header(header, parent_header, chain_config, fork)
        .map_err(InvalidBlockError::from)?;

    if fork >= Fork::Paris {
        if !block.body.ommers.is_empty() {
            return Err(InvalidBlockError::from(
                InvalidBlockHeaderError::PostMergeProofOfWorkFields,
            )
            .into());
        }
    } else if block.body.ommers.len() > MAX_OMMERS {
        return Err(InvalidBlockError::from(InvalidBlockHeaderError::TooManyOmmers).into());
    }

    if compute_transactions_root(&block.body.transactions) != header.transactions_root {
        return Err(InvalidBlockError::TransactionsRootMismatch.into());
    }
    if compute_ommers_hash(&block.body.ommers) != header.ommers_hash {
        return Err(InvalidBlockError::OmmersHashMismatch.into());
    }
    match (&block.body.withdrawals, header.withdrawals_root) {
        (Some(withdrawals), Some(root)) => {
            if compute_withdrawals_root(withdrawals) != root {
                return Err(InvalidBlockError::WithdrawalsRootMismatch.into());
            }
        }
        (None, None) => {}
        _ => {
            return Err(InvalidBlockError::from(InvalidBlockHeaderError::WithdrawalsMismatch).into());
        }
    }

    if fork >= Fork::Cancun {
        verify_blob_gas_usage(block, fork)?;
    }
    Ok(())
}

/// Checks the ommers of `block` against its recent ancestors.
///
/// `ancestors` are the canonical blocks before `block`, oldest first and ending with
/// its parent. Only the last `MAX_OMMER_DEPTH + 1` of them are looked at.
pub fn validate_ommers(
    block: &Block,
    ancestors: &[Block],
    chain_config: &ChainConfig,
) -> Result<(), ChainError> {
    let ommers = &block.body.ommers;
    if ommers.is_empty() {
        return Ok(());
    }
    if ommers.len() > MAX_OMMERS {
        return Err(InvalidBlockError::from(InvalidBlockHeaderError::TooManyOmmers).into());
    }

    let recent = &ancestors[ancestors.len().saturating_sub(MAX_OMMER_DEPTH as usize + 1)..];
    let recent_headers: HashMap<H256, &BlockHeader> = recent
        .iter()
        .map(|ancestor| (ancestor.hash(), &ancestor.header))
        .collect();
    let recent_ommers: HashSet<H256> = recent
        .iter()
        .flat_map(|ancestor| ancestor.body.ommers.iter().map(BlockHeader::hash))
        .collect();
    let mut included = HashSet::new();
    for ommer in ommers {
        let ommer_hash = ommer.hash();
        if !included.insert(ommer_hash) {
            let error = InvalidBlockError::InvalidOmmer(ommer_hash, InvalidOmmerError::Duplicate);
            return Err(error.into());
        }
        check_ommer(ommer, ommer_hash, block, &recent_headers, &recent_ommers, chain_config)
            .map_err(|error| InvalidBlockError::InvalidOmmer(ommer_hash, error))?;
    }
    Ok(())
}

fn check_ommer(
    ommer: &BlockHeader,
    ommer_hash: H256,
    block: &Block,
    recent_headers: &HashMap<H256, &BlockHeader>,
    recent_ommers: &HashSet<H256>,
    chain_config: &ChainConfig,
) -> Result<(), InvalidOmmerError> {
    let header = &block.header;
    let age = header.number.checked_sub(ommer.number);
    if ommer.number == 0 || !age.is_some_and(|age| (1..=MAX_OMMER_DEPTH).contains(&age)) {
        return Err(InvalidOmmerError::NumberOutOfRange {
            ommer: ommer.number,
            block: header.number,
        });
    }
    if ommer_hash == block.hash() || recent_headers.contains_key(&ommer_hash) {
        return Err(InvalidOmmerError::IsAncestor);
    }
    if recent_ommers.contains(&ommer_hash) {
        return Err(InvalidOmmerError::AlreadyIncluded);
    }
    let Some(ommer_parent) = recent_headers.get(&ommer.parent_hash) else {
        return Err(InvalidOmmerError::ParentNotAncestor);
    };
    if ommer.parent_hash == header.parent_hash {
        return Err(InvalidOmmerError::IsSibling);
    }
    let fork = chain_config.fork(ommer.number, ommer.timestamp);
    validate_block_header(ommer, ommer_parent, chain_config, fork)?;
    Ok(())
}

/// Header checks against the parent. Proof of work is not verified.
pub fn validate_block_header(
    header: &BlockHeader,
    parent_header: &BlockHeader,
    chain_config: &ChainConfig,
    fork: Fork,
) -> Result<(), InvalidBlockHeaderError> {
    if parent_header.number.checked_add(1) != Some(header.number) {
        return Err(InvalidBlockHeaderError::NumberMismatch);
    }
    if header.parent_hash != parent_header.hash() {
        return Err(InvalidBlockHeaderError::ParentHashMismatch);
    }
    if header.timestamp <= parent_header.timestamp {
        return Err(InvalidBlockHeaderError::TimestampNotIncreasing);
    }
    if header.extra_data.len() > MAX_EXTRA_DATA_SIZE {
        return Err(InvalidBlockHeaderError::ExtraDataTooLong);
    }
    if header.gas_used > header.gas_limit {
        return Err(InvalidBlockHeaderError::GasUsedExceedsGasLimit);
    }

    let london_transition = fork >= Fork::London
        && !chain_config.is_fork_activated(
            Fork::London,
            parent_header.number,
            parent_header.timestamp,
        );
    let parent_gas_limit = if london_transition {
        parent_header.gas_limit.saturating_mul(ELASTICITY_MULTIPLIER)
    } else {
        parent_header.gas_limit
    };
    if !check_gas_limit(header.gas_limit, parent_gas_limit) {
        return Err(InvalidBlockHeaderError::GasLimitOutOfBounds);
    }

    if fork >= Fork::London {
        let expected_base_fee = if london_transition {
            INITIAL_BASE_FEE
        } else {
            calculate_base_fee_per_gas(
                parent_header.gas_limit,
                parent_header.gas_used,
                parent_header.base_fee_per_gas.unwrap_or_default(),
            )
        };
        if header.base_fee_per_gas != Some(expected_base_fee) {
            return Err(InvalidBlockHeaderError::BaseFeeMismatch);
        }
    } else if header.base_fee_per_gas.is_some() {
        return Err(InvalidBlockHeaderError::UnexpectedBaseFee);
    }

    if fork >= Fork::Paris
        && (!header.difficulty.is_zero()
            || header.nonce != 0
            || header.ommers_hash != DEFAULT_OMMERS_HASH)
    {
        return Err(InvalidBlockHeaderError::PostMergeProofOfWorkFields);
    }

    if (fork >= Fork::Shanghai) != header.withdrawals_root.is_some() {
        return Err(InvalidBlockHeaderError::WithdrawalsMismatch);
    }

    if fork >= Fork::Cancun {
        let (Some(_), Some(excess_blob_gas)) = (header.blob_gas_used, header.excess_blob_gas)
        else {
            return Err(InvalidBlockHeaderError::BlobGasFieldsMismatch);
        };
        let expected = calc_excess_blob_gas(parent_header, fork);
        if excess_blob_gas != expected {
            return Err(InvalidBlockHeaderError::ExcessBlobGasMismatch);
        }
        if header.parent_beacon_block_root.is_none() {
            return Err(InvalidBlockHeaderError::ParentBeaconBlockRootMismatch);
        }
    } else {
        if header.blob_gas_used.is_some() || header.excess_blob_gas.is_some() {
            return Err(InvalidBlockHeaderError::BlobGasFieldsMismatch);
        }
        if header.parent_beacon_block_root.is_some() {
            return Err(InvalidBlockHeaderError::ParentBeaconBlockRootMismatch);
        }
    }

    if (fork >= Fork::Prague) != header.requests_hash.is_some() {
        return Err(InvalidBlockHeaderError::RequestsHashFieldMismatch);
    }
    Ok(())
}

/// The gas limit may move by less than 1/1024 of the parent's per block.
fn check_gas_limit(gas_limit: u64, parent_gas_limit: u64) -> bool {
    let max_delta = parent_gas_limit / GAS_LIMIT_ADJUSTMENT_FACTOR;
    gas_limit < parent_gas_limit.saturating_add(max_delta)
        && gas_limit > parent_gas_limit.saturating_sub(max_delta)
        && gas_limit >= GAS_LIMIT_MINIMUM
}

// Perform validations over the block's blob gas usage.
// Must be called only if the block has cancun activated
fn verify_blob_gas_usage(block: &Block, fork: Fork) -> Result<(), ChainError> {
    let blob_gas_used = block
        .body
        .transactions
        .iter()
        .map(blob_gas_used)
        .fold(0u64, u64::saturating_add);
    if blob_gas_used > fork.blob_schedule().max_blob_gas() {
        return Err(ChainError::InvalidBlock(
            InvalidBlockError::ExceededMaxBlobGasPerBlock,
        ));
    }
    if block
        .header
        .blob_gas_used
        .is_some_and(|header_blob_gas_used| header_blob_gas_used != blob_gas_used)
    {
        return Err(ChainError::InvalidBlock(
            InvalidBlockError::BlobGasUsedMismatch,
        ));
    }
    Ok(())
}

/// Performs post-execution checks
pub fn validate_state_root(
    block_header: &BlockHeader,
    new_state_root: H256,
) -> Result<(), ChainError> {
    // Compare state root
    if new_state_root == block_header.state_root {
        Ok(())
    } else {
        Err(ChainError::InvalidBlock(
            InvalidBlockError::StateRootMismatch {
                expected: block_header.state_root,
                computed: new_state_root,
            },
        ))
    }
}

pub fn validate_receipts_root(
    block_header: &BlockHeader,
    receipts: &[Receipt],
) -> Result<(), ChainError> {
    let receipts_root = compute_receipts_root(receipts);

    if receipts_root == block_header.receipts_root {
        Ok(())
    } else {
        Err(ChainError::InvalidBlock(
            InvalidBlockError::ReceiptsRootMismatch,
        ))
    }
}

pub fn validate_gas_used(gas_used: u64, block_header: &BlockHeader) -> Result<(), ChainError> {
    if gas_used != block_header.gas_used {
        return Err(ChainError::InvalidBlock(InvalidBlockError::GasUsedMismatch {
            expected: block_header.gas_used,
            computed: gas_used,
        }));
    }
    Ok(())
}

pub fn validate_logs_bloom(logs_bloom: &Bloom, block_header: &BlockHeader) -> Result<(), ChainError> {
    if *logs_bloom != block_header.logs_bloom {
        return Err(ChainError::InvalidBlock(InvalidBlockError::BloomMismatch));
    }
    Ok(())
}

pub fn validate_requests_hash(
    block_header: &BlockHeader,
    requests_hash: Option<H256>,
) -> Result<(), ChainError> {
    if block_header.requests_hash != requests_hash {
        return Err(ChainError::InvalidBlock(
            InvalidBlockError::RequestsHashMismatch,
        ));
    }
    Ok(())
}

pub fn validate_blob_gas_used(
    blob_gas_used: u64,
    block_header: &BlockHeader,
) -> Result<(), ChainError> {
    if block_header
        .blob_gas_used
        .is_some_and(|expected| expected != blob_gas_used)
    {
        return Err(ChainError::InvalidBlock(
            InvalidBlockError::BlobGasUsedMismatch,
        ));
    }
    Ok(())
}

/// Destination of a create transaction sent by `sender` with `nonce`.
pub(crate) fn created_address(tx: &Transaction, sender: Address) -> Option<Address> {
    matches!(tx.to(), TxKind::Create)
        .then(|| keel_vm::utils::calculate_create_address(sender, tx.nonce()))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use keel_common::types::{
        AuthorizationTuple, BlockBody, EIP2930Transaction, EIP7702Transaction, LegacyTransaction,
    };
    use proptest::prelude::*;

    use super::*;

    fn legacy(data: &[u8], to: TxKind) -> Transaction {
        Transaction::LegacyTransaction(LegacyTransaction {
            gas: 100_000,
            to,
            data: Bytes::copy_from_slice(data),
            ..Default::default()
        })
    }

    #[test]
    fn intrinsic_gas_by_fork() {
        let call = legacy(&[0, 0, 1], TxKind::Call(Address::repeat_byte(1)));
        let create = legacy(&[0, 0, 1], TxKind::Create);
        let frontier = ForkConfig::new(Fork::Frontier);
        let istanbul = ForkConfig::new(Fork::Istanbul);
        let shanghai = ForkConfig::new(Fork::Shanghai);
        assert_eq!(intrinsic_gas(&call, &frontier), 21000 + 8 + 68);
        assert_eq!(intrinsic_gas(&create, &frontier), 21000 + 8 + 68);
        assert_eq!(intrinsic_gas(&call, &istanbul), 21000 + 8 + 16);
        assert_eq!(intrinsic_gas(&create, &istanbul), 53000 + 8 + 16);
        assert_eq!(intrinsic_gas(&create, &shanghai), 53000 + 8 + 16 + 2);
    }

    #[test]
    fn access_list_is_priced() {
        let tx = Transaction::EIP2930Transaction(EIP2930Transaction {
            to: TxKind::Call(Address::repeat_byte(1)),
            access_list: vec![
                (Address::repeat_byte(2), vec![H256::zero(), H256::repeat_byte(1)]),
                (Address::repeat_byte(3), vec![]),
            ],
            ..Default::default()
        });
        assert_eq!(
            intrinsic_gas(&tx, &ForkConfig::new(Fork::Berlin)),
            21000 + 2 * 2400 + 2 * 1900
        );
    }

    #[test]
    fn calldata_floor_and_authorizations_are_priced_from_prague() {
        let tx = legacy(&[1; 100], TxKind::Call(Address::repeat_byte(1)));
        let cancun = ForkConfig::new(Fork::Cancun);
        let prague = ForkConfig::new(Fork::Prague);
        assert_eq!(calldata_floor_gas(&tx, &cancun), 0);
        // 400 tokens at 10 gas
        assert_eq!(calldata_floor_gas(&tx, &prague), 21000 + 4000);
        assert_eq!(intrinsic_gas(&tx, &prague), 21000 + 1600);

        let set_code = Transaction::EIP7702Transaction(EIP7702Transaction {
            to: Address::repeat_byte(1),
            authorization_list: vec![AuthorizationTuple::default(); 2],
            ..Default::default()
        });
        assert_eq!(intrinsic_gas(&set_code, &prague), 21000 + 2 * 25000);
    }

    #[test]
    fn gas_limit_bounds() {
        assert!(check_gas_limit(1_000_000, 1_000_000));
        assert!(check_gas_limit(1_000_975, 1_000_000));
        assert!(!check_gas_limit(1_000_976, 1_000_000));
        assert!(!check_gas_limit(999_023, 1_000_000));
        assert!(!check_gas_limit(4_999, 5_000));
    }

    /// Pre-merge canonical chain of `length` blocks starting at genesis.
    fn chain(length: u64) -> Vec<Block> {
        let mut blocks: Vec<Block> = Vec::new();
        for number in 0..length {
            let header = BlockHeader {
                parent_hash: blocks.last().map(Block::hash).unwrap_or_default(),
                ommers_hash: DEFAULT_OMMERS_HASH,
                number,
                gas_limit: 1_000_000,
                timestamp: number * 10,
                difficulty: U256::from(131_072),
                ..Default::default()
            };
            blocks.push(Block::new(header, BlockBody::empty()));
        }
        blocks
    }

    fn ommer_of(parent: &Block, miner: u8) -> BlockHeader {
        BlockHeader {
            parent_hash: parent.hash(),
            ommers_hash: DEFAULT_OMMERS_HASH,
            coinbase: Address::repeat_byte(miner),
            number: parent.header.number + 1,
            gas_limit: parent.header.gas_limit,
            timestamp: parent.header.timestamp + 5,
            difficulty: parent.header.difficulty,
            ..Default::default()
        }
    }

    /// Child of the last ancestor including `ommers`.
    fn block_with(ancestors: &[Block], ommers: Vec<BlockHeader>) -> Block {
        let parent = ancestors.last().unwrap();
        let mut header = ommer_of(parent, 0xc0);
        header.ommers_hash = compute_ommers_hash(&ommers);
        Block::new(
            header,
            BlockBody {
                ommers,
                ..BlockBody::empty()
            },
        )
    }

    fn check(ancestors: &[Block], ommers: Vec<BlockHeader>) -> Result<(), InvalidOmmerError> {
        let config = ChainConfig::for_fork(Fork::Istanbul, 1);
        match validate_ommers(&block_with(ancestors, ommers), ancestors, &config) {
            Ok(()) => Ok(()),
            Err(ChainError::InvalidBlock(InvalidBlockError::InvalidOmmer(_, error))) => Err(error),
            Err(error) => panic!("unexpected error: {error}"),
        }
    }

    #[test]
    fn ommers_within_six_generations_are_accepted() {
        let ancestors = chain(8);
        let ommers = vec![ommer_of(&ancestors[6], 1), ommer_of(&ancestors[2], 2)];
        assert_eq!(check(&ancestors, ommers), Ok(()));
        assert_eq!(check(&ancestors, vec![]), Ok(()));
    }

    #[test]
    fn future_numbered_ommer_is_rejected() {
        let ancestors = chain(8);
        let mut ommer = ommer_of(&ancestors[6], 1);
        ommer.number = 9;
        assert_eq!(
            check(&ancestors, vec![ommer]),
            Err(InvalidOmmerError::NumberOutOfRange { ommer: 9, block: 8 })
        );
        // same height as the block
        assert_eq!(
            check(&ancestors, vec![ommer_of(&ancestors[7], 1)]),
            Err(InvalidOmmerError::NumberOutOfRange { ommer: 8, block: 8 })
        );
    }

    #[test]
    fn ommer_older_than_six_generations_is_rejected() {
        let ancestors = chain(8);
        assert_eq!(
            check(&ancestors, vec![ommer_of(&ancestors[0], 1)]),
            Err(InvalidOmmerError::NumberOutOfRange { ommer: 1, block: 8 })
        );
    }

    #[test]
    fn duplicated_ommer_is_rejected() {
        let ancestors = chain(8);
        let ommer = ommer_of(&ancestors[5], 1);
        assert_eq!(
            check(&ancestors, vec![ommer.clone(), ommer]),
            Err(InvalidOmmerError::Duplicate)
        );
    }

    #[test]
    fn ancestor_cannot_be_an_ommer() {
        let ancestors = chain(8);
        assert_eq!(
            check(&ancestors, vec![ancestors[5].header.clone()]),
            Err(InvalidOmmerError::IsAncestor)
        );
    }

    #[test]
    fn ommer_included_by_an_ancestor_is_rejected() {
        let mut ancestors = chain(8);
        let ommer = ommer_of(&ancestors[4], 1);
        ancestors[6].body.ommers.push(ommer.clone());
        assert_eq!(
            check(&ancestors, vec![ommer]),
            Err(InvalidOmmerError::AlreadyIncluded)
        );
    }

    #[test]
    fn ommer_must_branch_off_a_recent_ancestor() {
        let ancestors = chain(8);
        let mut ommer = ommer_of(&ancestors[6], 1);
        ommer.parent_hash = H256::repeat_byte(0xab);
        assert_eq!(
            check(&ancestors, vec![ommer]),
            Err(InvalidOmmerError::ParentNotAncestor)
        );
    }

    #[test]
    fn sibling_cannot_be_an_ommer() {
        let ancestors = chain(8);
        let mut ommer = ommer_of(&ancestors[7], 1);
        ommer.number = 7;
        assert_eq!(
            check(&ancestors, vec![ommer]),
            Err(InvalidOmmerError::IsSibling)
        );
    }

    #[test]
    fn ommer_header_is_validated() {
        let ancestors = chain(8);
        let mut ommer = ommer_of(&ancestors[6], 1);
        ommer.timestamp = ancestors[6].header.timestamp;
        assert_eq!(
            check(&ancestors, vec![ommer]),
            Err(InvalidOmmerError::InvalidHeader(
                InvalidBlockHeaderError::TimestampNotIncreasing
            ))
        );
    }

    #[test]
    fn at_most_two_ommers() {
        let ancestors = chain(8);
        let ommers = (1..=3).map(|miner| ommer_of(&ancestors[6], miner)).collect();
        let block = block_with(&ancestors, ommers);
        let config = ChainConfig::for_fork(Fork::Istanbul, 1);
        assert!(matches!(
            validate_ommers(&block, &ancestors, &config),
            Err(ChainError::InvalidBlock(InvalidBlockError::InvalidHeader(
                InvalidBlockHeaderError::TooManyOmmers
            )))
        ));
    }

    proptest! {
        #[test]
        fn calldata_never_lowers_intrinsic_gas(data in proptest::collection::vec(any::<u8>(), 0..256), extra in any::<u8>()) {
            let config = ForkConfig::new(Fork::Cancun);
            let to = TxKind::Call(Address::repeat_byte(1));
            let shorter = intrinsic_gas(&legacy(&data, to), &config);
            let mut longer_data = data.clone();
            longer_data.push(extra);
            let longer = intrinsic_gas(&legacy(&longer_data, to), &config);
            prop_assert!(longer > shorter);
        }

        #[test]
        fn parent_gas_limit_is_always_accepted(parent in GAS_LIMIT_MINIMUM..u64::MAX / 2) {
            prop_assert!(check_gas_limit(parent, parent));
        }
    }
}
