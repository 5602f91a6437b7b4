use bytes::{BufMut, Bytes};
use ethereum_types::{Address, Bloom, H256, U256};
use keel_crypto::keccak::keccak;
use keel_rlp::{
    decode::RLPDecode,
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};
use keel_trie::ordered_trie_root;
use serde::{Deserialize, Serialize};

use crate::constants::{
    BASE_FEE_MAX_CHANGE_DENOMINATOR, BLOB_BASE_COST, ELASTICITY_MULTIPLIER, GAS_PER_BLOB,
    MIN_BASE_FEE_PER_BLOB_GAS,
};

use super::{Fork, Receipt, Transaction};

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Block {
    pub header: BlockHeader,
    pub body: BlockBody,
}

impl Block {
    pub fn new(header: BlockHeader, body: BlockBody) -> Block {
        Block { header, body }
    }

    pub fn hash(&self) -> H256 {
        self.header.hash()
    }
}

impl RLPEncode for Block {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.header)
            .encode_field(&self.body.transactions)
            .encode_field(&self.body.ommers)
            .encode_optional_field(&self.body.withdrawals)
            .finish();
    }
}

impl RLPDecode for Block {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (header, decoder) = decoder.decode_field("header")?;
        let (transactions, decoder) = decoder.decode_field("transactions")?;
        let (ommers, decoder) = decoder.decode_field("ommers")?;
        let (withdrawals, decoder) = decoder.decode_optional_field()?;
        let body = BlockBody {
            transactions,
            ommers,
            withdrawals,
        };
        Ok((Block::new(header, body), decoder.finish()?))
    }
}

/// Header part of a block on the chain.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub parent_hash: H256,
    #[serde(rename = "sha3Uncles")]
    pub ommers_hash: H256,
    #[serde(rename = "miner")]
    pub coinbase: Address,
    pub state_root: H256,
    pub transactions_root: H256,
    pub receipts_root: H256,
    pub logs_bloom: Bloom,
    pub difficulty: U256,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub number: u64,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub gas_limit: u64,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub gas_used: u64,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub timestamp: u64,
    #[serde(with = "crate::serde_utils::bytes")]
    pub extra_data: Bytes,
    #[serde(rename = "mixHash")]
    pub prev_randao: H256,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub nonce: u64,
    #[serde(default, with = "crate::serde_utils::u64::hex_str_opt")]
    pub base_fee_per_gas: Option<u64>,
    pub withdrawals_root: Option<H256>,
    #[serde(default, with = "crate::serde_utils::u64::hex_str_opt")]
    pub blob_gas_used: Option<u64>,
    #[serde(default, with = "crate::serde_utils::u64::hex_str_opt")]
    pub excess_blob_gas: Option<u64>,
    pub parent_beacon_block_root: Option<H256>,
    pub requests_hash: Option<H256>,
}

impl RLPEncode for BlockHeader {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.parent_hash)
            .encode_field(&self.ommers_hash)
            .encode_field(&self.coinbase)
            .encode_field(&self.state_root)
            .encode_field(&self.transactions_root)
            .encode_field(&self.receipts_root)
            .encode_field(&self.logs_bloom)
            .encode_field(&self.difficulty)
            .encode_field(&self.number)
            .encode_field(&self.gas_limit)
            .encode_field(&self.gas_used)
            .encode_field(&self.timestamp)
            .encode_field(&self.extra_data)
            .encode_field(&self.prev_randao)
            .encode_field(&self.nonce.to_be_bytes())
            .encode_optional_field(&self.base_fee_per_gas)
            .encode_optional_field(&self.withdrawals_root)
            .encode_optional_field(&self.blob_gas_used)
            .encode_optional_field(&self.excess_blob_gas)
            .encode_optional_field(&self.parent_beacon_block_root)
            .encode_optional_field(&self.requests_hash)
            .finish();
    }
}

impl RLPDecode for BlockHeader {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (parent_hash, decoder) = decoder.decode_field("parent_hash")?;
        let (ommers_hash, decoder) = decoder.decode_field("ommers_hash")?;
        let (coinbase, decoder) = decoder.decode_field("coinbase")?;
        let (state_root, decoder) = decoder.decode_field("state_root")?;
        let (transactions_root, decoder) = decoder.decode_field("transactions_root")?;
        let (receipts_root, decoder) = decoder.decode_field("receipts_root")?;
        let (logs_bloom, decoder) = decoder.decode_field("logs_bloom")?;
        let (difficulty, decoder) = decoder.decode_field("difficulty")?;
        let (number, decoder) = decoder.decode_field("number")?;
        let (gas_limit, decoder) = decoder.decode_field("gas_limit")?;
        let (gas_used, decoder) = decoder.decode_field("gas_used")?;
        let (timestamp, decoder) = decoder.decode_field("timestamp")?;
        let (extra_data, decoder) = decoder.decode_field("extra_data")?;
        let (prev_randao, decoder) = decoder.decode_field("prev_randao")?;
        let (nonce, decoder): ([u8; 8], _) = decoder.decode_field("nonce")?;
        let (base_fee_per_gas, decoder) = decoder.decode_optional_field()?;
        let (withdrawals_root, decoder) = decoder.decode_optional_field()?;
        let (blob_gas_used, decoder) = decoder.decode_optional_field()?;
        let (excess_blob_gas, decoder) = decoder.decode_optional_field()?;
        let (parent_beacon_block_root, decoder) = decoder.decode_optional_field()?;
        let (requests_hash, decoder) = decoder.decode_optional_field()?;
        let header = BlockHeader {
            parent_hash,
            ommers_hash,
            coinbase,
            state_root,
            transactions_root,
            receipts_root,
            logs_bloom,
            difficulty,
            number,
            gas_limit,
            gas_used,
            timestamp,
            extra_data,
            prev_randao,
            nonce: u64::from_be_bytes(nonce),
            base_fee_per_gas,
            withdrawals_root,
            blob_gas_used,
            excess_blob_gas,
            parent_beacon_block_root,
            requests_hash,
        };
        Ok((header, decoder.finish()?))
    }
}

impl BlockHeader {
    pub fn hash(&self) -> H256 {
        keccak(self.encode_to_vec())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BlockBody {
    pub transactions: Vec<Transaction>,
    pub ommers: Vec<BlockHeader>,
    pub withdrawals: Option<Vec<Withdrawal>>,
}

impl BlockBody {
    pub const fn empty() -> Self {
        Self {
            transactions: Vec::new(),
            ommers: Vec::new(),
            withdrawals: None,
        }
    }
}

/// Validator withdrawal (EIP-4895). `amount` is denominated in gwei.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub index: u64,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub validator_index: u64,
    pub address: Address,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub amount: u64,
}

impl RLPEncode for Withdrawal {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.index)
            .encode_field(&self.validator_index)
            .encode_field(&self.address)
            .encode_field(&self.amount)
            .finish();
    }
}

impl RLPDecode for Withdrawal {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (index, decoder) = decoder.decode_field("index")?;
        let (validator_index, decoder) = decoder.decode_field("validator_index")?;
        let (address, decoder) = decoder.decode_field("address")?;
        let (amount, decoder) = decoder.decode_field("amount")?;
        let withdrawal = Withdrawal {
            index,
            validator_index,
            address,
            amount,
        };
        Ok((withdrawal, decoder.finish()?))
    }
}

pub fn compute_transactions_root(transactions: &[Transaction]) -> H256 {
    ordered_trie_root(transactions.iter().map(Transaction::encode_canonical_to_vec))
}

pub fn compute_receipts_root(receipts: &[Receipt]) -> H256 {
    ordered_trie_root(receipts.iter().map(Receipt::encode_inner))
}

pub fn compute_withdrawals_root(withdrawals: &[Withdrawal]) -> H256 {
    ordered_trie_root(withdrawals.iter().map(RLPEncode::encode_to_vec))
}

pub fn compute_ommers_hash(ommers: &[BlockHeader]) -> H256 {
    keccak(ommers.to_vec().encode_to_vec())
}

/// Base fee of a block following a parent with the given values (EIP-1559).
pub fn calculate_base_fee_per_gas(
    parent_gas_limit: u64,
    parent_gas_used: u64,
    parent_base_fee_per_gas: u64,
) -> u64 {
    let parent_gas_target = parent_gas_limit / ELASTICITY_MULTIPLIER;
    if parent_gas_target == 0 || parent_gas_used == parent_gas_target {
        return parent_base_fee_per_gas;
    }
    let scaled_delta = |gas_delta: u64| {
        (u128::from(parent_base_fee_per_gas) * u128::from(gas_delta)
            / u128::from(parent_gas_target)
            / u128::from(BASE_FEE_MAX_CHANGE_DENOMINATOR)) as u64
    };
    if parent_gas_used > parent_gas_target {
        let increase = scaled_delta(parent_gas_used - parent_gas_target).max(1);
        parent_base_fee_per_gas.saturating_add(increase)
    } else {
        let decrease = scaled_delta(parent_gas_target - parent_gas_used);
        parent_base_fee_per_gas.saturating_sub(decrease)
    }
}

/// Excess blob gas of a block following `parent` (EIP-4844).
///
/// Since Osaka the excess stops decreasing while blob gas is priced below
/// the execution base fee (EIP-7918).
pub fn calc_excess_blob_gas(parent: &BlockHeader, fork: Fork) -> u64 {
    let parent_excess_blob_gas = parent.excess_blob_gas.unwrap_or_default();
    let parent_blob_gas_used = parent.blob_gas_used.unwrap_or_default();
    let schedule = fork.blob_schedule();
    let target = schedule.target_blob_gas();
    let total = parent_excess_blob_gas.saturating_add(parent_blob_gas_used);
    if total < target {
        return 0;
    }
    if fork >= Fork::Osaka {
        let reserve_price = U256::from(BLOB_BASE_COST)
            * U256::from(parent.base_fee_per_gas.unwrap_or_default());
        let blob_price =
            U256::from(GAS_PER_BLOB).saturating_mul(get_blob_base_fee(parent_excess_blob_gas, fork));
        if reserve_price > blob_price {
            let max = schedule.max_blob_gas();
            return parent_excess_blob_gas
                .saturating_add(parent_blob_gas_used.saturating_mul(max - target) / max);
        }
    }
    total - target
}

/// Approximates `factor * e ** (numerator / denominator)` using Taylor expansion.
pub fn fake_exponential(factor: U256, numerator: U256, denominator: U256) -> U256 {
    if denominator.is_zero() {
        return U256::zero();
    }
    let mut i = U256::one();
    let mut output = U256::zero();
    let mut numerator_accum = factor.saturating_mul(denominator);
    while !numerator_accum.is_zero() {
        output = output.saturating_add(numerator_accum);
        numerator_accum = numerator_accum.saturating_mul(numerator) / (denominator * i);
        i += U256::one();
    }
    output / denominator
}

pub fn get_blob_base_fee(excess_blob_gas: u64, fork: Fork) -> U256 {
    fake_exponential(
        U256::from(MIN_BASE_FEE_PER_BLOB_GAS),
        U256::from(excess_blob_gas),
        U256::from(fork.blob_schedule().base_fee_update_fraction),
    )
}
