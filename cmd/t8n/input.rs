use std::collections::BTreeMap;

use anyhow::{Context, bail, ensure};
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use keel_blockchain::{BlockEnv, block_reward};
use keel_common::{
    serde_utils,
    types::{
        AuthorizationTuple, BlockHeader, EIP1559Transaction, EIP2930Transaction,
        EIP4844Transaction, EIP7702Transaction, Fork, LegacyTransaction, Transaction, TxKind,
        Withdrawal, calc_excess_blob_gas, calculate_base_fee_per_gas,
    },
};
use keel_rlp::{
    decode::{decode_bytes, decode_rlp_item, get_item_with_prefix},
    encode::encode_json_value,
};
use serde::{Deserialize, Deserializer};

/// Block context, in the env layout shared by the state-transition tools.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvInput {
    pub current_coinbase: Address,
    #[serde(with = "serde_utils::u64::hex_or_dec_str")]
    pub current_gas_limit: u64,
    #[serde(with = "serde_utils::u64::hex_or_dec_str")]
    pub current_number: u64,
    #[serde(with = "serde_utils::u64::hex_or_dec_str")]
    pub current_timestamp: u64,
    #[serde(default, with = "serde_utils::u256::hex_str_opt")]
    pub current_difficulty: Option<U256>,
    #[serde(default)]
    pub current_random: Option<H256>,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub current_base_fee: Option<u64>,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub parent_base_fee: Option<u64>,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub parent_gas_used: Option<u64>,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub parent_gas_limit: Option<u64>,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub current_excess_blob_gas: Option<u64>,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub parent_excess_blob_gas: Option<u64>,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub parent_blob_gas_used: Option<u64>,
    #[serde(default)]
    pub parent_beacon_block_root: Option<H256>,
    #[serde(default)]
    pub parent_hash: Option<H256>,
    #[serde(default)]
    pub withdrawals: Option<Vec<Withdrawal>>,
    #[serde(default)]
    pub block_hashes: BTreeMap<String, H256>,
    #[serde(default)]
    pub ommers: Vec<OmmerInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OmmerInput {
    /// Distance to the block being built.
    #[serde(with = "serde_utils::u64::hex_or_dec_str")]
    pub delta: u64,
    pub address: Address,
}

impl EnvInput {
    /// Resolves the block context for `fork`, deriving what the input leaves
    /// out from the parent values.
    ///
    /// `reward` overrides the miner reward in wei, a negative value disables it.
    pub fn block_env(
        &self,
        fork: Fork,
        chain_id: u64,
        reward: Option<i64>,
    ) -> anyhow::Result<BlockEnv> {
        let base_fee_per_gas = if fork >= Fork::London {
            Some(self.base_fee()?)
        } else {
            None
        };
        let excess_blob_gas = (fork >= Fork::Cancun).then(|| {
            self.current_excess_blob_gas.unwrap_or_else(|| {
                let parent = BlockHeader {
                    excess_blob_gas: self.parent_excess_blob_gas,
                    blob_gas_used: self.parent_blob_gas_used,
                    base_fee_per_gas: self.parent_base_fee,
                    ..Default::default()
                };
                calc_excess_blob_gas(&parent, fork)
            })
        });
        let (difficulty, prev_randao) = if fork >= Fork::Paris {
            let random = self
                .current_random
                .context("currentRandom is required from the merge on")?;
            (U256::zero(), Some(random))
        } else {
            (self.current_difficulty.unwrap_or_default(), None)
        };
        let block_reward = match reward {
            None => block_reward(fork),
            Some(reward) if reward < 0 => None,
            Some(reward) => Some(U256::from(reward.unsigned_abs())),
        };

        let block_hashes = self.block_hashes()?;
        // the parent hash falls back to the hash of the previous block when only that is given
        let parent_hash = self
            .parent_hash
            .or_else(|| {
                let parent = self.current_number.checked_sub(1)?;
                block_hashes.get(&parent).copied()
            })
            .unwrap_or_default();

        Ok(BlockEnv {
            fork,
            chain_id,
            parent_hash,
            coinbase: self.current_coinbase,
            number: self.current_number,
            timestamp: self.current_timestamp,
            gas_limit: self.current_gas_limit,
            base_fee_per_gas,
            difficulty,
            prev_randao,
            excess_blob_gas,
            parent_beacon_block_root: self
                .parent_beacon_block_root
                .filter(|_| fork >= Fork::Cancun),
            withdrawals: (fork >= Fork::Shanghai)
                .then(|| self.withdrawals.clone().unwrap_or_default()),
            block_hashes,
            block_reward,
        })
    }

    fn base_fee(&self) -> anyhow::Result<u64> {
        if let Some(base_fee) = self.current_base_fee {
            return Ok(base_fee);
        }
        match (self.parent_gas_limit, self.parent_gas_used, self.parent_base_fee) {
            (Some(gas_limit), Some(gas_used), Some(base_fee)) => {
                Ok(calculate_base_fee_per_gas(gas_limit, gas_used, base_fee))
            }
            _ => bail!("currentBaseFee, or the parent gas and base fee values, are required from London on"),
        }
    }

    fn block_hashes(&self) -> anyhow::Result<BTreeMap<u64, H256>> {
        self.block_hashes
            .iter()
            .map(|(number, hash)| {
                let number = parse_quantity(number)
                    .with_context(|| format!("invalid block number {number} in blockHashes"))?;
                Ok((number, *hash))
            })
            .collect()
    }

    /// Ommer headers carrying the fields the reward payout reads.
    pub fn ommers(&self) -> Vec<BlockHeader> {
        self.ommers
            .iter()
            .map(|ommer| BlockHeader {
                number: self.current_number.saturating_sub(ommer.delta),
                coinbase: ommer.address,
                ..Default::default()
            })
            .collect()
    }
}

fn parse_quantity(value: &str) -> Result<u64, std::num::ParseIntError> {
    match value.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListEntry {
    pub address: Address,
    #[serde(default)]
    pub storage_keys: Vec<H256>,
}

/// An EIP-7702 authorization, signed with `v`, `r` and `s` or by `secretKey`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationInput {
    #[serde(with = "serde_utils::u256::hex_or_dec_str")]
    pub chain_id: U256,
    pub address: Address,
    #[serde(with = "serde_utils::u64::hex_or_dec_str")]
    pub nonce: u64,
    #[serde(default, alias = "yParity", with = "serde_utils::u256::hex_str_opt")]
    pub v: Option<U256>,
    #[serde(default, with = "serde_utils::u256::hex_str_opt")]
    pub r: Option<U256>,
    #[serde(default, with = "serde_utils::u256::hex_str_opt")]
    pub s: Option<U256>,
    #[serde(default)]
    pub secret_key: Option<H256>,
}

impl AuthorizationInput {
    fn into_tuple(self) -> anyhow::Result<AuthorizationTuple> {
        let mut tuple = AuthorizationTuple {
            chain_id: self.chain_id,
            address: self.address,
            nonce: self.nonce,
            y_parity: self.v.unwrap_or_default(),
            r_signature: self.r.unwrap_or_default(),
            s_signature: self.s.unwrap_or_default(),
        };
        if let Some(secret_key) = self.secret_key {
            tuple.sign(&secret_key.0)?;
        }
        Ok(tuple)
    }
}

/// A transaction as written by hand or by the test fillers: either signed
/// with `v`, `r` and `s` or carrying the `secretKey` to sign it with.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInput {
    #[serde(default, rename = "type", with = "serde_utils::u64::hex_str_opt")]
    pub tx_type: Option<u64>,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub chain_id: Option<u64>,
    #[serde(with = "serde_utils::u64::hex_or_dec_str")]
    pub nonce: u64,
    #[serde(default, with = "serde_utils::u256::hex_str_opt")]
    pub gas_price: Option<U256>,
    #[serde(default, with = "serde_utils::u256::hex_str_opt")]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(default, with = "serde_utils::u256::hex_str_opt")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default, with = "serde_utils::u256::hex_str_opt")]
    pub max_fee_per_blob_gas: Option<U256>,
    #[serde(alias = "gasLimit", with = "serde_utils::u64::hex_or_dec_str")]
    pub gas: u64,
    #[serde(default, deserialize_with = "deserialize_to")]
    pub to: Option<Address>,
    #[serde(default, with = "serde_utils::u256::hex_or_dec_str")]
    pub value: U256,
    #[serde(default, alias = "data", with = "serde_utils::bytes")]
    pub input: Bytes,
    #[serde(default)]
    pub access_list: Vec<AccessListEntry>,
    #[serde(default)]
    pub blob_versioned_hashes: Vec<H256>,
    #[serde(default)]
    pub authorization_list: Option<Vec<AuthorizationInput>>,
    #[serde(default, with = "serde_utils::u256::hex_str_opt")]
    pub v: Option<U256>,
    #[serde(default, with = "serde_utils::u256::hex_str_opt")]
    pub r: Option<U256>,
    #[serde(default, with = "serde_utils::u256::hex_str_opt")]
    pub s: Option<U256>,
    #[serde(default)]
    pub secret_key: Option<H256>,
    /// Legacy transactions only: whether to sign with EIP-155 replay protection.
    #[serde(default)]
    pub protected: Option<bool>,
}

/// An empty string or null means contract creation.
fn deserialize_to<'de, D>(d: D) -> Result<Option<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(to) = Option::<String>::deserialize(d)? else {
        return Ok(None);
    };
    let digits = to.strip_prefix("0x").unwrap_or(&to);
    if digits.is_empty() {
        return Ok(None);
    }
    let bytes = hex::decode(digits).map_err(serde::de::Error::custom)?;
    if bytes.len() != Address::len_bytes() {
        return Err(serde::de::Error::custom(format!("invalid address {to}")));
    }
    Ok(Some(Address::from_slice(&bytes)))
}

impl TxInput {
    fn resolved_type(&self) -> u64 {
        if let Some(tx_type) = self.tx_type {
            tx_type
        } else if self.authorization_list.is_some() {
            4
        } else if self.max_fee_per_blob_gas.is_some() || !self.blob_versioned_hashes.is_empty() {
            3
        } else if self.max_fee_per_gas.is_some() {
            2
        } else if !self.access_list.is_empty() {
            1
        } else {
            0
        }
    }

    /// Builds the transaction, signing it when a secret key is present.
    pub fn into_transaction(self, chain_id: u64) -> anyhow::Result<Transaction> {
        let kind = self.to.map_or(TxKind::Create, TxKind::Call);
        let tx_chain_id = self.chain_id.unwrap_or(chain_id);
        let access_list: Vec<(Address, Vec<H256>)> = self
            .access_list
            .iter()
            .map(|entry| (entry.address, entry.storage_keys.clone()))
            .collect();
        let y_parity = self.v.is_some_and(|v| !v.is_zero());
        let (r, s) = (self.r.unwrap_or_default(), self.s.unwrap_or_default());

        let mut tx = match self.resolved_type() {
            0 => Transaction::LegacyTransaction(LegacyTransaction {
                nonce: self.nonce,
                gas_price: self.gas_price.unwrap_or_default(),
                gas: self.gas,
                to: kind,
                value: self.value,
                data: self.input,
                v: self.v.unwrap_or_default(),
                r,
                s,
            }),
            1 => Transaction::EIP2930Transaction(EIP2930Transaction {
                chain_id: tx_chain_id,
                nonce: self.nonce,
                gas_price: self.gas_price.unwrap_or_default(),
                gas_limit: self.gas,
                to: kind,
                value: self.value,
                data: self.input,
                access_list,
                signature_y_parity: y_parity,
                signature_r: r,
                signature_s: s,
            }),
            2 => Transaction::EIP1559Transaction(EIP1559Transaction {
                chain_id: tx_chain_id,
                nonce: self.nonce,
                max_priority_fee_per_gas: self.max_priority_fee_per_gas.unwrap_or_default(),
                max_fee_per_gas: self.max_fee_per_gas.unwrap_or_default(),
                gas_limit: self.gas,
                to: kind,
                value: self.value,
                data: self.input,
                access_list,
                signature_y_parity: y_parity,
                signature_r: r,
                signature_s: s,
            }),
            3 => Transaction::EIP4844Transaction(EIP4844Transaction {
                chain_id: tx_chain_id,
                nonce: self.nonce,
                max_priority_fee_per_gas: self.max_priority_fee_per_gas.unwrap_or_default(),
                max_fee_per_gas: self.max_fee_per_gas.unwrap_or_default(),
                gas: self.gas,
                to: self.to.context("blob transactions cannot create contracts")?,
                value: self.value,
                data: self.input,
                access_list,
                max_fee_per_blob_gas: self.max_fee_per_blob_gas.unwrap_or_default(),
                blob_versioned_hashes: self.blob_versioned_hashes,
                signature_y_parity: y_parity,
                signature_r: r,
                signature_s: s,
            }),
            4 => Transaction::EIP7702Transaction(EIP7702Transaction {
                chain_id: tx_chain_id,
                nonce: self.nonce,
                max_priority_fee_per_gas: self.max_priority_fee_per_gas.unwrap_or_default(),
                max_fee_per_gas: self.max_fee_per_gas.unwrap_or_default(),
                gas_limit: self.gas,
                to: self.to.context("set code transactions cannot create contracts")?,
                value: self.value,
                data: self.input,
                access_list,
                authorization_list: self
                    .authorization_list
                    .unwrap_or_default()
                    .into_iter()
                    .map(AuthorizationInput::into_tuple)
                    .collect::<anyhow::Result<_>>()?,
                signature_y_parity: y_parity,
                signature_r: r,
                signature_s: s,
            }),
            other => bail!("unsupported transaction type {other}"),
        };

        if let Some(secret_key) = self.secret_key {
            let replay_protected = self.protected.unwrap_or(true);
            tx.sign(&secret_key.0, replay_protected.then_some(tx_chain_id))?;
        }
        Ok(tx)
    }
}

/// Reads the transactions input. Accepts a list whose entries are transaction
/// objects, canonical encodings as hex strings or raw RLP field lists, and a
/// single hex string holding the RLP list of every transaction.
pub fn parse_transactions(
    value: serde_json::Value,
    chain_id: u64,
) -> anyhow::Result<Vec<Transaction>> {
    use serde_json::Value;

    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(encoded) => decode_transaction_list(&decode_hex(&encoded)?),
        Value::Array(entries) => entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                parse_transaction(entry, chain_id)
                    .with_context(|| format!("invalid transaction at index {index}"))
            })
            .collect(),
        other => bail!("expected a list of transactions, found {other}"),
    }
}

fn parse_transaction(entry: serde_json::Value, chain_id: u64) -> anyhow::Result<Transaction> {
    use serde_json::Value;

    match entry {
        Value::Object(_) => serde_json::from_value::<TxInput>(entry)?.into_transaction(chain_id),
        Value::String(encoded) => Ok(Transaction::decode_canonical(&decode_hex(&encoded)?)?),
        Value::Array(_) => {
            let mut encoded = Vec::new();
            encode_json_value(&entry, &mut encoded)?;
            Ok(Transaction::decode_canonical(&encoded)?)
        }
        other => bail!("unexpected transaction value {other}"),
    }
}

fn decode_hex(value: &str) -> anyhow::Result<Vec<u8>> {
    Ok(hex::decode(value.strip_prefix("0x").unwrap_or(value))?)
}

/// Splits an RLP list of transactions. Legacy transactions are nested lists,
/// typed ones are byte strings wrapping their canonical encoding.
fn decode_transaction_list(rlp: &[u8]) -> anyhow::Result<Vec<Transaction>> {
    let (is_list, mut payload, rest) = decode_rlp_item(rlp)?;
    ensure!(is_list, "transactions RLP is not a list");
    ensure!(rest.is_empty(), "trailing bytes after the transactions RLP");

    let mut transactions = Vec::new();
    while !payload.is_empty() {
        let (item, remaining) = get_item_with_prefix(payload)?;
        let encoded = match item.first() {
            Some(&prefix) if prefix >= 0xc0 => item,
            _ => decode_bytes(item)?.0,
        };
        transactions.push(Transaction::decode_canonical(encoded)?);
        payload = remaining;
    }
    Ok(transactions)
}
