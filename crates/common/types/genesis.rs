use bytes::Bytes;
use ethereum_types::{Address, Bloom, H256, U256};
use keel_crypto::keccak::keccak_hash;
use keel_rlp::encode::RLPEncode;
use keel_trie::Trie;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    io::{BufReader, Error},
    path::Path,
};
use tracing::debug;

use super::{
    AccountState, Block, BlockBody, BlockHeader, compute_receipts_root, compute_transactions_root,
    compute_withdrawals_root,
};
use crate::constants::{DEFAULT_OMMERS_HASH, DEFAULT_REQUESTS_HASH, GAS_PER_BLOB, INITIAL_BASE_FEE};

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Genesis {
    /// Chain configuration
    pub config: ChainConfig,
    /// The initial state of the accounts in the genesis block.
    pub alloc: BTreeMap<Address, GenesisAccount>,
    /// Genesis header values
    #[serde(default)]
    pub coinbase: Address,
    #[serde(default)]
    pub difficulty: U256,
    #[serde(default, with = "crate::serde_utils::bytes")]
    pub extra_data: Bytes,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub gas_limit: u64,
    #[serde(default, with = "crate::serde_utils::u64::hex_str")]
    pub nonce: u64,
    #[serde(default, alias = "mixHash", alias = "mixhash")]
    pub mix_hash: H256,
    #[serde(default, with = "crate::serde_utils::u64::hex_or_dec_str")]
    pub timestamp: u64,
    #[serde(default)]
    pub parent_hash: H256,
    #[serde(default, with = "crate::serde_utils::u64::hex_str_opt")]
    pub base_fee_per_gas: Option<u64>,
    #[serde(default, with = "crate::serde_utils::u64::hex_str_opt")]
    pub blob_gas_used: Option<u64>,
    #[serde(default, with = "crate::serde_utils::u64::hex_str_opt")]
    pub excess_blob_gas: Option<u64>,
    #[serde(default)]
    pub requests_hash: Option<H256>,
}

#[derive(Debug, thiserror::Error)]
pub enum GenesisError {
    #[error("Failed to decode genesis file: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Failed to open genesis file: {0}")]
    File(#[from] Error),
}

impl TryFrom<&Path> for Genesis {
    type Error = GenesisError;

    fn try_from(genesis_file_path: &Path) -> Result<Self, Self::Error> {
        let genesis_file = std::fs::File::open(genesis_file_path)?;
        let genesis: Genesis = serde_json::from_reader(BufReader::new(genesis_file))?;
        debug!(
            path = %genesis_file_path.display(),
            accounts = genesis.alloc.len(),
            "Loaded genesis file"
        );
        Ok(genesis)
    }
}

/// Protocol upgrades, in activation order.
#[repr(u8)]
#[derive(
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Default,
    Hash,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
)]
pub enum Fork {
    Frontier = 0,
    Homestead = 1,
    #[strum(to_string = "TangerineWhistle", serialize = "EIP150")]
    TangerineWhistle = 2,
    #[strum(to_string = "SpuriousDragon", serialize = "EIP158")]
    SpuriousDragon = 3,
    Byzantium = 4,
    Constantinople = 5,
    #[strum(to_string = "Petersburg", serialize = "ConstantinopleFix")]
    Petersburg = 6,
    Istanbul = 7,
    Berlin = 8,
    London = 9,
    #[strum(to_string = "Paris", serialize = "Merge")]
    Paris = 10,
    Shanghai = 11,
    #[default]
    Cancun = 12,
    Prague = 13,
    Osaka = 14,
}

/// Blob limits of a fork, counted in blobs (EIP-4844, EIP-7691).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForkBlobSchedule {
    pub target: u64,
    pub max: u64,
    pub base_fee_update_fraction: u64,
}

impl ForkBlobSchedule {
    pub const fn target_blob_gas(&self) -> u64 {
        self.target * GAS_PER_BLOB
    }

    pub const fn max_blob_gas(&self) -> u64 {
        self.max * GAS_PER_BLOB
    }
}

impl Fork {
    /// Blob schedule in force during this fork. Forks before Cancun get Cancun's.
    pub const fn blob_schedule(self) -> ForkBlobSchedule {
        match self {
            Fork::Prague | Fork::Osaka => ForkBlobSchedule {
                target: 6,
                max: 9,
                base_fee_update_fraction: 5_007_716,
            },
            _ => ForkBlobSchedule {
                target: 3,
                max: 6,
                base_fee_update_fraction: 3_338_477,
            },
        }
    }
}

/// Blockchain settings defined per block, in the geth genesis layout.
/// Block based forks activate by number, later ones by timestamp.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// Current chain identifier
    pub chain_id: u64,

    pub homestead_block: Option<u64>,
    #[serde(rename = "eip150Block")]
    pub eip150_block: Option<u64>,
    #[serde(rename = "eip155Block")]
    pub eip155_block: Option<u64>,
    #[serde(rename = "eip158Block")]
    pub eip158_block: Option<u64>,
    pub byzantium_block: Option<u64>,
    pub constantinople_block: Option<u64>,
    pub petersburg_block: Option<u64>,
    pub istanbul_block: Option<u64>,
    pub berlin_block: Option<u64>,
    pub london_block: Option<u64>,
    pub merge_netsplit_block: Option<u64>,

    pub shanghai_time: Option<u64>,
    pub cancun_time: Option<u64>,
    pub prague_time: Option<u64>,
    pub osaka_time: Option<u64>,

    /// Amount of total difficulty reached by the network that triggers the consensus upgrade.
    pub terminal_total_difficulty: Option<u128>,
    /// Network has already passed the terminal total difficulty
    #[serde(default)]
    pub terminal_total_difficulty_passed: bool,
}

impl ChainConfig {
    /// A configuration where every fork up to `fork` is active from genesis.
    pub fn for_fork(fork: Fork, chain_id: u64) -> Self {
        let at_genesis = |f: Fork| (fork >= f).then_some(0);
        ChainConfig {
            chain_id,
            homestead_block: at_genesis(Fork::Homestead),
            eip150_block: at_genesis(Fork::TangerineWhistle),
            eip155_block: at_genesis(Fork::SpuriousDragon),
            eip158_block: at_genesis(Fork::SpuriousDragon),
            byzantium_block: at_genesis(Fork::Byzantium),
            constantinople_block: at_genesis(Fork::Constantinople),
            petersburg_block: at_genesis(Fork::Petersburg),
            istanbul_block: at_genesis(Fork::Istanbul),
            berlin_block: at_genesis(Fork::Berlin),
            london_block: at_genesis(Fork::London),
            merge_netsplit_block: at_genesis(Fork::Paris),
            shanghai_time: at_genesis(Fork::Shanghai),
            cancun_time: at_genesis(Fork::Cancun),
            prague_time: at_genesis(Fork::Prague),
            osaka_time: at_genesis(Fork::Osaka),
            terminal_total_difficulty: (fork >= Fork::Paris).then_some(0),
            terminal_total_difficulty_passed: fork >= Fork::Paris,
        }
    }

    fn is_merged(&self, block_number: u64) -> bool {
        self.terminal_total_difficulty_passed
            || self.terminal_total_difficulty == Some(0)
            || self
                .merge_netsplit_block
                .is_some_and(|block| block <= block_number)
    }

    /// Fork active for a block with the given number and timestamp.
    pub fn fork(&self, block_number: u64, block_timestamp: u64) -> Fork {
        let at_time = |activation: Option<u64>| activation.is_some_and(|t| t <= block_timestamp);
        let by_time = [
            (self.osaka_time, Fork::Osaka),
            (self.prague_time, Fork::Prague),
            (self.cancun_time, Fork::Cancun),
            (self.shanghai_time, Fork::Shanghai),
        ];
        if let Some((_, fork)) = by_time.into_iter().find(|(time, _)| at_time(*time)) {
            return fork;
        }
        if self.is_merged(block_number) && self.london_block.is_some() {
            return Fork::Paris;
        }
        let by_number = [
            (self.london_block, Fork::London),
            (self.berlin_block, Fork::Berlin),
            (self.istanbul_block, Fork::Istanbul),
            (self.petersburg_block, Fork::Petersburg),
            (self.constantinople_block, Fork::Constantinople),
            (self.byzantium_block, Fork::Byzantium),
            (self.eip158_block, Fork::SpuriousDragon),
            (self.eip150_block, Fork::TangerineWhistle),
            (self.homestead_block, Fork::Homestead),
        ];
        by_number
            .into_iter()
            .find(|(activation, _)| activation.is_some_and(|block| block <= block_number))
            .map(|(_, fork)| fork)
            .unwrap_or(Fork::Frontier)
    }

    pub fn is_fork_activated(&self, fork: Fork, block_number: u64, block_timestamp: u64) -> bool {
        self.fork(block_number, block_timestamp) >= fork
    }

    /// Whether transactions in this block may carry an EIP-155 chain id.
    pub fn is_eip155_activated(&self, block_number: u64) -> bool {
        self.eip155_block.is_some_and(|block| block <= block_number)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct GenesisAccount {
    #[serde(default, with = "crate::serde_utils::bytes")]
    pub code: Bytes,
    #[serde(default, with = "crate::serde_utils::u256::storage_map")]
    pub storage: BTreeMap<U256, U256>,
    #[serde(with = "crate::serde_utils::u256::hex_or_dec_str")]
    pub balance: U256,
    #[serde(default, with = "crate::serde_utils::u64::hex_or_dec_str")]
    pub nonce: u64,
}

impl GenesisAccount {
    /// Root of the secure storage trie, zero slots left out.
    pub fn storage_root(&self) -> H256 {
        let mut trie = Trie::new_secure();
        for (key, value) in self.storage.iter().filter(|(_, value)| !value.is_zero()) {
            trie.insert(key.to_big_endian().to_vec(), value.encode_to_vec());
        }
        trie.hash()
    }
}

impl Genesis {
    /// Reads a genesis file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GenesisError> {
        Genesis::try_from(path.as_ref())
    }

    /// Accounts of the initial state, as leaf values of the account trie.
    pub fn state_accounts(&self) -> BTreeMap<Address, AccountState> {
        self.alloc
            .iter()
            .map(|(address, account)| (*address, AccountState::from(account)))
            .collect()
    }

    pub fn compute_state_root(&self) -> H256 {
        let mut trie = Trie::new(false);
        for (address, account) in self.state_accounts() {
            trie.insert(keccak_hash(address).to_vec(), account.encode_to_vec());
        }
        trie.hash()
    }

    pub fn get_block(&self) -> Block {
        Block::new(self.get_block_header(), self.get_block_body())
    }

    fn get_block_header(&self) -> BlockHeader {
        let fork = self.config.fork(0, self.timestamp);
        let (blob_gas_used, excess_blob_gas) = if fork >= Fork::Cancun {
            (
                Some(self.blob_gas_used.unwrap_or(0)),
                Some(self.excess_blob_gas.unwrap_or(0)),
            )
        } else {
            (None, None)
        };

        BlockHeader {
            parent_hash: self.parent_hash,
            ommers_hash: DEFAULT_OMMERS_HASH,
            coinbase: self.coinbase,
            state_root: self.compute_state_root(),
            transactions_root: compute_transactions_root(&[]),
            receipts_root: compute_receipts_root(&[]),
            logs_bloom: Bloom::zero(),
            difficulty: self.difficulty,
            number: 0,
            gas_limit: self.gas_limit,
            gas_used: 0,
            timestamp: self.timestamp,
            extra_data: self.extra_data.clone(),
            prev_randao: self.mix_hash,
            nonce: self.nonce,
            base_fee_per_gas: (fork >= Fork::London)
                .then(|| self.base_fee_per_gas.unwrap_or(INITIAL_BASE_FEE)),
            withdrawals_root: (fork >= Fork::Shanghai).then(|| compute_withdrawals_root(&[])),
            blob_gas_used,
            excess_blob_gas,
            parent_beacon_block_root: (fork >= Fork::Cancun).then_some(H256::zero()),
            requests_hash: (fork >= Fork::Prague)
                .then(|| self.requests_hash.unwrap_or(DEFAULT_REQUESTS_HASH)),
        }
    }

    fn get_block_body(&self) -> BlockBody {
        let withdrawals = (self.config.fork(0, self.timestamp) >= Fork::Shanghai).then(Vec::new);
        BlockBody {
            withdrawals,
            ..BlockBody::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EMPTY_TRIE_HASH;
    use hex_literal::hex;
    use std::str::FromStr;

    const GENESIS: &str = r#"{
        "config": {
            "chainId": 1,
            "homesteadBlock": 0,
            "eip150Block": 0,
            "eip155Block": 0,
            "eip158Block": 0,
            "byzantiumBlock": 0,
            "constantinopleBlock": 0,
            "petersburgBlock": 0,
            "istanbulBlock": 0,
            "berlinBlock": 0,
            "londonBlock": 0,
            "terminalTotalDifficulty": 0,
            "shanghaiTime": 0,
            "cancunTime": 100
        },
        "alloc": {
            "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b": {
                "balance": "0x0de0b6b3a7640000"
            },
            "0x1000000000000000000000000000000000000000": {
                "balance": "0",
                "nonce": "0x01",
                "code": "0x6001600055",
                "storage": { "0x00": "0x01", "0x01": "0x00" }
            }
        },
        "coinbase": "0x2adc25665018aa1fe0e6bc666dac8fc2697ff9ba",
        "difficulty": "0x0",
        "gasLimit": "0x1c9c380",
        "nonce": "0x0",
        "mixHash": "0x0000000000000000000000000000000000000000000000000000000000000000",
        "timestamp": "0x0"
    }"#;

    #[test]
    fn deserialize_genesis() {
        let genesis: Genesis = serde_json::from_str(GENESIS).unwrap();
        assert_eq!(genesis.config.chain_id, 1);
        assert_eq!(genesis.config.cancun_time, Some(100));
        assert_eq!(genesis.gas_limit, 30_000_000);
        assert_eq!(genesis.alloc.len(), 2);

        let contract = &genesis.alloc
            [&Address::from_str("0x1000000000000000000000000000000000000000").unwrap()];
        assert_eq!(contract.nonce, 1);
        assert_eq!(contract.code, Bytes::from_static(&hex!("6001600055")));
        assert_eq!(contract.storage.get(&U256::zero()), Some(&U256::one()));
    }

    #[test]
    fn genesis_block_shape() {
        let genesis: Genesis = serde_json::from_str(GENESIS).unwrap();
        let block = genesis.get_block();
        let header = &block.header;
        assert_eq!(header.number, 0);
        assert_eq!(header.base_fee_per_gas, Some(INITIAL_BASE_FEE));
        assert_eq!(header.withdrawals_root, Some(*EMPTY_TRIE_HASH));
        // cancun activates after genesis
        assert_eq!(header.blob_gas_used, None);
        assert_eq!(header.parent_beacon_block_root, None);
        assert_eq!(block.body.withdrawals, Some(vec![]));
        assert_ne!(header.state_root, *EMPTY_TRIE_HASH);
    }

    #[test]
    fn state_root_ignores_zero_slots() {
        let account = GenesisAccount {
            storage: BTreeMap::from([(U256::one(), U256::zero())]),
            ..Default::default()
        };
        assert_eq!(account.storage_root(), *EMPTY_TRIE_HASH);
    }

    #[test]
    fn single_account_state_root() {
        // one account with balance 1 and nothing else
        let genesis = Genesis {
            alloc: BTreeMap::from([(
                Address::from(hex!("a94f5374fce5edbc8e2a8697c15331677e6ebf0b")),
                GenesisAccount {
                    balance: U256::one(),
                    ..Default::default()
                },
            )]),
            ..Default::default()
        };
        let mut trie = Trie::new_secure();
        trie.insert(
            hex!("a94f5374fce5edbc8e2a8697c15331677e6ebf0b").to_vec(),
            AccountState {
                balance: U256::one(),
                ..Default::default()
            }
            .encode_to_vec(),
        );
        assert_eq!(genesis.compute_state_root(), trie.hash());
    }

    #[test]
    fn forks_by_number_and_time() {
        let config = ChainConfig {
            homestead_block: Some(5),
            byzantium_block: Some(10),
            london_block: Some(20),
            merge_netsplit_block: Some(30),
            shanghai_time: Some(1000),
            ..Default::default()
        };
        assert_eq!(config.fork(0, 0), Fork::Frontier);
        assert_eq!(config.fork(5, 0), Fork::Homestead);
        assert_eq!(config.fork(12, 0), Fork::Byzantium);
        assert_eq!(config.fork(25, 0), Fork::London);
        assert_eq!(config.fork(30, 0), Fork::Paris);
        assert_eq!(config.fork(31, 1000), Fork::Shanghai);
        assert!(config.is_fork_activated(Fork::Berlin, 25, 0));

        let config = ChainConfig {
            prague_time: Some(2000),
            osaka_time: Some(3000),
            ..config
        };
        assert_eq!(config.fork(40, 1999), Fork::Shanghai);
        assert_eq!(config.fork(40, 2000), Fork::Prague);
        assert_eq!(config.fork(40, 3500), Fork::Osaka);
    }

    #[test]
    fn config_for_fork() {
        for fork in [
            Fork::Frontier,
            Fork::Istanbul,
            Fork::Paris,
            Fork::Cancun,
            Fork::Prague,
            Fork::Osaka,
        ] {
            assert_eq!(ChainConfig::for_fork(fork, 1).fork(0, 0), fork);
        }
    }

    #[test]
    fn fork_names() {
        assert_eq!(Fork::from_str("ConstantinopleFix").unwrap(), Fork::Petersburg);
        assert_eq!(Fork::from_str("Merge").unwrap(), Fork::Paris);
        assert_eq!(Fork::from_str("Cancun").unwrap(), Fork::Cancun);
        assert_eq!(Fork::SpuriousDragon.to_string(), "SpuriousDragon");
        assert_eq!(Fork::from_str("Prague").unwrap(), Fork::Prague);
        assert_eq!(Fork::Osaka.to_string(), "Osaka");
        assert!(Fork::from_str("Amsterdam").is_err());
    }

    #[test]
    fn blob_schedule_grows_with_prague() {
        assert_eq!(Fork::Cancun.blob_schedule().max_blob_gas(), 6 * GAS_PER_BLOB);
        assert_eq!(Fork::Prague.blob_schedule().target, 6);
        assert_eq!(Fork::Osaka.blob_schedule(), Fork::Prague.blob_schedule());
    }

    #[test]
    fn prague_genesis_carries_the_empty_requests_hash() {
        let genesis = Genesis {
            config: ChainConfig::for_fork(Fork::Prague, 1),
            ..Default::default()
        };
        let header = genesis.get_block().header;
        assert_eq!(header.requests_hash, Some(DEFAULT_REQUESTS_HASH));

        let genesis = Genesis {
            config: ChainConfig::for_fork(Fork::Cancun, 1),
            ..Default::default()
        };
        assert_eq!(genesis.get_block().header.requests_hash, None);
    }
}
