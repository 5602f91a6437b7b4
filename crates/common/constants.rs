use ethereum_types::{Address, H160, H256};
use hex_literal::hex;

pub use keel_trie::EMPTY_TRIE_HASH;

/// keccak256 of the empty byte string, the code hash of accounts without code.
pub const EMPTY_KECCAK_HASH: H256 = H256(hex!(
    "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
));

/// keccak256(rlp([])), the ommers hash of blocks without ommers.
pub const DEFAULT_OMMERS_HASH: H256 = H256(hex!(
    "1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347"
));

// === Header limits ===

pub const MAX_EXTRA_DATA_SIZE: usize = 32;
pub const GAS_LIMIT_ADJUSTMENT_FACTOR: u64 = 1024;
pub const GAS_LIMIT_MINIMUM: u64 = 5000;

// === EIP-1559 constants ===

pub const INITIAL_BASE_FEE: u64 = 1_000_000_000;
pub const ELASTICITY_MULTIPLIER: u64 = 2;
pub const BASE_FEE_MAX_CHANGE_DENOMINATOR: u64 = 8;

// === EIP-4844 constants ===

/// Gas consumption of a single data blob (== blob byte size).
pub const GAS_PER_BLOB: u64 = 1 << 17;
// Minimum base fee per blob
pub const MIN_BASE_FEE_PER_BLOB_GAS: u64 = 1;
/// Blob gas priced against the execution base fee (EIP-7918).
pub const BLOB_BASE_COST: u64 = 1 << 13;
/// Blobs a single transaction may carry since Osaka (EIP-7594).
pub const MAX_BLOBS_PER_TX: u64 = 6;

// === System contracts ===

pub const SYSTEM_ADDRESS: Address = H160(hex!("fffffffffffffffffffffffffffffffffffffffe"));
pub const SYSTEM_CALL_GAS_LIMIT: u64 = 30_000_000;
pub const BEACON_ROOTS_ADDRESS: Address = H160(hex!("000F3df6D732807Ef1319fB7B8bB8522d0Beac02"));
pub const HISTORY_STORAGE_ADDRESS: Address =
    H160(hex!("0000F90827F1C53a10cb7A02335B175320002935"));
pub const WITHDRAWAL_REQUEST_PREDEPLOY_ADDRESS: Address =
    H160(hex!("00000961Ef480Eb55e80D19ad83579A64c007002"));
pub const CONSOLIDATION_REQUEST_PREDEPLOY_ADDRESS: Address =
    H160(hex!("0000BBdDc7CE488642fb579F8B00f3a590007251"));

// === EIP-6110 / EIP-7685 constants ===

pub const DEPOSIT_CONTRACT_ADDRESS: Address =
    H160(hex!("00000000219ab540356cbb839cbe05303d7705fa"));
/// keccak256("DepositEvent(bytes,bytes,bytes,bytes,bytes)")
pub const DEPOSIT_EVENT_TOPIC: H256 = H256(hex!(
    "649bbc62d0e31342afea4e5cd82d4049e7e1ee912fc0889aa790803be39038c5"
));
/// sha256 of the empty string, the requests hash of a block without requests.
pub const DEFAULT_REQUESTS_HASH: H256 = H256(hex!(
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
));

// === EIP-7702 constants ===

/// Code prefix of an account delegating to another one.
pub const DELEGATION_PREFIX: [u8; 3] = [0xef, 0x01, 0x00];
/// First byte of the authorization signing payload.
pub const SET_CODE_AUTHORIZATION_MAGIC: u8 = 0x05;

// === EIP-7825 constants ===

/// Highest gas limit a transaction may declare since Osaka.
pub const TX_MAX_GAS_LIMIT: u64 = 1 << 24;
