use ethereum_types::U256;

pub const WORD_SIZE: usize = 32;
pub const WORD_SIZE_U64: u64 = 32;

pub const STACK_LIMIT: usize = 1024;
pub const STACK_DEPTH_LIMIT: usize = 1024;

pub const SUCCESS: U256 = U256([1, 0, 0, 0]);
pub const FAIL: U256 = U256([0, 0, 0, 0]);

/// EIP-170
pub const MAX_CODE_SIZE: usize = 0x6000;
/// EIP-3860
pub const INIT_CODE_MAX_SIZE: usize = 2 * MAX_CODE_SIZE;
/// EIP-3541
pub const INVALID_CONTRACT_PREFIX: u8 = 0xef;

/// Number of ancestors reachable through `BLOCKHASH`.
pub const BLOCKHASH_WINDOW: u64 = 256;

/// Address of the P256VERIFY precompile (EIP-7951).
pub const P256_VERIFY_ADDRESS: u64 = 0x100;

/// Refund when an authorization targets an account that already exists (EIP-7702).
pub const AUTHORIZATION_EXISTING_ACCOUNT_REFUND: u64 = 25000 - 12500;
