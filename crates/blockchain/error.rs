use ethereum_types::{Address, H256, U256};
use keel_common::types::{DepositError, TxType};
use keel_crypto::CryptoError;
use keel_storage::StoreError;
use keel_vm::VMError;

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid Block: {0}")]
    InvalidBlock(#[from] InvalidBlockError),
    #[error("Invalid Transaction: {0}")]
    InvalidTransaction(#[from] InvalidTransaction),
    #[error("DB error: {0}")]
    StoreError(#[from] StoreError),
    #[error("EVM error: {0}")]
    EvmError(#[from] VMError),
    #[error("{0}")]
    Custom(String),
}

/// Reasons a transaction cannot be included in a block.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTransaction {
    #[error("Nonce mismatch: expected {expected}, got {actual}")]
    NonceMismatch { expected: u64, actual: u64 },
    #[error("Sender nonce is already at its maximum")]
    NonceIsMax,
    #[error("Sender {sender:#x} has balance {balance}, needs {required}")]
    InsufficientAccountFunds {
        sender: Address,
        balance: U256,
        required: U256,
    },
    #[error("Intrinsic gas {intrinsic} exceeds the gas limit {gas_limit}")]
    IntrinsicGasTooLow { intrinsic: u64, gas_limit: u64 },
    #[error("Priority fee is greater than the max fee per gas")]
    PriorityFeeGreaterThanMaxFee,
    #[error("Max fee per gas is below the block base fee")]
    MaxFeeBelowBaseFee,
    #[error("Gas limit {gas_limit} exceeds the {available} gas left in the block")]
    GasAllowanceExceeded { gas_limit: u64, available: u64 },
    #[error("Sender {0:#x} has deployed code")]
    SenderNotEoa(Address),
    #[error("Invalid signature: {0}")]
    InvalidSignature(#[from] CryptoError),
    #[error("Transaction type {0:?} is not active in this fork")]
    UnsupportedTxType(TxType),
    #[error("Init code of {0} bytes exceeds the limit")]
    InitCodeTooLarge(usize),
    #[error("Transaction chain id {actual} does not match {expected}")]
    ChainIdMismatch { expected: u64, actual: u64 },
    #[error("Blob transaction carries no blobs")]
    NoBlobs,
    #[error("Blob versioned hash {0:#x} has an unsupported version")]
    InvalidBlobVersionedHash(H256),
    #[error("Max fee per blob gas is below the blob base fee")]
    InsufficientMaxFeePerBlobGas,
    #[error("Blob gas of the transaction exceeds the block limit")]
    BlobGasLimitExceeded,
    #[error("Transaction carries {0} blobs, more than allowed per transaction")]
    TooManyBlobs(usize),
    #[error("Gas limit {0} exceeds the per transaction cap")]
    GasLimitAboveCap(u64),
    #[error("Set code transaction has an empty authorization list")]
    EmptyAuthorizationList,
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidBlockError {
    #[error("World State Root does not match the one in the header after executing")]
    StateRootMismatch { expected: H256, computed: H256 },
    #[error("Receipts Root does not match the one in the header after executing")]
    ReceiptsRootMismatch,
    #[error("Gas used {computed} does not match the header value {expected}")]
    GasUsedMismatch { expected: u64, computed: u64 },
    #[error("Logs bloom does not match the one in the header after executing")]
    BloomMismatch,
    #[error("Blob gas used doesn't match value in header")]
    BlobGasUsedMismatch,
    #[error("Blob gas used exceeds the maximum of the fork")]
    ExceededMaxBlobGasPerBlock,
    #[error("Requests hash does not match the header")]
    RequestsHashMismatch,
    #[error("Invalid deposit log: {0}")]
    InvalidDepositLog(#[from] DepositError),
    #[error("System contract {0:#x} has no code")]
    SystemContractEmpty(Address),
    #[error("System call to {0:#x} failed")]
    SystemCallFailed(Address),
    #[error("Transactions root does not match the header")]
    TransactionsRootMismatch,
    #[error("Ommers hash does not match the header")]
    OmmersHashMismatch,
    #[error("Withdrawals root does not match the header")]
    WithdrawalsRootMismatch,
    #[error("Invalid header: {0}")]
    InvalidHeader(#[from] InvalidBlockHeaderError),
    #[error("Invalid ommer {0:#x}: {1}")]
    InvalidOmmer(H256, InvalidOmmerError),
    #[error("Parent block is not among the given ancestors")]
    MissingParent,
    #[error("Invalid transaction {0}: {1}")]
    InvalidTransaction(usize, InvalidTransaction),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidBlockHeaderError {
    #[error("Block number is not the parent number plus one")]
    NumberMismatch,
    #[error("Parent hash does not match the parent header")]
    ParentHashMismatch,
    #[error("Timestamp is not greater than the parent timestamp")]
    TimestampNotIncreasing,
    #[error("Gas limit is outside the range allowed by the parent")]
    GasLimitOutOfBounds,
    #[error("Gas used exceeds the gas limit")]
    GasUsedExceedsGasLimit,
    #[error("Extra data is longer than 32 bytes")]
    ExtraDataTooLong,
    #[error("Base fee per gas does not follow EIP-1559")]
    BaseFeeMismatch,
    #[error("Base fee per gas present before London")]
    UnexpectedBaseFee,
    #[error("Difficulty, nonce or ommers set after the merge")]
    PostMergeProofOfWorkFields,
    #[error("Block has more than two ommers")]
    TooManyOmmers,
    #[error("Excess blob gas does not follow EIP-4844")]
    ExcessBlobGasMismatch,
    #[error("Blob gas fields missing after Cancun or present before it")]
    BlobGasFieldsMismatch,
    #[error("Withdrawals missing after Shanghai or present before it")]
    WithdrawalsMismatch,
    #[error("Parent beacon block root missing after Cancun or present before it")]
    ParentBeaconBlockRootMismatch,
    #[error("Requests hash missing after Prague or present before it")]
    RequestsHashFieldMismatch,
}

/// Reasons an ommer header cannot be included in a block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidOmmerError {
    #[error("Ommer number {ommer} is not between one and six below the block number {block}")]
    NumberOutOfRange { ommer: u64, block: u64 },
    #[error("Ommer is included twice")]
    Duplicate,
    #[error("Ommer is the block itself or one of its ancestors")]
    IsAncestor,
    #[error("Ommer was already included by a recent ancestor")]
    AlreadyIncluded,
    #[error("Ommer parent is not a recent ancestor")]
    ParentNotAncestor,
    #[error("Ommer is a sibling of the block")]
    IsSibling,
    #[error("Invalid ommer header: {0}")]
    InvalidHeader(#[from] InvalidBlockHeaderError),
}
