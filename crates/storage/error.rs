use ethereum_types::{Address, H256};
use keel_rlp::error::RLPDecodeError;
use keel_trie::TrieError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    RLPDecode(#[from] RLPDecodeError),
    #[error(transparent)]
    Trie(#[from] TrieError),
    #[error("Code with hash {0:#x} missing from the store")]
    MissingCode(H256),
    #[error("State root requested while a transaction is still open")]
    OpenTransaction,
    #[error("No transaction to commit or roll back")]
    NoTransaction,
    #[error("Account {0:#x} cannot cover a transfer of its balance")]
    InsufficientBalance(Address),
    #[error("Arithmetic overflow updating account {0:#x}")]
    Overflow(Address),
    #[cfg(feature = "redb")]
    #[error("Redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),
    #[cfg(feature = "redb")]
    #[error("Redb transaction error: {0}")]
    RedbTransaction(#[from] Box<redb::TransactionError>),
    #[cfg(feature = "redb")]
    #[error("Redb table error: {0}")]
    RedbTable(#[from] redb::TableError),
    #[cfg(feature = "redb")]
    #[error("Redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),
    #[cfg(feature = "redb")]
    #[error("Redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),
    #[error("{0}")]
    Custom(String),
}
