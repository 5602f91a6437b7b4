use keel_rlp::error::RLPDecodeError;
use thiserror::Error;

use crate::NodeHash;

#[derive(Debug, Error)]
pub enum TrieError {
    #[error(transparent)]
    RLPDecode(#[from] RLPDecodeError),
    #[error("Inconsistent internal tree structure")]
    InconsistentTree,
    #[error("Node {0:?} missing from the trie database")]
    MissingNode(NodeHash),
    #[error("Lock Error: Panicked when trying to acquire a lock")]
    LockError,
    #[error("Database error: {0}")]
    DbError(anyhow::Error),
    #[error("Invalid trie input")]
    InvalidInput,
}
