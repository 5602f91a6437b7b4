use std::sync::Arc;

use ethereum_types::H256;
use keel_trie::{TrieDB, TrieError};
use redb::{Database, TableDefinition};

pub(crate) const TRIE_NODES_TABLE: TableDefinition<[u8; 32], &[u8]> =
    TableDefinition::new("TrieNodes");

/// Trie node store backed by a redb table shared by the account and storage tries.
pub struct RedBTrie {
    db: Arc<Database>,
}

impl RedBTrie {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl TrieDB for RedBTrie {
    fn get(&self, hash: H256) -> Result<Option<Vec<u8>>, TrieError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| TrieError::DbError(e.into()))?;
        let table = read_txn
            .open_table(TRIE_NODES_TABLE)
            .map_err(|e| TrieError::DbError(e.into()))?;
        Ok(table
            .get(hash.0)
            .map_err(|e| TrieError::DbError(e.into()))?
            .map(|value| value.value().to_vec()))
    }

    fn put_batch(&self, nodes: Vec<(H256, Vec<u8>)>) -> Result<(), TrieError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| TrieError::DbError(e.into()))?;
        {
            let mut table = write_txn
                .open_table(TRIE_NODES_TABLE)
                .map_err(|e| TrieError::DbError(e.into()))?;
            for (hash, encoded) in nodes {
                table
                    .insert(hash.0, encoded.as_slice())
                    .map_err(|e| TrieError::DbError(e.into()))?;
            }
        }
        write_txn
            .commit()
            .map_err(|e| TrieError::DbError(e.into()))
    }
}
