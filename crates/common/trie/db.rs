use crate::error::TrieError;
use ethereum_types::H256;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

/// Storage for encoded trie nodes, keyed by the hash of their encoding.
pub trait TrieDB: Send + Sync {
    fn get(&self, hash: H256) -> Result<Option<Vec<u8>>, TrieError>;
    fn put_batch(&self, nodes: Vec<(H256, Vec<u8>)>) -> Result<(), TrieError>;
    fn put(&self, hash: H256, encoded: Vec<u8>) -> Result<(), TrieError> {
        self.put_batch(vec![(hash, encoded)])
    }
}

/// InMemory implementation for the TrieDB trait, with get and put operations.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTrieDB {
    inner: Arc<Mutex<BTreeMap<H256, Vec<u8>>>>,
}

impl InMemoryTrieDB {
    pub const fn new(map: Arc<Mutex<BTreeMap<H256, Vec<u8>>>>) -> Self {
        Self { inner: map }
    }

    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Amount of stored nodes.
    pub fn len(&self) -> Result<usize, TrieError> {
        Ok(self.inner.lock().map_err(|_| TrieError::LockError)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, TrieError> {
        Ok(self.len()? == 0)
    }
}

impl TrieDB for InMemoryTrieDB {
    fn get(&self, hash: H256) -> Result<Option<Vec<u8>>, TrieError> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| TrieError::LockError)?
            .get(&hash)
            .cloned())
    }

    fn put_batch(&self, nodes: Vec<(H256, Vec<u8>)>) -> Result<(), TrieError> {
        let mut db = self.inner.lock().map_err(|_| TrieError::LockError)?;
        db.extend(nodes);
        Ok(())
    }
}
