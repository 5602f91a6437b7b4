use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use keel_common::{constants::EMPTY_KECCAK_HASH, types::AccountState};
use keel_rlp::{decode::RLPDecode, encode::RLPEncode};
use keel_trie::Trie;

use crate::error::StoreError;
use crate::state_backend::{
    StateBackend, StateUpdate, decode_slot, set_slot, update_code, updated_account_state,
};

/// Backend keeping the secure account trie, one storage trie per account and the
/// code map in memory.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    state_trie: Trie,
    storage_tries: BTreeMap<Address, Trie>,
    codes: HashMap<H256, Bytes>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self {
            state_trie: Trie::new_secure(),
            storage_tries: BTreeMap::new(),
            codes: HashMap::new(),
        }
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateBackend for InMemoryBackend {
    fn account(&self, address: &Address) -> Result<Option<AccountState>, StoreError> {
        self.state_trie
            .get(address.as_bytes())
            .map(|encoded| AccountState::decode(encoded))
            .transpose()
            .map_err(StoreError::from)
    }

    fn code(&self, code_hash: &H256) -> Result<Option<Bytes>, StoreError> {
        if *code_hash == EMPTY_KECCAK_HASH {
            return Ok(Some(Bytes::new()));
        }
        Ok(self.codes.get(code_hash).cloned())
    }

    fn storage(&self, address: &Address, key: &H256) -> Result<U256, StoreError> {
        match self
            .storage_tries
            .get(address)
            .and_then(|trie| trie.get(key.as_bytes()))
        {
            Some(encoded) => decode_slot(encoded),
            None => Ok(U256::zero()),
        }
    }

    fn storage_entries(&self, address: &Address) -> Result<Vec<(H256, U256)>, StoreError> {
        let Some(trie) = self.storage_tries.get(address) else {
            return Ok(Vec::new());
        };
        let mut entries = trie
            .iter()
            .map(|(key, value)| Ok((H256::from_slice(key), decode_slot(value)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        entries.sort_unstable_by_key(|(key, _)| *key);
        Ok(entries)
    }

    fn commit(&mut self, update: StateUpdate) -> Result<H256, StoreError> {
        for update in update.updates {
            let address = update.address;
            if update.removed {
                self.state_trie.remove(address.as_bytes());
                self.storage_tries.remove(&address);
                continue;
            }
            let storage_root = {
                let trie = self
                    .storage_tries
                    .entry(address)
                    .or_insert_with(Trie::new_secure);
                if update.removed_storage {
                    *trie = Trie::new_secure();
                }
                for (key, value) in &update.added_storage {
                    set_slot(trie, *key, *value);
                }
                trie.hash()
            };
            if self
                .storage_tries
                .get(&address)
                .is_some_and(|trie| trie.is_empty())
            {
                self.storage_tries.remove(&address);
            }
            if let Some((hash, code)) = update_code(&update) {
                self.codes.insert(hash, code);
            }
            let previous = self.account(&address)?;
            let state = updated_account_state(&update, previous, storage_root);
            self.state_trie
                .insert(address.as_bytes().to_vec(), state.encode_to_vec());
        }
        Ok(self.state_trie.hash())
    }

    fn state_root(&self) -> Result<H256, StoreError> {
        Ok(self.state_trie.hash())
    }

    fn accounts(&self) -> Result<Vec<(Address, AccountState)>, StoreError> {
        let mut accounts = self
            .state_trie
            .iter()
            .map(|(key, value)| Ok((Address::from_slice(key), AccountState::decode(value)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        accounts.sort_unstable_by_key(|(address, _)| *address);
        Ok(accounts)
    }
}
