//! # State Storage Backend
//!
//! The boundary between the transactional [`WorldState`](crate::WorldState) and the
//! place where committed accounts, storage and code live. A backend only ever sees
//! finished changes, batched into a [`StateUpdate`], and answers with the new state
//! root computed through the secure account and storage tries.

use std::collections::BTreeMap;
use std::fmt::Debug;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use keel_common::types::{AccountState, code_hash};
use keel_rlp::{decode::RLPDecode, encode::RLPEncode};
use keel_trie::Trie;

use crate::error::StoreError;

/// Account fields that do not depend on storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountInfo {
    pub nonce: u64,
    pub balance: U256,
    pub code_hash: H256,
}

impl AccountInfo {
    pub fn into_state(self, storage_root: H256) -> AccountState {
        AccountState {
            nonce: self.nonce,
            balance: self.balance,
            storage_root,
            code_hash: self.code_hash,
        }
    }
}

/// Changes to a single account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountUpdate {
    pub address: Address,
    /// The account and all of its storage are gone.
    pub removed: bool,
    pub info: Option<AccountInfo>,
    /// New code, stored under `info.code_hash`.
    pub code: Option<Bytes>,
    /// Written slots. A zero value deletes the slot.
    pub added_storage: BTreeMap<H256, U256>,
    /// Storage is wiped before `added_storage` is applied.
    pub removed_storage: bool,
}

impl AccountUpdate {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    pub fn removed(address: Address) -> Self {
        Self {
            address,
            removed: true,
            ..Default::default()
        }
    }
}

/// State update batch, applied atomically by [`StateBackend::commit`].
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub updates: Vec<AccountUpdate>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, update: AccountUpdate) {
        self.updates.push(update);
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Committed world state.
pub trait StateBackend: Debug + Send {
    fn account(&self, address: &Address) -> Result<Option<AccountState>, StoreError>;

    fn code(&self, code_hash: &H256) -> Result<Option<Bytes>, StoreError>;

    /// Value of a storage slot, zero when unset.
    fn storage(&self, address: &Address, key: &H256) -> Result<U256, StoreError>;

    /// Every non-zero slot of an account, ordered by key.
    fn storage_entries(&self, address: &Address) -> Result<Vec<(H256, U256)>, StoreError>;

    /// Applies `update` and returns the resulting state root.
    fn commit(&mut self, update: StateUpdate) -> Result<H256, StoreError>;

    fn state_root(&self) -> Result<H256, StoreError>;

    /// Every account in the state, ordered by address.
    fn accounts(&self) -> Result<Vec<(Address, AccountState)>, StoreError>;
}

/// Storage trie of an account, built from its slots.
pub(crate) fn storage_trie(entries: impl IntoIterator<Item = (H256, U256)>) -> Trie {
    let mut trie = Trie::new_secure();
    for (key, value) in entries {
        set_slot(&mut trie, key, value);
    }
    trie
}

pub(crate) fn set_slot(trie: &mut Trie, key: H256, value: U256) {
    if value.is_zero() {
        trie.remove(key.as_bytes());
    } else {
        trie.insert(key.as_bytes().to_vec(), value.encode_to_vec());
    }
}

pub(crate) fn decode_slot(encoded: &[u8]) -> Result<U256, StoreError> {
    Ok(U256::decode(encoded)?)
}

/// Account state resulting from `update`, given the previous state and the new storage root.
pub(crate) fn updated_account_state(
    update: &AccountUpdate,
    previous: Option<AccountState>,
    storage_root: H256,
) -> AccountState {
    match update.info {
        Some(info) => info.into_state(storage_root),
        None => AccountState {
            storage_root,
            ..previous.unwrap_or_default()
        },
    }
}

/// Code referenced by an update, keyed by its hash.
pub(crate) fn update_code(update: &AccountUpdate) -> Option<(H256, Bytes)> {
    let code = update.code.as_ref().filter(|code| !code.is_empty())?;
    Some((code_hash(code), code.clone()))
}
