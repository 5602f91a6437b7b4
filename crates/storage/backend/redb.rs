use std::{path::Path, sync::Arc};

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use keel_common::{
    constants::{EMPTY_KECCAK_HASH, EMPTY_TRIE_HASH},
    types::AccountState,
};
use keel_rlp::{decode::RLPDecode, encode::RLPEncode};
use keel_trie::Trie;
use redb::{Database, ReadableTable, ReadableTableMetadata, Table, TableDefinition};
use tracing::debug;

use crate::error::StoreError;
use crate::state_backend::{
    StateBackend, StateUpdate, storage_trie, update_code, updated_account_state,
};
use crate::trie_db::redb::{RedBTrie, TRIE_NODES_TABLE};

const ACCOUNTS_TABLE: TableDefinition<[u8; 20], &[u8]> = TableDefinition::new("Accounts");
const STORAGE_TABLE: TableDefinition<([u8; 20], [u8; 32]), [u8; 32]> =
    TableDefinition::new("Storage");
const CODES_TABLE: TableDefinition<[u8; 32], &[u8]> = TableDefinition::new("Codes");
const METADATA_TABLE: TableDefinition<&str, [u8; 32]> = TableDefinition::new("Metadata");

const STATE_ROOT_KEY: &str = "state_root";

type StorageTable<'txn> = Table<'txn, ([u8; 20], [u8; 32]), [u8; 32]>;

/// Persistent backend on a redb database.
///
/// Accounts, slots and code are kept as plain tables. Every commit rebuilds the
/// affected storage tries and the account trie, writes their nodes through
/// [`RedBTrie`] and records the resulting root.
#[derive(Debug)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Opens the database at `path`, creating it and its tables if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path)?;
        let table_creation_txn = db.begin_write().map_err(Box::new)?;
        table_creation_txn.open_table(ACCOUNTS_TABLE)?;
        table_creation_txn.open_table(STORAGE_TABLE)?;
        table_creation_txn.open_table(CODES_TABLE)?;
        table_creation_txn.open_table(METADATA_TABLE)?;
        table_creation_txn.open_table(TRIE_NODES_TABLE)?;
        table_creation_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Node store holding every trie committed so far.
    pub fn trie_db(&self) -> RedBTrie {
        RedBTrie::new(self.db.clone())
    }
}

fn slot_range(address: &Address) -> std::ops::RangeInclusive<([u8; 20], [u8; 32])> {
    (address.0, [0; 32])..=(address.0, [0xff; 32])
}

fn clear_storage(table: &mut StorageTable<'_>, address: &Address) -> Result<(), StoreError> {
    let keys = table
        .range(slot_range(address))?
        .map(|entry| Ok(entry?.0.value()))
        .collect::<Result<Vec<_>, StoreError>>()?;
    for key in keys {
        table.remove(key)?;
    }
    Ok(())
}

fn read_slots(
    table: &impl ReadableTable<([u8; 20], [u8; 32]), [u8; 32]>,
    address: &Address,
) -> Result<Vec<(H256, U256)>, StoreError> {
    table
        .range(slot_range(address))?
        .map(|entry| {
            let (key, value) = entry?;
            Ok((H256(key.value().1), U256::from_big_endian(&value.value())))
        })
        .collect()
}

impl StateBackend for RedbBackend {
    fn account(&self, address: &Address) -> Result<Option<AccountState>, StoreError> {
        let read_txn = self.db.begin_read().map_err(Box::new)?;
        let table = read_txn.open_table(ACCOUNTS_TABLE)?;
        table
            .get(address.0)?
            .map(|encoded| AccountState::decode(encoded.value()))
            .transpose()
            .map_err(StoreError::from)
    }

    fn code(&self, code_hash: &H256) -> Result<Option<Bytes>, StoreError> {
        if *code_hash == EMPTY_KECCAK_HASH {
            return Ok(Some(Bytes::new()));
        }
        let read_txn = self.db.begin_read().map_err(Box::new)?;
        let table = read_txn.open_table(CODES_TABLE)?;
        Ok(table
            .get(code_hash.0)?
            .map(|code| Bytes::copy_from_slice(code.value())))
    }

    fn storage(&self, address: &Address, key: &H256) -> Result<U256, StoreError> {
        let read_txn = self.db.begin_read().map_err(Box::new)?;
        let table = read_txn.open_table(STORAGE_TABLE)?;
        Ok(table
            .get((address.0, key.0))?
            .map(|value| U256::from_big_endian(&value.value()))
            .unwrap_or_default())
    }

    fn storage_entries(&self, address: &Address) -> Result<Vec<(H256, U256)>, StoreError> {
        let read_txn = self.db.begin_read().map_err(Box::new)?;
        let table = read_txn.open_table(STORAGE_TABLE)?;
        read_slots(&table, address)
    }

    fn commit(&mut self, update: StateUpdate) -> Result<H256, StoreError> {
        let mut tries = Vec::new();
        let write_txn = self.db.begin_write().map_err(Box::new)?;
        let state_root = {
            let mut accounts = write_txn.open_table(ACCOUNTS_TABLE)?;
            let mut storage = write_txn.open_table(STORAGE_TABLE)?;
            let mut codes = write_txn.open_table(CODES_TABLE)?;

            for update in &update.updates {
                let address = update.address;
                if update.removed || update.removed_storage {
                    clear_storage(&mut storage, &address)?;
                }
                if update.removed {
                    accounts.remove(address.0)?;
                    continue;
                }
                for (key, value) in &update.added_storage {
                    if value.is_zero() {
                        storage.remove((address.0, key.0))?;
                    } else {
                        storage.insert((address.0, key.0), value.to_big_endian())?;
                    }
                }
                let trie = storage_trie(read_slots(&storage, &address)?);
                let storage_root = trie.hash();
                if !trie.is_empty() {
                    tries.push(trie);
                }
                if let Some((hash, code)) = update_code(update) {
                    codes.insert(hash.0, code.as_ref())?;
                }
                let previous = accounts
                    .get(address.0)?
                    .map(|encoded| AccountState::decode(encoded.value()))
                    .transpose()?;
                let state = updated_account_state(update, previous, storage_root);
                accounts.insert(address.0, state.encode_to_vec().as_slice())?;
            }

            let mut state_trie = Trie::new_secure();
            for entry in accounts.iter()? {
                let (address, encoded) = entry?;
                state_trie.insert(address.value().to_vec(), encoded.value().to_vec());
            }
            let state_root = state_trie.hash();
            tries.push(state_trie);

            write_txn
                .open_table(METADATA_TABLE)?
                .insert(STATE_ROOT_KEY, state_root.0)?;
            state_root
        };
        write_txn.commit()?;

        let trie_db = self.trie_db();
        for trie in &tries {
            trie.commit(&trie_db)?;
        }
        debug!(
            accounts = update.updates.len(),
            tries = tries.len(),
            "Committed state update, new root {state_root:#x}"
        );
        Ok(state_root)
    }

    fn state_root(&self) -> Result<H256, StoreError> {
        let read_txn = self.db.begin_read().map_err(Box::new)?;
        let table = read_txn.open_table(METADATA_TABLE)?;
        Ok(table
            .get(STATE_ROOT_KEY)?
            .map(|root| H256(root.value()))
            .unwrap_or(*EMPTY_TRIE_HASH))
    }

    fn accounts(&self) -> Result<Vec<(Address, AccountState)>, StoreError> {
        let read_txn = self.db.begin_read().map_err(Box::new)?;
        let table = read_txn.open_table(ACCOUNTS_TABLE)?;
        let mut accounts = Vec::with_capacity(table.len()? as usize);
        for entry in table.iter()? {
            let (address, encoded) = entry?;
            accounts.push((
                Address::from(address.value()),
                AccountState::decode(encoded.value())?,
            ));
        }
        Ok(accounts)
    }
}
