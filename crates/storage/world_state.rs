use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use keel_common::{
    constants::EMPTY_TRIE_HASH,
    types::{Account, GenesisAccount},
    utils::{h256_to_u256, u256_to_h256},
};
use tracing::trace;

use crate::error::StoreError;
use crate::state_backend::{AccountInfo, AccountUpdate, StateBackend, StateUpdate};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct StorageOverlay {
    /// Committed slots are ignored.
    cleared: bool,
    slots: BTreeMap<H256, U256>,
}

/// Undo record of a single write.
#[derive(Debug)]
enum JournalEntry {
    Account {
        address: Address,
        previous: Option<Option<Account>>,
    },
    Storage {
        address: Address,
        key: H256,
        previous: Option<U256>,
    },
    StorageDestroyed {
        address: Address,
        previous: Option<StorageOverlay>,
    },
}

/// Mutable view of the world state used during execution.
///
/// Writes are kept in an overlay on top of a [`StateBackend`] and only reach it when
/// the state root is requested. Transactions nest: each one records the journal
/// length at its start, and rolling it back undoes every write made since.
#[derive(Debug)]
pub struct WorldState {
    backend: Box<dyn StateBackend>,
    accounts: BTreeMap<Address, Option<Account>>,
    storage: BTreeMap<Address, StorageOverlay>,
    journal: Vec<JournalEntry>,
    checkpoints: Vec<usize>,
    /// Slot values at the start of the outermost transaction, recorded on first write.
    original_storage: HashMap<(Address, H256), U256>,
    created_accounts: HashSet<Address>,
}

impl WorldState {
    pub fn new(backend: Box<dyn StateBackend>) -> Self {
        Self {
            backend,
            accounts: BTreeMap::new(),
            storage: BTreeMap::new(),
            journal: Vec::new(),
            checkpoints: Vec::new(),
            original_storage: HashMap::new(),
            created_accounts: HashSet::new(),
        }
    }

    /// Writes every account of a genesis or t8n alloc.
    pub fn load_alloc<'a>(
        &mut self,
        alloc: impl IntoIterator<Item = (&'a Address, &'a GenesisAccount)>,
    ) -> Result<(), StoreError> {
        for (address, account) in alloc {
            self.set_account(
                *address,
                Account::new(account.nonce, account.balance, account.code.clone()),
            )?;
            for (key, value) in &account.storage {
                self.set_storage(*address, u256_to_h256(*key), *value)?;
            }
        }
        Ok(())
    }

    pub fn get_account_optional(&self, address: &Address) -> Result<Option<Account>, StoreError> {
        if let Some(account) = self.accounts.get(address) {
            return Ok(account.clone());
        }
        let Some(state) = self.backend.account(address)? else {
            return Ok(None);
        };
        let code = self
            .backend
            .code(&state.code_hash)?
            .ok_or(StoreError::MissingCode(state.code_hash))?;
        Ok(Some(Account::new(state.nonce, state.balance, code)))
    }

    /// The account at `address`, or an empty one when it does not exist.
    pub fn get_account(&self, address: &Address) -> Result<Account, StoreError> {
        Ok(self.get_account_optional(address)?.unwrap_or_default())
    }

    pub fn set_account(&mut self, address: Address, account: Account) -> Result<(), StoreError> {
        self.write_account(address, Some(account));
        Ok(())
    }

    fn write_account(&mut self, address: Address, account: Option<Account>) {
        let previous = self.accounts.insert(address, account);
        self.record(JournalEntry::Account { address, previous });
    }

    fn update_account(
        &mut self,
        address: Address,
        f: impl FnOnce(&mut Account) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut account = self.get_account(&address)?;
        f(&mut account)?;
        self.set_account(address, account)
    }

    pub fn account_exists(&self, address: &Address) -> Result<bool, StoreError> {
        Ok(self.get_account_optional(address)?.is_some())
    }

    /// A contract cannot be created at an address with code, a nonce or storage
    /// (EIP-684, EIP-7610).
    pub fn create_would_collide(&self, address: &Address) -> Result<bool, StoreError> {
        Ok(self.get_account(address)?.has_code_or_nonce() || self.has_storage(address)?)
    }

    /// True when `address` holds a non-zero slot, written or committed.
    pub fn has_storage(&self, address: &Address) -> Result<bool, StoreError> {
        let overlay = self.storage.get(address);
        if overlay.is_some_and(|overlay| overlay.slots.values().any(|value| !value.is_zero())) {
            return Ok(true);
        }
        if overlay.is_some_and(|overlay| overlay.cleared)
            || matches!(self.accounts.get(address), Some(None))
        {
            return Ok(false);
        }
        Ok(self
            .backend
            .account(address)?
            .is_some_and(|state| state.storage_root != *EMPTY_TRIE_HASH))
    }

    /// True for accounts with no nonce, balance or code, including missing ones.
    pub fn is_account_empty(&self, address: &Address) -> Result<bool, StoreError> {
        Ok(self.get_account(address)?.is_empty())
    }

    pub fn account_exists_and_is_empty(&self, address: &Address) -> Result<bool, StoreError> {
        Ok(self
            .get_account_optional(address)?
            .is_some_and(|account| account.is_empty()))
    }

    /// Creates an empty account at `address` if there is none.
    pub fn touch_account(&mut self, address: Address) -> Result<(), StoreError> {
        if !self.account_exists(&address)? {
            self.set_account(address, Account::default())?;
        }
        Ok(())
    }

    /// Removes every touched account that exists and is empty (EIP-161).
    pub fn destroy_touched_empty_accounts<'a>(
        &mut self,
        touched: impl IntoIterator<Item = &'a Address>,
    ) -> Result<(), StoreError> {
        for address in touched {
            if self.account_exists_and_is_empty(address)? {
                trace!("Pruning empty account {address:#x}");
                self.destroy_account(*address)?;
            }
        }
        Ok(())
    }

    pub fn destroy_account(&mut self, address: Address) -> Result<(), StoreError> {
        self.destroy_storage(address)?;
        self.write_account(address, None);
        Ok(())
    }

    pub fn destroy_storage(&mut self, address: Address) -> Result<(), StoreError> {
        let previous = self.storage.insert(
            address,
            StorageOverlay {
                cleared: true,
                slots: BTreeMap::new(),
            },
        );
        self.record(JournalEntry::StorageDestroyed { address, previous });
        Ok(())
    }

    pub fn get_storage(&self, address: &Address, key: &H256) -> Result<U256, StoreError> {
        if let Some(overlay) = self.storage.get(address) {
            if let Some(value) = overlay.slots.get(key) {
                return Ok(*value);
            }
            if overlay.cleared {
                return Ok(U256::zero());
            }
        }
        if matches!(self.accounts.get(address), Some(None)) {
            return Ok(U256::zero());
        }
        self.backend.storage(address, key)
    }

    pub fn set_storage(&mut self, address: Address, key: H256, value: U256) -> Result<(), StoreError> {
        if !self.checkpoints.is_empty() && !self.original_storage.contains_key(&(address, key)) {
            let original = self.get_storage(&address, &key)?;
            self.original_storage.insert((address, key), original);
        }
        let previous = self
            .storage
            .entry(address)
            .or_default()
            .slots
            .insert(key, value);
        self.record(JournalEntry::Storage {
            address,
            key,
            previous,
        });
        Ok(())
    }

    /// Value of a slot before the outermost open transaction started.
    /// Accounts created within that transaction have no original storage.
    pub fn get_storage_original(&self, address: &Address, key: &H256) -> Result<U256, StoreError> {
        if self.created_accounts.contains(address) {
            return Ok(U256::zero());
        }
        match self.original_storage.get(&(*address, *key)) {
            Some(value) => Ok(*value),
            None => self.get_storage(address, key),
        }
    }

    /// Marks `address` as created in the current outermost transaction.
    pub fn mark_account_created(&mut self, address: Address) {
        self.created_accounts.insert(address);
    }

    pub fn is_account_created(&self, address: &Address) -> bool {
        self.created_accounts.contains(address)
    }

    pub fn increment_nonce(&mut self, address: Address) -> Result<(), StoreError> {
        self.update_account(address, |account| {
            account.nonce = account
                .nonce
                .checked_add(1)
                .ok_or(StoreError::Overflow(address))?;
            Ok(())
        })
    }

    pub fn set_balance(&mut self, address: Address, balance: U256) -> Result<(), StoreError> {
        self.update_account(address, |account| {
            account.balance = balance;
            Ok(())
        })
    }

    /// Moves `amount` wei from `sender` to `recipient`.
    pub fn move_ether(
        &mut self,
        sender: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<(), StoreError> {
        self.update_account(sender, |account| {
            account.balance = account
                .balance
                .checked_sub(amount)
                .ok_or(StoreError::InsufficientBalance(sender))?;
            Ok(())
        })?;
        self.update_account(recipient, |account| {
            account.balance = account
                .balance
                .checked_add(amount)
                .ok_or(StoreError::Overflow(recipient))?;
            Ok(())
        })
    }

    pub fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), StoreError> {
        self.update_account(address, |account| {
            account.code = code;
            Ok(())
        })
    }

    fn record(&mut self, entry: JournalEntry) {
        if !self.checkpoints.is_empty() {
            self.journal.push(entry);
        }
    }

    pub fn in_transaction(&self) -> bool {
        !self.checkpoints.is_empty()
    }

    pub fn begin_transaction(&mut self) {
        self.checkpoints.push(self.journal.len());
    }

    /// Keeps the writes of the innermost transaction, folding them into its parent.
    pub fn commit_transaction(&mut self) -> Result<(), StoreError> {
        self.checkpoints.pop().ok_or(StoreError::NoTransaction)?;
        if self.checkpoints.is_empty() {
            self.end_outermost();
        }
        Ok(())
    }

    /// Undoes every write made since the matching [`WorldState::begin_transaction`].
    pub fn rollback_transaction(&mut self) -> Result<(), StoreError> {
        let mark = self.checkpoints.pop().ok_or(StoreError::NoTransaction)?;
        while self.journal.len() > mark {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            self.undo(entry);
        }
        if self.checkpoints.is_empty() {
            self.end_outermost();
        }
        Ok(())
    }

    fn end_outermost(&mut self) {
        self.journal.clear();
        self.original_storage.clear();
        self.created_accounts.clear();
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Account { address, previous } => match previous {
                Some(account) => {
                    self.accounts.insert(address, account);
                }
                None => {
                    self.accounts.remove(&address);
                }
            },
            JournalEntry::Storage {
                address,
                key,
                previous,
            } => {
                if let Some(overlay) = self.storage.get_mut(&address) {
                    match previous {
                        Some(value) => {
                            overlay.slots.insert(key, value);
                        }
                        None => {
                            overlay.slots.remove(&key);
                        }
                    }
                }
            }
            JournalEntry::StorageDestroyed { address, previous } => match previous {
                Some(overlay) => {
                    self.storage.insert(address, overlay);
                }
                None => {
                    self.storage.remove(&address);
                }
            },
        }
    }

    /// Pushes the overlay down to the backend.
    fn flush(&mut self) -> Result<(), StoreError> {
        if self.in_transaction() {
            return Err(StoreError::OpenTransaction);
        }
        let addresses: BTreeSet<Address> = self
            .accounts
            .keys()
            .chain(self.storage.keys())
            .copied()
            .collect();
        if addresses.is_empty() {
            return Ok(());
        }
        let mut accounts = std::mem::take(&mut self.accounts);
        let mut storage = std::mem::take(&mut self.storage);
        let mut update = StateUpdate::new();
        for address in addresses {
            let overlay = storage.remove(&address).unwrap_or_default();
            let account_update = match accounts.remove(&address) {
                Some(None) => AccountUpdate::removed(address),
                Some(Some(account)) => AccountUpdate {
                    info: Some(AccountInfo {
                        nonce: account.nonce,
                        balance: account.balance,
                        code_hash: account.code_hash(),
                    }),
                    code: Some(account.code),
                    added_storage: overlay.slots,
                    removed_storage: overlay.cleared,
                    ..AccountUpdate::new(address)
                },
                None => AccountUpdate {
                    added_storage: overlay.slots,
                    removed_storage: overlay.cleared,
                    ..AccountUpdate::new(address)
                },
            };
            update.push(account_update);
        }
        self.backend.commit(update)?;
        Ok(())
    }

    /// Root of the account trie. Fails while a transaction is open.
    pub fn state_root(&mut self) -> Result<H256, StoreError> {
        self.flush()?;
        self.backend.state_root()
    }

    /// Root of the storage trie of `address`. Fails while a transaction is open.
    pub fn storage_root(&mut self, address: &Address) -> Result<Option<H256>, StoreError> {
        self.flush()?;
        Ok(self
            .backend
            .account(address)?
            .map(|state| state.storage_root))
    }

    /// Every account with its code and storage. Fails while a transaction is open.
    pub fn dump(&mut self) -> Result<BTreeMap<Address, GenesisAccount>, StoreError> {
        self.flush()?;
        let mut alloc = BTreeMap::new();
        for (address, state) in self.backend.accounts()? {
            let code = self
                .backend
                .code(&state.code_hash)?
                .ok_or(StoreError::MissingCode(state.code_hash))?;
            let storage = self
                .backend
                .storage_entries(&address)?
                .into_iter()
                .map(|(key, value)| (h256_to_u256(key), value))
                .collect();
            alloc.insert(
                address,
                GenesisAccount {
                    code,
                    storage,
                    balance: state.balance,
                    nonce: state.nonce,
                },
            );
        }
        Ok(alloc)
    }
}
