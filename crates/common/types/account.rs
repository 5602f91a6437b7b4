use bytes::Bytes;
use ethereum_types::{H256, U256};
use keel_crypto::keccak::keccak;
use keel_rlp::{
    decode::RLPDecode,
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};
use serde::{Deserialize, Serialize};

use crate::constants::{EMPTY_KECCAK_HASH, EMPTY_TRIE_HASH};

use super::GenesisAccount;

/// An account as seen by execution. Storage lives beside it in the world state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub nonce: u64,
    pub balance: U256,
    pub code: Bytes,
}

impl Account {
    pub fn new(nonce: u64, balance: U256, code: Bytes) -> Self {
        Self {
            nonce,
            balance,
            code,
        }
    }

    /// An account is empty when it has no nonce, no balance and no code (EIP-161).
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code.is_empty()
    }

    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }

    pub fn has_code_or_nonce(&self) -> bool {
        self.has_code() || self.nonce != 0
    }

    pub fn code_hash(&self) -> H256 {
        code_hash(&self.code)
    }
}

pub fn code_hash(code: &[u8]) -> H256 {
    if code.is_empty() {
        EMPTY_KECCAK_HASH
    } else {
        keccak(code)
    }
}

/// Leaf value of the account trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub nonce: u64,
    pub balance: U256,
    pub storage_root: H256,
    pub code_hash: H256,
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            nonce: Default::default(),
            balance: Default::default(),
            storage_root: *EMPTY_TRIE_HASH,
            code_hash: EMPTY_KECCAK_HASH,
        }
    }
}

impl AccountState {
    pub fn from_account(account: &Account, storage_root: H256) -> Self {
        Self {
            nonce: account.nonce,
            balance: account.balance,
            storage_root,
            code_hash: account.code_hash(),
        }
    }
}

impl From<&GenesisAccount> for AccountState {
    fn from(value: &GenesisAccount) -> Self {
        AccountState {
            nonce: value.nonce,
            balance: value.balance,
            storage_root: value.storage_root(),
            code_hash: code_hash(&value.code),
        }
    }
}

impl RLPEncode for AccountState {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_field(&self.nonce)
            .encode_field(&self.balance)
            .encode_field(&self.storage_root)
            .encode_field(&self.code_hash)
            .finish();
    }
}

impl RLPDecode for AccountState {
    fn decode_unfinished(rlp: &[u8]) -> Result<(AccountState, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (balance, decoder) = decoder.decode_field("balance")?;
        let (storage_root, decoder) = decoder.decode_field("storage_root")?;
        let (code_hash, decoder) = decoder.decode_field("code_hash")?;
        let state = AccountState {
            nonce,
            balance,
            storage_root,
            code_hash,
        };
        Ok((state, decoder.finish()?))
    }
}
