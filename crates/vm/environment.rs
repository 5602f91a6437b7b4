use std::collections::BTreeMap;

use ethereum_types::{Address, H256, U256};

use crate::constants::BLOCKHASH_WINDOW;

/// Block and transaction context visible to the executing code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// The sender of the transaction, `ORIGIN`.
    pub origin: Address,
    /// Price paid per unit of gas, after applying the block base fee.
    pub gas_price: U256,
    pub coinbase: Address,
    pub block_number: u64,
    pub timestamp: u64,
    pub block_gas_limit: u64,
    /// `DIFFICULTY` before the merge.
    pub difficulty: U256,
    /// `PREVRANDAO` from the merge on.
    pub prev_randao: Option<H256>,
    pub chain_id: u64,
    pub base_fee_per_gas: U256,
    pub blob_base_fee: U256,
    pub tx_blob_hashes: Vec<H256>,
    /// Hashes of known ancestors by number.
    pub block_hashes: BTreeMap<u64, H256>,
}

impl Environment {
    /// Hash of ancestor `number`, zero outside the last 256 blocks.
    pub fn block_hash(&self, number: U256) -> H256 {
        let Ok(number) = u64::try_from(number) else {
            return H256::zero();
        };
        if number >= self.block_number
            || self.block_number.saturating_sub(number) > BLOCKHASH_WINDOW
        {
            return H256::zero();
        }
        self.block_hashes.get(&number).copied().unwrap_or_default()
    }
}
