pub mod db;
pub mod error;
pub mod nibbles;
pub mod node;
pub mod node_hash;
mod rlp;

use std::{collections::BTreeMap, sync::OnceLock};

use ethereum_types::H256;
use keel_crypto::keccak::{keccak, keccak_hash};
use keel_rlp::{constants::RLP_NULL, encode::RLPEncode};
use lazy_static::lazy_static;

pub use self::db::{InMemoryTrieDB, TrieDB};
pub use self::error::TrieError;
pub use self::nibbles::Nibbles;
pub use self::node::{BranchNode, ExtensionNode, LeafNode, Node};
pub use self::node_hash::NodeHash;

use self::nibbles::common_prefix_length;

lazy_static! {
    // Hash value for an empty trie, equal to keccak(RLP_NULL)
    pub static ref EMPTY_TRIE_HASH: H256 = keccak([RLP_NULL]);
}

/// RLP-encoded trie path
pub type PathRLP = Vec<u8>;
/// RLP-encoded trie value
pub type ValueRLP = Vec<u8>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: PathRLP,
    value: ValueRLP,
}

/// Ethereum-compatible Merkle Patricia Trie
///
/// The trie keeps its contents as a flat map from nibble path to value and derives
/// the node structure when the root is requested, so its hash only depends on the
/// contents and never on the order of insertions and removals.
/// A secured trie keys every entry by the keccak hash of its key.
#[derive(Debug, Clone, Default)]
pub struct Trie {
    secured: bool,
    entries: BTreeMap<Vec<u8>, Entry>,
    root: OnceLock<H256>,
}

impl Trie {
    /// Creates an empty trie
    pub fn new(secured: bool) -> Self {
        Self {
            secured,
            ..Default::default()
        }
    }

    /// Creates an empty trie keyed by the keccak hash of the inserted keys
    pub fn new_secure() -> Self {
        Self::new(true)
    }

    pub fn is_secured(&self) -> bool {
        self.secured
    }

    fn path(&self, key: &[u8]) -> Vec<u8> {
        let nibbles = if self.secured {
            Nibbles::from_raw(&keccak_hash(key), false)
        } else {
            Nibbles::from_raw(key, false)
        };
        nibbles.as_ref().to_vec()
    }

    /// Retrieves a value from the trie given its key
    pub fn get(&self, key: &[u8]) -> Option<&ValueRLP> {
        self.entries
            .get(&self.path(key))
            .map(|entry| &entry.value)
    }

    /// Inserts a value into the trie. Inserting an empty value removes the key.
    pub fn insert(&mut self, key: PathRLP, value: ValueRLP) {
        if value.is_empty() {
            self.remove(&key);
            return;
        }
        self.root = OnceLock::new();
        let path = self.path(&key);
        self.entries.insert(path, Entry { key, value });
    }

    /// Removes a value from the trie given its key, returning it if it existed
    pub fn remove(&mut self, key: &[u8]) -> Option<ValueRLP> {
        let removed = self.entries.remove(&self.path(key))?;
        self.root = OnceLock::new();
        Some(removed.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries as (key, value), in trie path order
    pub fn iter(&self) -> impl Iterator<Item = (&PathRLP, &ValueRLP)> {
        self.entries
            .values()
            .map(|entry| (&entry.key, &entry.value))
    }

    /// Root hash of the trie
    pub fn hash(&self) -> H256 {
        *self.root.get_or_init(|| self.compute_root(&mut |_, _| {}))
    }

    /// Writes every hashed node of the trie to `db` and returns the root hash.
    /// The root node is always stored, even when it is shorter than a hash.
    pub fn commit(&self, db: &dyn TrieDB) -> Result<H256, TrieError> {
        let mut nodes = Vec::new();
        let root = self.compute_root(&mut |hash, encoded| nodes.push((hash, encoded.to_vec())));
        if !self.is_empty() {
            db.put_batch(nodes)?;
        }
        Ok(root)
    }

    /// Looks `key` up in the nodes stored in `db` under `root`.
    pub fn get_from_db(
        db: &dyn TrieDB,
        root: H256,
        key: &[u8],
        secured: bool,
    ) -> Result<Option<ValueRLP>, TrieError> {
        if root == *EMPTY_TRIE_HASH {
            return Ok(None);
        }
        let path = if secured {
            Nibbles::from_bytes(&keccak_hash(key))
        } else {
            Nibbles::from_bytes(key)
        };
        match Node::load(db, NodeHash::Hashed(root))? {
            Some(node) => node.get(db, path),
            None => Ok(None),
        }
    }

    fn compute_root(&self, record: &mut dyn FnMut(H256, &[u8])) -> H256 {
        let entries: Vec<(&[u8], &[u8])> = self
            .entries
            .iter()
            .map(|(path, entry)| (path.as_slice(), entry.value.as_slice()))
            .collect();
        match compose(&entries, 0, record) {
            None => *EMPTY_TRIE_HASH,
            Some(root) => {
                let encoded = root.encode_to_vec();
                let hash = keccak(&encoded);
                record(hash, &encoded);
                hash
            }
        }
    }
}

/// Builds the node holding `entries`, whose paths all share their first `level` nibbles.
/// Entries must be sorted by path.
fn compose(
    entries: &[(&[u8], &[u8])],
    level: usize,
    record: &mut dyn FnMut(H256, &[u8]),
) -> Option<Node> {
    let (first_path, first_value) = entries.first()?;
    if entries.len() == 1 {
        let mut partial = Nibbles::from_hex(first_path[level..].to_vec());
        partial.append(nibbles::LEAF_FLAG);
        return Some(
            LeafNode {
                partial,
                value: first_value.to_vec(),
            }
            .into(),
        );
    }

    let first_rest = &first_path[level..];
    let prefix_len = entries
        .iter()
        .map(|(path, _)| common_prefix_length(first_rest, &path[level..]))
        .min()
        .unwrap_or(0);
    if prefix_len > 0 {
        let child = compose(entries, level + prefix_len, record);
        return Some(
            ExtensionNode {
                prefix: Nibbles::from_hex(first_rest[..prefix_len].to_vec()),
                child: reference(child, record),
            }
            .into(),
        );
    }

    // Paths ending at this level sort first, at most one of them exists
    let value_entries = entries.partition_point(|(path, _)| path.len() == level);
    let value = entries[..value_entries]
        .last()
        .map(|(_, value)| value.to_vec())
        .unwrap_or_default();
    let mut choices: [NodeHash; 16] = Default::default();
    let mut start = value_entries;
    for (nibble, choice) in choices.iter_mut().enumerate() {
        let end = start + entries[start..].partition_point(|(path, _)| path[level] as usize <= nibble);
        *choice = reference(compose(&entries[start..end], level + 1, record), record);
        start = end;
    }
    Some(BranchNode { choices, value }.into())
}

/// Reference a parent keeps to `node`, recording it when it is hashed.
fn reference(node: Option<Node>, record: &mut dyn FnMut(H256, &[u8])) -> NodeHash {
    let Some(node) = node else {
        return NodeHash::default();
    };
    let encoded = node.encode_to_vec();
    let reference = NodeHash::from_encoded_raw(&encoded);
    if let NodeHash::Hashed(hash) = reference {
        record(hash, &encoded);
    }
    reference
}

/// Root of a trie mapping `rlp(index)` to each item, as used for the transactions,
/// receipts and withdrawals of a block.
pub fn ordered_trie_root(items: impl IntoIterator<Item = Vec<u8>>) -> H256 {
    let mut trie = Trie::new(false);
    for (index, item) in items.into_iter().enumerate() {
        trie.insert(index.encode_to_vec(), item);
    }
    trie.hash()
}
