use ethereum_types::H256;
use keel_crypto::keccak::keccak;
use keel_rlp::{constants::RLP_NULL, encode::RLPEncode};

/// Reference from a node to one of its children.
///
/// Nodes whose encoding is shorter than 32 bytes are embedded in their parent,
/// every other node is referenced by the keccak hash of its encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeHash {
    Hashed(H256),
    Inline(([u8; 31], u8)),
}

impl NodeHash {
    /// Reference for a node with the given encoding.
    pub fn from_encoded_raw(encoded: &[u8]) -> Self {
        if encoded.len() >= 32 {
            NodeHash::Hashed(keccak(encoded))
        } else {
            Self::inline(encoded)
        }
    }

    /// Builds a reference from its stored form, either a hash or an embedded node.
    pub fn from_slice(slice: &[u8]) -> Self {
        match slice.len() {
            32 => NodeHash::Hashed(H256::from_slice(slice)),
            _ => Self::inline(slice),
        }
    }

    fn inline(encoded: &[u8]) -> Self {
        let mut buffer = [0; 31];
        let len = encoded.len().min(31);
        buffer[..len].copy_from_slice(&encoded[..len]);
        NodeHash::Inline((buffer, len as u8))
    }

    /// Hash of the referenced node, hashing inline nodes too.
    /// Used for trie roots, which are always hashed.
    pub fn finalize(self) -> H256 {
        match self {
            NodeHash::Hashed(hash) => hash,
            NodeHash::Inline(_) => keccak(self.as_ref()),
        }
    }

    /// True for the reference to an empty subtrie.
    pub fn is_empty(&self) -> bool {
        matches!(self, NodeHash::Inline((_, 0)))
    }
}

impl Default for NodeHash {
    fn default() -> Self {
        NodeHash::Inline(([0; 31], 0))
    }
}

impl AsRef<[u8]> for NodeHash {
    fn as_ref(&self) -> &[u8] {
        match self {
            NodeHash::Inline((slice, len)) => &slice[..*len as usize],
            NodeHash::Hashed(hash) => hash.as_bytes(),
        }
    }
}

impl From<H256> for NodeHash {
    fn from(value: H256) -> Self {
        NodeHash::Hashed(value)
    }
}

// Hashed references are RLP strings, embedded nodes are written as is.
impl RLPEncode for NodeHash {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        match self {
            NodeHash::Hashed(hash) => hash.encode(buf),
            NodeHash::Inline((_, 0)) => buf.put_u8(RLP_NULL),
            NodeHash::Inline((encoded, len)) => buf.put_slice(&encoded[..*len as usize]),
        }
    }

    fn length(&self) -> usize {
        match self {
            NodeHash::Hashed(_) => 33,
            NodeHash::Inline((_, 0)) => 1,
            NodeHash::Inline((_, len)) => *len as usize,
        }
    }
}
