use keel_rlp::{decode::RLPDecode, encode::RLPEncode};

use crate::{TrieDB, error::TrieError, nibbles::Nibbles, node_hash::NodeHash};

#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    /// Remaining key nibbles, leaf flag included
    pub partial: Nibbles,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionNode {
    pub prefix: Nibbles,
    pub child: NodeHash,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchNode {
    pub choices: [NodeHash; 16],
    pub value: Vec<u8>,
}

/// A Node in an Ethereum Compatible Patricia Merkle Trie
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Branch(Box<BranchNode>),
    Extension(ExtensionNode),
    Leaf(LeafNode),
}

impl From<BranchNode> for Node {
    fn from(val: BranchNode) -> Self {
        Node::Branch(Box::new(val))
    }
}

impl From<ExtensionNode> for Node {
    fn from(val: ExtensionNode) -> Self {
        Node::Extension(val)
    }
}

impl From<LeafNode> for Node {
    fn from(val: LeafNode) -> Self {
        Node::Leaf(val)
    }
}

impl Node {
    pub fn compute_hash(&self) -> NodeHash {
        NodeHash::from_encoded_raw(&self.encode_to_vec())
    }

    /// Loads the node a reference points to, from the database when it is hashed.
    pub fn load(db: &dyn TrieDB, reference: NodeHash) -> Result<Option<Node>, TrieError> {
        let encoded = match reference {
            _ if reference.is_empty() => return Ok(None),
            NodeHash::Inline(_) => reference.as_ref().to_vec(),
            NodeHash::Hashed(hash) => db.get(hash)?.ok_or(TrieError::MissingNode(reference))?,
        };
        Ok(Some(Node::decode(&encoded)?))
    }

    /// Retrieves a value from the subtrie originating from this node given its path
    pub fn get(&self, db: &dyn TrieDB, mut path: Nibbles) -> Result<Option<Vec<u8>>, TrieError> {
        match self {
            Node::Leaf(leaf) => Ok((leaf.partial == path).then(|| leaf.value.clone())),
            Node::Extension(extension) => {
                if !path.skip_prefix(&extension.prefix) {
                    return Ok(None);
                }
                match Node::load(db, extension.child)? {
                    Some(child) => child.get(db, path),
                    None => Err(TrieError::InconsistentTree),
                }
            }
            Node::Branch(branch) => match path.next_choice() {
                Some(choice) => match Node::load(db, branch.choices[choice])? {
                    Some(child) => child.get(db, path),
                    None => Ok(None),
                },
                None => Ok((!branch.value.is_empty()).then(|| branch.value.clone())),
            },
        }
    }
}
