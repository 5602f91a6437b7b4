// RLP encoding and decoding of trie nodes. The same encoding is hashed and stored.
use keel_rlp::{
    decode::{RLPDecode, decode_bytes},
    encode::{RLPEncode, encode_length},
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};

use crate::{
    nibbles::Nibbles,
    node::{BranchNode, ExtensionNode, LeafNode, Node},
    node_hash::NodeHash,
};

impl RLPEncode for BranchNode {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        let payload_len = self
            .choices
            .iter()
            .map(RLPEncode::length)
            .sum::<usize>()
            + self.value.as_slice().length();
        encode_length(payload_len, buf);
        for child in &self.choices {
            child.encode(buf);
        }
        self.value.as_slice().encode(buf);
    }
}

impl RLPEncode for ExtensionNode {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_bytes(&self.prefix.encode_compact())
            .encode_field(&self.child)
            .finish();
    }
}

impl RLPEncode for LeafNode {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_bytes(&self.partial.encode_compact())
            .encode_bytes(&self.value)
            .finish()
    }
}

impl RLPEncode for Node {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        match self {
            Node::Branch(n) => n.encode(buf),
            Node::Extension(n) => n.encode(buf),
            Node::Leaf(n) => n.encode(buf),
        }
    }
}

impl RLPDecode for Node {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let mut items = Vec::with_capacity(17);
        let mut decoder = Decoder::new(rlp)?;
        while !decoder.is_done() && items.len() <= 17 {
            let item;
            (item, decoder) = decoder.get_encoded_item()?;
            items.push(item);
        }
        let rest = decoder.finish()?;

        let node = match items.as_slice() {
            [path, second] => {
                let (path, _) = decode_bytes(path)?;
                let path = Nibbles::decode_compact(path);
                if path.is_leaf() {
                    let (value, _) = decode_bytes(second)?;
                    LeafNode {
                        partial: path,
                        value: value.to_vec(),
                    }
                    .into()
                } else {
                    ExtensionNode {
                        prefix: path,
                        child: decode_child(second),
                    }
                    .into()
                }
            }
            [children @ .., value] if children.len() == 16 => {
                let (value, _) = decode_bytes(value)?;
                BranchNode {
                    choices: std::array::from_fn(|i| decode_child(&children[i])),
                    value: value.to_vec(),
                }
                .into()
            }
            _ => {
                return Err(RLPDecodeError::Custom(format!(
                    "Invalid arg count for Node, expected 2 or 17, got {}",
                    items.len()
                )));
            }
        };
        Ok((node, rest))
    }
}

fn decode_child(rlp: &[u8]) -> NodeHash {
    match decode_bytes(rlp) {
        Ok((hash, [])) if hash.len() == 32 => NodeHash::from_slice(hash),
        Ok(([], [])) => NodeHash::default(),
        _ => NodeHash::from_slice(rlp),
    }
}
