use std::cmp;

/// A sequence of half-bytes, used as a path through the trie.
///
/// Paths built from full keys carry a trailing leaf flag (the value 16), which tells
/// the compact encoding to mark the node as a leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nibbles {
    data: Vec<u8>,
}

pub const LEAF_FLAG: u8 = 16;

impl Nibbles {
    /// Create `Nibbles` from hex-encoded nibbles
    pub fn from_hex(hex: Vec<u8>) -> Self {
        Self { data: hex }
    }

    /// Splits incoming bytes into nibbles and appends the leaf flag
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::from_raw(bytes, true)
    }

    /// Splits incoming bytes into nibbles, appending the leaf flag if `is_leaf` is true
    pub fn from_raw(bytes: &[u8], is_leaf: bool) -> Self {
        let mut data: Vec<u8> = bytes.iter().flat_map(|b| [b >> 4, b & 0x0f]).collect();
        if is_leaf {
            data.push(LEAF_FLAG);
        }
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        self.data.last() == Some(&LEAF_FLAG)
    }

    /// Nibbles without the leaf flag.
    pub fn path(&self) -> &[u8] {
        if self.is_leaf() {
            &self.data[..self.data.len() - 1]
        } else {
            &self.data
        }
    }

    /// If `prefix` is a prefix of self, drop it and return true, otherwise return false.
    pub fn skip_prefix(&mut self, prefix: &Nibbles) -> bool {
        if self.data.starts_with(&prefix.data) {
            self.data.drain(..prefix.len());
            true
        } else {
            false
        }
    }

    /// Amount of leading nibbles shared with `other`
    pub fn count_prefix(&self, other: &Nibbles) -> usize {
        common_prefix_length(&self.data, &other.data)
    }

    /// Removes and returns the first nibble if it is a branch choice (below 16)
    pub fn next_choice(&mut self) -> Option<usize> {
        match self.data.first() {
            Some(&nibble) if nibble < LEAF_FLAG => {
                self.data.remove(0);
                Some(nibble as usize)
            }
            _ => None,
        }
    }

    pub fn offset(&self, offset: usize) -> Nibbles {
        self.slice(offset, self.len())
    }

    pub fn slice(&self, start: usize, end: usize) -> Nibbles {
        Nibbles::from_hex(self.data[start..end].to_vec())
    }

    pub fn append(&mut self, nibble: u8) {
        self.data.push(nibble);
    }

    pub fn concat(&self, other: &Nibbles) -> Nibbles {
        let mut data = self.data.clone();
        data.extend_from_slice(&other.data);
        Nibbles { data }
    }

    /// Hex-prefix encoding of the path.
    ///
    /// The high nibble of the first byte holds the flags: bit 1 marks a leaf,
    /// bit 0 an odd amount of nibbles (whose first nibble then fills the low half).
    pub fn encode_compact(&self) -> Vec<u8> {
        let is_leaf = self.is_leaf();
        let mut hex = self.path();
        let mut flags = if is_leaf { 0x20 } else { 0x00 };
        if hex.len() % 2 == 1 {
            flags |= 0x10 | hex[0];
            hex = &hex[1..];
        }
        let mut compact = Vec::with_capacity(1 + hex.len() / 2);
        compact.push(flags);
        compact.extend(hex.chunks_exact(2).map(|pair| pair[0] << 4 | pair[1]));
        compact
    }

    /// Decodes a hex-prefix encoded path, restoring the leaf flag.
    pub fn decode_compact(compact: &[u8]) -> Self {
        let Some((&first, rest)) = compact.split_first() else {
            return Self::default();
        };
        let flags = first >> 4;
        let mut data = Vec::with_capacity(rest.len() * 2 + 2);
        if flags & 0x1 == 1 {
            data.push(first & 0x0f);
        }
        data.extend(rest.iter().flat_map(|b| [b >> 4, b & 0x0f]));
        if flags & 0x2 == 2 {
            data.push(LEAF_FLAG);
        }
        Self { data }
    }

    /// Combines the nibbles into bytes, trimming the leaf flag
    pub fn to_bytes(&self) -> Vec<u8> {
        self.path()
            .chunks(2)
            .map(|chunk| match chunk {
                [high, low] => high << 4 | low,
                [high] => high << 4,
                _ => 0,
            })
            .collect()
    }

    /// Compares self to another, comparing prefixes only in case of unequal lengths.
    pub fn compare_prefix(&self, prefix: &Nibbles) -> cmp::Ordering {
        let len = self.len().min(prefix.len());
        self.data[..len].cmp(&prefix.data[..len])
    }
}

impl AsRef<[u8]> for Nibbles {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

pub(crate) fn common_prefix_length(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn from_bytes_appends_leaf_flag() {
        let nibbles = Nibbles::from_bytes(&[0x12, 0xab]);
        assert_eq!(nibbles.as_ref(), &[1, 2, 10, 11, 16]);
        assert!(nibbles.is_leaf());
        assert_eq!(nibbles.to_bytes(), vec![0x12, 0xab]);
    }

    #[test]
    fn compact_encoding_flags() {
        // extension, even
        assert_eq!(
            Nibbles::from_hex(vec![1, 2, 3, 4]).encode_compact(),
            vec![0x00, 0x12, 0x34]
        );
        // extension, odd
        assert_eq!(
            Nibbles::from_hex(vec![1, 2, 3]).encode_compact(),
            vec![0x11, 0x23]
        );
        // leaf, even
        assert_eq!(
            Nibbles::from_hex(vec![0, 15, 1, 12, 11, 8, 16]).encode_compact(),
            vec![0x20, 0x0f, 0x1c, 0xb8]
        );
        // leaf, odd
        assert_eq!(
            Nibbles::from_hex(vec![15, 1, 12, 11, 8, 16]).encode_compact(),
            vec![0x3f, 0x1c, 0xb8]
        );
    }

    #[test]
    fn compact_decoding_inverts_encoding() {
        for hex in [
            vec![],
            vec![16],
            vec![1, 2, 3],
            vec![1, 2, 3, 4],
            vec![0, 15, 1, 12, 11, 8, 16],
            vec![15, 1, 12, 11, 8, 16],
        ] {
            let nibbles = Nibbles::from_hex(hex);
            assert_eq!(Nibbles::decode_compact(&nibbles.encode_compact()), nibbles);
        }
    }

    #[test]
    fn skip_prefix_and_choices() {
        let mut a = Nibbles::from_hex(vec![1, 2, 3, 16]);
        assert!(!a.skip_prefix(&Nibbles::from_hex(vec![2])));
        assert!(a.skip_prefix(&Nibbles::from_hex(vec![1, 2])));
        assert_eq!(a.next_choice(), Some(3));
        assert_eq!(a.next_choice(), None);
        assert!(a.is_leaf());
    }

    #[test]
    fn count_prefix_counts_shared_nibbles() {
        let a = Nibbles::from_hex(vec![1, 2, 3, 4]);
        let b = Nibbles::from_hex(vec![1, 2, 5]);
        assert_eq!(a.count_prefix(&b), 2);
        assert_eq!(a.compare_prefix(&b), cmp::Ordering::Less);
    }
}
