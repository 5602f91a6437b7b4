use bytes::Bytes;
use ethereum_types::U256;

use crate::{
    constants::{WORD_SIZE, WORD_SIZE_U64},
    errors::{ExceptionalHalt, VMError},
};

/// Byte addressed, zero initialized frame memory.
///
/// Memory only grows in whole words. Callers charge the expansion with
/// [`expansion_cost`] before reading or writing, so every access below may grow it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grows memory to `new_memory_size` bytes, already rounded to words.
    pub fn expand(&mut self, new_memory_size: usize) {
        if new_memory_size > self.data.len() {
            self.data.resize(new_memory_size, 0);
        }
    }

    fn resize(&mut self, offset: usize, size: usize) -> Result<(), VMError> {
        let new_size = calculate_memory_size(offset, size)?;
        if new_size > self.data.len() {
            self.data.resize(new_size, 0);
        }
        Ok(())
    }

    pub fn load_range(&mut self, offset: usize, size: usize) -> Result<Bytes, VMError> {
        if size == 0 {
            return Ok(Bytes::new());
        }
        self.resize(offset, size)?;
        let end = offset.checked_add(size).ok_or(ExceptionalHalt::OutOfGas)?;
        Ok(self
            .data
            .get(offset..end)
            .map(Bytes::copy_from_slice)
            .unwrap_or_default())
    }

    pub fn load_word(&mut self, offset: usize) -> Result<U256, VMError> {
        let word = self.load_range(offset, WORD_SIZE)?;
        Ok(U256::from_big_endian(&word))
    }

    pub fn store_data(&mut self, offset: usize, data: &[u8]) -> Result<(), VMError> {
        if data.is_empty() {
            return Ok(());
        }
        self.resize(offset, data.len())?;
        let end = offset
            .checked_add(data.len())
            .ok_or(ExceptionalHalt::OutOfGas)?;
        if let Some(target) = self.data.get_mut(offset..end) {
            target.copy_from_slice(data);
        }
        Ok(())
    }

    pub fn store_word(&mut self, offset: usize, word: U256) -> Result<(), VMError> {
        self.store_data(offset, &word.to_big_endian())
    }

    /// Writes `size` bytes taken from `data` at `data_offset`, padding with zeros past its end.
    pub fn store_padded(
        &mut self,
        offset: usize,
        data: &[u8],
        data_offset: usize,
        size: usize,
    ) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }
        let mut chunk = vec![0u8; size];
        if let Some(available) = data.get(data_offset..) {
            let copied = available.len().min(size);
            chunk[..copied].copy_from_slice(&available[..copied]);
        }
        self.store_data(offset, &chunk)
    }

    /// Copies `size` bytes from `from` to `to`. The ranges may overlap.
    pub fn copy_within(&mut self, from: usize, to: usize, size: usize) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }
        self.resize(from.max(to), size)?;
        let end = from.checked_add(size).ok_or(ExceptionalHalt::OutOfGas)?;
        self.data.copy_within(from..end, to);
        Ok(())
    }
}

/// Memory size in bytes after an access of `size` bytes at `offset`, rounded up to words.
pub fn calculate_memory_size(offset: usize, size: usize) -> Result<usize, VMError> {
    if size == 0 {
        return Ok(0);
    }
    offset
        .checked_add(size)
        .and_then(|end| end.checked_next_multiple_of(WORD_SIZE))
        .ok_or(ExceptionalHalt::OutOfGas.into())
}

/// Gas charged to grow memory from `current_memory_size` to `new_memory_size` bytes.
pub fn expansion_cost(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    if new_memory_size <= current_memory_size {
        return Ok(0);
    }
    cost(new_memory_size)?
        .checked_sub(cost(current_memory_size)?)
        .ok_or(ExceptionalHalt::OutOfGas.into())
}

fn cost(memory_size: usize) -> Result<u64, VMError> {
    let words = u64::try_from(memory_size)
        .map_err(|_| ExceptionalHalt::OutOfGas)?
        .div_ceil(WORD_SIZE_U64);
    let quadratic = words
        .checked_mul(words)
        .ok_or(ExceptionalHalt::OutOfGas)?
        / 512;
    words
        .checked_mul(3)
        .and_then(|linear| linear.checked_add(quadratic))
        .ok_or(ExceptionalHalt::OutOfGas.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_round_up() {
        assert_eq!(calculate_memory_size(0, 0).unwrap(), 0);
        assert_eq!(calculate_memory_size(usize::MAX, 0).unwrap(), 0);
        assert_eq!(calculate_memory_size(0, 1).unwrap(), 32);
        assert_eq!(calculate_memory_size(31, 2).unwrap(), 64);
        assert!(calculate_memory_size(usize::MAX, 1).is_err());
    }

    #[test]
    fn expansion_cost_is_quadratic() {
        assert_eq!(expansion_cost(32, 0).unwrap(), 3);
        assert_eq!(expansion_cost(64, 32).unwrap(), 3);
        assert_eq!(expansion_cost(32, 64).unwrap(), 0);
        // 1024 words: 3 * 1024 + 1024^2 / 512
        assert_eq!(expansion_cost(32 * 1024, 0).unwrap(), 3072 + 2048);
    }

    #[test]
    fn store_and_load_words() {
        let mut memory = Memory::new();
        memory.store_word(0, U256::from(0xabcdu64)).unwrap();
        assert_eq!(memory.len(), 32);
        assert_eq!(memory.load_word(0).unwrap(), U256::from(0xabcdu64));
        assert_eq!(memory.load_word(1).unwrap(), U256::from(0xabcd00u64));
        assert_eq!(memory.len(), 64);
    }

    #[test]
    fn overlapping_copy() {
        let mut memory = Memory::new();
        memory.store_data(0, &[1, 2, 3, 4]).unwrap();
        memory.copy_within(0, 2, 4).unwrap();
        assert_eq!(memory.load_range(0, 6).unwrap().as_ref(), &[1, 2, 1, 2, 3, 4]);
    }

    #[test]
    fn padded_store_fills_zeros() {
        let mut memory = Memory::new();
        memory.store_data(0, &[0xff; 8]).unwrap();
        memory.store_padded(0, &[7, 8, 9], 1, 4).unwrap();
        assert_eq!(memory.load_range(0, 5).unwrap().as_ref(), &[8, 9, 0, 0, 0xff]);
    }

    proptest::proptest! {
        #[test]
        fn expansion_is_additive(a in 0usize..1 << 20, b in 0usize..1 << 20, c in 0usize..1 << 20) {
            let mut sizes = [a, b, c];
            sizes.sort_unstable();
            let [small, middle, large] = sizes;
            let stepwise = expansion_cost(middle, small).unwrap() + expansion_cost(large, middle).unwrap();
            proptest::prop_assert_eq!(stepwise, expansion_cost(large, small).unwrap());
        }
    }
}
