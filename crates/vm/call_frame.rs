use bytes::Bytes;
use ethereum_types::{Address, U256};

use crate::{
    constants::STACK_LIMIT,
    errors::{ExceptionalHalt, VMError},
    memory::Memory,
    opcodes::Opcode,
};

/// Operand stack, at most [`STACK_LIMIT`] words.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stack {
    values: Vec<U256>,
}

impl Stack {
    /// Pops `N` words, the top of the stack first.
    pub fn pop<const N: usize>(&mut self) -> Result<[U256; N], VMError> {
        let start = self
            .values
            .len()
            .checked_sub(N)
            .ok_or(ExceptionalHalt::StackUnderflow)?;
        let mut popped = [U256::zero(); N];
        for (slot, value) in popped.iter_mut().zip(self.values.drain(start..).rev()) {
            *slot = value;
        }
        Ok(popped)
    }

    pub fn pop1(&mut self) -> Result<U256, VMError> {
        self.values
            .pop()
            .ok_or(ExceptionalHalt::StackUnderflow.into())
    }

    pub fn push(&mut self, value: U256) -> Result<(), VMError> {
        if self.values.len() >= STACK_LIMIT {
            return Err(ExceptionalHalt::StackOverflow.into());
        }
        self.values.push(value);
        Ok(())
    }

    pub fn push_zero(&mut self) -> Result<(), VMError> {
        self.push(U256::zero())
    }

    /// Word `depth` positions below the top.
    pub fn peek(&self, depth: usize) -> Result<U256, VMError> {
        self.values
            .len()
            .checked_sub(depth.saturating_add(1))
            .and_then(|index| self.values.get(index))
            .copied()
            .ok_or(ExceptionalHalt::StackUnderflow.into())
    }

    /// Swaps the top with the word `depth` positions below it.
    pub fn swap(&mut self, depth: usize) -> Result<(), VMError> {
        let top = self
            .values
            .len()
            .checked_sub(1)
            .ok_or(ExceptionalHalt::StackUnderflow)?;
        let other = top
            .checked_sub(depth)
            .ok_or(ExceptionalHalt::StackUnderflow)?;
        self.values.swap(top, other);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Words from bottom to top.
    pub fn as_slice(&self) -> &[U256] {
        &self.values
    }
}

/// Valid `JUMPDEST` positions of a bytecode, one bit per byte.
///
/// Bytes inside `PUSH` immediates are never valid targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JumpTargets(Vec<u64>);

impl JumpTargets {
    pub fn analyze(code: &[u8]) -> Self {
        let mut bits = vec![0u64; code.len().div_ceil(64)];
        let mut pc = 0;
        while let Some(&byte) = code.get(pc) {
            if byte == Opcode::JUMPDEST as u8 {
                if let Some(word) = bits.get_mut(pc / 64) {
                    *word |= 1 << (pc % 64);
                }
            }
            pc = pc
                .saturating_add(1)
                .saturating_add(Opcode::push_size(byte));
        }
        Self(bits)
    }

    pub fn contains(&self, pc: usize) -> bool {
        self.0
            .get(pc / 64)
            .is_some_and(|word| (word >> (pc % 64)) & 1 == 1)
    }
}

/// State of one message call or contract creation.
#[derive(Debug, Clone, Default)]
pub struct CallFrame {
    pub gas_limit: u64,
    pub gas_remaining: u64,
    pub pc: usize,
    /// Address that sent the message, `CALLER`.
    pub msg_sender: Address,
    /// Account whose storage and balance the frame acts on.
    pub to: Address,
    /// Account the executed code was loaded from.
    pub code_address: Address,
    pub bytecode: Bytes,
    pub jump_targets: JumpTargets,
    pub msg_value: U256,
    pub stack: Stack,
    pub memory: Memory,
    pub calldata: Bytes,
    /// Data returned or reverted by this frame.
    pub output: Bytes,
    /// Data returned by the last child frame, `RETURNDATA*`.
    pub sub_return_data: Bytes,
    pub is_static: bool,
    pub depth: usize,
    pub is_create: bool,
    pub should_transfer_value: bool,
    /// Where the parent wants the output of a call written.
    pub ret_offset: usize,
    pub ret_size: usize,
}

impl CallFrame {
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        msg_sender: Address,
        to: Address,
        code_address: Address,
        bytecode: Bytes,
        msg_value: U256,
        calldata: Bytes,
        is_static: bool,
        gas_limit: u64,
        depth: usize,
        should_transfer_value: bool,
        is_create: bool,
    ) -> Self {
        Self {
            gas_limit,
            gas_remaining: gas_limit,
            msg_sender,
            to,
            code_address,
            jump_targets: JumpTargets::analyze(&bytecode),
            bytecode,
            msg_value,
            calldata,
            is_static,
            depth,
            should_transfer_value,
            is_create,
            ..Default::default()
        }
    }

    /// Opcode at `pc`, advancing past it. Running off the end of the code reads `STOP`.
    pub fn next_opcode(&mut self) -> u8 {
        let opcode = self.bytecode.get(self.pc).copied().unwrap_or_default();
        self.pc = self.pc.saturating_add(1);
        opcode
    }

    /// Opcode that is about to execute.
    pub fn current_opcode(&self) -> u8 {
        self.bytecode.get(self.pc).copied().unwrap_or_default()
    }

    pub fn increase_consumed_gas(&mut self, gas: u64) -> Result<(), VMError> {
        self.gas_remaining = self
            .gas_remaining
            .checked_sub(gas)
            .ok_or(ExceptionalHalt::OutOfGas)?;
        Ok(())
    }

    pub fn gas_used(&self) -> u64 {
        self.gas_limit.saturating_sub(self.gas_remaining)
    }

    /// Moves `pc` to `target`, which has to be a `JUMPDEST` outside push data.
    pub fn jump(&mut self, target: U256) -> Result<(), VMError> {
        let target = usize::try_from(target).map_err(|_| ExceptionalHalt::InvalidJumpDest)?;
        if !self.jump_targets.contains(target) {
            return Err(ExceptionalHalt::InvalidJumpDest.into());
        }
        self.pc = target;
        Ok(())
    }

    /// `N` bytes of immediate data after the current opcode, zero padded past the end of the code.
    pub fn immediate<const N: usize>(&self) -> [u8; N] {
        let mut data = [0u8; N];
        if let Some(available) = self.bytecode.get(self.pc..) {
            let copied = available.len().min(N);
            data[..copied].copy_from_slice(&available[..copied]);
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_bounds() {
        let mut stack = Stack::default();
        assert!(matches!(
            stack.pop1(),
            Err(VMError::ExceptionalHalt(ExceptionalHalt::StackUnderflow))
        ));
        for i in 0..STACK_LIMIT {
            stack.push(U256::from(i)).unwrap();
        }
        assert!(matches!(
            stack.push(U256::one()),
            Err(VMError::ExceptionalHalt(ExceptionalHalt::StackOverflow))
        ));
        let [top, below] = stack.pop().unwrap();
        assert_eq!(top, U256::from(STACK_LIMIT - 1));
        assert_eq!(below, U256::from(STACK_LIMIT - 2));
        assert_eq!(stack.len(), STACK_LIMIT - 2);
    }

    #[test]
    fn failed_pop_leaves_stack_untouched() {
        let mut stack = Stack::default();
        stack.push(U256::one()).unwrap();
        assert!(stack.pop::<2>().is_err());
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn swap_and_peek() {
        let mut stack = Stack::default();
        for i in 1..=3u64 {
            stack.push(U256::from(i)).unwrap();
        }
        stack.swap(2).unwrap();
        assert_eq!(stack.peek(0).unwrap(), U256::from(1));
        assert_eq!(stack.peek(2).unwrap(), U256::from(3));
        assert!(stack.swap(3).is_err());
        assert!(stack.peek(3).is_err());
    }

    #[test]
    fn jumpdest_analysis_skips_push_data() {
        // PUSH2 0x5b5b JUMPDEST PUSH32 <31 bytes>
        let mut code = vec![0x61, 0x5b, 0x5b, 0x5b, 0x7f];
        code.extend([0x5b; 31]);
        let targets = JumpTargets::analyze(&code);
        assert!(!targets.contains(1));
        assert!(!targets.contains(2));
        assert!(targets.contains(3));
        assert!((4..code.len()).all(|pc| !targets.contains(pc)));
        assert!(!targets.contains(1000));
    }

    #[test]
    fn truncated_immediate_is_zero_padded() {
        let mut frame = CallFrame::new(
            Address::zero(),
            Address::zero(),
            Address::zero(),
            Bytes::from_static(&[0x61, 0xaa]),
            U256::zero(),
            Bytes::new(),
            false,
            100,
            0,
            false,
            false,
        );
        assert_eq!(frame.next_opcode(), 0x61);
        assert_eq!(frame.immediate::<2>(), [0xaa, 0x00]);
        frame.pc = 2;
        assert_eq!(frame.next_opcode(), 0x00);
    }
}
