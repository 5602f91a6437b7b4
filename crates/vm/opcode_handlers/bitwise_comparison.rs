use std::cmp::Ordering;

use ethereum_types::U256;

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::{
        OpcodeHandler,
        arithmetic::{is_negative, negate},
    },
    vm::VM,
};

// Comparison and Bitwise Logic Operations (15)
// Opcodes: LT, GT, SLT, SGT, EQ, ISZERO, AND, OR, XOR, NOT, BYTE, SHL, SHR, SAR, CLZ

fn bool_word(value: bool) -> U256 {
    if value { U256::one() } else { U256::zero() }
}

fn signed_cmp(lho: U256, rho: U256) -> Ordering {
    match (is_negative(lho), is_negative(rho)) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => lho.cmp(&rho),
    }
}

/// Binary operation on the two top words, `op(top, second)`.
fn binary(
    vm: &mut VM<'_>,
    gas: u64,
    op: impl FnOnce(U256, U256) -> U256,
) -> Result<OpcodeResult, VMError> {
    let frame = &mut vm.current_call_frame;
    frame.increase_consumed_gas(gas)?;
    let [lho, rho] = frame.stack.pop()?;
    frame.stack.push(op(lho, rho))?;
    Ok(OpcodeResult::Continue)
}

pub struct OpLtHandler;
impl OpcodeHandler for OpLtHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        binary(vm, gas_cost::LT, |lho, rho| bool_word(lho < rho))
    }
}

pub struct OpGtHandler;
impl OpcodeHandler for OpGtHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        binary(vm, gas_cost::GT, |lho, rho| bool_word(lho > rho))
    }
}

pub struct OpSLtHandler;
impl OpcodeHandler for OpSLtHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        binary(vm, gas_cost::SLT, |lho, rho| {
            bool_word(signed_cmp(lho, rho) == Ordering::Less)
        })
    }
}

pub struct OpSGtHandler;
impl OpcodeHandler for OpSGtHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        binary(vm, gas_cost::SGT, |lho, rho| {
            bool_word(signed_cmp(lho, rho) == Ordering::Greater)
        })
    }
}

pub struct OpEqHandler;
impl OpcodeHandler for OpEqHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        binary(vm, gas_cost::EQ, |lho, rho| bool_word(lho == rho))
    }
}

pub struct OpIsZeroHandler;
impl OpcodeHandler for OpIsZeroHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::ISZERO)?;
        let operand = frame.stack.pop1()?;
        frame.stack.push(bool_word(operand.is_zero()))?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpAndHandler;
impl OpcodeHandler for OpAndHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        binary(vm, gas_cost::AND, |a, b| a & b)
    }
}

pub struct OpOrHandler;
impl OpcodeHandler for OpOrHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        binary(vm, gas_cost::OR, |a, b| a | b)
    }
}

pub struct OpXorHandler;
impl OpcodeHandler for OpXorHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        binary(vm, gas_cost::XOR, |a, b| a ^ b)
    }
}

pub struct OpNotHandler;
impl OpcodeHandler for OpNotHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::NOT)?;
        let operand = frame.stack.pop1()?;
        frame.stack.push(!operand)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpByteHandler;
impl OpcodeHandler for OpByteHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        binary(vm, gas_cost::BYTE, |index, value| {
            if index >= U256::from(32) {
                return U256::zero();
            }
            // index 0 is the most significant byte
            U256::from(value.byte(31 - index.low_u64() as usize))
        })
    }
}

pub struct OpShlHandler;
impl OpcodeHandler for OpShlHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        binary(vm, gas_cost::SHL, |shift, value| {
            if shift >= U256::from(256) {
                U256::zero()
            } else {
                value << shift.low_u64() as usize
            }
        })
    }
}

pub struct OpShrHandler;
impl OpcodeHandler for OpShrHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        binary(vm, gas_cost::SHR, |shift, value| {
            if shift >= U256::from(256) {
                U256::zero()
            } else {
                value >> shift.low_u64() as usize
            }
        })
    }
}

pub struct OpSarHandler;
impl OpcodeHandler for OpSarHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        binary(vm, gas_cost::SAR, arithmetic_shift_right)
    }
}

/// Count of leading zero bits, 256 for zero (EIP-7939).
pub struct OpClzHandler;
impl OpcodeHandler for OpClzHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::CLZ)?;
        let value = frame.stack.pop1()?;
        frame.stack.push(U256::from(value.leading_zeros()))?;
        Ok(OpcodeResult::Continue)
    }
}

fn arithmetic_shift_right(shift: U256, value: U256) -> U256 {
    let negative = is_negative(value);
    if shift >= U256::from(256) {
        return if negative { U256::MAX } else { U256::zero() };
    }
    let shift = shift.low_u64() as usize;
    if negative {
        !(!value >> shift)
    } else {
        value >> shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_comparison() {
        let minus_one = U256::MAX;
        assert_eq!(signed_cmp(minus_one, U256::one()), Ordering::Less);
        assert_eq!(signed_cmp(U256::one(), minus_one), Ordering::Greater);
        assert_eq!(signed_cmp(minus_one, negate(U256::from(2))), Ordering::Greater);
    }

    #[test]
    fn sar_keeps_the_sign() {
        let minus_sixteen = negate(U256::from(16));
        assert_eq!(
            arithmetic_shift_right(U256::from(4), minus_sixteen),
            U256::MAX
        );
        assert_eq!(
            arithmetic_shift_right(U256::from(2), minus_sixteen),
            negate(U256::from(4))
        );
        assert_eq!(
            arithmetic_shift_right(U256::from(300), minus_sixteen),
            U256::MAX
        );
        assert_eq!(
            arithmetic_shift_right(U256::from(4), U256::from(0x100)),
            U256::from(0x10)
        );
    }
}
