use ethereum_types::{U256, U512};

use crate::{
    errors::{InternalError, OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::VM,
};

// Arithmetic Operations (11)
// Opcodes: ADD, SUB, MUL, DIV, SDIV, MOD, SMOD, ADDMOD, MULMOD, EXP, SIGNEXTEND

pub struct OpAddHandler;
impl OpcodeHandler for OpAddHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::ADD)?;
        let [augend, addend] = frame.stack.pop()?;
        frame.stack.push(augend.overflowing_add(addend).0)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpSubHandler;
impl OpcodeHandler for OpSubHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::SUB)?;
        let [minuend, subtrahend] = frame.stack.pop()?;
        frame.stack.push(minuend.overflowing_sub(subtrahend).0)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpMulHandler;
impl OpcodeHandler for OpMulHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::MUL)?;
        let [multiplicand, multiplier] = frame.stack.pop()?;
        frame.stack.push(multiplicand.overflowing_mul(multiplier).0)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpDivHandler;
impl OpcodeHandler for OpDivHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::DIV)?;
        let [dividend, divisor] = frame.stack.pop()?;
        frame
            .stack
            .push(dividend.checked_div(divisor).unwrap_or_default())?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpSDivHandler;
impl OpcodeHandler for OpSDivHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::SDIV)?;
        let [dividend, divisor] = frame.stack.pop()?;
        if divisor.is_zero() {
            frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }
        let quotient = abs(dividend) / abs(divisor);
        let quotient = if is_negative(dividend) ^ is_negative(divisor) {
            negate(quotient)
        } else {
            quotient
        };
        frame.stack.push(quotient)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpModHandler;
impl OpcodeHandler for OpModHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::MOD)?;
        let [dividend, divisor] = frame.stack.pop()?;
        frame
            .stack
            .push(dividend.checked_rem(divisor).unwrap_or_default())?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpSModHandler;
impl OpcodeHandler for OpSModHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::SMOD)?;
        let [dividend, divisor] = frame.stack.pop()?;
        if divisor.is_zero() {
            frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }
        // the remainder takes the sign of the dividend
        let remainder = abs(dividend) % abs(divisor);
        let remainder = if is_negative(dividend) {
            negate(remainder)
        } else {
            remainder
        };
        frame.stack.push(remainder)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpAddModHandler;
impl OpcodeHandler for OpAddModHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::ADDMOD)?;
        let [augend, addend, modulus] = frame.stack.pop()?;
        if modulus.is_zero() {
            frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }
        let sum = U512::from(augend) + U512::from(addend);
        frame.stack.push(narrow(sum % U512::from(modulus))?)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpMulModHandler;
impl OpcodeHandler for OpMulModHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::MULMOD)?;
        let [multiplicand, multiplier, modulus] = frame.stack.pop()?;
        if modulus.is_zero() {
            frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }
        let product = multiplicand.full_mul(multiplier);
        frame.stack.push(narrow(product % U512::from(modulus))?)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpExpHandler;
impl OpcodeHandler for OpExpHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let schedule = vm.config.gas;
        let frame = &mut vm.current_call_frame;
        let [base, exponent] = frame.stack.pop()?;
        frame.increase_consumed_gas(gas_cost::exp(exponent, schedule)?)?;
        frame.stack.push(base.overflowing_pow(exponent).0)?;
        Ok(OpcodeResult::Continue)
    }
}

pub struct OpSignExtendHandler;
impl OpcodeHandler for OpSignExtendHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::SIGNEXTEND)?;
        let [byte_size, value] = frame.stack.pop()?;
        frame.stack.push(sign_extend(byte_size, value))?;
        Ok(OpcodeResult::Continue)
    }
}

/// Extends the sign bit of byte `byte_size`, counted from the least significant one.
fn sign_extend(byte_size: U256, value: U256) -> U256 {
    if byte_size >= U256::from(31) {
        return value;
    }
    let sign_bit = byte_size.low_u64() as usize * 8 + 7;
    let mask = (U256::one() << (sign_bit + 1)) - 1;
    if value.bit(sign_bit) {
        value | !mask
    } else {
        value & mask
    }
}

pub(crate) fn is_negative(value: U256) -> bool {
    value.bit(255)
}

/// Two's complement negation.
pub(crate) fn negate(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn abs(value: U256) -> U256 {
    if is_negative(value) {
        negate(value)
    } else {
        value
    }
}

fn narrow(value: U512) -> Result<U256, VMError> {
    U256::try_from(value).map_err(|_| InternalError::TypeConversion.into())
}
