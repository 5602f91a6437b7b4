use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use hex_literal::hex;
use keel_common::{
    types::{Account, Fork, TxKind},
    utils::delegation_code,
};
use keel_crypto::NativeCrypto;
use keel_storage::{InMemoryBackend, WorldState};
use keel_vm::{
    Environment, ExceptionalHalt, ExecutionReport, ForkConfig, Message, NoopTracer, TxResult,
    VM, VMError, precompiles::IDENTITY_ADDRESS, utils::calculate_create2_address,
};

fn sender() -> Address {
    Address::from_low_u64_be(0x5e4d)
}

fn contract() -> Address {
    Address::from_low_u64_be(0xc0de)
}

fn state_with(accounts: &[(Address, Account)]) -> WorldState {
    let mut state = WorldState::new(Box::new(InMemoryBackend::new()));
    state
        .set_account(sender(), Account::new(0, U256::from(10u64.pow(18)), Bytes::new()))
        .unwrap();
    for (address, account) in accounts {
        state.set_account(*address, account.clone()).unwrap();
    }
    state
}

fn with_code(code: &[u8]) -> Account {
    Account::new(1, U256::zero(), Bytes::copy_from_slice(code))
}

fn call(to: Address, gas: u64) -> Message {
    Message {
        caller: sender(),
        target: TxKind::Call(to),
        current_target: to,
        gas,
        ..Default::default()
    }
}

fn run(fork: Fork, state: &mut WorldState, message: Message) -> ExecutionReport {
    let config = ForkConfig::new(fork);
    let mut tracer = NoopTracer;
    let mut vm = VM::new(
        Environment::default(),
        state,
        &config,
        &NativeCrypto,
        &mut tracer,
    );
    vm.execute(message).unwrap()
}

fn word(value: impl Into<U256>) -> Bytes {
    Bytes::copy_from_slice(&value.into().to_big_endian())
}

#[test]
fn adds_and_returns() {
    // PUSH1 2 PUSH1 3 ADD PUSH1 0 MSTORE PUSH1 32 PUSH1 0 RETURN
    let code = hex!("6002600301600052602060" "00f3");
    let mut state = state_with(&[(contract(), with_code(&code))]);
    let report = run(Fork::Cancun, &mut state, call(contract(), 100_000));
    assert!(report.is_success());
    assert_eq!(report.output, word(5));
    assert_eq!(report.gas_used, 24);
}

#[test]
fn running_off_the_end_of_the_code_stops() {
    // PUSH1 1 PUSH1 0 SSTORE, then a PUSH2 missing its second byte
    let code = hex!("6001600055" "6101");
    let mut state = state_with(&[(contract(), with_code(&code))]);
    let report = run(Fork::Cancun, &mut state, call(contract(), 100_000));
    assert!(report.is_success());
    assert!(report.output.is_empty());
    assert_eq!(
        state.get_storage(&contract(), &H256::zero()).unwrap(),
        U256::one()
    );
}

#[test]
fn revert_keeps_output_and_drops_writes() {
    // PUSH1 1 PUSH1 0 SSTORE PUSH1 0xaa PUSH1 0 MSTORE8 PUSH1 1 PUSH1 0 REVERT
    let code = hex!("600160005560aa60005360016000fd");
    let mut state = state_with(&[(contract(), with_code(&code))]);
    let report = run(Fork::Cancun, &mut state, call(contract(), 100_000));
    assert!(matches!(report.result, TxResult::Revert(VMError::RevertOpcode)));
    assert_eq!(report.output, Bytes::from_static(&[0xaa]));
    // cold slot write plus the six cheap opcodes and one word of memory
    assert_eq!(report.gas_used, 22_124);
    assert_eq!(
        state.get_storage(&contract(), &H256::zero()).unwrap(),
        U256::zero()
    );
}

#[test]
fn exceptional_halt_consumes_all_gas() {
    // PUSH1 1 PUSH1 0 SSTORE
    let code = hex!("6001600055");
    let mut state = state_with(&[(contract(), with_code(&code))]);
    let report = run(Fork::Cancun, &mut state, call(contract(), 5_000));
    assert!(matches!(
        report.result,
        TxResult::Revert(VMError::ExceptionalHalt(ExceptionalHalt::OutOfGas))
    ));
    assert_eq!(report.gas_used, 5_000);
    assert!(report.output.is_empty());
}

#[test]
fn static_call_cannot_write() {
    let writer = Address::from_low_u64_be(0xbeef);
    // PUSH1 1 PUSH1 0 SSTORE
    let writer_code = hex!("6001600055");
    // STATICCALL(0xffff, writer, 0, 0, 0, 0), then return the call status
    let mut caller_code = hex!("6000600060006000" "73" "0000000000000000000000000000000000000000" "61fffffa").to_vec();
    caller_code[9..29].copy_from_slice(writer.as_bytes());
    caller_code.extend(hex!("60005260206000f3"));

    let mut state = state_with(&[
        (contract(), with_code(&caller_code)),
        (writer, with_code(&writer_code)),
    ]);
    let report = run(Fork::Cancun, &mut state, call(contract(), 200_000));
    assert!(report.is_success());
    assert_eq!(report.output, word(0));
    assert_eq!(
        state.get_storage(&writer, &H256::zero()).unwrap(),
        U256::zero()
    );
}

#[test]
fn create2_deploys_at_the_salted_address() {
    // init code: PUSH1 0x2a PUSH1 0 MSTORE8 PUSH1 1 PUSH1 0 RETURN
    let init_code = hex!("602a60005360016000f3");
    // PUSH10 <init code> PUSH1 0 MSTORE, CREATE2(0, 22, 10, salt 0), return the address
    let mut factory = vec![0x69];
    factory.extend(init_code);
    factory.extend(hex!("600052" "6000600a60166000f5" "60005260206000f3"));

    let mut state = state_with(&[(contract(), with_code(&factory))]);
    let report = run(Fork::Cancun, &mut state, call(contract(), 200_000));
    assert!(report.is_success());

    let expected = calculate_create2_address(contract(), &init_code, U256::zero());
    assert_eq!(report.output, word(U256::from_big_endian(expected.as_bytes())));
    let created = state.get_account(&expected).unwrap();
    assert_eq!(created.code, Bytes::from_static(&[0x2a]));
    assert_eq!(created.nonce, 1);
    assert_eq!(state.get_account(&contract()).unwrap().nonce, 2);
}

#[test]
fn creation_collision_burns_the_gas() {
    let target = Address::from_low_u64_be(0xdead);
    let mut state = state_with(&[(target, Account::new(1, U256::zero(), Bytes::new()))]);
    let message = Message {
        caller: sender(),
        target: TxKind::Create,
        current_target: target,
        data: Bytes::from_static(&hex!("00")),
        gas: 50_000,
        ..Default::default()
    };
    let report = run(Fork::Cancun, &mut state, message);
    assert!(matches!(
        report.result,
        TxResult::Revert(VMError::ExceptionalHalt(ExceptionalHalt::AddressCollision))
    ));
    assert_eq!(report.gas_used, 50_000);
    assert_eq!(report.created_address, None);
}

#[test]
fn creation_onto_storage_collides() {
    let target = Address::from_low_u64_be(0xdead);
    let mut state = state_with(&[]);
    state
        .set_storage(target, H256::from_low_u64_be(1), U256::one())
        .unwrap();
    let message = Message {
        caller: sender(),
        target: TxKind::Create,
        current_target: target,
        data: Bytes::from_static(&hex!("00")),
        gas: 50_000,
        ..Default::default()
    };
    let report = run(Fork::Cancun, &mut state, message);
    assert!(matches!(
        report.result,
        TxResult::Revert(VMError::ExceptionalHalt(ExceptionalHalt::AddressCollision))
    ));
    assert_eq!(report.gas_used, 50_000);
}

#[test]
fn create2_onto_storage_pushes_zero() {
    let init_code = hex!("602a60005360016000f3");
    let mut factory = vec![0x69];
    factory.extend(init_code);
    factory.extend(hex!("600052" "6000600a60166000f5" "60005260206000f3"));
    let expected = calculate_create2_address(contract(), &init_code, U256::zero());

    let mut state = state_with(&[(contract(), with_code(&factory))]);
    state
        .set_storage(expected, H256::zero(), U256::from(7))
        .unwrap();
    let report = run(Fork::Cancun, &mut state, call(contract(), 200_000));
    assert!(report.is_success());
    assert_eq!(report.output, word(0));
    assert!(state.get_account(&expected).unwrap().code.is_empty());
    // the factory still pays the nonce
    assert_eq!(state.get_account(&contract()).unwrap().nonce, 2);
}

#[test]
fn top_level_precompile_call() {
    let mut state = state_with(&[]);
    let mut message = call(IDENTITY_ADDRESS, 1_000);
    message.data = Bytes::from_static(&[1, 2, 3]);
    let report = run(Fork::Cancun, &mut state, message);
    assert!(report.is_success());
    assert_eq!(report.output, Bytes::from_static(&[1, 2, 3]));
    assert_eq!(report.gas_used, 18);
}

#[test]
fn selfdestruct_after_cancun_only_moves_the_balance() {
    let beneficiary = Address::from_low_u64_be(0xbe2e);
    // PUSH20 beneficiary SELFDESTRUCT
    let mut code = vec![0x73];
    code.extend(beneficiary.as_bytes());
    code.push(0xff);
    let account = Account::new(1, U256::from(100), Bytes::from(code.clone()));

    let mut state = state_with(&[(contract(), account)]);
    let report = run(Fork::Cancun, &mut state, call(contract(), 100_000));
    assert!(report.is_success());
    // push, base cost, cold beneficiary and a new account
    assert_eq!(report.gas_used, 3 + 5_000 + 2_600 + 25_000);
    assert!(report.accounts_to_delete.is_empty());
    assert_eq!(
        state.get_account(&beneficiary).unwrap().balance,
        U256::from(100)
    );
    let remaining = state.get_account(&contract()).unwrap();
    assert_eq!(remaining.balance, U256::zero());
    assert_eq!(remaining.code, Bytes::from(code));

    // the same contract before Cancun is scheduled for deletion
    let account = Account::new(1, U256::from(100), remaining.code);
    let mut state = state_with(&[(contract(), account)]);
    let report = run(Fork::Shanghai, &mut state, call(contract(), 100_000));
    assert!(report.accounts_to_delete.contains(&contract()));
}

#[test]
fn frontier_has_no_shift_opcodes() {
    // PUSH1 1 PUSH1 1 SHL
    let code = hex!("600160011b");
    let mut state = state_with(&[(contract(), with_code(&code))]);
    let report = run(Fork::Frontier, &mut state, call(contract(), 10_000));
    assert!(matches!(
        report.result,
        TxResult::Revert(VMError::ExceptionalHalt(ExceptionalHalt::InvalidOpcode))
    ));
    let report = run(Fork::Constantinople, &mut state, call(contract(), 10_000));
    assert!(report.is_success());
}

#[test]
fn clz_arrives_with_osaka() {
    // PUSH1 1 CLZ PUSH1 0 MSTORE PUSH1 32 PUSH1 0 RETURN
    let code = hex!("60011e60005260206000f3");
    let mut state = state_with(&[(contract(), with_code(&code))]);
    let report = run(Fork::Osaka, &mut state, call(contract(), 10_000));
    assert!(report.is_success());
    assert_eq!(report.output, word(255));
    let report = run(Fork::Prague, &mut state, call(contract(), 10_000));
    assert!(matches!(
        report.result,
        TxResult::Revert(VMError::ExceptionalHalt(ExceptionalHalt::InvalidOpcode))
    ));
}

#[test]
fn delegated_account_runs_the_delegate_code() {
    let authority = Address::from_low_u64_be(0xa11ce);
    // ADDRESS PUSH1 0 MSTORE PUSH1 32 PUSH1 0 RETURN
    let code = hex!("3060005260206000f3");
    let delegating = Account::new(1, U256::zero(), delegation_code(contract()));
    let mut state = state_with(&[(contract(), with_code(&code)), (authority, delegating)]);

    let report = run(Fork::Prague, &mut state, call(authority, 100_000));
    assert!(report.is_success());
    assert_eq!(report.output, word(U256::from_big_endian(authority.as_bytes())));

    // before Prague the designator is just code starting with an invalid opcode
    let report = run(Fork::Cancun, &mut state, call(authority, 100_000));
    assert!(matches!(
        report.result,
        TxResult::Revert(VMError::ExceptionalHalt(ExceptionalHalt::InvalidOpcode))
    ));
}

#[test]
fn delegation_to_a_precompile_runs_nothing() {
    let authority = Address::from_low_u64_be(0xa11ce);
    let delegating = Account::new(1, U256::zero(), delegation_code(IDENTITY_ADDRESS));
    let mut state = state_with(&[(authority, delegating)]);
    let mut message = call(authority, 1_000);
    message.data = Bytes::from_static(&[1, 2, 3]);
    let report = run(Fork::Prague, &mut state, message);
    assert!(report.is_success());
    assert!(report.output.is_empty());
    assert_eq!(report.gas_used, 0);
}

#[test]
fn calling_a_delegated_account_pays_for_the_delegate() {
    let authority = Address::from_low_u64_be(0xa11ce);
    let delegate = Address::from_low_u64_be(0xd00d);
    let delegating = Account::new(1, U256::zero(), delegation_code(delegate));
    // CALL(0, authority, 0, 0, 0, 0, 0) then GAS, return the remaining gas
    let mut code = hex!("60006000600060006000" "73").to_vec();
    code.extend(authority.as_bytes());
    code.extend(hex!("6000" "f1" "50" "5a" "60005260206000f3"));
    let mut state = state_with(&[
        (contract(), with_code(&code)),
        (authority, delegating.clone()),
        (delegate, with_code(&hex!("00"))),
    ]);
    let direct = run(Fork::Prague, &mut state, call(contract(), 100_000));

    let mut state = state_with(&[
        (contract(), with_code(&code)),
        (authority, Account::new(1, U256::zero(), Bytes::new())),
    ]);
    let plain = run(Fork::Prague, &mut state, call(contract(), 100_000));
    assert!(direct.is_success() && plain.is_success());
    // a cold delegate costs 2600 on top of the cold callee
    assert_eq!(direct.gas_used - plain.gas_used, 2_600);
}
