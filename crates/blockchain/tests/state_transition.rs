use std::collections::BTreeMap;

use bytes::Bytes;
use hex_literal::hex;
use keel_blockchain::{
    BlockEnv, apply_body, apply_body_skipping_invalid,
    error::{ChainError, InvalidBlockError, InvalidOmmerError, InvalidTransaction},
    execute_block,
};
use keel_common::{
    Address, H256, U256,
    constants::{
        CONSOLIDATION_REQUEST_PREDEPLOY_ADDRESS, DEFAULT_OMMERS_HASH,
        WITHDRAWAL_REQUEST_PREDEPLOY_ADDRESS,
    },
    types::{
        AuthorizationTuple, Block, BlockBody, BlockHeader, ChainConfig, EIP1559Transaction,
        EIP7702Transaction, Fork, GenesisAccount, LegacyTransaction, Transaction, TxKind,
        calculate_base_fee_per_gas, compute_ommers_hash, compute_transactions_root,
    },
    utils::delegation_code,
};
use keel_crypto::{NativeCrypto, native::address_from_secret_key};
use keel_storage::{InMemoryBackend, WorldState};
use keel_vm::NoopTracer;

const CHAIN_ID: u64 = 1;
const SENDER_KEY: [u8; 32] = [0x45; 32];

fn sender() -> Address {
    address_from_secret_key(&SENDER_KEY).unwrap()
}

fn coinbase() -> Address {
    Address::repeat_byte(0xc0)
}

fn contract() -> Address {
    Address::repeat_byte(0xcc)
}

fn state_with(accounts: impl IntoIterator<Item = (Address, GenesisAccount)>) -> WorldState {
    let alloc: BTreeMap<_, _> = accounts.into_iter().collect();
    let mut state = WorldState::new(Box::new(InMemoryBackend::new()));
    state.load_alloc(&alloc).unwrap();
    state
}

fn funded(balance: u64) -> GenesisAccount {
    GenesisAccount {
        balance: U256::from(balance),
        ..Default::default()
    }
}

fn with_code(code: &[u8], storage: BTreeMap<U256, U256>) -> GenesisAccount {
    GenesisAccount {
        code: Bytes::copy_from_slice(code),
        storage,
        nonce: 1,
        ..Default::default()
    }
}

fn env(fork: Fork) -> BlockEnv {
    BlockEnv {
        fork,
        chain_id: CHAIN_ID,
        coinbase: coinbase(),
        number: 1,
        timestamp: 1000,
        gas_limit: 10_000_000,
        ..Default::default()
    }
}

fn legacy(nonce: u64, to: Address, value: u64, gas: u64, data: &[u8]) -> Transaction {
    let mut tx = Transaction::LegacyTransaction(LegacyTransaction {
        nonce,
        gas_price: U256::one(),
        gas,
        to: TxKind::Call(to),
        value: U256::from(value),
        data: Bytes::copy_from_slice(data),
        ..Default::default()
    });
    tx.sign(&SENDER_KEY, Some(CHAIN_ID)).unwrap();
    tx
}

fn eip1559(nonce: u64, to: Address, max_fee: u64, priority_fee: u64) -> Transaction {
    let mut tx = Transaction::EIP1559Transaction(EIP1559Transaction {
        chain_id: CHAIN_ID,
        nonce,
        max_priority_fee_per_gas: U256::from(priority_fee),
        max_fee_per_gas: U256::from(max_fee),
        gas_limit: 21_000,
        to: TxKind::Call(to),
        ..Default::default()
    });
    tx.sign(&SENDER_KEY, None).unwrap();
    tx
}

fn balance(state: &WorldState, address: Address) -> U256 {
    state.get_account(&address).unwrap().balance
}

#[test]
fn simple_transfer() {
    let recipient = Address::repeat_byte(0x22);
    let mut state = state_with([(sender(), funded(100_000))]);
    let txs = [legacy(0, recipient, 1, 21_000, &[])];

    let result = apply_body(
        &mut state,
        &env(Fork::Istanbul),
        &txs,
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap();

    assert_eq!(result.gas_used, 21_000);
    assert_eq!(balance(&state, sender()), U256::from(78_999));
    assert_eq!(state.get_account(&sender()).unwrap().nonce, 1);
    assert_eq!(balance(&state, recipient), U256::one());
    assert_eq!(balance(&state, coinbase()), U256::from(21_000));
    assert_eq!(result.receipts.len(), 1);
    assert!(result.receipts[0].succeeded);
    assert_eq!(result.receipts[0].cumulative_gas_used, 21_000);
}

#[test]
fn add_then_sstore() {
    // PUSH1 1 PUSH1 2 ADD PUSH1 0 SSTORE
    let code = hex!("6001600201600055");
    let mut state = state_with([
        (sender(), funded(1_000_000)),
        (contract(), with_code(&code, BTreeMap::new())),
    ]);
    let txs = [legacy(0, contract(), 0, 100_000, &[])];

    let result = apply_body(
        &mut state,
        &env(Fork::Istanbul),
        &txs,
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap();

    assert_eq!(
        state.get_storage(&contract(), &H256::zero()).unwrap(),
        U256::from(3)
    );
    assert_eq!(result.gas_used, 21_000 + 4 * 3 + 20_000);
}

#[test]
fn gas_is_conserved_with_refunds() {
    // PUSH1 0 PUSH1 0 SSTORE, clearing a set slot
    let code = hex!("6000600055");
    let storage = BTreeMap::from([(U256::zero(), U256::one())]);
    let initial = 1_000_000u64;
    let gas_limit = 60_000u64;
    let mut state = state_with([
        (sender(), funded(initial)),
        (contract(), with_code(&code, storage)),
    ]);
    let txs = [legacy(0, contract(), 0, gas_limit, &[])];

    let result = apply_body(
        &mut state,
        &env(Fork::Istanbul),
        &txs,
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap();

    let gas_before_refund = 21_000 + 3 + 3 + 5_000;
    let gas_used = gas_before_refund - gas_before_refund / 2;
    assert_eq!(result.gas_used, gas_used);
    let returned = balance(&state, sender()) - (U256::from(initial) - U256::from(gas_limit));
    assert_eq!(returned + U256::from(result.gas_used), U256::from(gas_limit));
    assert_eq!(balance(&state, coinbase()), U256::from(gas_used));
    assert_eq!(
        state.get_storage(&contract(), &H256::zero()).unwrap(),
        U256::zero()
    );
}

#[test]
fn invalid_nonce_is_rejected() {
    let mut state = state_with([(sender(), funded(100_000))]);
    let root = state.state_root().unwrap();
    let txs = [legacy(5, Address::repeat_byte(0x22), 1, 21_000, &[])];

    let error = apply_body(
        &mut state,
        &env(Fork::Istanbul),
        &txs,
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap_err();
    assert!(matches!(
        error,
        ChainError::InvalidBlock(InvalidBlockError::InvalidTransaction(
            0,
            InvalidTransaction::NonceMismatch {
                expected: 0,
                actual: 5
            }
        ))
    ));

    let (result, rejected) = apply_body_skipping_invalid(
        &mut state,
        &env(Fork::Istanbul),
        &txs,
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].index, 0);
    assert_eq!(result.gas_used, 0);
    assert!(result.receipts.is_empty());
    assert_eq!(state.state_root().unwrap(), root);
}

#[test]
fn base_fee_is_burned() {
    let recipient = Address::repeat_byte(0x22);
    let initial = 1_000_000_000u64;
    let mut state = state_with([(sender(), funded(initial))]);
    let block_env = BlockEnv {
        base_fee_per_gas: Some(7),
        ..env(Fork::London)
    };
    let txs = [eip1559(0, recipient, 10, 2)];

    let result = apply_body(
        &mut state,
        &block_env,
        &txs,
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap();

    assert_eq!(result.gas_used, 21_000);
    assert_eq!(
        balance(&state, sender()),
        U256::from(initial - 21_000 * 9)
    );
    assert_eq!(balance(&state, coinbase()), U256::from(21_000 * 2));
    // the empty recipient was touched and pruned
    assert!(!state.account_exists(&recipient).unwrap());
}

#[test]
fn max_fee_below_base_fee_is_rejected() {
    let mut state = state_with([(sender(), funded(1_000_000_000))]);
    let block_env = BlockEnv {
        base_fee_per_gas: Some(20),
        ..env(Fork::London)
    };
    let txs = [eip1559(0, Address::repeat_byte(0x22), 10, 2)];
    let (_, rejected) = apply_body_skipping_invalid(
        &mut state,
        &block_env,
        &txs,
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap();
    assert_eq!(rejected[0].error, InvalidTransaction::MaxFeeBelowBaseFee);
}

#[test]
fn gas_price_times_gas_limit_overflow_is_rejected() {
    let mut state = state_with([(
        sender(),
        GenesisAccount {
            balance: U256::MAX,
            ..Default::default()
        },
    )]);
    let mut tx = Transaction::LegacyTransaction(LegacyTransaction {
        gas_price: U256::MAX,
        gas: 21_000,
        to: TxKind::Call(Address::repeat_byte(0x22)),
        ..Default::default()
    });
    tx.sign(&SENDER_KEY, Some(CHAIN_ID)).unwrap();
    let root = state.state_root().unwrap();

    let error = apply_body(
        &mut state,
        &env(Fork::Istanbul),
        std::slice::from_ref(&tx),
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap_err();
    assert!(matches!(
        error,
        ChainError::InvalidBlock(InvalidBlockError::InvalidTransaction(
            0,
            InvalidTransaction::InsufficientAccountFunds { required, .. }
        )) if required == U256::MAX
    ));

    let (result, rejected) = apply_body_skipping_invalid(
        &mut state,
        &env(Fork::Istanbul),
        &[tx],
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap();
    assert!(matches!(
        rejected[0].error,
        InvalidTransaction::InsufficientAccountFunds { .. }
    ));
    assert_eq!(result.gas_used, 0);
    assert_eq!(state.state_root().unwrap(), root);
}

#[test]
fn value_on_top_of_the_gas_fee_overflowing_is_rejected() {
    let mut state = state_with([(
        sender(),
        GenesisAccount {
            balance: U256::MAX,
            ..Default::default()
        },
    )]);
    let mut tx = Transaction::LegacyTransaction(LegacyTransaction {
        gas_price: U256::one(),
        gas: 21_000,
        to: TxKind::Call(Address::repeat_byte(0x22)),
        value: U256::MAX - U256::from(20_000),
        ..Default::default()
    });
    tx.sign(&SENDER_KEY, Some(CHAIN_ID)).unwrap();

    let (_, rejected) = apply_body_skipping_invalid(
        &mut state,
        &env(Fork::Istanbul),
        &[tx],
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap();
    assert_eq!(rejected.len(), 1);
    assert!(matches!(
        rejected[0].error,
        InvalidTransaction::InsufficientAccountFunds { required, .. } if required == U256::MAX
    ));
}

#[test]
fn typed_transactions_need_their_fork() {
    let mut state = state_with([(sender(), funded(1_000_000_000))]);
    let txs = [eip1559(0, Address::repeat_byte(0x22), 10, 2)];
    let (_, rejected) = apply_body_skipping_invalid(
        &mut state,
        &env(Fork::Berlin),
        &txs,
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap();
    assert!(matches!(
        rejected[0].error,
        InvalidTransaction::UnsupportedTxType(_)
    ));
}

#[test]
fn pre_byzantium_receipts_carry_the_state_root() {
    let mut state = state_with([(sender(), funded(100_000))]);
    let txs = [legacy(0, Address::repeat_byte(0x22), 1, 21_000, &[])];
    let result = apply_body(
        &mut state,
        &env(Fork::SpuriousDragon),
        &txs,
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap();
    assert_eq!(
        result.receipts[0].post_state,
        Some(state.state_root().unwrap())
    );
}

#[test]
fn miner_is_rewarded_before_the_merge() {
    let mut state = state_with([(sender(), funded(100_000))]);
    let block_env = BlockEnv {
        block_reward: keel_blockchain::block_reward(Fork::Istanbul),
        ..env(Fork::Istanbul)
    };
    apply_body(
        &mut state,
        &block_env,
        &[],
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap();
    assert_eq!(balance(&state, coinbase()), U256::from(2) * U256::exp10(18));
}

fn paris_block(state: &mut WorldState, parent: &BlockHeader) -> Block {
    let transactions = vec![eip1559(0, Address::repeat_byte(0x22), 2_000_000_000, 1)];
    let mut header = BlockHeader {
        parent_hash: parent.hash(),
        ommers_hash: DEFAULT_OMMERS_HASH,
        coinbase: coinbase(),
        number: parent.number + 1,
        gas_limit: parent.gas_limit,
        timestamp: parent.timestamp + 12,
        prev_randao: H256::repeat_byte(0x11),
        base_fee_per_gas: Some(calculate_base_fee_per_gas(
            parent.gas_limit,
            parent.gas_used,
            parent.base_fee_per_gas.unwrap_or_default(),
        )),
        transactions_root: compute_transactions_root(&transactions),
        ..Default::default()
    };
    let chain_config = ChainConfig::for_fork(Fork::Paris, CHAIN_ID);
    let env = BlockEnv::from_header(&header, None, &chain_config, BTreeMap::new());
    let result = apply_body(
        state,
        &env,
        &transactions,
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap();
    header.gas_used = result.gas_used;
    header.receipts_root = result.receipts_root;
    header.logs_bloom = result.logs_bloom;
    header.state_root = state.state_root().unwrap();
    Block::new(
        header,
        BlockBody {
            transactions,
            ..BlockBody::empty()
        },
    )
}

#[test]
fn execute_block_checks_the_header() {
    let alloc = [(sender(), funded(1_000_000_000_000_000_000))];
    let parent = BlockHeader {
        ommers_hash: DEFAULT_OMMERS_HASH,
        gas_limit: 30_000_000,
        base_fee_per_gas: Some(1_000_000_000),
        ..Default::default()
    };
    let chain_config = ChainConfig::for_fork(Fork::Paris, CHAIN_ID);
    let block = paris_block(&mut state_with(alloc.clone()), &parent);
    let ancestors = [Block::new(parent, BlockBody::empty())];

    let mut state = state_with(alloc.clone());
    let result = execute_block(&mut state, &ancestors, &block, &chain_config).unwrap();
    assert_eq!(result.gas_used, 21_000);
    assert_eq!(state.state_root().unwrap(), block.header.state_root);

    let mut wrong_root = block.clone();
    wrong_root.header.state_root = H256::repeat_byte(0xab);
    let error = execute_block(
        &mut state_with(alloc.clone()),
        &ancestors,
        &wrong_root,
        &chain_config,
    )
    .unwrap_err();
    assert!(matches!(
        error,
        ChainError::InvalidBlock(InvalidBlockError::StateRootMismatch { .. })
    ));

    let mut wrong_gas = block.clone();
    wrong_gas.header.gas_used = 21_001;
    let error = execute_block(&mut state_with(alloc.clone()), &ancestors, &wrong_gas, &chain_config)
        .unwrap_err();
    assert!(matches!(
        error,
        ChainError::InvalidBlock(InvalidBlockError::GasUsedMismatch {
            expected: 21_001,
            computed: 21_000
        })
    ));

    let mut wrong_number = block;
    wrong_number.header.number = 5;
    let error = execute_block(&mut state_with(alloc), &ancestors, &wrong_number, &chain_config)
        .unwrap_err();
    assert!(matches!(
        error,
        ChainError::InvalidBlock(InvalidBlockError::InvalidHeader(_))
    ));
}

#[test]
fn execute_block_rejects_a_future_numbered_ommer() {
    let chain_config = ChainConfig::for_fork(Fork::Istanbul, CHAIN_ID);
    let parent = Block::new(
        BlockHeader {
            ommers_hash: DEFAULT_OMMERS_HASH,
            gas_limit: 1_000_000,
            difficulty: U256::from(131_072),
            ..Default::default()
        },
        BlockBody::empty(),
    );
    let ommers = vec![BlockHeader {
        parent_hash: parent.hash(),
        coinbase: Address::repeat_byte(0x0e),
        number: 2,
        gas_limit: 1_000_000,
        timestamp: 20,
        ..Default::default()
    }];
    let header = BlockHeader {
        parent_hash: parent.hash(),
        ommers_hash: compute_ommers_hash(&ommers),
        coinbase: coinbase(),
        number: 1,
        gas_limit: 1_000_000,
        timestamp: 10,
        transactions_root: compute_transactions_root(&[]),
        ..Default::default()
    };
    let block = Block::new(
        header,
        BlockBody {
            ommers,
            ..BlockBody::empty()
        },
    );

    let mut state = state_with([(sender(), funded(1))]);
    let error = execute_block(&mut state, &[parent], &block, &chain_config).unwrap_err();
    assert!(matches!(
        error,
        ChainError::InvalidBlock(InvalidBlockError::InvalidOmmer(
            _,
            InvalidOmmerError::NumberOutOfRange { ommer: 2, block: 1 }
        ))
    ));
}

#[test]
fn execute_block_needs_a_parent() {
    let block = Block::new(BlockHeader::default(), BlockBody::empty());
    let error = execute_block(
        &mut state_with([(sender(), funded(1))]),
        &[],
        &block,
        &ChainConfig::for_fork(Fork::Istanbul, CHAIN_ID),
    )
    .unwrap_err();
    assert!(matches!(
        error,
        ChainError::InvalidBlock(InvalidBlockError::MissingParent)
    ));
}

const AUTHORITY_KEY: [u8; 32] = [0x77; 32];

/// Prague state: `accounts` plus request predeploys with empty queues.
fn prague_state(accounts: impl IntoIterator<Item = (Address, GenesisAccount)>) -> WorldState {
    let stop = with_code(&[0x00], BTreeMap::new());
    state_with(accounts.into_iter().chain([
        (WITHDRAWAL_REQUEST_PREDEPLOY_ADDRESS, stop.clone()),
        (CONSOLIDATION_REQUEST_PREDEPLOY_ADDRESS, stop),
    ]))
}

fn post_merge_env(fork: Fork) -> BlockEnv {
    BlockEnv {
        base_fee_per_gas: Some(1),
        prev_randao: Some(H256::zero()),
        excess_blob_gas: Some(0),
        gas_limit: 30_000_000,
        ..env(fork)
    }
}

fn authorization(key: &[u8; 32], chain_id: u64, address: Address) -> AuthorizationTuple {
    let mut authorization = AuthorizationTuple {
        chain_id: U256::from(chain_id),
        address,
        nonce: 0,
        ..Default::default()
    };
    authorization.sign(key).unwrap();
    authorization
}

fn set_code(to: Address, authorization_list: Vec<AuthorizationTuple>) -> Transaction {
    let mut tx = Transaction::EIP7702Transaction(EIP7702Transaction {
        chain_id: CHAIN_ID,
        max_fee_per_gas: U256::from(10),
        gas_limit: 200_000,
        to,
        authorization_list,
        ..Default::default()
    });
    tx.sign(&SENDER_KEY, None).unwrap();
    tx
}

fn rejection(state: &mut WorldState, env: &BlockEnv, tx: Transaction) -> InvalidTransaction {
    match apply_body(state, env, &[tx], &[], &NativeCrypto, &mut NoopTracer) {
        Err(ChainError::InvalidBlock(InvalidBlockError::InvalidTransaction(0, error))) => error,
        other => panic!("expected an invalid transaction, got {other:?}"),
    }
}

#[test]
fn set_code_transaction_delegates_the_authority() {
    let authority = address_from_secret_key(&AUTHORITY_KEY).unwrap();
    let other_chain_key = [0x88; 32];
    let other_chain = address_from_secret_key(&other_chain_key).unwrap();
    // PUSH1 1 PUSH1 0 SSTORE
    let mut state = prague_state([
        (sender(), funded(10_000_000)),
        (contract(), with_code(&hex!("6001600055"), BTreeMap::new())),
    ]);
    let tx = set_code(
        authority,
        vec![
            authorization(&AUTHORITY_KEY, CHAIN_ID, contract()),
            authorization(&other_chain_key, 5, contract()),
        ],
    );

    let result = apply_body(
        &mut state,
        &post_merge_env(Fork::Prague),
        &[tx],
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap();

    assert!(result.receipts[0].succeeded);
    let delegated = state.get_account(&authority).unwrap();
    assert_eq!(delegated.code, delegation_code(contract()));
    assert_eq!(delegated.nonce, 1);
    // the delegate code ran against the authority's storage
    assert_eq!(
        state.get_storage(&authority, &H256::zero()).unwrap(),
        U256::one()
    );
    assert_eq!(
        state.get_storage(&contract(), &H256::zero()).unwrap(),
        U256::zero()
    );
    let skipped = state.get_account(&other_chain).unwrap();
    assert!(!skipped.has_code());
    assert_eq!(skipped.nonce, 0);
}

#[test]
fn empty_authorization_list_is_rejected() {
    let mut state = prague_state([(sender(), funded(10_000_000))]);
    let error = rejection(
        &mut state,
        &post_merge_env(Fork::Prague),
        set_code(contract(), Vec::new()),
    );
    assert!(matches!(error, InvalidTransaction::EmptyAuthorizationList));
}

#[test]
fn delegated_account_can_still_send() {
    let delegated_sender = GenesisAccount {
        code: delegation_code(contract()),
        balance: U256::from(100_000),
        ..Default::default()
    };
    let mut state = prague_state([(sender(), delegated_sender)]);
    let txs = [legacy(0, Address::repeat_byte(0x22), 1, 21_000, &[])];

    let result = apply_body(
        &mut state,
        &post_merge_env(Fork::Prague),
        &txs,
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap();
    assert_eq!(result.gas_used, 21_000);
}

#[test]
fn calldata_heavy_transactions_pay_the_floor() {
    let recipient = Address::repeat_byte(0x22);
    let data = [0xff; 100];
    let mut state = prague_state([(sender(), funded(1_000_000))]);

    let error = rejection(
        &mut state,
        &post_merge_env(Fork::Prague),
        legacy(0, recipient, 0, 24_999, &data),
    );
    assert!(matches!(
        error,
        InvalidTransaction::IntrinsicGasTooLow {
            intrinsic: 25_000,
            gas_limit: 24_999
        }
    ));

    let result = apply_body(
        &mut state,
        &post_merge_env(Fork::Prague),
        &[legacy(0, recipient, 0, 30_000, &data)],
        &[],
        &NativeCrypto,
        &mut NoopTracer,
    )
    .unwrap();
    // execution alone would charge 21000 + 100 * 16
    assert_eq!(result.gas_used, 25_000);
    assert_eq!(balance(&state, sender()), U256::from(1_000_000 - 25_000));
}

#[test]
fn osaka_caps_the_transaction_gas_limit() {
    let mut state = prague_state([(sender(), funded(u64::MAX))]);
    let mut tx = Transaction::EIP1559Transaction(EIP1559Transaction {
        chain_id: CHAIN_ID,
        max_fee_per_gas: U256::one(),
        gas_limit: (1 << 24) + 1,
        to: TxKind::Call(Address::repeat_byte(0x22)),
        ..Default::default()
    });
    tx.sign(&SENDER_KEY, None).unwrap();

    let error = rejection(&mut state, &post_merge_env(Fork::Osaka), tx.clone());
    assert!(matches!(error, InvalidTransaction::GasLimitAboveCap(limit) if limit == (1 << 24) + 1));
    assert!(
        apply_body(
            &mut state,
            &post_merge_env(Fork::Prague),
            &[tx],
            &[],
            &NativeCrypto,
            &mut NoopTracer,
        )
        .is_ok()
    );
}
