use ethereum_types::{Address, Bloom, H256, U256};
use keel_blockchain::{BlockEnv, BodyExecutionResult, RejectedTransaction};
use keel_common::{
    serde_utils,
    types::{EncodedRequests, Log},
};
use serde::Serialize;

/// The `result` output: roots, receipts and what was left out of the block.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResultOutput {
    pub state_root: H256,
    pub tx_root: H256,
    pub receipts_root: H256,
    pub logs_bloom: Bloom,
    pub receipts: Vec<ReceiptOutput>,
    pub rejected: Vec<RejectedOutput>,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub gas_used: u64,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "serde_utils::u256::hex_str_opt"
    )]
    pub current_difficulty: Option<U256>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "serde_utils::u64::hex_str_opt"
    )]
    pub current_base_fee: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<H256>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "serde_utils::u64::hex_str_opt"
    )]
    pub current_excess_blob_gas: Option<u64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "serde_utils::u64::hex_str_opt"
    )]
    pub blob_gas_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_hash: Option<H256>,
    /// Non-empty requests, type byte first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<Vec<EncodedRequests>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptOutput {
    #[serde(rename = "type", with = "serde_utils::u64::hex_str")]
    pub tx_type: u64,
    /// Post state root, only for receipts before Byzantium.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<H256>,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub status: u64,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub cumulative_gas_used: u64,
    pub logs_bloom: Bloom,
    pub logs: Vec<Log>,
    pub transaction_hash: H256,
    pub contract_address: Option<Address>,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub gas_used: u64,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub transaction_index: u64,
}

#[derive(Debug, Serialize)]
pub struct RejectedOutput {
    /// Position in the transactions input.
    pub index: usize,
    pub error: String,
}

impl ExecutionResultOutput {
    pub fn new(
        state_root: H256,
        env: &BlockEnv,
        result: BodyExecutionResult,
        rejected: &[RejectedTransaction],
    ) -> Self {
        let receipts = result
            .transactions
            .into_iter()
            .enumerate()
            .map(|(position, outcome)| ReceiptOutput {
                tx_type: outcome.receipt.tx_type as u64,
                root: outcome.receipt.post_state,
                status: u64::from(outcome.receipt.succeeded),
                cumulative_gas_used: outcome.receipt.cumulative_gas_used,
                logs_bloom: outcome.receipt.bloom,
                logs: outcome.receipt.logs,
                transaction_hash: outcome.hash,
                contract_address: outcome.contract_address,
                gas_used: outcome.gas_used,
                transaction_index: position as u64,
            })
            .collect();
        let rejected = rejected
            .iter()
            .map(|rejected| RejectedOutput {
                index: rejected.index,
                error: rejected.error.to_string(),
            })
            .collect();

        Self {
            state_root,
            tx_root: result.transactions_root,
            receipts_root: result.receipts_root,
            logs_bloom: result.logs_bloom,
            receipts,
            rejected,
            gas_used: result.gas_used,
            current_difficulty: env.prev_randao.is_none().then_some(env.difficulty),
            current_base_fee: env.base_fee_per_gas,
            withdrawals_root: result.withdrawals_root,
            current_excess_blob_gas: env.excess_blob_gas,
            blob_gas_used: env.excess_blob_gas.map(|_| result.blob_gas_used),
            requests_hash: result.requests_hash,
            requests: result.requests_hash.map(|_| {
                result
                    .requests
                    .into_iter()
                    .filter(EncodedRequests::has_data)
                    .collect()
            }),
        }
    }
}
