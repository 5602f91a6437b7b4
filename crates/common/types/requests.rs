//! Execution layer requests to the consensus layer (EIP-7685).

use bytes::Bytes;
use ethereum_types::H256;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::Receipt;
use crate::constants::{DEPOSIT_CONTRACT_ADDRESS, DEPOSIT_EVENT_TOPIC};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Deposit = 0x00,
    Withdrawal = 0x01,
    Consolidation = 0x02,
}

/// `request_type || request_data`, as committed to by the requests hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedRequests(#[serde(with = "crate::serde_utils::bytes")] pub Bytes);

impl EncodedRequests {
    pub fn new(request_type: RequestType, data: &[u8]) -> Self {
        let mut encoded = Vec::with_capacity(data.len() + 1);
        encoded.push(request_type as u8);
        encoded.extend_from_slice(data);
        Self(Bytes::from(encoded))
    }

    /// Requests of a type that produced no data are left out of the hash.
    pub fn has_data(&self) -> bool {
        self.0.len() > 1
    }
}

/// sha256 over the sha256 of each non-empty request list.
pub fn compute_requests_hash(requests: &[EncodedRequests]) -> H256 {
    let mut hasher = Sha256::new();
    for request in requests.iter().filter(|request| request.has_data()) {
        hasher.update(Sha256::digest(&request.0));
    }
    H256::from_slice(&hasher.finalize())
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DepositError {
    #[error("deposit log data has {0} bytes")]
    InvalidLength(usize),
    #[error("deposit log field at {0} has an unexpected offset or size")]
    InvalidLayout(usize),
}

/// Byte ranges of the deposit fields inside the ABI encoded `DepositEvent` data.
/// Each entry is the head offset, the expected tail offset and the field size.
const DEPOSIT_LAYOUT: [(usize, usize, usize); 5] = [
    (0, 160, 48),  // pubkey
    (32, 256, 32), // withdrawal credentials
    (64, 320, 8),  // amount
    (96, 384, 96), // signature
    (128, 512, 8), // index
];
const DEPOSIT_LOG_SIZE: usize = 576;
pub const DEPOSIT_REQUEST_SIZE: usize = 192;

fn read_word(data: &[u8], at: usize) -> Option<usize> {
    let word = data.get(at..at + 32)?;
    if word[..24].iter().any(|byte| *byte != 0) {
        return None;
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(low)).ok()
}

/// Deposit request data carried by a `DepositEvent` log (EIP-6110):
/// pubkey, withdrawal credentials, amount, signature and index, concatenated.
pub fn deposit_request_from_log(data: &[u8]) -> Result<[u8; DEPOSIT_REQUEST_SIZE], DepositError> {
    if data.len() != DEPOSIT_LOG_SIZE {
        return Err(DepositError::InvalidLength(data.len()));
    }
    let mut request = [0u8; DEPOSIT_REQUEST_SIZE];
    let mut written = 0;
    for (head, offset, size) in DEPOSIT_LAYOUT {
        if read_word(data, head) != Some(offset) || read_word(data, offset) != Some(size) {
            return Err(DepositError::InvalidLayout(head));
        }
        let field = &data[offset + 32..offset + 32 + size];
        request[written..written + size].copy_from_slice(field);
        written += size;
    }
    Ok(request)
}

/// Concatenated deposit requests emitted by the deposit contract in `receipts`.
pub fn deposit_requests(receipts: &[Receipt]) -> Result<Vec<u8>, DepositError> {
    let mut deposits = Vec::new();
    let logs = receipts.iter().flat_map(|receipt| receipt.logs.iter());
    for log in logs.filter(|log| {
        log.address == DEPOSIT_CONTRACT_ADDRESS && log.topics.first() == Some(&DEPOSIT_EVENT_TOPIC)
    }) {
        deposits.extend_from_slice(&deposit_request_from_log(&log.data)?);
    }
    Ok(deposits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_REQUESTS_HASH;
    use crate::types::{Log, TxType};

    fn deposit_log_data(amount: u64, index: u64) -> Vec<u8> {
        let mut data = vec![0u8; DEPOSIT_LOG_SIZE];
        for (head, offset, size) in DEPOSIT_LAYOUT {
            data[head + 24..head + 32].copy_from_slice(&(offset as u64).to_be_bytes());
            data[offset + 24..offset + 32].copy_from_slice(&(size as u64).to_be_bytes());
        }
        data[192..240].copy_from_slice(&[0xaa; 48]);
        data[288..320].copy_from_slice(&[0xbb; 32]);
        data[352..360].copy_from_slice(&amount.to_le_bytes());
        data[416..512].copy_from_slice(&[0xcc; 96]);
        data[544..552].copy_from_slice(&index.to_le_bytes());
        data
    }

    #[test]
    fn empty_requests_hash_is_the_hash_of_nothing() {
        assert_eq!(compute_requests_hash(&[]), DEFAULT_REQUESTS_HASH);
        let empty = [
            EncodedRequests::new(RequestType::Deposit, &[]),
            EncodedRequests::new(RequestType::Withdrawal, &[]),
            EncodedRequests::new(RequestType::Consolidation, &[]),
        ];
        assert_eq!(compute_requests_hash(&empty), DEFAULT_REQUESTS_HASH);
    }

    #[test]
    fn requests_hash_commits_to_type_and_data() {
        let deposit = EncodedRequests::new(RequestType::Deposit, &[1, 2, 3]);
        let withdrawal = EncodedRequests::new(RequestType::Withdrawal, &[1, 2, 3]);
        let expected = {
            let inner = Sha256::digest([0u8, 1, 2, 3]);
            H256::from_slice(&Sha256::digest(inner))
        };
        assert_eq!(compute_requests_hash(std::slice::from_ref(&deposit)), expected);
        assert_ne!(compute_requests_hash(&[withdrawal]), expected);
    }

    #[test]
    fn deposit_fields_are_concatenated() {
        let request = deposit_request_from_log(&deposit_log_data(32_000_000_000, 7)).unwrap();
        assert_eq!(request[..48], [0xaa; 48]);
        assert_eq!(request[48..80], [0xbb; 32]);
        assert_eq!(request[80..88], 32_000_000_000u64.to_le_bytes());
        assert_eq!(request[88..184], [0xcc; 96]);
        assert_eq!(request[184..], 7u64.to_le_bytes());
    }

    #[test]
    fn malformed_deposit_logs_are_rejected() {
        assert_eq!(
            deposit_request_from_log(&[0u8; 575]),
            Err(DepositError::InvalidLength(575))
        );
        let mut data = deposit_log_data(1, 0);
        data[63] = 0xff;
        assert_eq!(
            deposit_request_from_log(&data),
            Err(DepositError::InvalidLayout(32))
        );
        let mut data = deposit_log_data(1, 0);
        data[415] = 95;
        assert_eq!(
            deposit_request_from_log(&data),
            Err(DepositError::InvalidLayout(96))
        );
    }

    #[test]
    fn only_deposit_contract_events_count() {
        let deposit = Log {
            address: DEPOSIT_CONTRACT_ADDRESS,
            topics: vec![DEPOSIT_EVENT_TOPIC],
            data: Bytes::from(deposit_log_data(1, 0)),
        };
        let other_topic = Log {
            topics: vec![H256::zero()],
            ..deposit.clone()
        };
        let receipt = Receipt::new(TxType::EIP1559, true, 21000, vec![deposit, other_topic]);
        assert_eq!(
            deposit_requests(&[receipt]).unwrap().len(),
            DEPOSIT_REQUEST_SIZE
        );
    }
}
