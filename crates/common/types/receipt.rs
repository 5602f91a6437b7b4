use bytes::{BufMut, Bytes};
use ethereum_types::{Address, Bloom, BloomInput, H256};
use keel_crypto::keccak::keccak_hash;
use keel_rlp::{
    decode::{RLPDecode, decode_rlp_item},
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};
use serde::{Deserialize, Serialize};

use crate::types::TxType;

/// Result of a transaction
///
/// Receipts before Byzantium commit to the intermediate state root instead of a status.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Receipt {
    pub tx_type: TxType,
    pub succeeded: bool,
    pub post_state: Option<H256>,
    pub cumulative_gas_used: u64,
    pub bloom: Bloom,
    pub logs: Vec<Log>,
}

impl Receipt {
    pub fn new(tx_type: TxType, succeeded: bool, cumulative_gas_used: u64, logs: Vec<Log>) -> Self {
        Self {
            tx_type,
            succeeded,
            post_state: None,
            cumulative_gas_used,
            bloom: bloom_from_logs(&logs),
            logs,
        }
    }

    pub fn with_post_state(mut self, post_state: H256) -> Self {
        self.post_state = Some(post_state);
        self
    }

    /// Consensus encoding, hashed into the receipts trie:
    /// `rlp(receipt)` for legacy receipts, `tx_type || rlp(receipt)` otherwise.
    pub fn encode_inner(&self) -> Vec<u8> {
        // the bloom alone takes 256 bytes
        let mut buf = Vec::with_capacity(512);
        if self.tx_type != TxType::Legacy {
            buf.push(self.tx_type as u8);
        }
        let encoder = Encoder::new(&mut buf);
        let encoder = match self.post_state {
            Some(root) => encoder.encode_field(&root),
            None => encoder.encode_field(&self.succeeded),
        };
        encoder
            .encode_field(&self.cumulative_gas_used)
            .encode_field(&self.bloom)
            .encode_field(&self.logs)
            .finish();
        buf
    }

    /// Inverse of [`Receipt::encode_inner`].
    pub fn decode_inner(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        let (tx_type, rlp) = match rlp.first() {
            Some(&ty) if ty < 0x7f => {
                let tx_type = TxType::from_u8(ty).ok_or_else(|| {
                    RLPDecodeError::Custom(format!("Invalid transaction type: {ty}"))
                })?;
                (tx_type, &rlp[1..])
            }
            _ => (TxType::Legacy, rlp),
        };
        let decoder = Decoder::new(rlp)?;
        let (status, decoder) = decoder.get_encoded_item()?;
        let (succeeded, post_state) = if status.len() == 33 {
            (true, Some(H256::decode(&status)?))
        } else {
            (bool::decode(&status)?, None)
        };
        let (cumulative_gas_used, decoder) = decoder.decode_field("cumulative_gas_used")?;
        let (bloom, decoder) = decoder.decode_field("bloom")?;
        let (logs, decoder) = decoder.decode_field("logs")?;
        decoder.finish()?;
        Ok(Self {
            tx_type,
            succeeded,
            post_state,
            cumulative_gas_used,
            bloom,
            logs,
        })
    }
}

pub fn bloom_from_logs(logs: &[Log]) -> Bloom {
    let mut bloom = Bloom::zero();
    for log in logs {
        bloom.accrue(BloomInput::Hash(&keccak_hash(log.address)));
        for topic in log.topics.iter() {
            bloom.accrue(BloomInput::Hash(&keccak_hash(topic)));
        }
    }
    bloom
}

/// Network form: legacy receipts as a list, typed ones as a byte string.
impl RLPEncode for Receipt {
    fn encode(&self, buf: &mut dyn BufMut) {
        match self.tx_type {
            TxType::Legacy => buf.put_slice(&self.encode_inner()),
            _ => self.encode_inner().as_slice().encode(buf),
        }
    }
}

impl RLPDecode for Receipt {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, rest) = decode_rlp_item(rlp)?;
        let encoded = if is_list {
            &rlp[..rlp.len() - rest.len()]
        } else {
            payload
        };
        let receipt = Receipt::decode_inner(encoded).map_err(|e| e.with_context("Receipt"))?;
        Ok((receipt, rest))
    }
}

/// Data record produced during the execution of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    #[serde(with = "crate::serde_utils::bytes")]
    pub data: Bytes,
}

impl RLPEncode for Log {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.address)
            .encode_field(&self.topics)
            .encode_field(&self.data)
            .finish();
    }
}

impl RLPDecode for Log {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (address, decoder) = decoder.decode_field("address")?;
        let (topics, decoder) = decoder.decode_field("topics")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let log = Log {
            address,
            topics,
            data,
        };
        Ok((log, decoder.finish()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> Log {
        Log {
            address: Address::repeat_byte(0x11),
            topics: vec![H256::repeat_byte(0x22)],
            data: Bytes::from_static(b"data"),
        }
    }

    #[test]
    fn bloom_contains_address_and_topics() {
        let log = sample_log();
        let bloom = bloom_from_logs(std::slice::from_ref(&log));
        assert!(bloom.contains_input(BloomInput::Raw(log.address.as_bytes())));
        assert!(bloom.contains_input(BloomInput::Raw(log.topics[0].as_bytes())));
        assert!(!bloom.contains_input(BloomInput::Raw(&[0x33; 20])));
        assert_eq!(bloom_from_logs(&[]), Bloom::zero());
    }

    #[test]
    fn typed_receipt_roundtrip() {
        let receipt = Receipt::new(TxType::EIP1559, true, 21000, vec![sample_log()]);
        let inner = receipt.encode_inner();
        assert_eq!(inner[0], TxType::EIP1559 as u8);
        assert_eq!(Receipt::decode_inner(&inner).unwrap(), receipt);
        assert_eq!(Receipt::decode(&receipt.encode_to_vec()).unwrap(), receipt);
    }

    #[test]
    fn legacy_receipts_with_status_or_root() {
        let failed = Receipt::new(TxType::Legacy, false, 50000, vec![]);
        assert_eq!(Receipt::decode(&failed.encode_to_vec()).unwrap(), failed);

        let pre_byzantium =
            Receipt::new(TxType::Legacy, true, 21000, vec![]).with_post_state(H256::repeat_byte(9));
        let decoded = Receipt::decode_inner(&pre_byzantium.encode_inner()).unwrap();
        assert_eq!(decoded, pre_byzantium);
    }
}
