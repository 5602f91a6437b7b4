use bytes::{BufMut, Bytes};
use ethereum_types::{Address, H256, U256};
use keel_crypto::{Crypto, CryptoError, keccak::keccak, native::sign_recoverable};
use crate::constants::SET_CODE_AUTHORIZATION_MAGIC;
use keel_rlp::{
    constants::RLP_NULL,
    decode::{RLPDecode, decode_rlp_item},
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};
use serde::{Deserialize, Serialize};

pub type AccessList = Vec<AccessListItem>;
pub type AccessListItem = (Address, Vec<H256>);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    #[default]
    Legacy = 0x00,
    EIP2930 = 0x01,
    EIP1559 = 0x02,
    EIP4844 = 0x03,
    EIP7702 = 0x04,
}

impl TxType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Legacy),
            0x01 => Some(Self::EIP2930),
            0x02 => Some(Self::EIP1559),
            0x03 => Some(Self::EIP4844),
            0x04 => Some(Self::EIP7702),
            _ => None,
        }
    }
}

/// Destination of a transaction, either a call to an address or a contract creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    Call(Address),
    #[default]
    Create,
}

impl RLPEncode for TxKind {
    fn encode(&self, buf: &mut dyn BufMut) {
        match self {
            Self::Call(address) => address.encode(buf),
            Self::Create => buf.put_u8(RLP_NULL),
        }
    }
}

impl RLPDecode for TxKind {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        match rlp.first() {
            Some(&RLP_NULL) => Ok((Self::Create, &rlp[1..])),
            _ => {
                let (address, rest) = Address::decode_unfinished(rlp)?;
                Ok((Self::Call(address), rest))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas: u64,
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub v: U256,
    pub r: U256,
    pub s: U256,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EIP2930Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub access_list: AccessList,
    pub signature_y_parity: bool,
    pub signature_r: U256,
    pub signature_s: U256,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EIP1559Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: u64,
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub access_list: AccessList,
    pub signature_y_parity: bool,
    pub signature_r: U256,
    pub signature_s: U256,
}

/// Blob transaction. Blobs can't create contracts so `to` is a plain address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EIP4844Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub access_list: AccessList,
    pub max_fee_per_blob_gas: U256,
    pub blob_versioned_hashes: Vec<H256>,
    pub signature_y_parity: bool,
    pub signature_r: U256,
    pub signature_s: U256,
}

pub type AuthorizationList = Vec<AuthorizationTuple>;

/// Signed permission for `address`'s code to run on behalf of the signer (EIP-7702).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationTuple {
    pub chain_id: U256,
    pub address: Address,
    pub nonce: u64,
    pub y_parity: U256,
    pub r_signature: U256,
    pub s_signature: U256,
}

impl AuthorizationTuple {
    /// keccak256(MAGIC || rlp([chain_id, address, nonce]))
    pub fn signing_hash(&self) -> H256 {
        let mut buf = vec![SET_CODE_AUTHORIZATION_MAGIC];
        Encoder::new(&mut buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.address)
            .encode_field(&self.nonce)
            .finish();
        keccak(buf)
    }

    /// The signer, or `None` when the signature is malformed or can't be recovered.
    pub fn authority(&self, crypto: &dyn Crypto) -> Option<Address> {
        if self.y_parity > U256::one() || self.r_signature.is_zero() || self.s_signature.is_zero()
        {
            return None;
        }
        let mut signature = [0u8; 65];
        signature[..32].copy_from_slice(&self.r_signature.to_big_endian());
        signature[32..64].copy_from_slice(&self.s_signature.to_big_endian());
        signature[64] = self.y_parity.low_u64() as u8;
        crypto
            .recover_signer(&signature, &self.signing_hash().0)
            .ok()
    }

    pub fn sign(&mut self, secret_key: &[u8; 32]) -> Result<(), CryptoError> {
        let (signature, recovery_id) = sign_recoverable(secret_key, &self.signing_hash().0)?;
        self.r_signature = U256::from_big_endian(&signature[..32]);
        self.s_signature = U256::from_big_endian(&signature[32..]);
        self.y_parity = U256::from(recovery_id);
        Ok(())
    }
}

impl RLPEncode for AuthorizationTuple {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.address)
            .encode_field(&self.nonce)
            .encode_field(&self.y_parity)
            .encode_field(&self.r_signature)
            .encode_field(&self.s_signature)
            .finish();
    }
}

impl RLPDecode for AuthorizationTuple {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (chain_id, decoder) = decoder.decode_field("chain_id")?;
        let (address, decoder) = decoder.decode_field("address")?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (y_parity, decoder) = decoder.decode_field("y_parity")?;
        let (r_signature, decoder) = decoder.decode_field("r_signature")?;
        let (s_signature, decoder) = decoder.decode_field("s_signature")?;
        let authorization = AuthorizationTuple {
            chain_id,
            address,
            nonce,
            y_parity,
            r_signature,
            s_signature,
        };
        Ok((authorization, decoder.finish()?))
    }
}

/// Set code transaction (EIP-7702). Like blob transactions it always calls an address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EIP7702Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub access_list: AccessList,
    pub authorization_list: AuthorizationList,
    pub signature_y_parity: bool,
    pub signature_r: U256,
    pub signature_s: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    LegacyTransaction(LegacyTransaction),
    EIP2930Transaction(EIP2930Transaction),
    EIP1559Transaction(EIP1559Transaction),
    EIP4844Transaction(EIP4844Transaction),
    EIP7702Transaction(EIP7702Transaction),
}

impl RLPEncode for LegacyTransaction {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_price)
            .encode_field(&self.gas)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.v)
            .encode_field(&self.r)
            .encode_field(&self.s)
            .finish();
    }
}

impl RLPEncode for EIP2930Transaction {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_price)
            .encode_field(&self.gas_limit)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.access_list)
            .encode_field(&self.signature_y_parity)
            .encode_field(&self.signature_r)
            .encode_field(&self.signature_s)
            .finish();
    }
}

impl RLPEncode for EIP1559Transaction {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.nonce)
            .encode_field(&self.max_priority_fee_per_gas)
            .encode_field(&self.max_fee_per_gas)
            .encode_field(&self.gas_limit)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.access_list)
            .encode_field(&self.signature_y_parity)
            .encode_field(&self.signature_r)
            .encode_field(&self.signature_s)
            .finish();
    }
}

impl RLPEncode for EIP4844Transaction {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.nonce)
            .encode_field(&self.max_priority_fee_per_gas)
            .encode_field(&self.max_fee_per_gas)
            .encode_field(&self.gas)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.access_list)
            .encode_field(&self.max_fee_per_blob_gas)
            .encode_field(&self.blob_versioned_hashes)
            .encode_field(&self.signature_y_parity)
            .encode_field(&self.signature_r)
            .encode_field(&self.signature_s)
            .finish();
    }
}

impl RLPEncode for EIP7702Transaction {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.chain_id)
            .encode_field(&self.nonce)
            .encode_field(&self.max_priority_fee_per_gas)
            .encode_field(&self.max_fee_per_gas)
            .encode_field(&self.gas_limit)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.access_list)
            .encode_field(&self.authorization_list)
            .encode_field(&self.signature_y_parity)
            .encode_field(&self.signature_r)
            .encode_field(&self.signature_s)
            .finish();
    }
}

impl RLPDecode for LegacyTransaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (gas_price, decoder) = decoder.decode_field("gas_price")?;
        let (gas, decoder) = decoder.decode_field("gas")?;
        let (to, decoder) = decoder.decode_field("to")?;
        let (value, decoder) = decoder.decode_field("value")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let (v, decoder) = decoder.decode_field("v")?;
        let (r, decoder) = decoder.decode_field("r")?;
        let (s, decoder) = decoder.decode_field("s")?;
        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas,
            to,
            value,
            data,
            v,
            r,
            s,
        };
        Ok((tx, decoder.finish()?))
    }
}

impl RLPDecode for EIP2930Transaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (chain_id, decoder) = decoder.decode_field("chain_id")?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (gas_price, decoder) = decoder.decode_field("gas_price")?;
        let (gas_limit, decoder) = decoder.decode_field("gas_limit")?;
        let (to, decoder) = decoder.decode_field("to")?;
        let (value, decoder) = decoder.decode_field("value")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let (access_list, decoder) = decoder.decode_field("access_list")?;
        let (signature_y_parity, decoder) = decoder.decode_field("signature_y_parity")?;
        let (signature_r, decoder) = decoder.decode_field("signature_r")?;
        let (signature_s, decoder) = decoder.decode_field("signature_s")?;
        let tx = EIP2930Transaction {
            chain_id,
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            data,
            access_list,
            signature_y_parity,
            signature_r,
            signature_s,
        };
        Ok((tx, decoder.finish()?))
    }
}

impl RLPDecode for EIP1559Transaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (chain_id, decoder) = decoder.decode_field("chain_id")?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (max_priority_fee_per_gas, decoder) =
            decoder.decode_field("max_priority_fee_per_gas")?;
        let (max_fee_per_gas, decoder) = decoder.decode_field("max_fee_per_gas")?;
        let (gas_limit, decoder) = decoder.decode_field("gas_limit")?;
        let (to, decoder) = decoder.decode_field("to")?;
        let (value, decoder) = decoder.decode_field("value")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let (access_list, decoder) = decoder.decode_field("access_list")?;
        let (signature_y_parity, decoder) = decoder.decode_field("signature_y_parity")?;
        let (signature_r, decoder) = decoder.decode_field("signature_r")?;
        let (signature_s, decoder) = decoder.decode_field("signature_s")?;
        let tx = EIP1559Transaction {
            chain_id,
            nonce,
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas_limit,
            to,
            value,
            data,
            access_list,
            signature_y_parity,
            signature_r,
            signature_s,
        };
        Ok((tx, decoder.finish()?))
    }
}

impl RLPDecode for EIP4844Transaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (chain_id, decoder) = decoder.decode_field("chain_id")?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (max_priority_fee_per_gas, decoder) =
            decoder.decode_field("max_priority_fee_per_gas")?;
        let (max_fee_per_gas, decoder) = decoder.decode_field("max_fee_per_gas")?;
        let (gas, decoder) = decoder.decode_field("gas")?;
        let (to, decoder) = decoder.decode_field("to")?;
        let (value, decoder) = decoder.decode_field("value")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let (access_list, decoder) = decoder.decode_field("access_list")?;
        let (max_fee_per_blob_gas, decoder) = decoder.decode_field("max_fee_per_blob_gas")?;
        let (blob_versioned_hashes, decoder) = decoder.decode_field("blob_versioned_hashes")?;
        let (signature_y_parity, decoder) = decoder.decode_field("signature_y_parity")?;
        let (signature_r, decoder) = decoder.decode_field("signature_r")?;
        let (signature_s, decoder) = decoder.decode_field("signature_s")?;
        let tx = EIP4844Transaction {
            chain_id,
            nonce,
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas,
            to,
            value,
            data,
            access_list,
            max_fee_per_blob_gas,
            blob_versioned_hashes,
            signature_y_parity,
            signature_r,
            signature_s,
        };
        Ok((tx, decoder.finish()?))
    }
}

impl RLPDecode for EIP7702Transaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (chain_id, decoder) = decoder.decode_field("chain_id")?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (max_priority_fee_per_gas, decoder) =
            decoder.decode_field("max_priority_fee_per_gas")?;
        let (max_fee_per_gas, decoder) = decoder.decode_field("max_fee_per_gas")?;
        let (gas_limit, decoder) = decoder.decode_field("gas_limit")?;
        let (to, decoder) = decoder.decode_field("to")?;
        let (value, decoder) = decoder.decode_field("value")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let (access_list, decoder) = decoder.decode_field("access_list")?;
        let (authorization_list, decoder) = decoder.decode_field("authorization_list")?;
        let (signature_y_parity, decoder) = decoder.decode_field("signature_y_parity")?;
        let (signature_r, decoder) = decoder.decode_field("signature_r")?;
        let (signature_s, decoder) = decoder.decode_field("signature_s")?;
        let tx = EIP7702Transaction {
            chain_id,
            nonce,
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas_limit,
            to,
            value,
            data,
            access_list,
            authorization_list,
            signature_y_parity,
            signature_r,
            signature_s,
        };
        Ok((tx, decoder.finish()?))
    }
}

impl Transaction {
    pub fn tx_type(&self) -> TxType {
        match self {
            Transaction::LegacyTransaction(_) => TxType::Legacy,
            Transaction::EIP2930Transaction(_) => TxType::EIP2930,
            Transaction::EIP1559Transaction(_) => TxType::EIP1559,
            Transaction::EIP4844Transaction(_) => TxType::EIP4844,
            Transaction::EIP7702Transaction(_) => TxType::EIP7702,
        }
    }

    /// Consensus encoding: `rlp(tx)` for legacy transactions, `type || rlp(tx)` otherwise.
    /// This is the form that gets hashed and inserted in the transactions trie.
    pub fn encode_canonical(&self, buf: &mut dyn BufMut) {
        match self {
            Transaction::LegacyTransaction(tx) => tx.encode(buf),
            Transaction::EIP2930Transaction(tx) => {
                buf.put_u8(TxType::EIP2930 as u8);
                tx.encode(buf)
            }
            Transaction::EIP1559Transaction(tx) => {
                buf.put_u8(TxType::EIP1559 as u8);
                tx.encode(buf)
            }
            Transaction::EIP4844Transaction(tx) => {
                buf.put_u8(TxType::EIP4844 as u8);
                tx.encode(buf)
            }
            Transaction::EIP7702Transaction(tx) => {
                buf.put_u8(TxType::EIP7702 as u8);
                tx.encode(buf)
            }
        }
    }

    pub fn encode_canonical_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_canonical(&mut buf);
        buf
    }

    /// Inverse of [`Transaction::encode_canonical`].
    pub fn decode_canonical(bytes: &[u8]) -> Result<Self, RLPDecodeError> {
        let Some(&first) = bytes.first() else {
            return Err(RLPDecodeError::invalid_length());
        };
        if first >= 0xc0 {
            return LegacyTransaction::decode(bytes).map(Transaction::LegacyTransaction);
        }
        let payload = &bytes[1..];
        match TxType::from_u8(first) {
            Some(TxType::EIP2930) => {
                EIP2930Transaction::decode(payload).map(Transaction::EIP2930Transaction)
            }
            Some(TxType::EIP1559) => {
                EIP1559Transaction::decode(payload).map(Transaction::EIP1559Transaction)
            }
            Some(TxType::EIP4844) => {
                EIP4844Transaction::decode(payload).map(Transaction::EIP4844Transaction)
            }
            Some(TxType::EIP7702) => {
                EIP7702Transaction::decode(payload).map(Transaction::EIP7702Transaction)
            }
            _ => Err(RLPDecodeError::Custom(format!(
                "Invalid transaction type: {first}"
            ))),
        }
    }

    pub fn hash(&self) -> H256 {
        keccak(self.encode_canonical_to_vec())
    }

    /// Hash of the unsigned payload, the message covered by the signature.
    pub fn signing_hash(&self) -> H256 {
        let mut buf = Vec::new();
        match self {
            Transaction::LegacyTransaction(tx) => {
                let encoder = Encoder::new(&mut buf)
                    .encode_field(&tx.nonce)
                    .encode_field(&tx.gas_price)
                    .encode_field(&tx.gas)
                    .encode_field(&tx.to)
                    .encode_field(&tx.value)
                    .encode_field(&tx.data);
                // EIP-155 replay protection
                match legacy_chain_id(tx.v) {
                    Some(chain_id) => encoder
                        .encode_field(&chain_id)
                        .encode_field(&0u8)
                        .encode_field(&0u8)
                        .finish(),
                    None => encoder.finish(),
                }
            }
            Transaction::EIP2930Transaction(tx) => {
                buf.put_u8(TxType::EIP2930 as u8);
                Encoder::new(&mut buf)
                    .encode_field(&tx.chain_id)
                    .encode_field(&tx.nonce)
                    .encode_field(&tx.gas_price)
                    .encode_field(&tx.gas_limit)
                    .encode_field(&tx.to)
                    .encode_field(&tx.value)
                    .encode_field(&tx.data)
                    .encode_field(&tx.access_list)
                    .finish();
            }
            Transaction::EIP1559Transaction(tx) => {
                buf.put_u8(TxType::EIP1559 as u8);
                Encoder::new(&mut buf)
                    .encode_field(&tx.chain_id)
                    .encode_field(&tx.nonce)
                    .encode_field(&tx.max_priority_fee_per_gas)
                    .encode_field(&tx.max_fee_per_gas)
                    .encode_field(&tx.gas_limit)
                    .encode_field(&tx.to)
                    .encode_field(&tx.value)
                    .encode_field(&tx.data)
                    .encode_field(&tx.access_list)
                    .finish();
            }
            Transaction::EIP4844Transaction(tx) => {
                buf.put_u8(TxType::EIP4844 as u8);
                Encoder::new(&mut buf)
                    .encode_field(&tx.chain_id)
                    .encode_field(&tx.nonce)
                    .encode_field(&tx.max_priority_fee_per_gas)
                    .encode_field(&tx.max_fee_per_gas)
                    .encode_field(&tx.gas)
                    .encode_field(&tx.to)
                    .encode_field(&tx.value)
                    .encode_field(&tx.data)
                    .encode_field(&tx.access_list)
                    .encode_field(&tx.max_fee_per_blob_gas)
                    .encode_field(&tx.blob_versioned_hashes)
                    .finish();
            }
            Transaction::EIP7702Transaction(tx) => {
                buf.put_u8(TxType::EIP7702 as u8);
                Encoder::new(&mut buf)
                    .encode_field(&tx.chain_id)
                    .encode_field(&tx.nonce)
                    .encode_field(&tx.max_priority_fee_per_gas)
                    .encode_field(&tx.max_fee_per_gas)
                    .encode_field(&tx.gas_limit)
                    .encode_field(&tx.to)
                    .encode_field(&tx.value)
                    .encode_field(&tx.data)
                    .encode_field(&tx.access_list)
                    .encode_field(&tx.authorization_list)
                    .finish();
            }
        }
        keccak(buf)
    }

    /// Signature as (r, s, recovery id). Fails for legacy `v` values that are
    /// neither 27/28 nor a valid EIP-155 value.
    pub fn signature(&self) -> Result<(U256, U256, u8), CryptoError> {
        match self {
            Transaction::LegacyTransaction(tx) => {
                let recovery_id = if tx.v == U256::from(27) || tx.v == U256::from(28) {
                    tx.v.low_u64() - 27
                } else if tx.v >= U256::from(35) && tx.v.bits() <= 64 {
                    (tx.v.low_u64() - 35) % 2
                } else {
                    return Err(CryptoError::InvalidRecoveryId);
                };
                Ok((tx.r, tx.s, recovery_id as u8))
            }
            Transaction::EIP2930Transaction(tx) => Ok((
                tx.signature_r,
                tx.signature_s,
                tx.signature_y_parity as u8,
            )),
            Transaction::EIP1559Transaction(tx) => Ok((
                tx.signature_r,
                tx.signature_s,
                tx.signature_y_parity as u8,
            )),
            Transaction::EIP4844Transaction(tx) => Ok((
                tx.signature_r,
                tx.signature_s,
                tx.signature_y_parity as u8,
            )),
            Transaction::EIP7702Transaction(tx) => Ok((
                tx.signature_r,
                tx.signature_s,
                tx.signature_y_parity as u8,
            )),
        }
    }

    /// Recovers the address that signed the transaction.
    pub fn sender(&self, crypto: &dyn Crypto) -> Result<Address, CryptoError> {
        let (r, s, recovery_id) = self.signature()?;
        let mut signature = [0u8; 65];
        signature[..32].copy_from_slice(&r.to_big_endian());
        signature[32..64].copy_from_slice(&s.to_big_endian());
        signature[64] = recovery_id;
        crypto.recover_signer(&signature, &self.signing_hash().0)
    }

    /// Signs the transaction in place. `chain_id` only applies to legacy transactions,
    /// where `Some` produces an EIP-155 signature.
    pub fn sign(&mut self, secret_key: &[u8; 32], chain_id: Option<u64>) -> Result<(), CryptoError> {
        if let Transaction::LegacyTransaction(tx) = self {
            // the signing payload of a legacy transaction is derived from `v`
            tx.v = match chain_id {
                Some(chain_id) => U256::from(chain_id) * 2 + 35,
                None => U256::from(27),
            };
        }
        let (signature, recovery_id) = sign_recoverable(secret_key, &self.signing_hash().0)?;
        let r = U256::from_big_endian(&signature[..32]);
        let s = U256::from_big_endian(&signature[32..]);
        let y_parity = recovery_id != 0;
        match self {
            Transaction::LegacyTransaction(tx) => {
                tx.v = match chain_id {
                    Some(chain_id) => U256::from(chain_id) * 2 + 35 + recovery_id,
                    None => U256::from(27 + recovery_id),
                };
                tx.r = r;
                tx.s = s;
            }
            Transaction::EIP2930Transaction(tx) => {
                (tx.signature_r, tx.signature_s, tx.signature_y_parity) = (r, s, y_parity)
            }
            Transaction::EIP1559Transaction(tx) => {
                (tx.signature_r, tx.signature_s, tx.signature_y_parity) = (r, s, y_parity)
            }
            Transaction::EIP4844Transaction(tx) => {
                (tx.signature_r, tx.signature_s, tx.signature_y_parity) = (r, s, y_parity)
            }
            Transaction::EIP7702Transaction(tx) => {
                (tx.signature_r, tx.signature_s, tx.signature_y_parity) = (r, s, y_parity)
            }
        }
        Ok(())
    }

    /// Chain id the signature commits to, `None` for pre EIP-155 legacy transactions.
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Transaction::LegacyTransaction(tx) => legacy_chain_id(tx.v),
            Transaction::EIP2930Transaction(tx) => Some(tx.chain_id),
            Transaction::EIP1559Transaction(tx) => Some(tx.chain_id),
            Transaction::EIP4844Transaction(tx) => Some(tx.chain_id),
            Transaction::EIP7702Transaction(tx) => Some(tx.chain_id),
        }
    }

    pub fn nonce(&self) -> u64 {
        match self {
            Transaction::LegacyTransaction(tx) => tx.nonce,
            Transaction::EIP2930Transaction(tx) => tx.nonce,
            Transaction::EIP1559Transaction(tx) => tx.nonce,
            Transaction::EIP4844Transaction(tx) => tx.nonce,
            Transaction::EIP7702Transaction(tx) => tx.nonce,
        }
    }

    pub fn gas_limit(&self) -> u64 {
        match self {
            Transaction::LegacyTransaction(tx) => tx.gas,
            Transaction::EIP2930Transaction(tx) => tx.gas_limit,
            Transaction::EIP1559Transaction(tx) => tx.gas_limit,
            Transaction::EIP4844Transaction(tx) => tx.gas,
            Transaction::EIP7702Transaction(tx) => tx.gas_limit,
        }
    }

    /// Gas price for pre-1559 transactions, max fee per gas otherwise.
    pub fn gas_price(&self) -> U256 {
        match self {
            Transaction::LegacyTransaction(tx) => tx.gas_price,
            Transaction::EIP2930Transaction(tx) => tx.gas_price,
            Transaction::EIP1559Transaction(tx) => tx.max_fee_per_gas,
            Transaction::EIP4844Transaction(tx) => tx.max_fee_per_gas,
            Transaction::EIP7702Transaction(tx) => tx.max_fee_per_gas,
        }
    }

    pub fn max_priority_fee(&self) -> Option<U256> {
        match self {
            Transaction::LegacyTransaction(_) | Transaction::EIP2930Transaction(_) => None,
            Transaction::EIP1559Transaction(tx) => Some(tx.max_priority_fee_per_gas),
            Transaction::EIP4844Transaction(tx) => Some(tx.max_priority_fee_per_gas),
            Transaction::EIP7702Transaction(tx) => Some(tx.max_priority_fee_per_gas),
        }
    }

    pub fn max_fee_per_gas(&self) -> Option<U256> {
        match self {
            Transaction::LegacyTransaction(_) | Transaction::EIP2930Transaction(_) => None,
            Transaction::EIP1559Transaction(tx) => Some(tx.max_fee_per_gas),
            Transaction::EIP4844Transaction(tx) => Some(tx.max_fee_per_gas),
            Transaction::EIP7702Transaction(tx) => Some(tx.max_fee_per_gas),
        }
    }

    pub fn max_fee_per_blob_gas(&self) -> Option<U256> {
        match self {
            Transaction::EIP4844Transaction(tx) => Some(tx.max_fee_per_blob_gas),
            _ => None,
        }
    }

    pub fn to(&self) -> TxKind {
        match self {
            Transaction::LegacyTransaction(tx) => tx.to,
            Transaction::EIP2930Transaction(tx) => tx.to,
            Transaction::EIP1559Transaction(tx) => tx.to,
            Transaction::EIP4844Transaction(tx) => TxKind::Call(tx.to),
            Transaction::EIP7702Transaction(tx) => TxKind::Call(tx.to),
        }
    }

    pub fn is_contract_creation(&self) -> bool {
        matches!(self.to(), TxKind::Create)
    }

    pub fn value(&self) -> U256 {
        match self {
            Transaction::LegacyTransaction(tx) => tx.value,
            Transaction::EIP2930Transaction(tx) => tx.value,
            Transaction::EIP1559Transaction(tx) => tx.value,
            Transaction::EIP4844Transaction(tx) => tx.value,
            Transaction::EIP7702Transaction(tx) => tx.value,
        }
    }

    pub fn data(&self) -> &Bytes {
        match self {
            Transaction::LegacyTransaction(tx) => &tx.data,
            Transaction::EIP2930Transaction(tx) => &tx.data,
            Transaction::EIP1559Transaction(tx) => &tx.data,
            Transaction::EIP4844Transaction(tx) => &tx.data,
            Transaction::EIP7702Transaction(tx) => &tx.data,
        }
    }

    pub fn access_list(&self) -> &[AccessListItem] {
        match self {
            Transaction::LegacyTransaction(_) => &[],
            Transaction::EIP2930Transaction(tx) => &tx.access_list,
            Transaction::EIP1559Transaction(tx) => &tx.access_list,
            Transaction::EIP4844Transaction(tx) => &tx.access_list,
            Transaction::EIP7702Transaction(tx) => &tx.access_list,
        }
    }

    pub fn authorization_list(&self) -> Option<&[AuthorizationTuple]> {
        match self {
            Transaction::EIP7702Transaction(tx) => Some(&tx.authorization_list),
            _ => None,
        }
    }

    pub fn blob_versioned_hashes(&self) -> &[H256] {
        match self {
            Transaction::EIP4844Transaction(tx) => &tx.blob_versioned_hashes,
            _ => &[],
        }
    }

    /// Price paid per unit of gas given the block base fee.
    /// `None` when the max fee doesn't cover the base fee.
    pub fn effective_gas_price(&self, base_fee_per_gas: Option<u64>) -> Option<U256> {
        let base_fee = U256::from(base_fee_per_gas.unwrap_or_default());
        match (self.max_fee_per_gas(), self.max_priority_fee()) {
            (Some(max_fee), Some(priority_fee)) => {
                let headroom = max_fee.checked_sub(base_fee)?;
                Some(base_fee + priority_fee.min(headroom))
            }
            _ => Some(self.gas_price()),
        }
    }
}

fn legacy_chain_id(v: U256) -> Option<u64> {
    if v.bits() > 64 || v.low_u64() < 35 {
        return None;
    }
    Some((v.low_u64() - 35) / 2)
}

/// Block body form: legacy transactions as a list, typed ones as a byte string
/// wrapping their canonical encoding.
impl RLPEncode for Transaction {
    fn encode(&self, buf: &mut dyn BufMut) {
        match self {
            Transaction::LegacyTransaction(tx) => tx.encode(buf),
            _ => self.encode_canonical_to_vec().as_slice().encode(buf),
        }
    }
}

impl RLPDecode for Transaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, rest) = decode_rlp_item(rlp)?;
        if is_list {
            let (tx, rest) = LegacyTransaction::decode_unfinished(rlp)?;
            return Ok((Transaction::LegacyTransaction(tx), rest));
        }
        let tx = Transaction::decode_canonical(payload)
            .map_err(|err| err.with_context("Transaction"))?;
        Ok((tx, rest))
    }
}
