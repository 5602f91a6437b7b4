//! # keel-crypto
//!
//! Cryptographic primitives consumed by the execution layer.
//!
//! The interpreter and the state transition only talk to the [`Crypto`] trait;
//! [`NativeCrypto`] implements it on top of `secp256k1`, `p256`, `sha2`,
//! `ripemd`, the arkworks BN254 curve, `bls12_381` and `kzg-rs`.
//!
//! ```rust
//! use keel_crypto::keccak::keccak_hash;
//!
//! let hash = keccak_hash(b"hello");
//! assert_eq!(hash.len(), 32);
//! ```

pub mod blake2f;
mod bls12;
pub mod keccak;
pub mod kzg;
pub mod native;
pub mod provider;

pub use native::NativeCrypto;
pub use provider::{Bls12G1, Bls12G2, Crypto, CryptoError};
