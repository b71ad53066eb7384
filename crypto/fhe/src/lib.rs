//! Census FHE
//!
//! Ciphertext capability and decryption gateway for the encrypted census
//! ledger.
//!
//! # Key Features:
//! - [`CipherBackend`]: homomorphic arithmetic, comparison and select over
//!   opaque encrypted u64 values
//! - [`PlainBackend`]: in-the-clear stand-in with identical semantics
//! - [`DecryptionGateway`]: asynchronous decryption with signed proofs
//! - TFHE-rs backend behind the `tfhe` feature
//!
//! # Architecture:
//! - Encryptor: client side, turns census answers into ciphertexts
//! - CipherBackend: ledger side, computes on ciphertexts
//! - Decryptor: key holder behind the gateway

pub mod backend;
pub mod errors;
pub mod gateway;
pub mod plain;

#[cfg(feature = "tfhe")]
mod real_impl;

pub use backend::{CipherBackend, Decryptor, Encryptor};
pub use errors::FHEError;
pub use gateway::{
    decode_payload, encode_payload, DecryptionGateway, DecryptionOracle, DecryptionProof,
    DecryptionRequest, DecryptionResponse, ProofVerifier, RequestId,
};
pub use plain::{PlainBackend, PlainBool, PlainCiphertext};

#[cfg(feature = "tfhe")]
pub use real_impl::*;

/// FHE Configuration
#[derive(Clone, Debug)]
pub struct FHEConfig {
    /// Security parameter (bits)
    pub security_bits: u32,
    /// Enable multi-threaded operations
    pub multi_threaded: bool,
}

impl Default for FHEConfig {
    fn default() -> Self {
        Self {
            security_bits: 128,
            multi_threaded: true,
        }
    }
}

impl FHEConfig {
    /// Fingerprint of the parameters, stored alongside keys
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.security_bits.to_le_bytes());
        hasher.update(&[self.multi_threaded as u8]);
        *hasher.finalize().as_bytes()
    }
}

/// Result type for FHE operations
pub type FHEResult<T> = Result<T, FHEError>;
