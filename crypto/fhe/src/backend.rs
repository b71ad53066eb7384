//! Ciphertext capability traits
//!
//! The ledger never looks inside a ciphertext. Everything it does to encrypted
//! census fields goes through [`CipherBackend`]; turning plaintext into
//! ciphertext and back is the business of key holders ([`Encryptor`],
//! [`Decryptor`]).

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::FHEResult;

/// Homomorphic operations on opaque encrypted 64-bit integers.
///
/// Arithmetic wraps modulo 2^64. Division truncates toward zero and a zero
/// divisor yields `u64::MAX`, matching TFHE-rs integer semantics.
pub trait CipherBackend: Send + Sync {
    /// Encrypted unsigned integer
    type Ciphertext: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static;

    /// Encrypted boolean produced by comparisons
    type EncryptedBool: Clone + Debug + Send + Sync;

    /// Trivially encrypt a public constant
    fn encrypt_constant(&self, value: u64) -> FHEResult<Self::Ciphertext>;

    fn add(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> FHEResult<Self::Ciphertext>;

    fn sub(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> FHEResult<Self::Ciphertext>;

    fn mul(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> FHEResult<Self::Ciphertext>;

    fn div(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> FHEResult<Self::Ciphertext>;

    /// Encrypted `a == b`
    fn eq(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> FHEResult<Self::EncryptedBool>;

    /// Encrypted `a < b`
    fn lt(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> FHEResult<Self::EncryptedBool>;

    /// Encrypted `a >= b`
    fn ge(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> FHEResult<Self::EncryptedBool>;

    /// Conditional select: if `cond` then `if_true` else `if_false`
    fn select(
        &self,
        cond: &Self::EncryptedBool,
        if_true: &Self::Ciphertext,
        if_false: &Self::Ciphertext,
    ) -> FHEResult<Self::Ciphertext>;

    /// Sum a non-empty slice of ciphertexts
    fn sum(&self, values: &[Self::Ciphertext]) -> FHEResult<Self::Ciphertext> {
        let (first, rest) = values
            .split_first()
            .ok_or_else(|| crate::FHEError::OperationFailed("Empty sum".into()))?;

        let mut result = first.clone();
        for value in rest {
            result = self.add(&result, value)?;
        }
        Ok(result)
    }
}

/// Client-side encryption of census values
pub trait Encryptor {
    type Ciphertext;

    fn encrypt(&self, value: u64) -> FHEResult<Self::Ciphertext>;
}

/// Key holder able to decrypt ciphertexts for the decryption gateway
pub trait Decryptor: Send + Sync {
    type Ciphertext: Clone + Debug + Send + Sync + 'static;

    fn decrypt(&self, ciphertext: &Self::Ciphertext) -> FHEResult<u64>;
}
