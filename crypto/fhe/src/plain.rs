//! Plaintext stand-in for the ciphertext capability
//!
//! Carries values in the clear while honouring the exact semantics of the
//! encrypted backend (wrapping arithmetic, truncating division, `u64::MAX` on
//! division by zero). Used by tests, benchmarks and the CLI's simulated mode.

use serde::{Deserialize, Serialize};

use crate::backend::{CipherBackend, Decryptor, Encryptor};
use crate::FHEResult;

/// "Ciphertext" of the plaintext backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlainCiphertext(pub u64);

impl PlainCiphertext {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Encrypted boolean of the plaintext backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlainBool(pub bool);

/// Plaintext backend. Acts as encryptor, evaluator and decryptor at once.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainBackend;

impl PlainBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CipherBackend for PlainBackend {
    type Ciphertext = PlainCiphertext;
    type EncryptedBool = PlainBool;

    fn encrypt_constant(&self, value: u64) -> FHEResult<PlainCiphertext> {
        Ok(PlainCiphertext(value))
    }

    fn add(&self, a: &PlainCiphertext, b: &PlainCiphertext) -> FHEResult<PlainCiphertext> {
        Ok(PlainCiphertext(a.0.wrapping_add(b.0)))
    }

    fn sub(&self, a: &PlainCiphertext, b: &PlainCiphertext) -> FHEResult<PlainCiphertext> {
        Ok(PlainCiphertext(a.0.wrapping_sub(b.0)))
    }

    fn mul(&self, a: &PlainCiphertext, b: &PlainCiphertext) -> FHEResult<PlainCiphertext> {
        Ok(PlainCiphertext(a.0.wrapping_mul(b.0)))
    }

    fn div(&self, a: &PlainCiphertext, b: &PlainCiphertext) -> FHEResult<PlainCiphertext> {
        Ok(PlainCiphertext(a.0.checked_div(b.0).unwrap_or(u64::MAX)))
    }

    fn eq(&self, a: &PlainCiphertext, b: &PlainCiphertext) -> FHEResult<PlainBool> {
        Ok(PlainBool(a.0 == b.0))
    }

    fn lt(&self, a: &PlainCiphertext, b: &PlainCiphertext) -> FHEResult<PlainBool> {
        Ok(PlainBool(a.0 < b.0))
    }

    fn ge(&self, a: &PlainCiphertext, b: &PlainCiphertext) -> FHEResult<PlainBool> {
        Ok(PlainBool(a.0 >= b.0))
    }

    fn select(
        &self,
        cond: &PlainBool,
        if_true: &PlainCiphertext,
        if_false: &PlainCiphertext,
    ) -> FHEResult<PlainCiphertext> {
        Ok(if cond.0 { *if_true } else { *if_false })
    }
}

impl Encryptor for PlainBackend {
    type Ciphertext = PlainCiphertext;

    fn encrypt(&self, value: u64) -> FHEResult<PlainCiphertext> {
        Ok(PlainCiphertext(value))
    }
}

impl Decryptor for PlainBackend {
    type Ciphertext = PlainCiphertext;

    fn decrypt(&self, ciphertext: &PlainCiphertext) -> FHEResult<u64> {
        Ok(ciphertext.0)
    }
}
