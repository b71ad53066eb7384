//! Homomorphic operations with TFHE-rs
//!
//! Performed by the ledger using the server key only.

use tfhe::prelude::*;
use tfhe::{FheBool, FheUint64};

use super::ciphertext::TfheCiphertext;
use super::keys::ServerKey;
use crate::backend::CipherBackend;
use crate::{FHEError, FHEResult};

/// Encrypted boolean for comparison results
#[derive(Clone)]
pub struct TfheBool {
    inner: FheBool,
}

impl std::fmt::Debug for TfheBool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfheBool").finish()
    }
}

/// Evaluator holding the server key
#[derive(Clone, Debug)]
pub struct TfheBackend {
    server_key: ServerKey,
}

impl TfheBackend {
    pub fn new(server_key: ServerKey) -> Self {
        Self { server_key }
    }

    fn activate(&self) {
        self.server_key.install();
    }

    fn wrap(result: FheUint64, a: &TfheCiphertext, b: &TfheCiphertext, cost: u32) -> TfheCiphertext {
        TfheCiphertext::with_ops(result, a.op_count() + b.op_count() + cost)
    }
}

impl CipherBackend for TfheBackend {
    type Ciphertext = TfheCiphertext;
    type EncryptedBool = TfheBool;

    fn encrypt_constant(&self, value: u64) -> FHEResult<TfheCiphertext> {
        let inner = FheUint64::try_encrypt_trivial(value)
            .map_err(|e| FHEError::EncryptionFailed(format!("{:?}", e)))?;
        Ok(TfheCiphertext::from_tfhe(inner))
    }

    fn add(&self, a: &TfheCiphertext, b: &TfheCiphertext) -> FHEResult<TfheCiphertext> {
        self.activate();
        Ok(Self::wrap(a.inner() + b.inner(), a, b, 1))
    }

    fn sub(&self, a: &TfheCiphertext, b: &TfheCiphertext) -> FHEResult<TfheCiphertext> {
        self.activate();
        Ok(Self::wrap(a.inner() - b.inner(), a, b, 1))
    }

    fn mul(&self, a: &TfheCiphertext, b: &TfheCiphertext) -> FHEResult<TfheCiphertext> {
        self.activate();
        // Mul is more expensive
        Ok(Self::wrap(a.inner() * b.inner(), a, b, 5))
    }

    fn div(&self, a: &TfheCiphertext, b: &TfheCiphertext) -> FHEResult<TfheCiphertext> {
        self.activate();
        Ok(Self::wrap(a.inner() / b.inner(), a, b, 10))
    }

    fn eq(&self, a: &TfheCiphertext, b: &TfheCiphertext) -> FHEResult<TfheBool> {
        self.activate();
        Ok(TfheBool {
            inner: a.inner().eq(b.inner()),
        })
    }

    fn lt(&self, a: &TfheCiphertext, b: &TfheCiphertext) -> FHEResult<TfheBool> {
        self.activate();
        Ok(TfheBool {
            inner: a.inner().lt(b.inner()),
        })
    }

    fn ge(&self, a: &TfheCiphertext, b: &TfheCiphertext) -> FHEResult<TfheBool> {
        self.activate();
        Ok(TfheBool {
            inner: a.inner().ge(b.inner()),
        })
    }

    fn select(
        &self,
        cond: &TfheBool,
        if_true: &TfheCiphertext,
        if_false: &TfheCiphertext,
    ) -> FHEResult<TfheCiphertext> {
        self.activate();
        let result = cond.inner.if_then_else(if_true.inner(), if_false.inner());
        Ok(Self::wrap(result, if_true, if_false, 5))
    }
}
