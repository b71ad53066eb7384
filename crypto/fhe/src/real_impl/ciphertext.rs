//! Encrypted census values backed by TFHE-rs

use serde::{Deserialize, Serialize};
use tfhe::FheUint64;

/// Encrypted 64-bit unsigned integer
#[derive(Clone, Serialize, Deserialize)]
pub struct TfheCiphertext {
    inner: FheUint64,
    /// Operation count (noise proxy)
    op_count: u32,
}

impl TfheCiphertext {
    pub fn from_tfhe(inner: FheUint64) -> Self {
        Self { inner, op_count: 0 }
    }

    pub(crate) fn with_ops(inner: FheUint64, op_count: u32) -> Self {
        Self { inner, op_count }
    }

    pub fn inner(&self) -> &FheUint64 {
        &self.inner
    }

    pub fn op_count(&self) -> u32 {
        self.op_count
    }
}

impl std::fmt::Debug for TfheCiphertext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfheCiphertext")
            .field("ops", &self.op_count)
            .finish()
    }
}
