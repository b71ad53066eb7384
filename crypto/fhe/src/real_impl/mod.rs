//! TFHE-rs backend
//!
//! Real encrypted computation. Key generation takes tens of seconds.

mod ciphertext;
mod keys;
mod operations;

pub use ciphertext::TfheCiphertext;
pub use keys::{ClientKey, KeyPair, ServerKey};
pub use operations::{TfheBackend, TfheBool};
