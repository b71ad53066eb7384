//! FHE Error types

use thiserror::Error;

/// Errors that can occur in the ciphertext capability or the decryption gateway
#[derive(Error, Debug)]
pub enum FHEError {
    /// Key generation failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Homomorphic operation failed
    #[error("Homomorphic operation failed: {0}")]
    OperationFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid key
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Decryption payload could not be decoded
    #[error("Malformed payload: expected {expected} bytes, got {got}")]
    MalformedPayload { expected: usize, got: usize },

    /// Decryption request was rejected by the gateway
    #[error("Decryption request rejected: {0}")]
    RequestRejected(String),
}
