//! TFHE key management
//!
//! - ClientKey: encrypts census answers and decrypts behind the gateway
//! - ServerKey: evaluates the analysis on ciphertexts, never decrypts

use tfhe::prelude::*;
use tfhe::{generate_keys, ConfigBuilder};
use tfhe::{ClientKey as TfheClientKey, ServerKey as TfheServerKey};

use super::ciphertext::TfheCiphertext;
use crate::backend::{Decryptor, Encryptor};
use crate::{FHEConfig, FHEError, FHEResult};

fn tfhe_config(config: &FHEConfig) -> tfhe::Config {
    if config.security_bits >= 128 {
        ConfigBuilder::default().build()
    } else {
        // Lower security for testing
        ConfigBuilder::default_with_small_encryption().build()
    }
}

/// Client key for encryption and decryption
#[derive(Clone)]
pub struct ClientKey {
    pub(crate) inner: TfheClientKey,
    config_hash: [u8; 32],
}

impl ClientKey {
    /// Derive the matching server key
    pub fn derive_server_key(&self) -> ServerKey {
        ServerKey {
            inner: TfheServerKey::new(&self.inner),
            config_hash: self.config_hash,
        }
    }

    pub fn to_bytes(&self) -> FHEResult<Vec<u8>> {
        bincode::serialize(&self.inner).map_err(|e| FHEError::SerializationError(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8], config: &FHEConfig) -> FHEResult<Self> {
        let inner: TfheClientKey =
            bincode::deserialize(bytes).map_err(|e| FHEError::SerializationError(e.to_string()))?;

        Ok(Self {
            inner,
            config_hash: config.fingerprint(),
        })
    }
}

impl Encryptor for ClientKey {
    type Ciphertext = TfheCiphertext;

    fn encrypt(&self, value: u64) -> FHEResult<TfheCiphertext> {
        let inner = tfhe::FheUint64::try_encrypt(value, &self.inner)
            .map_err(|e| FHEError::EncryptionFailed(format!("{:?}", e)))?;
        Ok(TfheCiphertext::from_tfhe(inner))
    }
}

impl Decryptor for ClientKey {
    type Ciphertext = TfheCiphertext;

    fn decrypt(&self, ciphertext: &TfheCiphertext) -> FHEResult<u64> {
        Ok(ciphertext.inner().decrypt(&self.inner))
    }
}

impl std::fmt::Debug for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientKey")
            .field("config_hash", &hex::encode(&self.config_hash[..8]))
            .finish()
    }
}

/// Server key for homomorphic operations
#[derive(Clone)]
pub struct ServerKey {
    pub(crate) inner: TfheServerKey,
    config_hash: [u8; 32],
}

impl ServerKey {
    /// Verify this key matches the expected configuration
    pub fn verify_config(&self, config: &FHEConfig) -> bool {
        config.fingerprint() == self.config_hash
    }

    /// Install this key for the current thread.
    ///
    /// TFHE-rs keeps the server key in a thread local, so every thread that
    /// evaluates must install it first.
    pub fn install(&self) {
        tfhe::set_server_key(self.inner.clone());
    }

    /// Serialize to bytes (large, tens of MB)
    pub fn to_bytes(&self) -> FHEResult<Vec<u8>> {
        bincode::serialize(&self.inner).map_err(|e| FHEError::SerializationError(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8], config: &FHEConfig) -> FHEResult<Self> {
        let inner: TfheServerKey =
            bincode::deserialize(bytes).map_err(|e| FHEError::SerializationError(e.to_string()))?;

        Ok(Self {
            inner,
            config_hash: config.fingerprint(),
        })
    }
}

impl std::fmt::Debug for ServerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKey")
            .field("config_hash", &hex::encode(&self.config_hash[..8]))
            .finish()
    }
}

/// Client and server key generated together
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub client: ClientKey,
    pub server: ServerKey,
}

impl KeyPair {
    /// Generate a new key pair
    ///
    /// WARNING: Key generation is slow (~10-30 seconds)
    pub fn generate(config: &FHEConfig) -> FHEResult<Self> {
        let (client_key, server_key) = generate_keys(tfhe_config(config));
        let config_hash = config.fingerprint();

        Ok(Self {
            client: ClientKey {
                inner: client_key,
                config_hash,
            },
            server: ServerKey {
                inner: server_key,
                config_hash,
            },
        })
    }
}
