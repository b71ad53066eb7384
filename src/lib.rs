//! Census: Encrypted Census Ledger
//!
//! This is the root crate that re-exports the census components for
//! integration testing and runs the ledger as a tokio service.
//!
//! ## Architecture Overview
//!
//! Respondents submit census answers as ciphertexts. The ledger aggregates
//! them homomorphically and releases plaintext only for aggregate results,
//! once, through a proof-carrying decryption callback:
//!
//! - **Access Control**: an admin authorizes submitters
//! - **Record Store**: append-only encrypted records with per-submitter index
//! - **Analysis Engine**: average age, occupation count and mobility index
//! - **Decryption Correlator**: request ids routed back to analyses
//!
//! ## Crate Organization
//!
//! - `census-fhe`: ciphertext capability traits, TFHE and plaintext backends,
//!   decryption gateway
//! - `census-contracts`: the ledger state machine
//! - `census-storage`: redb persistence of the ledger

pub mod service;

// Re-export all crates for integration testing
pub use census_contracts as ledger;
pub use census_fhe as fhe;
pub use census_storage as storage;

/// Census protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Ledger configuration defaults
pub mod config {
    pub use census_contracts::types::{
        ADULT_AGE, MOBILITY_SCALE, SENIOR_AGE, TRACKED_LOCATION, TRACKED_OCCUPATION,
    };

    /// Number of ciphertexts revealed per analysis
    pub const RESULT_WORDS: usize = census_contracts::decryption::RESULT_WORDS;

    /// Service configuration defaults
    pub mod service {
        /// Relayer poll interval in milliseconds
        pub const RELAY_INTERVAL_MS: u64 = 10;

        /// Broadcast channel capacity
        pub const EVENT_CAPACITY: usize = 1024;
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use census_contracts::prelude::*;
    pub use census_fhe::{
        CipherBackend, DecryptionGateway, DecryptionOracle, DecryptionProof, DecryptionResponse,
        Decryptor, Encryptor, FHEError, PlainBackend, PlainCiphertext, RequestId,
    };
    pub use census_storage::{LedgerSink, Storage};
    pub use crate::service::{CensusService, ServiceConfig, ServiceError, ServiceEvent};
}
