//! Census Ledger
//!
//! Bookkeeping state machine for encrypted census microdata.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Ledger Flow                         │
//! ├─────────────────────────────────────────────────────┤
//! │  Access Control (admin, authorized submitters)      │
//! │      ↓                                              │
//! │  Record Store (append-only encrypted records)       │
//! │      ↓                                              │
//! │  Analysis Engine (aggregates over ciphertexts)      │
//! │      ↓                                              │
//! │  Decryption Correlator (request id -> analysis)     │
//! │      ↓                                              │
//! │  One-time plaintext reveal                          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Features
//!
//! - **Capability injection**: ciphertext arithmetic and decryption are
//!   traits from `census-fhe`, so tests run on a plaintext stand-in
//! - **All-or-nothing**: validation and ciphertext work happen before the
//!   first write
//! - **Verified reveal**: callbacks must carry a proof bound to their
//!   request id, and each analysis reveals at most once

pub mod access;
pub mod analysis;
pub mod contract;
pub mod decryption;
pub mod errors;
pub mod events;
pub mod records;
pub mod state;
pub mod types;

pub use contract::CensusContract;
pub use errors::{CensusError, CensusResult};
pub use events::CensusEvent;
pub use state::{CensusState, StateChanges, StateTables};
pub use types::{
    AgeDistribution, AnalysisPhase, AnalysisResult, CallContext, CensusAnswers, CensusFields,
    DecryptedResult, EncryptedRecord, Identity, PendingRequest,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::contract::CensusContract;
    pub use crate::errors::{CensusError, CensusResult};
    pub use crate::events::CensusEvent;
    pub use crate::state::CensusState;
    pub use crate::types::{
        AnalysisPhase, CallContext, CensusAnswers, CensusFields, DecryptedResult, Identity,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        let admin = Identity::from_label("admin");
        let state: CensusState<census_fhe::PlainCiphertext> = CensusState::new(admin);
        assert_eq!(state.admin(), admin);
        let _ = CensusError::NotCompleted(1);
        let _ = AnalysisPhase::Pending;
    }
}
