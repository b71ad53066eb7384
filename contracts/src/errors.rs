//! Error types for the census ledger

use census_fhe::{FHEError, RequestId};
use thiserror::Error;

/// Errors that can occur during ledger operations.
///
/// Every error aborts the operation with no state change.
#[derive(Error, Debug)]
pub enum CensusError {
    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Analysis {0} is not completed")]
    NotCompleted(u64),

    #[error("Analysis {0} has already been revealed")]
    AlreadyRevealed(u64),

    #[error("Unknown decryption request: {0}")]
    UnknownRequest(RequestId),

    #[error("Invalid decryption proof for request {0}")]
    InvalidProof(RequestId),

    #[error("Stale decryption request {request_id}: analysis {analysis_id} was recomputed")]
    StaleRequest { request_id: RequestId, analysis_id: u64 },

    #[error("FHE operation failed: {0}")]
    FHEError(#[from] FHEError),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CensusError {
    /// Short machine-readable kind, used in logs and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            CensusError::Authorization(_) => "authorization",
            CensusError::InvalidInput(_) => "invalid_input",
            CensusError::NotCompleted(_) => "not_completed",
            CensusError::AlreadyRevealed(_) => "already_revealed",
            CensusError::UnknownRequest(_) => "unknown_request",
            CensusError::InvalidProof(_) => "invalid_proof",
            CensusError::StaleRequest { .. } => "stale_request",
            CensusError::FHEError(_) => "fhe",
            CensusError::SerializationError(_) => "serialization",
        }
    }
}

/// Result type for ledger operations
pub type CensusResult<T> = Result<T, CensusError>;
