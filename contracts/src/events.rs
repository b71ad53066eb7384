//! Ledger notifications

use census_fhe::RequestId;
use serde::{Deserialize, Serialize};

use crate::types::Identity;

/// Notification emitted by a successful ledger operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CensusEvent {
    RecordSubmitted { id: u64, submitter: Identity },
    AnalysisRequested { analysis_id: u64, request_id: RequestId },
    AnalysisCompleted { analysis_id: u64 },
    ResultRevealed { analysis_id: u64 },
}

impl CensusEvent {
    /// Analysis (or record) id the event is about
    pub fn subject(&self) -> u64 {
        match self {
            CensusEvent::RecordSubmitted { id, .. } => *id,
            CensusEvent::AnalysisRequested { analysis_id, .. }
            | CensusEvent::AnalysisCompleted { analysis_id }
            | CensusEvent::ResultRevealed { analysis_id } => *analysis_id,
        }
    }
}
