//! Decryption correlator
//!
//! Per analysis id: `Completed -> DecryptionRequested -> Revealed`.
//!
//! `request_decryption` hands the three result ciphertexts to the oracle and
//! remembers which analysis (and which revision of it) the returned request id
//! belongs to. `on_decrypted` is the out-of-band completion: it re-checks every
//! guard, verifies the proof against that exact request id and payload, and
//! reveals at most once. A failed guard leaves the state untouched.

use census_fhe::{
    decode_payload, CipherBackend, DecryptionOracle, DecryptionProof, FHEError, RequestId,
};
use tracing::{info, warn};

use crate::contract::CensusContract;
use crate::errors::{CensusError, CensusResult};
use crate::events::CensusEvent;
use crate::types::{DecryptedResult, PendingRequest};

/// Plaintext words in a result payload
pub const RESULT_WORDS: usize = 3;

impl<B, O> CensusContract<B, O>
where
    B: CipherBackend,
    O: DecryptionOracle<B::Ciphertext>,
{
    /// Ask the oracle to decrypt a completed analysis.
    ///
    /// Open to anyone. Several requests for the same analysis may be
    /// outstanding; the first verified callback wins.
    pub fn request_decryption(&mut self, analysis_id: u64) -> CensusResult<RequestId> {
        let analysis = self
            .state
            .analyses
            .get(&analysis_id)
            .filter(|a| a.completed)
            .ok_or(CensusError::NotCompleted(analysis_id))?;

        if self.state.is_revealed(analysis_id) {
            return Err(CensusError::AlreadyRevealed(analysis_id));
        }

        let revision = analysis.revision;
        let ciphertexts = analysis.ciphertexts().into_iter().cloned().collect();
        let request_id = self.oracle.request_decryption(ciphertexts)?;

        // An id below the mark may still have a proof in circulation
        if request_id.value() < self.state.next_request_id {
            let cancelled = self.oracle.cancel_request(request_id);
            warn!(
                "Oracle reissued request id {} (mark {}, cancelled: {})",
                request_id, self.state.next_request_id, cancelled
            );
            return Err(CensusError::FHEError(FHEError::RequestRejected(format!(
                "request id {} was already issued",
                request_id
            ))));
        }

        self.state.next_request_id = request_id.value().saturating_add(1);
        self.state.pending.insert(
            request_id,
            PendingRequest {
                analysis_id,
                revision,
                fulfilled: false,
            },
        );
        self.changes.pending.insert(request_id);

        info!("Decryption of analysis {} requested as {}", analysis_id, request_id);
        self.emit(CensusEvent::AnalysisRequested {
            analysis_id,
            request_id,
        });
        Ok(request_id)
    }

    /// Deliver a decryption result
    pub fn on_decrypted(
        &mut self,
        request_id: RequestId,
        payload: &[u8],
        proof: &DecryptionProof,
    ) -> CensusResult<u64> {
        let pending = *self
            .state
            .pending
            .get(&request_id)
            .ok_or(CensusError::UnknownRequest(request_id))?;
        let analysis_id = pending.analysis_id;

        let analysis = self
            .state
            .analyses
            .get(&analysis_id)
            .filter(|a| a.completed)
            .ok_or(CensusError::NotCompleted(analysis_id))?;

        if self.state.is_revealed(analysis_id) {
            return Err(CensusError::AlreadyRevealed(analysis_id));
        }

        if analysis.revision != pending.revision {
            warn!(
                "Rejected stale callback {} for analysis {} (revision {} != {})",
                request_id, analysis_id, pending.revision, analysis.revision
            );
            return Err(CensusError::StaleRequest {
                request_id,
                analysis_id,
            });
        }

        if !self.oracle.verify_proof(request_id, payload, proof) {
            warn!("Rejected callback {} with invalid proof", request_id);
            return Err(CensusError::InvalidProof(request_id));
        }

        let values = decode_payload(payload, RESULT_WORDS)
            .map_err(|e| CensusError::InvalidInput(e.to_string()))?;

        self.state.decrypted.insert(
            analysis_id,
            DecryptedResult {
                average_age: values[0],
                occupation_distribution: values[1],
                mobility_index: values[2],
                revealed: true,
            },
        );
        if let Some(entry) = self.state.pending.get_mut(&request_id) {
            entry.fulfilled = true;
        }
        self.changes.decrypted.insert(analysis_id);
        self.changes.pending.insert(request_id);

        info!("Analysis {} revealed via request {}", analysis_id, request_id);
        self.emit(CensusEvent::ResultRevealed { analysis_id });
        Ok(analysis_id)
    }

    /// Drop every request whose analysis has been revealed. Returns the count.
    pub fn prune_settled(&mut self) -> usize {
        let decrypted = &self.state.decrypted;
        let settled: Vec<RequestId> = self
            .state
            .pending
            .iter()
            .filter(|(_, p)| {
                decrypted
                    .get(&p.analysis_id)
                    .map(|d| d.revealed)
                    .unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect();

        for request_id in &settled {
            self.state.pending.remove(request_id);
            self.changes.pending.insert(*request_id);
        }
        settled.len()
    }

    /// Outstanding request ids in issue order
    pub fn pending_requests(&self) -> Vec<RequestId> {
        self.state.pending_requests()
    }

    pub fn decrypted(&self, analysis_id: u64) -> Option<&DecryptedResult> {
        self.state.decrypted(analysis_id)
    }
}
