//! Record store
//!
//! Append-only. Every submission also pre-allocates a zero-valued, incomplete
//! analysis result and an unrevealed decrypted result under the new id.

use census_fhe::{CipherBackend, DecryptionOracle};
use tracing::info;

use crate::contract::CensusContract;
use crate::errors::CensusResult;
use crate::events::CensusEvent;
use crate::types::{AnalysisResult, CallContext, CensusFields, DecryptedResult, EncryptedRecord, Identity};

impl<B, O> CensusContract<B, O>
where
    B: CipherBackend,
    O: DecryptionOracle<B::Ciphertext>,
{
    /// Store a new record and return its id
    pub fn submit(&mut self, ctx: &CallContext, fields: CensusFields<B::Ciphertext>) -> CensusResult<u64> {
        self.state.ensure_authorized(&ctx.caller)?;

        let zero = self.backend.encrypt_constant(0)?;
        let placeholder = AnalysisResult {
            average_age: zero.clone(),
            occupation_distribution: zero.clone(),
            mobility_index: zero,
            completed: false,
            revision: 0,
        };

        let id = self.state.next_record_id;
        self.state.next_record_id += 1;

        self.state.records.insert(
            id,
            EncryptedRecord {
                id,
                submitter: ctx.caller,
                fields,
                created_at: ctx.timestamp,
            },
        );
        self.state.submitters.entry(ctx.caller).or_default().push(id);
        self.state.analyses.insert(id, placeholder);
        self.state.decrypted.insert(id, DecryptedResult::default());

        self.changes.records.insert(id);
        self.changes.analyses.insert(id);
        self.changes.decrypted.insert(id);
        self.changes.submitters.insert(ctx.caller);

        info!("Record {} submitted by {}", id, ctx.caller.short());
        self.emit(CensusEvent::RecordSubmitted {
            id,
            submitter: ctx.caller,
        });
        Ok(id)
    }

    /// Record ids of a submitter, in submission order
    pub fn records_of(&self, identity: &Identity) -> Vec<u64> {
        self.state.records_of(identity)
    }

    pub fn record(&self, id: u64) -> Option<&EncryptedRecord<B::Ciphertext>> {
        self.state.record(id)
    }

    pub fn record_count(&self) -> usize {
        self.state.record_count()
    }
}

#[cfg(test)]
mod tests {
    use census_fhe::PlainBackend;

    use crate::contract::test_support::*;
    use crate::errors::CensusError;
    use crate::events::CensusEvent;
    use crate::types::{AnalysisPhase, CallContext, Identity};

    #[test]
    fn test_ids_sequential_from_one() {
        let (mut contract, _) = setup();
        let ids: Vec<u64> = (0..5).map(|i| submit(&mut contract, answers(20 + i, 0, 0, 1))).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(contract.records_of(&alice()), ids);
    }

    #[test]
    fn test_submit_preallocates_results() {
        let (mut contract, _) = setup();
        let id = submit(&mut contract, answers(30, 1, 2, 3));

        let record = contract.record(id).unwrap();
        assert_eq!(record.submitter, alice());
        assert_eq!(record.created_at, 1_700_000_000);

        let analysis = contract.state().analysis(id).unwrap();
        assert!(!analysis.completed);
        assert_eq!(analysis.average_age.value(), 0);
        assert!(!contract.state().is_revealed(id));
        assert_eq!(contract.state().phase(id), Some(AnalysisPhase::Pending));

        assert_eq!(
            contract.take_events(),
            vec![CensusEvent::RecordSubmitted { id, submitter: alice() }]
        );
    }

    #[test]
    fn test_unauthorized_submit_rejected() {
        let (mut contract, _) = setup();
        let fields = answers(30, 1, 2, 3).encrypt(&PlainBackend::new()).unwrap();
        let mallory = Identity::from_label("mallory");

        let result = contract.submit(&CallContext::at(mallory, 0), fields.clone());
        assert!(matches!(result, Err(CensusError::Authorization(_))));

        // Administrator is not a submitter either
        let result = contract.submit(&CallContext::at(admin(), 0), fields);
        assert!(matches!(result, Err(CensusError::Authorization(_))));

        assert_eq!(contract.record_count(), 0);
        assert_eq!(contract.state().next_record_id(), 1);
        assert!(contract.take_events().is_empty());
    }

    #[test]
    fn test_records_of_per_submitter() {
        let (mut contract, _) = setup();
        let bob = Identity::from_label("bob");
        contract.authorize(&CallContext::at(admin(), 0), bob).unwrap();

        let a1 = submit(&mut contract, answers(30, 1, 2, 3));
        let fields = answers(40, 0, 0, 1).encrypt(&PlainBackend::new()).unwrap();
        let b1 = contract.submit(&CallContext::at(bob, 0), fields).unwrap();
        let a2 = submit(&mut contract, answers(50, 1, 2, 3));

        assert_eq!(contract.records_of(&alice()), vec![a1, a2]);
        assert_eq!(contract.records_of(&bob), vec![b1]);
        assert!(contract.records_of(&admin()).is_empty());
    }
}
