//! The census ledger
//!
//! [`CensusContract`] owns the state container and the injected capabilities.
//! Operations are split across `access`, `records`, `analysis` and
//! `decryption`.

use census_fhe::{CipherBackend, DecryptionOracle};

use crate::errors::CensusResult;
use crate::events::CensusEvent;
use crate::state::{CensusState, StateChanges};
use crate::types::Identity;

/// Encrypted census ledger
pub struct CensusContract<B: CipherBackend, O> {
    pub(crate) backend: B,
    pub(crate) oracle: O,
    pub(crate) state: CensusState<B::Ciphertext>,
    /// Notifications not yet taken by an observer
    pub(crate) events: Vec<CensusEvent>,
    /// Keys written since the last `take_changes`
    pub(crate) changes: StateChanges,
}

impl<B, O> CensusContract<B, O>
where
    B: CipherBackend,
    O: DecryptionOracle<B::Ciphertext>,
{
    /// Create a ledger administered by its creator
    pub fn new(admin: Identity, backend: B, oracle: O) -> Self {
        Self::from_state(CensusState::new(admin), backend, oracle)
    }

    /// Resume from previously persisted state
    pub fn from_state(state: CensusState<B::Ciphertext>, backend: B, oracle: O) -> Self {
        Self {
            backend,
            oracle,
            state,
            events: Vec::new(),
            changes: StateChanges::default(),
        }
    }

    pub fn state(&self) -> &CensusState<B::Ciphertext> {
        &self.state
    }

    pub fn into_state(self) -> CensusState<B::Ciphertext> {
        self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Take every notification emitted since the last call
    pub fn take_events(&mut self) -> Vec<CensusEvent> {
        std::mem::take(&mut self.events)
    }

    /// Take the keys written since the last call
    pub fn take_changes(&mut self) -> StateChanges {
        std::mem::take(&mut self.changes)
    }

    /// Commitment to the current state
    pub fn state_root(&self) -> CensusResult<[u8; 32]> {
        self.state.state_root()
    }

    pub(crate) fn emit(&mut self, event: CensusEvent) {
        self.events.push(event);
    }
}

impl<B: CipherBackend, O> std::fmt::Debug for CensusContract<B, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CensusContract")
            .field("admin", &self.state.admin)
            .field("records", &self.state.records.len())
            .field("pending", &self.state.pending.len())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_contract_creation() {
        let (mut contract, _) = setup();
        assert_eq!(contract.state().admin(), admin());
        assert_eq!(contract.state().record_count(), 0);
        assert!(contract.take_events().is_empty());
    }

    #[test]
    fn test_take_events_drains() {
        let (mut contract, _) = setup();
        submit(&mut contract, answers(30, 1, 2, 3));
        assert_eq!(contract.take_events().len(), 1);
        assert!(contract.take_events().is_empty());
    }

    #[test]
    fn test_changes_track_written_keys() {
        let (mut contract, _) = setup();
        let changes = contract.take_changes();
        assert!(changes.authorized.contains(&alice()));

        let id = submit(&mut contract, answers(30, 1, 2, 3));
        let changes = contract.take_changes();
        assert!(changes.records.contains(&id));
        assert!(changes.analyses.contains(&id));
        assert!(changes.decrypted.contains(&id));
        assert!(changes.submitters.contains(&alice()));
        assert!(changes.authorized.is_empty());
        assert!(contract.take_changes().is_empty());
    }

    #[test]
    fn test_rejected_call_records_no_changes() {
        let (mut contract, _) = setup();
        contract.take_changes();

        let mallory = Identity::from_label("mallory");
        let fields = answers(30, 1, 2, 3).encrypt(&census_fhe::PlainBackend::new()).unwrap();
        assert!(contract
            .submit(&crate::types::CallContext::at(mallory, 0), fields)
            .is_err());
        assert!(contract.take_changes().is_empty());
    }

    #[test]
    fn test_state_root_changes_on_submit() {
        let (mut contract, _) = setup();
        let before = contract.state_root().unwrap();
        submit(&mut contract, answers(30, 1, 2, 3));
        assert_ne!(before, contract.state_root().unwrap());
    }
}
