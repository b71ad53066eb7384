//! Ledger state container
//!
//! All tables live in one owned [`CensusState`] that every operation receives
//! by reference. Tables are ordered maps so snapshots and commitments are
//! deterministic.

use std::collections::{BTreeMap, BTreeSet};

use census_fhe::RequestId;
use serde::{Deserialize, Serialize};

use crate::errors::{CensusError, CensusResult};
use crate::types::{
    AnalysisPhase, AnalysisResult, DecryptedResult, EncryptedRecord, Identity, PendingRequest,
};

/// Complete ledger state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CensusState<C> {
    /// Fixed at creation
    pub(crate) admin: Identity,
    /// Next record id to assign (ids start at 1)
    pub(crate) next_record_id: u64,
    pub(crate) records: BTreeMap<u64, EncryptedRecord<C>>,
    pub(crate) analyses: BTreeMap<u64, AnalysisResult<C>>,
    pub(crate) decrypted: BTreeMap<u64, DecryptedResult>,
    pub(crate) pending: BTreeMap<RequestId, PendingRequest>,
    /// Submitter -> record ids in submission order
    pub(crate) submitters: BTreeMap<Identity, Vec<u64>>,
    pub(crate) authorized: BTreeSet<Identity>,
    /// Lowest request id the ledger will still accept from the oracle.
    /// Only grows, so pruned ids are never handed out again.
    pub(crate) next_request_id: u64,
}

/// Raw table contents, used by the persistence layer
#[derive(Clone, Debug)]
pub struct StateTables<C> {
    pub admin: Identity,
    pub next_record_id: u64,
    pub records: Vec<EncryptedRecord<C>>,
    pub analyses: Vec<(u64, AnalysisResult<C>)>,
    pub decrypted: Vec<(u64, DecryptedResult)>,
    pub pending: Vec<(RequestId, PendingRequest)>,
    pub submitters: Vec<(Identity, Vec<u64>)>,
    pub authorized: Vec<Identity>,
    pub next_request_id: u64,
}

/// Keys written since the last flush to storage
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateChanges {
    pub records: BTreeSet<u64>,
    pub analyses: BTreeSet<u64>,
    pub decrypted: BTreeSet<u64>,
    pub pending: BTreeSet<RequestId>,
    pub submitters: BTreeSet<Identity>,
    pub authorized: BTreeSet<Identity>,
}

impl StateChanges {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
            && self.analyses.is_empty()
            && self.decrypted.is_empty()
            && self.pending.is_empty()
            && self.submitters.is_empty()
            && self.authorized.is_empty()
    }

    /// Fold `other` into `self`
    pub fn merge(&mut self, other: StateChanges) {
        self.records.extend(other.records);
        self.analyses.extend(other.analyses);
        self.decrypted.extend(other.decrypted);
        self.pending.extend(other.pending);
        self.submitters.extend(other.submitters);
        self.authorized.extend(other.authorized);
    }
}

impl<C> CensusState<C> {
    /// Create empty state administered by `admin`
    pub fn new(admin: Identity) -> Self {
        Self {
            admin,
            next_record_id: 1,
            records: BTreeMap::new(),
            analyses: BTreeMap::new(),
            decrypted: BTreeMap::new(),
            pending: BTreeMap::new(),
            submitters: BTreeMap::new(),
            authorized: BTreeSet::new(),
            next_request_id: 1,
        }
    }

    pub fn admin(&self) -> Identity {
        self.admin
    }

    pub fn is_authorized(&self, identity: &Identity) -> bool {
        self.authorized.contains(identity)
    }

    /// Authorized submitters in ascending order
    pub fn authorized(&self) -> Vec<Identity> {
        self.authorized.iter().copied().collect()
    }

    pub(crate) fn ensure_authorized(&self, identity: &Identity) -> CensusResult<()> {
        if self.is_authorized(identity) {
            Ok(())
        } else {
            Err(CensusError::Authorization(format!(
                "{} is not an authorized submitter",
                identity.short()
            )))
        }
    }

    pub fn record(&self, id: u64) -> Option<&EncryptedRecord<C>> {
        self.records.get(&id)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Id the next submission will receive
    pub fn next_record_id(&self) -> u64 {
        self.next_record_id
    }

    /// Record ids of a submitter, in submission order
    pub fn records_of(&self, identity: &Identity) -> Vec<u64> {
        self.submitters.get(identity).cloned().unwrap_or_default()
    }

    /// Resolve a batch of record ids. Fails on an empty batch or an unknown id.
    pub(crate) fn batch(&self, ids: &[u64]) -> CensusResult<Vec<&EncryptedRecord<C>>> {
        if ids.is_empty() {
            return Err(CensusError::InvalidInput("empty record batch".into()));
        }

        ids.iter()
            .map(|id| {
                self.records
                    .get(id)
                    .ok_or_else(|| CensusError::InvalidInput(format!("record {} does not exist", id)))
            })
            .collect()
    }

    pub fn analysis(&self, id: u64) -> Option<&AnalysisResult<C>> {
        self.analyses.get(&id)
    }

    pub fn decrypted(&self, id: u64) -> Option<&DecryptedResult> {
        self.decrypted.get(&id)
    }

    pub fn is_revealed(&self, analysis_id: u64) -> bool {
        self.decrypted
            .get(&analysis_id)
            .map(|d| d.revealed)
            .unwrap_or(false)
    }

    pub fn pending_request(&self, request_id: RequestId) -> Option<&PendingRequest> {
        self.pending.get(&request_id)
    }

    /// Outstanding (unfulfilled) request ids in issue order
    pub fn pending_requests(&self) -> Vec<RequestId> {
        self.pending
            .iter()
            .filter(|(_, p)| !p.fulfilled)
            .map(|(id, _)| *id)
            .collect()
    }

    /// First request id an oracle may issue next. Never decreases.
    pub fn next_request_id(&self) -> u64 {
        self.next_request_id
    }

    /// Lifecycle phase of an analysis id
    pub fn phase(&self, analysis_id: u64) -> Option<AnalysisPhase> {
        let analysis = self.analyses.get(&analysis_id)?;

        let phase = if self.is_revealed(analysis_id) {
            AnalysisPhase::Revealed
        } else if self
            .pending
            .values()
            .any(|p| p.analysis_id == analysis_id && !p.fulfilled)
        {
            AnalysisPhase::DecryptionRequested
        } else if analysis.completed {
            AnalysisPhase::Completed
        } else {
            AnalysisPhase::Pending
        };
        Some(phase)
    }

    /// Dump every table
    pub fn into_tables(self) -> StateTables<C> {
        StateTables {
            admin: self.admin,
            next_record_id: self.next_record_id,
            records: self.records.into_values().collect(),
            analyses: self.analyses.into_iter().collect(),
            decrypted: self.decrypted.into_iter().collect(),
            pending: self.pending.into_iter().collect(),
            submitters: self.submitters.into_iter().collect(),
            authorized: self.authorized.into_iter().collect(),
            next_request_id: self.next_request_id,
        }
    }

    /// Rebuild state from table contents
    pub fn from_tables(tables: StateTables<C>) -> CensusResult<Self> {
        let next_record_id = tables.next_record_id.max(1);
        if let Some(record) = tables.records.iter().find(|r| r.id == 0 || r.id >= next_record_id) {
            return Err(CensusError::InvalidInput(format!(
                "record {} is outside the assigned id range 1..{}",
                record.id, next_record_id
            )));
        }

        let next_request_id = tables.next_request_id.max(1);
        if let Some((request_id, _)) = tables.pending.iter().find(|(id, _)| id.value() >= next_request_id) {
            return Err(CensusError::InvalidInput(format!(
                "request {} is at or above the issued id mark {}",
                request_id, next_request_id
            )));
        }

        Ok(Self {
            admin: tables.admin,
            next_record_id,
            records: tables.records.into_iter().map(|r| (r.id, r)).collect(),
            analyses: tables.analyses.into_iter().collect(),
            decrypted: tables.decrypted.into_iter().collect(),
            pending: tables.pending.into_iter().collect(),
            submitters: tables.submitters.into_iter().collect(),
            authorized: tables.authorized.into_iter().collect(),
            next_request_id,
        })
    }
}

impl<C: Serialize> CensusState<C> {
    /// Commitment to the whole state
    pub fn state_root(&self) -> CensusResult<[u8; 32]> {
        let bytes = self.serialize()?;
        Ok(*blake3::hash(&bytes).as_bytes())
    }

    /// Serialize state for persistence
    pub fn serialize(&self) -> CensusResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| CensusError::SerializationError(e.to_string()))
    }
}

impl<C: for<'de> Deserialize<'de>> CensusState<C> {
    /// Deserialize state from bytes
    pub fn deserialize(data: &[u8]) -> CensusResult<Self> {
        bincode::deserialize(data).map_err(|e| CensusError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use census_fhe::PlainCiphertext;

    #[test]
    fn test_state_creation() {
        let admin = Identity::from_label("admin");
        let state: CensusState<PlainCiphertext> = CensusState::new(admin);
        assert_eq!(state.admin(), admin);
        assert_eq!(state.next_record_id(), 1);
        assert_eq!(state.record_count(), 0);
        assert!(!state.is_authorized(&admin));
    }

    #[test]
    fn test_batch_validation() {
        let state: CensusState<PlainCiphertext> = CensusState::new(Identity::from_label("admin"));
        assert!(matches!(state.batch(&[]), Err(CensusError::InvalidInput(_))));
        assert!(matches!(state.batch(&[1]), Err(CensusError::InvalidInput(_))));
    }

    #[test]
    fn test_state_serialization() {
        let state: CensusState<PlainCiphertext> = CensusState::new(Identity::from_label("admin"));

        let serialized = state.serialize().unwrap();
        let deserialized = CensusState::<PlainCiphertext>::deserialize(&serialized).unwrap();

        assert_eq!(state.admin(), deserialized.admin());
        assert_eq!(state.state_root().unwrap(), deserialized.state_root().unwrap());
    }

    #[test]
    fn test_from_tables_rejects_out_of_range_records() {
        let mut tables = CensusState::<PlainCiphertext>::new(Identity::from_label("admin")).into_tables();
        tables.records.push(EncryptedRecord {
            id: 5,
            submitter: Identity::from_label("alice"),
            fields: crate::types::CensusFields {
                age: PlainCiphertext(1),
                birth_year: PlainCiphertext(1),
                occupation: PlainCiphertext(1),
                location: PlainCiphertext(1),
                family_size: PlainCiphertext(1),
            },
            created_at: 0,
        });
        assert!(CensusState::from_tables(tables).is_err());
    }

    #[test]
    fn test_from_tables_rejects_request_above_mark() {
        let mut tables = CensusState::<PlainCiphertext>::new(Identity::from_label("admin")).into_tables();
        tables.next_request_id = 3;
        tables.pending.push((
            RequestId(3),
            PendingRequest {
                analysis_id: 1,
                revision: 1,
                fulfilled: false,
            },
        ));
        assert!(CensusState::from_tables(tables.clone()).is_err());

        tables.next_request_id = 4;
        let state = CensusState::from_tables(tables).unwrap();
        assert_eq!(state.next_request_id(), 4);
    }

    #[test]
    fn test_changes_merge() {
        let mut changes = StateChanges::default();
        assert!(changes.is_empty());

        let mut other = StateChanges::default();
        other.records.insert(1);
        other.pending.insert(RequestId(2));
        changes.merge(other);
        assert!(!changes.is_empty());
        assert!(changes.records.contains(&1));
        assert!(changes.pending.contains(&RequestId(2)));
    }
}
