//! Ledger table storage
//!
//! One redb table per ledger table. `save` rewrites every table and
//! `save_changes` only the rows a mutation touched; either way one write
//! transaction covers the rows, the metadata and the state root, so a crash
//! leaves either the old or the new ledger.

use std::sync::Arc;

use census_contracts::{
    AnalysisResult, CensusState, DecryptedResult, EncryptedRecord, Identity, PendingRequest,
    StateChanges, StateTables,
};
use census_fhe::RequestId;
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::{StorageError, StorageResult};

/// Records by id
const RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("records");

/// Analysis results by analysis id
const ANALYSES: TableDefinition<u64, &[u8]> = TableDefinition::new("analyses");

/// Decrypted results by analysis id
const DECRYPTED: TableDefinition<u64, &[u8]> = TableDefinition::new("decrypted");

/// Pending decryption requests by request id
const PENDING: TableDefinition<u64, &[u8]> = TableDefinition::new("pending_requests");

/// Submitter -> record id list
const SUBMITTERS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("submitters");

/// Authorized submitter set
const AUTHORIZED: TableDefinition<&[u8], u8> = TableDefinition::new("authorized");

/// Ledger metadata
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

const META_ADMIN: &str = "admin";
const META_NEXT_RECORD_ID: &str = "next_record_id";
const META_NEXT_REQUEST_ID: &str = "next_request_id";
const META_STATE_ROOT: &str = "state_root";
const META_GATEWAY_KEY: &str = "gateway_key";

fn decode_identity(bytes: &[u8]) -> StorageResult<Identity> {
    let id: [u8; 32] = bytes
        .try_into()
        .map_err(|_| StorageError::Corruption(format!("identity of {} bytes", bytes.len())))?;
    Ok(Identity(id))
}

fn decode_u64(bytes: &[u8]) -> StorageResult<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::Corruption("Invalid u64 bytes".into()))?;
    Ok(u64::from_le_bytes(arr))
}

fn decode_array32(bytes: &[u8]) -> StorageResult<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| StorageError::Corruption(format!("expected 32 bytes, got {}", bytes.len())))
}

/// Ledger storage interface
pub struct LedgerStore {
    db: Arc<Database>,
}

impl LedgerStore {
    /// Create new ledger store
    pub fn new(db: Arc<Database>) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RECORDS)?;
            let _ = write_txn.open_table(ANALYSES)?;
            let _ = write_txn.open_table(DECRYPTED)?;
            let _ = write_txn.open_table(PENDING)?;
            let _ = write_txn.open_table(SUBMITTERS)?;
            let _ = write_txn.open_table(AUTHORIZED)?;
            let _ = write_txn.open_table(META)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Persist a full ledger snapshot, returning its state root
    pub fn save<C: Serialize + Clone>(&self, state: &CensusState<C>) -> StorageResult<[u8; 32]> {
        let root = state.state_root()?;
        let tables = state.clone().into_tables();

        let write_txn = self.db.begin_write()?;
        write_txn.delete_table(RECORDS)?;
        write_txn.delete_table(ANALYSES)?;
        write_txn.delete_table(DECRYPTED)?;
        write_txn.delete_table(PENDING)?;
        write_txn.delete_table(SUBMITTERS)?;
        write_txn.delete_table(AUTHORIZED)?;
        {
            let mut records = write_txn.open_table(RECORDS)?;
            for record in &tables.records {
                records.insert(record.id, bincode::serialize(record)?.as_slice())?;
            }

            let mut analyses = write_txn.open_table(ANALYSES)?;
            for (id, analysis) in &tables.analyses {
                analyses.insert(*id, bincode::serialize(analysis)?.as_slice())?;
            }

            let mut decrypted = write_txn.open_table(DECRYPTED)?;
            for (id, result) in &tables.decrypted {
                decrypted.insert(*id, bincode::serialize(result)?.as_slice())?;
            }

            let mut pending = write_txn.open_table(PENDING)?;
            for (request_id, entry) in &tables.pending {
                pending.insert(request_id.value(), bincode::serialize(entry)?.as_slice())?;
            }

            let mut submitters = write_txn.open_table(SUBMITTERS)?;
            for (identity, ids) in &tables.submitters {
                submitters.insert(identity.0.as_slice(), bincode::serialize(ids)?.as_slice())?;
            }

            let mut authorized = write_txn.open_table(AUTHORIZED)?;
            for identity in &tables.authorized {
                authorized.insert(identity.0.as_slice(), 1u8)?;
            }
        }
        write_meta(&write_txn, state, &root)?;
        write_txn.commit()?;

        debug!(
            "Saved ledger snapshot: {} records, {} pending requests",
            tables.records.len(),
            tables.pending.len()
        );
        Ok(root)
    }

    /// Persist only the rows in `changes`, returning the new state root.
    ///
    /// A key missing from `state` is deleted. Assumes the store already holds
    /// the ledger as it was before those changes.
    pub fn save_changes<C: Serialize>(
        &self,
        state: &CensusState<C>,
        changes: &StateChanges,
    ) -> StorageResult<[u8; 32]> {
        let root = state.state_root()?;

        let write_txn = self.db.begin_write()?;
        {
            let mut records = write_txn.open_table(RECORDS)?;
            for id in &changes.records {
                match state.record(*id) {
                    Some(record) => {
                        records.insert(*id, bincode::serialize(record)?.as_slice())?;
                    }
                    None => {
                        records.remove(*id)?;
                    }
                }
            }

            let mut analyses = write_txn.open_table(ANALYSES)?;
            for id in &changes.analyses {
                match state.analysis(*id) {
                    Some(analysis) => {
                        analyses.insert(*id, bincode::serialize(analysis)?.as_slice())?;
                    }
                    None => {
                        analyses.remove(*id)?;
                    }
                }
            }

            let mut decrypted = write_txn.open_table(DECRYPTED)?;
            for id in &changes.decrypted {
                match state.decrypted(*id) {
                    Some(result) => {
                        decrypted.insert(*id, bincode::serialize(result)?.as_slice())?;
                    }
                    None => {
                        decrypted.remove(*id)?;
                    }
                }
            }

            let mut pending = write_txn.open_table(PENDING)?;
            for request_id in &changes.pending {
                match state.pending_request(*request_id) {
                    Some(entry) => {
                        pending.insert(request_id.value(), bincode::serialize(entry)?.as_slice())?;
                    }
                    None => {
                        pending.remove(request_id.value())?;
                    }
                }
            }

            let mut submitters = write_txn.open_table(SUBMITTERS)?;
            for identity in &changes.submitters {
                let ids = state.records_of(identity);
                if ids.is_empty() {
                    submitters.remove(identity.0.as_slice())?;
                } else {
                    submitters.insert(identity.0.as_slice(), bincode::serialize(&ids)?.as_slice())?;
                }
            }

            let mut authorized = write_txn.open_table(AUTHORIZED)?;
            for identity in &changes.authorized {
                if state.is_authorized(identity) {
                    authorized.insert(identity.0.as_slice(), 1u8)?;
                } else {
                    authorized.remove(identity.0.as_slice())?;
                }
            }
        }
        write_meta(&write_txn, state, &root)?;
        write_txn.commit()?;

        debug!(
            "Saved ledger changes: {} records, {} analyses, {} requests",
            changes.records.len(),
            changes.analyses.len(),
            changes.pending.len()
        );
        Ok(root)
    }

    /// Load the persisted ledger, or `None` if nothing was saved yet
    pub fn load<C: DeserializeOwned>(&self) -> StorageResult<Option<CensusState<C>>> {
        let read_txn = self.db.begin_read()?;

        let meta = read_txn.open_table(META)?;
        let admin = match meta.get(META_ADMIN)? {
            Some(data) => decode_identity(data.value())?,
            None => return Ok(None),
        };
        let next_record_id = match meta.get(META_NEXT_RECORD_ID)? {
            Some(data) => decode_u64(data.value())?,
            None => 1,
        };
        let stored_request_mark = match meta.get(META_NEXT_REQUEST_ID)? {
            Some(data) => Some(decode_u64(data.value())?),
            None => None,
        };

        let records = read_txn
            .open_table(RECORDS)?
            .iter()?
            .map(|item| {
                let (_, data) = item?;
                Ok(bincode::deserialize(data.value())?)
            })
            .collect::<StorageResult<Vec<EncryptedRecord<C>>>>()?;

        let analyses = read_txn
            .open_table(ANALYSES)?
            .iter()?
            .map(|item| {
                let (key, data) = item?;
                Ok((key.value(), bincode::deserialize(data.value())?))
            })
            .collect::<StorageResult<Vec<(u64, AnalysisResult<C>)>>>()?;

        let decrypted = read_txn
            .open_table(DECRYPTED)?
            .iter()?
            .map(|item| {
                let (key, data) = item?;
                Ok((key.value(), bincode::deserialize(data.value())?))
            })
            .collect::<StorageResult<Vec<(u64, DecryptedResult)>>>()?;

        let pending = read_txn
            .open_table(PENDING)?
            .iter()?
            .map(|item| {
                let (key, data) = item?;
                Ok((RequestId(key.value()), bincode::deserialize(data.value())?))
            })
            .collect::<StorageResult<Vec<(RequestId, PendingRequest)>>>()?;

        let submitters = read_txn
            .open_table(SUBMITTERS)?
            .iter()?
            .map(|item| {
                let (key, data) = item?;
                Ok((decode_identity(key.value())?, bincode::deserialize(data.value())?))
            })
            .collect::<StorageResult<Vec<(Identity, Vec<u64>)>>>()?;

        let authorized = read_txn
            .open_table(AUTHORIZED)?
            .iter()?
            .map(|item| {
                let (key, _) = item?;
                decode_identity(key.value())
            })
            .collect::<StorageResult<Vec<_>>>()?;

        // Stores written before the mark existed: resume above every stored id
        let next_request_id = stored_request_mark.unwrap_or_else(|| {
            pending
                .iter()
                .map(|(id, _)| id.value().saturating_add(1))
                .max()
                .unwrap_or(1)
        });

        let state = CensusState::from_tables(StateTables {
            admin,
            next_record_id,
            records,
            analyses,
            decrypted,
            pending,
            submitters,
            authorized,
            next_request_id,
        })?;
        Ok(Some(state))
    }

    /// State root recorded by the last save
    pub fn latest_root(&self) -> StorageResult<Option<[u8; 32]>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(META)?;

        let result = match table.get(META_STATE_ROOT)? {
            Some(data) => Some(decode_array32(data.value())?),
            None => None,
        };

        Ok(result)
    }

    /// Number of stored records
    pub fn record_count(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECORDS)?;
        let len = table.len()?;
        Ok(len)
    }

    /// Number of stored decryption requests, fulfilled or not
    pub fn pending_count(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING)?;
        let len = table.len()?;
        Ok(len)
    }

    /// Seed of the decryption gateway's signing key
    pub fn gateway_key(&self) -> StorageResult<Option<[u8; 32]>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(META)?;

        let result = match table.get(META_GATEWAY_KEY)? {
            Some(data) => Some(decode_array32(data.value())?),
            None => None,
        };

        Ok(result)
    }

    pub fn save_gateway_key(&self, seed: &[u8; 32]) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut meta = write_txn.open_table(META)?;
            meta.insert(META_GATEWAY_KEY, seed.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

/// Metadata rows rewritten by every save
fn write_meta<C>(
    write_txn: &WriteTransaction,
    state: &CensusState<C>,
    root: &[u8; 32],
) -> StorageResult<()> {
    let mut meta = write_txn.open_table(META)?;
    meta.insert(META_ADMIN, state.admin().0.as_slice())?;
    meta.insert(META_NEXT_RECORD_ID, &state.next_record_id().to_le_bytes()[..])?;
    meta.insert(META_NEXT_REQUEST_ID, &state.next_request_id().to_le_bytes()[..])?;
    meta.insert(META_STATE_ROOT, root.as_slice())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use census_contracts::{CallContext, CensusAnswers, CensusContract};
    use census_fhe::{DecryptionGateway, DecryptionOracle, PlainBackend, PlainCiphertext};
    use tempfile::tempdir;

    fn admin() -> Identity {
        Identity::from_label("admin")
    }

    fn alice() -> Identity {
        Identity::from_label("alice")
    }

    fn populated() -> CensusState<PlainCiphertext> {
        let gateway = Arc::new(DecryptionGateway::generate(PlainBackend::new()));
        let mut contract = CensusContract::new(admin(), PlainBackend::new(), gateway.clone());
        contract.authorize(&CallContext::at(admin(), 0), alice()).unwrap();

        let ctx = CallContext::at(alice(), 1_700_000_000);
        let mut ids = Vec::new();
        for age in [10, 30, 70] {
            let fields = CensusAnswers {
                age,
                birth_year: 2024 - age,
                occupation: 1,
                location: 2,
                family_size: 3,
            }
            .encrypt(&PlainBackend::new())
            .unwrap();
            ids.push(contract.submit(&ctx, fields).unwrap());
        }

        let analysis_id = contract.analyze(&ctx, &ids).unwrap();
        let request_id = contract.request_decryption(analysis_id).unwrap();
        let response = gateway.fulfill_next().unwrap().unwrap();
        assert!(gateway.verify_proof(request_id, &response.payload, &response.proof));
        contract
            .on_decrypted(request_id, &response.payload, &response.proof)
            .unwrap();

        contract.into_state()
    }

    fn open_store(dir: &std::path::Path) -> LedgerStore {
        std::fs::create_dir_all(dir).unwrap();
        let db = Database::create(dir.join("ledger.redb")).unwrap();
        LedgerStore::new(Arc::new(db)).unwrap()
    }

    #[test]
    fn test_empty_store_loads_none() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        assert!(store.load::<PlainCiphertext>().unwrap().is_none());
        assert!(store.latest_root().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let state = populated();

        let root = store.save(&state).unwrap();
        assert_eq!(store.latest_root().unwrap(), Some(root));
        assert_eq!(store.record_count().unwrap(), 3);
        assert_eq!(store.pending_count().unwrap(), 1);

        let loaded: CensusState<PlainCiphertext> = store.load().unwrap().unwrap();
        assert_eq!(loaded.state_root().unwrap(), root);
        assert_eq!(loaded.records_of(&alice()), vec![1, 2, 3]);
        assert!(loaded.is_authorized(&alice()));
        assert_eq!(loaded.next_record_id(), 4);
        assert!(loaded.decrypted(1).unwrap().revealed);
        assert_eq!(loaded.decrypted(1).unwrap().average_age, 36);
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        store.save(&populated()).unwrap();
        let empty: CensusState<PlainCiphertext> = CensusState::new(admin());
        store.save(&empty).unwrap();

        assert_eq!(store.record_count().unwrap(), 0);
        let loaded: CensusState<PlainCiphertext> = store.load().unwrap().unwrap();
        assert_eq!(loaded.record_count(), 0);
        assert!(!loaded.is_authorized(&alice()));
    }

    #[test]
    fn test_gateway_key_survives_save() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        assert!(store.gateway_key().unwrap().is_none());
        store.save_gateway_key(&[9u8; 32]).unwrap();
        store.save(&populated()).unwrap();
        assert_eq!(store.gateway_key().unwrap(), Some([9u8; 32]));
    }

    #[test]
    fn test_request_mark_survives_prune_and_reload() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        let gateway = Arc::new(DecryptionGateway::generate(PlainBackend::new()));
        let mut contract = CensusContract::from_state(populated(), PlainBackend::new(), gateway.clone());
        assert_eq!(contract.prune_settled(), 1);
        store.save(contract.state()).unwrap();
        assert_eq!(store.pending_count().unwrap(), 0);

        let loaded: CensusState<PlainCiphertext> = store.load().unwrap().unwrap();
        assert!(loaded.pending_requests().is_empty());
        assert_eq!(loaded.next_request_id(), 2);
    }

    #[test]
    fn test_save_changes_matches_full_save() {
        let dir = tempdir().unwrap();
        let incremental = open_store(&dir.path().join("a"));
        let full = open_store(&dir.path().join("b"));

        let gateway = Arc::new(DecryptionGateway::generate(PlainBackend::new()));
        let mut contract = CensusContract::new(admin(), PlainBackend::new(), gateway.clone());
        incremental.save(contract.state()).unwrap();

        let ctx = CallContext::at(admin(), 0);
        contract.authorize(&ctx, alice()).unwrap();
        let fields = CensusAnswers::default().encrypt(&PlainBackend::new()).unwrap();
        let id = contract.submit(&CallContext::at(alice(), 0), fields).unwrap();
        contract.analyze(&CallContext::at(alice(), 0), &[id]).unwrap();
        let request_id = contract.request_decryption(id).unwrap();
        let response = gateway.fulfill_next().unwrap().unwrap();
        contract
            .on_decrypted(request_id, &response.payload, &response.proof)
            .unwrap();
        contract.prune_settled();

        let changes = contract.take_changes();
        let root = incremental.save_changes(contract.state(), &changes).unwrap();
        assert_eq!(full.save(contract.state()).unwrap(), root);

        let a: CensusState<PlainCiphertext> = incremental.load().unwrap().unwrap();
        let b: CensusState<PlainCiphertext> = full.load().unwrap().unwrap();
        assert_eq!(a.state_root().unwrap(), root);
        assert_eq!(b.state_root().unwrap(), root);
        assert_eq!(incremental.pending_count().unwrap(), 0);
        assert_eq!(a.next_request_id(), request_id.value() + 1);
    }

    #[test]
    fn test_save_changes_writes_only_touched_rows() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let state = populated();
        store.save(&state).unwrap();

        // Touch nothing: rows stay, metadata is refreshed
        let root = store.save_changes(&state, &StateChanges::default()).unwrap();
        assert_eq!(store.latest_root().unwrap(), Some(root));
        assert_eq!(store.record_count().unwrap(), 3);

        // A touched key missing from the state is deleted
        let mut changes = StateChanges::default();
        changes.pending.insert(RequestId(1));
        let empty: CensusState<PlainCiphertext> = CensusState::new(admin());
        let root = store.save_changes(&empty, &changes).unwrap();
        assert_eq!(store.pending_count().unwrap(), 0);
        assert_eq!(store.record_count().unwrap(), 3);
        assert_eq!(store.latest_root().unwrap(), Some(root));
    }
}
