//! Census Storage Layer
//!
//! Persists the census ledger between runs.
//!
//! # Architecture
//!
//! The storage layer uses redb (an embedded database) for:
//! - Encrypted records, analysis results and decrypted results
//! - Pending decryption requests
//! - Submitter index and authorized set
//! - Ledger metadata (admin, next record and request ids, state root, gateway key)

pub mod ledger;
mod error;

pub use error::{StorageError, StorageResult};
pub use ledger::LedgerStore;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use census_contracts::{CensusState, StateChanges};
use redb::Database;
use serde::Serialize;

/// Destination for ledger writes
pub trait LedgerSink<C>: Send + Sync {
    /// Rewrite the whole ledger
    fn save_full(&self, state: &CensusState<C>) -> StorageResult<[u8; 32]>;

    /// Write the rows in `changes` on top of the last save
    fn save_changes(&self, state: &CensusState<C>, changes: &StateChanges) -> StorageResult<[u8; 32]>;
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Database path
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./census_data/ledger.redb"),
        }
    }
}

/// Main storage interface
pub struct Storage {
    config: StorageConfig,
    pub ledger: LedgerStore,
}

impl Storage {
    /// Open or create storage at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let config = StorageConfig {
            path: path.as_ref().to_path_buf(),
        };
        Self::with_config(config)
    }

    /// Open storage with custom configuration
    pub fn with_config(config: StorageConfig) -> StorageResult<Self> {
        // Ensure directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Arc::new(Database::create(&config.path)?);
        let ledger = LedgerStore::new(db)?;

        Ok(Self { config, ledger })
    }

    /// Get storage configuration
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Get database statistics
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            path: self.config.path.clone(),
            record_count: self.ledger.record_count().unwrap_or(0),
            pending_count: self.ledger.pending_count().unwrap_or(0),
            state_root: self.ledger.latest_root().ok().flatten(),
        }
    }
}

impl<C: Serialize + Clone> LedgerSink<C> for Storage {
    fn save_full(&self, state: &CensusState<C>) -> StorageResult<[u8; 32]> {
        self.ledger.save(state)
    }

    fn save_changes(&self, state: &CensusState<C>, changes: &StateChanges) -> StorageResult<[u8; 32]> {
        self.ledger.save_changes(state, changes)
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub path: PathBuf,
    pub record_count: u64,
    pub pending_count: u64,
    pub state_root: Option<[u8; 32]>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_storage_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("test.redb");

        let storage = Storage::open(&path).unwrap();
        let stats = storage.stats();

        assert_eq!(stats.path, path);
        assert_eq!(stats.record_count, 0);
        assert_eq!(stats.pending_count, 0);
        assert!(stats.state_root.is_none());
    }

    #[test]
    fn test_storage_config() {
        let config = StorageConfig::default();
        assert!(config.path.ends_with("ledger.redb"));
    }

    #[test]
    fn test_storage_as_sink() {
        use census_contracts::Identity;
        use census_fhe::PlainCiphertext;

        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("test.redb")).unwrap();
        let sink: &dyn LedgerSink<PlainCiphertext> = &storage;

        let state = CensusState::new(Identity::from_label("admin"));
        let root = sink.save_full(&state).unwrap();
        assert_eq!(sink.save_changes(&state, &StateChanges::default()).unwrap(), root);
        assert_eq!(storage.stats().state_root, Some(root));
    }

    #[test]
    fn test_storage_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");

        {
            let storage = Storage::open(&path).unwrap();
            storage.ledger.save_gateway_key(&[3u8; 32]).unwrap();
        }

        let storage = Storage::open(&path).unwrap();
        assert_eq!(storage.ledger.gateway_key().unwrap(), Some([3u8; 32]));
    }
}
