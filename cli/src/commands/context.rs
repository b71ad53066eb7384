//! Opening the persisted ledger for a command

use std::path::PathBuf;
use std::sync::Arc;

use census_contracts::{CensusContract, CensusState, Identity};
use census_fhe::{DecryptionGateway, PlainBackend, PlainCiphertext};
use census_storage::Storage;
use tracing::{debug, info};

use crate::config::{default_config_path, default_data_dir, CensusConfig};

/// Gateway with simulated encryption keys
pub type CliGateway = Arc<DecryptionGateway<PlainBackend>>;

/// Ledger over simulated ciphertexts
pub type CliContract = CensusContract<PlainBackend, CliGateway>;

/// An initialized data directory
pub struct LedgerContext {
    pub config: CensusConfig,
    pub data_dir: PathBuf,
    pub storage: Arc<Storage>,
}

impl LedgerContext {
    /// Open an initialized data directory
    pub fn open(config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let config_path = config_path.unwrap_or_else(|| default_config_path(&data_dir));

        if !config_path.exists() {
            anyhow::bail!(
                "Ledger not initialized at {}. Run `census init` first.",
                data_dir.display()
            );
        }

        let config = CensusConfig::load(&config_path)?;
        let storage = Arc::new(Storage::open(config.database_path(&data_dir))?);
        debug!("Opened ledger database {}", storage.config().path.display());

        Ok(Self {
            config,
            data_dir,
            storage,
        })
    }

    /// Configured admin identity
    pub fn admin(&self) -> Identity {
        Identity::parse(&self.config.ledger.admin)
    }

    /// Load the ledger state
    pub fn state(&self) -> anyhow::Result<CensusState<PlainCiphertext>> {
        self.storage
            .ledger
            .load()?
            .ok_or_else(|| anyhow::anyhow!("Ledger database is empty"))
    }

    /// Rebuild the ledger and its gateway from storage
    pub fn contract(&self) -> anyhow::Result<(CliContract, CliGateway)> {
        let state = self.state()?;
        let seed = self
            .storage
            .ledger
            .gateway_key()?
            .ok_or_else(|| anyhow::anyhow!("Gateway key missing from ledger database"))?;

        // Never reissue an id the ledger has already handed out
        let gateway = Arc::new(
            DecryptionGateway::from_seed(PlainBackend::new(), &seed)
                .with_next_id(state.next_request_id()),
        );

        let contract = CensusContract::from_state(state, PlainBackend::new(), gateway.clone());
        Ok((contract, gateway))
    }

    /// Persist the rows a mutation touched
    pub fn commit(&self, contract: &mut CliContract) -> anyhow::Result<[u8; 32]> {
        for event in contract.take_events() {
            info!("{:?}", event);
        }
        let changes = contract.take_changes();
        let root = self.storage.ledger.save_changes(contract.state(), &changes)?;
        debug!("State root {}", hex::encode(root));
        Ok(root)
    }
}
