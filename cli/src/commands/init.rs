//! Init Command - Initialize a new ledger

use std::fs;
use std::path::PathBuf;

use clap::Args;
use census_contracts::{CensusState, Identity};
use census_fhe::{DecryptionGateway, PlainBackend, PlainCiphertext};
use census_storage::Storage;
use tracing::info;

use crate::config::{default_config_path, default_data_dir, CensusConfig};

/// Initialize a new ledger
#[derive(Args)]
pub struct InitCommand {
    /// Admin identity (64-hex or label)
    #[arg(short, long, default_value = "admin")]
    admin: String,

    /// Ledger name
    #[arg(short, long)]
    name: Option<String>,

    /// Force overwrite existing ledger
    #[arg(short, long)]
    force: bool,
}

impl InitCommand {
    pub async fn execute(self, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let config_path = default_config_path(&data_dir);

        info!("Initializing census ledger");
        info!("Data directory: {}", data_dir.display());

        // Check if already initialized
        if config_path.exists() && !self.force {
            anyhow::bail!(
                "Ledger already initialized at {}. Use --force to overwrite.",
                data_dir.display()
            );
        }

        fs::create_dir_all(&data_dir)?;

        let mut config = CensusConfig::with_admin(&self.admin);
        config.ledger.name = self.name.clone();
        config.save(&config_path)?;
        info!("Configuration saved to {}", config_path.display());

        let admin = Identity::parse(&self.admin);
        let storage = Storage::open(config.database_path(&data_dir))?;
        let gateway = DecryptionGateway::generate(PlainBackend::new());
        storage.ledger.save_gateway_key(&gateway.seed())?;
        let root = storage
            .ledger
            .save(&CensusState::<PlainCiphertext>::new(admin))?;

        info!("Ledger created with admin {}", admin.short());

        println!();
        println!("✅ Census ledger initialized successfully!");
        println!();
        println!("Configuration:  {}", config_path.display());
        println!("Database:       {}", storage.config().path.display());
        println!("Admin:          {}", admin);
        println!("Gateway key:    {}", hex::encode(gateway.verifier().to_bytes()));
        println!("State root:     {}", hex::encode(root));
        println!();
        println!("Authorize a submitter:");
        println!(
            "  census authorize <identity> --data-dir {}",
            data_dir.display()
        );

        Ok(())
    }
}
