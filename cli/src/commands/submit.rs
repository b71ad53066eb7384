//! Submit Command - Submit an encrypted census record

use std::path::PathBuf;

use clap::Args;
use census_contracts::{CallContext, CensusAnswers, Identity};
use census_fhe::PlainBackend;
use tracing::info;

use super::context::LedgerContext;

/// Encrypt and submit one census record
#[derive(Args)]
pub struct SubmitCommand {
    /// Submitting identity (64-hex or label)
    #[arg(long = "as")]
    caller: String,

    #[arg(long)]
    age: u64,

    #[arg(long)]
    birth_year: u64,

    /// Occupation code
    #[arg(long)]
    occupation: u64,

    /// Location code
    #[arg(long)]
    location: u64,

    #[arg(long)]
    family_size: u64,
}

impl SubmitCommand {
    pub async fn execute(
        self,
        config_path: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        let ctx = LedgerContext::open(config_path, data_dir)?;
        let caller = Identity::parse(&self.caller);

        let answers = CensusAnswers {
            age: self.age,
            birth_year: self.birth_year,
            occupation: self.occupation,
            location: self.location,
            family_size: self.family_size,
        };
        // Simulated encryption: the CLI keeps plaintext stand-in ciphertexts
        let fields = answers.encrypt(&PlainBackend::new())?;

        let (mut contract, _) = ctx.contract()?;
        let id = contract.submit(&CallContext::new(caller), fields)?;
        ctx.commit(&mut contract)?;

        info!("Record {} submitted by {}", id, caller.short());
        println!("✅ Record {} submitted", id);
        Ok(())
    }
}
