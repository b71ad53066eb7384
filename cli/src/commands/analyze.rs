//! Analyze Command - Run the encrypted aggregation over a batch

use std::path::PathBuf;

use clap::Args;
use census_contracts::{CallContext, Identity};
use tracing::info;

use super::context::LedgerContext;

/// Analyze a batch of records
#[derive(Args)]
pub struct AnalyzeCommand {
    /// Record ids in the batch; the first one names the analysis
    #[arg(required = true, num_args = 1..)]
    ids: Vec<u64>,

    /// Calling identity (must be authorized)
    #[arg(long = "as")]
    caller: String,
}

impl AnalyzeCommand {
    pub async fn execute(
        self,
        config_path: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        let ctx = LedgerContext::open(config_path, data_dir)?;
        let caller = Identity::parse(&self.caller);

        let (mut contract, _) = ctx.contract()?;
        let analysis_id = contract.analyze(&CallContext::new(caller), &self.ids)?;
        let root = ctx.commit(&mut contract)?;

        info!("Analysis {} over {} records", analysis_id, self.ids.len());
        println!("✅ Analysis {} completed", analysis_id);
        println!("State root: {}", hex::encode(root));
        println!();
        println!("Reveal it with:");
        println!("  census decrypt {}", analysis_id);
        Ok(())
    }
}
