//! Status Command - Show ledger status

use std::path::PathBuf;

use clap::Args;

use super::context::LedgerContext;
use super::decrypt::print_result;

/// Show ledger status
#[derive(Args)]
pub struct StatusCommand {
    /// Show the lifecycle of one analysis
    #[arg(short, long)]
    analysis: Option<u64>,
}

impl StatusCommand {
    pub async fn execute(
        self,
        config_path: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        let ctx = LedgerContext::open(config_path, data_dir)?;
        let state = ctx.state()?;
        let stats = ctx.storage.stats();

        if let Some(analysis_id) = self.analysis {
            match state.phase(analysis_id) {
                Some(phase) => {
                    println!("Analysis {}: {}", analysis_id, phase);
                    if let Some(result) = state.decrypted(analysis_id).filter(|d| d.revealed) {
                        print_result(analysis_id, result);
                    }
                }
                None => println!("Analysis {} does not exist", analysis_id),
            }
            return Ok(());
        }

        println!("Census ledger {}", ctx.config.ledger.name.as_deref().unwrap_or(""));
        println!();
        println!("Version:      {}", census::VERSION);
        println!("Data dir:     {}", ctx.data_dir.display());
        println!("Database:     {}", stats.path.display());
        println!("Admin:        {}", state.admin());
        println!("Authorized:   {}", state.authorized().len());
        println!("Records:      {}", stats.record_count);
        println!("Pending:      {} decryption requests", state.pending_requests().len());
        if let Some(root) = stats.state_root {
            println!("State Root:   {}", hex::encode(root));
        }

        Ok(())
    }
}
