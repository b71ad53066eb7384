//! Decrypt Command - Request the one-time reveal of an analysis

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use census::service::CensusService;
use census_contracts::DecryptedResult;
use tracing::info;

use super::context::LedgerContext;

/// Request decryption of an analysis and wait for the reveal
#[derive(Args)]
pub struct DecryptCommand {
    /// Analysis id
    analysis_id: u64,

    /// Override the reveal timeout (milliseconds)
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl DecryptCommand {
    pub async fn execute(
        self,
        config_path: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        let ctx = LedgerContext::open(config_path, data_dir)?;
        let (contract, gateway) = ctx.contract()?;

        if let Some(result) = contract.decrypted(self.analysis_id).filter(|d| d.revealed) {
            println!("Analysis {} was already revealed.", self.analysis_id);
            print_result(self.analysis_id, result);
            return Ok(());
        }

        let service = CensusService::new(ctx.config.service.to_service_config(), contract, gateway)
            .with_storage(ctx.storage.clone());
        service.start().await?;

        let request_id = service.request_decryption(self.analysis_id)?;
        info!("Decryption request {} for analysis {}", request_id, self.analysis_id);

        let timeout =
            Duration::from_millis(self.timeout_ms.unwrap_or(ctx.config.gateway.reveal_timeout_ms));
        let result = service.wait_for_reveal(self.analysis_id, timeout).await;
        service.stop().await;

        let result = result?;
        let root = service.snapshot().state_root()?;
        if ctx.storage.ledger.latest_root()? != Some(root) {
            anyhow::bail!("Analysis {} revealed but the ledger could not be saved", self.analysis_id);
        }
        println!("✅ Analysis {} revealed", self.analysis_id);
        print_result(self.analysis_id, &result);
        Ok(())
    }
}

pub(crate) fn print_result(analysis_id: u64, result: &DecryptedResult) {
    println!();
    println!("Analysis:               {}", analysis_id);
    println!("Average age:            {}", result.average_age);
    println!("Tracked occupation:     {}", result.occupation_distribution);
    println!("Mobility index:         {}", result.mobility_index);
}
