//! Records Command - List submitted records

use std::path::PathBuf;

use clap::Args;
use census_contracts::Identity;

use super::context::LedgerContext;

/// List records, optionally for one submitter
#[derive(Args)]
pub struct RecordsCommand {
    /// Only show records of this submitter
    #[arg(short, long)]
    submitter: Option<String>,
}

impl RecordsCommand {
    pub async fn execute(
        self,
        config_path: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        let ctx = LedgerContext::open(config_path, data_dir)?;
        let state = ctx.state()?;

        let ids: Vec<u64> = match &self.submitter {
            Some(submitter) => state.records_of(&Identity::parse(submitter)),
            None => (1..state.next_record_id()).collect(),
        };

        if ids.is_empty() {
            println!("No records found.");
            return Ok(());
        }

        println!("{:<8} {:<18} {:<12} {}", "ID", "SUBMITTER", "CREATED", "ANALYSIS");
        for id in ids {
            if let Some(record) = state.record(id) {
                let phase = state
                    .phase(id)
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<8} {:<18} {:<12} {}",
                    record.id,
                    record.submitter.short(),
                    record.created_at,
                    phase
                );
            }
        }

        Ok(())
    }
}
