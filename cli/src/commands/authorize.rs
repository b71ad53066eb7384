//! Authorize Command - Grant submission rights

use std::path::PathBuf;

use clap::Args;
use census_contracts::{CallContext, Identity};

use super::context::LedgerContext;

/// Authorize an identity to submit records
#[derive(Args)]
pub struct AuthorizeCommand {
    /// Identity to authorize (64-hex or label)
    identity: String,

    /// Calling identity, defaults to the configured admin
    #[arg(long = "as")]
    caller: Option<String>,
}

impl AuthorizeCommand {
    pub async fn execute(
        self,
        config_path: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        let ctx = LedgerContext::open(config_path, data_dir)?;
        let caller = self
            .caller
            .as_deref()
            .map(Identity::parse)
            .unwrap_or_else(|| ctx.admin());
        let identity = Identity::parse(&self.identity);

        let (mut contract, _) = ctx.contract()?;
        contract.authorize(&CallContext::new(caller), identity)?;
        ctx.commit(&mut contract)?;

        println!("✅ Authorized {}", identity);
        Ok(())
    }
}
