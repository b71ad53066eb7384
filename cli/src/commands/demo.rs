//! Demo Command - End-to-end run on an in-memory ledger

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use census::service::{CensusService, ServiceConfig, ServiceEvent};
use census_contracts::{CallContext, CensusAnswers, Identity};
use census_fhe::{DecryptionGateway, PlainBackend};
use tracing::info;

use super::decrypt::print_result;

/// Sample respondents: age, birth year, occupation, location, family size
const SAMPLE: [(u64, u64, u64, u64, u64); 5] = [
    (30, 1994, 1, 2, 3),
    (41, 1983, 2, 1, 4),
    (40, 1984, 1, 2, 2),
    (12, 2012, 3, 2, 4),
    (70, 1954, 1, 5, 1),
];

/// Run submit, analyze and reveal against a throwaway ledger
#[derive(Args)]
pub struct DemoCommand {
    /// Number of sample records to submit (1-5)
    #[arg(short, long, default_value = "3")]
    records: usize,

    /// Reveal timeout in milliseconds
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,
}

impl DemoCommand {
    pub async fn execute(self) -> anyhow::Result<()> {
        if self.records == 0 || self.records > SAMPLE.len() {
            anyhow::bail!("--records must be between 1 and {}", SAMPLE.len());
        }

        let admin = Identity::from_label("admin");
        let respondent = Identity::from_label("respondent");
        let backend = PlainBackend::new();
        let gateway = Arc::new(DecryptionGateway::generate(PlainBackend::new()));

        let service = CensusService::create(ServiceConfig::default(), admin, backend, gateway);
        let mut events = service.subscribe();
        service.start().await?;

        service.authorize(&CallContext::new(admin), respondent)?;

        let mut ids = Vec::with_capacity(self.records);
        for &(age, birth_year, occupation, location, family_size) in &SAMPLE[..self.records] {
            let fields = CensusAnswers {
                age,
                birth_year,
                occupation,
                location,
                family_size,
            }
            .encrypt(&PlainBackend::new())?;
            ids.push(service.submit(&CallContext::new(respondent), fields)?);
        }
        println!("Submitted records {:?}", ids);

        let analysis_id = service.analyze(&CallContext::new(respondent), &ids)?;
        let family = service.family_connections(&ids)?;
        println!("Analysis {} completed ({} encrypted family links)", analysis_id, family.value());

        let distribution = service.age_distribution(&ids)?;
        println!(
            "Age brackets (simulated ciphertexts): <18={} adult={} senior={}",
            distribution.under_18.value(),
            distribution.adult.value(),
            distribution.senior.value()
        );

        let request_id = service.request_decryption(analysis_id)?;
        info!("Requested decryption {}", request_id);

        let result = service
            .wait_for_reveal(analysis_id, Duration::from_millis(self.timeout_ms))
            .await;
        service.stop().await;
        let result = result?;

        println!();
        println!("Events:");
        while let Ok(event) = events.try_recv() {
            if let ServiceEvent::Ledger(event) = event {
                println!("  {:?}", event);
            }
        }

        print_result(analysis_id, &result);
        Ok(())
    }
}
