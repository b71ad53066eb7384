//! Analysis engine
//!
//! Aggregates encrypted record fields using only the capability's
//! operations. Averages use the capability's division, which truncates.

use census_fhe::{CipherBackend, DecryptionOracle};
use tracing::{debug, info};

use crate::contract::CensusContract;
use crate::errors::CensusResult;
use crate::events::CensusEvent;
use crate::types::{
    AgeDistribution, AnalysisPhase, AnalysisResult, CallContext, EncryptedRecord, ADULT_AGE,
    MOBILITY_SCALE, SENIOR_AGE, TRACKED_LOCATION, TRACKED_OCCUPATION,
};

/// Σ [field(r) == code] over the batch
fn count_matching<B, F>(
    backend: &B,
    records: &[&EncryptedRecord<B::Ciphertext>],
    code: u64,
    field: F,
) -> CensusResult<B::Ciphertext>
where
    B: CipherBackend,
    F: Fn(&EncryptedRecord<B::Ciphertext>) -> &B::Ciphertext,
{
    let code = backend.encrypt_constant(code)?;
    let one = backend.encrypt_constant(1)?;
    let zero = backend.encrypt_constant(0)?;

    let indicators = records
        .iter()
        .map(|r| {
            let hit = backend.eq(field(*r), &code)?;
            backend.select(&hit, &one, &zero)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(backend.sum(&indicators)?)
}

/// Compute the three aggregates of a batch
fn compute<B: CipherBackend>(
    backend: &B,
    records: &[&EncryptedRecord<B::Ciphertext>],
    revision: u64,
) -> CensusResult<AnalysisResult<B::Ciphertext>> {
    let ages: Vec<_> = records.iter().map(|r| r.fields.age.clone()).collect();
    let total_age = backend.sum(&ages)?;
    let count = backend.encrypt_constant(records.len() as u64)?;

    let occupation_counter = count_matching(backend, records, TRACKED_OCCUPATION, |r| &r.fields.occupation)?;
    let location_counter = count_matching(backend, records, TRACKED_LOCATION, |r| &r.fields.location)?;

    let scale = backend.encrypt_constant(MOBILITY_SCALE)?;
    let scaled = backend.mul(&location_counter, &scale)?;

    Ok(AnalysisResult {
        average_age: backend.div(&total_age, &count)?,
        occupation_distribution: occupation_counter,
        mobility_index: backend.div(&scaled, &count)?,
        completed: true,
        revision,
    })
}

impl<B, O> CensusContract<B, O>
where
    B: CipherBackend,
    O: DecryptionOracle<B::Ciphertext>,
{
    /// Analyze a batch of records. The result is stored under `ids[0]`,
    /// replacing whatever result that id held before.
    pub fn analyze(&mut self, ctx: &CallContext, ids: &[u64]) -> CensusResult<u64> {
        self.state.ensure_authorized(&ctx.caller)?;

        let records = self.state.batch(ids)?;
        let analysis_id = records[0].id;
        let revision = self
            .state
            .analyses
            .get(&analysis_id)
            .map(|a| a.revision + 1)
            .unwrap_or(1);

        let result = compute(&self.backend, &records, revision)?;

        if let Some(previous) = self.state.analyses.get(&analysis_id).filter(|a| a.completed) {
            debug!(
                "Analysis {} overwrites revision {} with batch of {}",
                analysis_id,
                previous.revision,
                ids.len()
            );
        }
        self.state.analyses.insert(analysis_id, result);
        self.changes.analyses.insert(analysis_id);

        info!("Analysis {} completed over {} records", analysis_id, ids.len());
        self.emit(CensusEvent::AnalysisCompleted { analysis_id });
        Ok(analysis_id)
    }

    /// Σ (family size - 1) over the batch. Read-only and open to anyone.
    pub fn family_connections(&self, ids: &[u64]) -> CensusResult<B::Ciphertext> {
        let records = self.state.batch(ids)?;
        let one = self.backend.encrypt_constant(1)?;

        let connections = records
            .iter()
            .map(|r| self.backend.sub(&r.fields.family_size, &one))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.backend.sum(&connections)?)
    }

    /// Count records under 18, from 18 to 64, and 65 or over.
    /// Read-only and open to anyone.
    pub fn age_distribution(&self, ids: &[u64]) -> CensusResult<AgeDistribution<B::Ciphertext>> {
        let records = self.state.batch(ids)?;
        let b = &self.backend;

        let adult_age = b.encrypt_constant(ADULT_AGE)?;
        let senior_age = b.encrypt_constant(SENIOR_AGE)?;
        let one = b.encrypt_constant(1)?;
        let zero = b.encrypt_constant(0)?;

        let mut under_18 = Vec::with_capacity(records.len());
        let mut adult = Vec::with_capacity(records.len());
        let mut senior = Vec::with_capacity(records.len());

        for record in &records {
            let is_minor = b.lt(&record.fields.age, &adult_age)?;
            let is_senior = b.ge(&record.fields.age, &senior_age)?;

            under_18.push(b.select(&is_minor, &one, &zero)?);
            senior.push(b.select(&is_senior, &one, &zero)?);

            let not_senior = b.select(&is_senior, &zero, &one)?;
            adult.push(b.select(&is_minor, &zero, &not_senior)?);
        }

        Ok(AgeDistribution {
            under_18: b.sum(&under_18)?,
            adult: b.sum(&adult)?,
            senior: b.sum(&senior)?,
        })
    }

    pub fn analysis(&self, id: u64) -> Option<&AnalysisResult<B::Ciphertext>> {
        self.state.analysis(id)
    }

    pub fn phase(&self, id: u64) -> Option<AnalysisPhase> {
        self.state.phase(id)
    }
}

#[cfg(test)]
mod tests {
    use crate::contract::test_support::*;
    use crate::errors::CensusError;
    use crate::events::CensusEvent;
    use crate::types::{AnalysisPhase, CallContext, Identity};

    fn ctx() -> CallContext {
        CallContext::at(alice(), 0)
    }

    #[test]
    fn test_analyze_aggregates() {
        let (mut contract, _) = setup();
        let a = submit(&mut contract, answers(30, 1, 2, 4));
        let b = submit(&mut contract, answers(41, 3, 2, 2));
        let c = submit(&mut contract, answers(40, 1, 5, 1));
        contract.take_events();

        let analysis_id = contract.analyze(&ctx(), &[a, b, c]).unwrap();
        assert_eq!(analysis_id, a);

        let result = contract.analysis(analysis_id).unwrap();
        assert!(result.completed);
        assert_eq!(result.average_age.value(), 37);
        assert_eq!(result.occupation_distribution.value(), 2);
        assert_eq!(result.mobility_index.value(), 66);
        assert_eq!(result.revision, 1);

        assert_eq!(contract.phase(analysis_id), Some(AnalysisPhase::Completed));
        assert_eq!(contract.take_events(), vec![CensusEvent::AnalysisCompleted { analysis_id }]);
    }

    #[test]
    fn test_analyze_rejects_bad_batches() {
        let (mut contract, _) = setup();
        let a = submit(&mut contract, answers(30, 1, 2, 4));
        contract.take_events();
        let root = contract.state_root().unwrap();

        assert!(matches!(contract.analyze(&ctx(), &[]), Err(CensusError::InvalidInput(_))));
        assert!(matches!(contract.analyze(&ctx(), &[a, 99]), Err(CensusError::InvalidInput(_))));

        assert_eq!(contract.state_root().unwrap(), root);
        assert!(contract.take_events().is_empty());
    }

    #[test]
    fn test_analyze_requires_authorization() {
        let (mut contract, _) = setup();
        let a = submit(&mut contract, answers(30, 1, 2, 4));
        let result = contract.analyze(&CallContext::at(Identity::from_label("mallory"), 0), &[a]);
        assert!(matches!(result, Err(CensusError::Authorization(_))));
        assert!(!contract.analysis(a).unwrap().completed);
    }

    #[test]
    fn test_first_id_collision_overwrites() {
        let (mut contract, _) = setup();
        let a = submit(&mut contract, answers(20, 0, 0, 1));
        let b = submit(&mut contract, answers(40, 0, 0, 1));
        let c = submit(&mut contract, answers(80, 0, 0, 1));

        contract.analyze(&ctx(), &[a, b]).unwrap();
        assert_eq!(contract.analysis(a).unwrap().average_age.value(), 30);

        contract.analyze(&ctx(), &[a, c]).unwrap();
        let result = contract.analysis(a).unwrap();
        assert_eq!(result.average_age.value(), 50);
        assert_eq!(result.revision, 2);
    }

    #[test]
    fn test_age_distribution() {
        let (mut contract, _) = setup();
        let ids = vec![
            submit(&mut contract, answers(10, 0, 0, 1)),
            submit(&mut contract, answers(30, 0, 0, 1)),
            submit(&mut contract, answers(70, 0, 0, 1)),
        ];

        let dist = contract.age_distribution(&ids).unwrap();
        assert_eq!(dist.under_18.value(), 1);
        assert_eq!(dist.adult.value(), 1);
        assert_eq!(dist.senior.value(), 1);
    }

    #[test]
    fn test_age_distribution_boundaries() {
        let (mut contract, _) = setup();
        let ids = vec![
            submit(&mut contract, answers(17, 0, 0, 1)),
            submit(&mut contract, answers(18, 0, 0, 1)),
            submit(&mut contract, answers(64, 0, 0, 1)),
            submit(&mut contract, answers(65, 0, 0, 1)),
        ];

        let dist = contract.age_distribution(&ids).unwrap();
        assert_eq!(dist.under_18.value(), 1);
        assert_eq!(dist.adult.value(), 2);
        assert_eq!(dist.senior.value(), 1);
    }

    #[test]
    fn test_family_connections() {
        let (mut contract, _) = setup();
        let a = submit(&mut contract, answers(30, 0, 0, 4));
        let b = submit(&mut contract, answers(30, 0, 0, 2));
        let root = contract.state_root().unwrap();

        assert_eq!(contract.family_connections(&[a, b]).unwrap().value(), 4);
        assert_eq!(contract.state_root().unwrap(), root);
    }

    #[test]
    fn test_read_only_aggregations_validate_batch() {
        let (mut contract, _) = setup();
        submit(&mut contract, answers(30, 0, 0, 4));
        assert!(matches!(contract.family_connections(&[]), Err(CensusError::InvalidInput(_))));
        assert!(matches!(contract.age_distribution(&[7]), Err(CensusError::InvalidInput(_))));
    }
}
