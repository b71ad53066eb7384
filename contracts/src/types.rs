//! Ledger data model

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use census_fhe::{Encryptor, FHEResult};
use serde::{Deserialize, Serialize};

use crate::errors::{CensusError, CensusResult};

/// Occupation code counted by the occupation distribution
pub const TRACKED_OCCUPATION: u64 = 1;
/// Location code counted by the mobility index
pub const TRACKED_LOCATION: u64 = 2;
/// Ages below this are minors
pub const ADULT_AGE: u64 = 18;
/// Ages at or above this are seniors
pub const SENIOR_AGE: u64 = 65;
/// Scale of the mobility index
pub const MOBILITY_SCALE: u64 = 100;

/// A caller or submitter, 32 bytes
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity(pub [u8; 32]);

impl Identity {
    /// Derive an identity from a human readable label
    pub fn from_label(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }

    /// Parse a 64 character hex identity
    pub fn from_hex(s: &str) -> CensusResult<Self> {
        let bytes = hex::decode(s).map_err(|e| CensusError::InvalidInput(e.to_string()))?;
        let id: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            CensusError::InvalidInput(format!("identity must be 32 bytes, got {}", b.len()))
        })?;
        Ok(Self(id))
    }

    /// Hex if it parses as a 32-byte identity, otherwise a label
    pub fn parse(s: &str) -> Self {
        Self::from_hex(s).unwrap_or_else(|_| Self::from_label(s))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 bytes in hex
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.short())
    }
}

/// Who is calling, and when
#[derive(Clone, Copy, Debug)]
pub struct CallContext {
    pub caller: Identity,
    /// Seconds since the unix epoch
    pub timestamp: u64,
}

impl CallContext {
    /// Context stamped with the current time
    pub fn new(caller: Identity) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self { caller, timestamp }
    }

    pub fn at(caller: Identity, timestamp: u64) -> Self {
        Self { caller, timestamp }
    }
}

/// Plaintext census answers, before encryption
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensusAnswers {
    pub age: u64,
    pub birth_year: u64,
    pub occupation: u64,
    pub location: u64,
    pub family_size: u64,
}

impl CensusAnswers {
    /// Encrypt every field
    pub fn encrypt<E: Encryptor>(&self, encryptor: &E) -> FHEResult<CensusFields<E::Ciphertext>> {
        Ok(CensusFields {
            age: encryptor.encrypt(self.age)?,
            birth_year: encryptor.encrypt(self.birth_year)?,
            occupation: encryptor.encrypt(self.occupation)?,
            location: encryptor.encrypt(self.location)?,
            family_size: encryptor.encrypt(self.family_size)?,
        })
    }
}

/// The five encrypted fields of a record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CensusFields<C> {
    pub age: C,
    pub birth_year: C,
    pub occupation: C,
    pub location: C,
    pub family_size: C,
}

/// A submitted record. Never mutated after creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedRecord<C> {
    pub id: u64,
    pub submitter: Identity,
    pub fields: CensusFields<C>,
    pub created_at: u64,
}

/// Encrypted aggregates of an analysis batch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisResult<C> {
    pub average_age: C,
    pub occupation_distribution: C,
    pub mobility_index: C,
    pub completed: bool,
    /// Bumped every time the result is overwritten
    pub revision: u64,
}

impl<C> AnalysisResult<C> {
    pub fn ciphertexts(&self) -> [&C; 3] {
        [&self.average_age, &self.occupation_distribution, &self.mobility_index]
    }
}

/// Plaintext aggregates, filled in by the one-time reveal
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedResult {
    pub average_age: u64,
    pub occupation_distribution: u64,
    pub mobility_index: u64,
    pub revealed: bool,
}

/// Correlation entry for an outstanding decryption request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub analysis_id: u64,
    /// Analysis revision the request was issued against
    pub revision: u64,
    pub fulfilled: bool,
}

/// Encrypted age bracket counts
#[derive(Clone, Debug)]
pub struct AgeDistribution<C> {
    pub under_18: C,
    pub adult: C,
    pub senior: C,
}

/// Lifecycle of an analysis id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisPhase {
    /// Placeholder only, never analyzed
    Pending,
    Completed,
    /// At least one decryption request outstanding
    DecryptionRequested,
    Revealed,
}

impl fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnalysisPhase::Pending => "pending",
            AnalysisPhase::Completed => "completed",
            AnalysisPhase::DecryptionRequested => "decryption-requested",
            AnalysisPhase::Revealed => "revealed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use census_fhe::{PlainBackend, PlainCiphertext};

    #[test]
    fn test_identity_parse() {
        let id = Identity::from_label("alice");
        assert_eq!(Identity::parse(&id.to_hex()), id);
        assert_eq!(Identity::parse("alice"), id);
        assert_ne!(Identity::parse("bob"), id);
    }

    #[test]
    fn test_identity_from_hex_rejects_short() {
        assert!(Identity::from_hex("abcd").is_err());
        assert!(Identity::from_hex("zz").is_err());
    }

    #[test]
    fn test_answers_encrypt() {
        let answers = CensusAnswers {
            age: 30,
            birth_year: 1994,
            occupation: 1,
            location: 2,
            family_size: 4,
        };
        let fields = answers.encrypt(&PlainBackend::new()).unwrap();
        assert_eq!(fields.age, PlainCiphertext(30));
        assert_eq!(fields.family_size, PlainCiphertext(4));
    }
}
