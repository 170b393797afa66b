use accredit_core::FieldElement;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{ZkError, ZkResult};
use crate::inputs::CircuitInputs;

/// An eligibility proof and the public signals it attests to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    #[serde(with = "base64_bytes")]
    pub proof: Vec<u8>,
    pub public_signals: Vec<String>,
}

impl ProofBundle {
    /// Public signal `index` as a field element.
    pub fn signal(&self, index: usize) -> ZkResult<FieldElement> {
        let raw = self
            .public_signals
            .get(index)
            .ok_or_else(|| ZkError::MalformedBundle(format!("no public signal at {index}")))?;
        FieldElement::from_decimal(raw)
            .map_err(|e| ZkError::MalformedBundle(format!("public signal {index}: {e}")))
    }
}

/// Positions of the proving date (year, month, day) among the public signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSignals {
    pub year: usize,
    pub month: usize,
    pub day: usize,
}

/// Where the binding values sit in a backend's public-signal vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSignalLayout {
    /// Index of the predicate output, when the circuit exposes one. It must be 1.
    #[serde(default)]
    pub eligible: Option<usize>,
    pub commitment: usize,
    pub merkle_root: usize,
    /// The date the predicate was evaluated on, when the circuit exposes it.
    #[serde(default)]
    pub current_date: Option<DateSignals>,
}

impl PublicSignalLayout {
    pub fn positions(&self) -> Vec<usize> {
        let mut positions = vec![self.commitment, self.merkle_root];
        positions.extend(self.eligible);
        if let Some(date) = self.current_date {
            positions.extend([date.year, date.month, date.day]);
        }
        positions
    }

    /// True when no two signals share a position.
    pub fn is_distinct(&self) -> bool {
        let positions = self.positions();
        let unique: HashSet<usize> = positions.iter().copied().collect();
        unique.len() == positions.len()
    }
}

impl Default for PublicSignalLayout {
    fn default() -> Self {
        Self {
            eligible: Some(0),
            commitment: 1,
            merkle_root: 2,
            current_date: Some(DateSignals {
                year: 3,
                month: 4,
                day: 5,
            }),
        }
    }
}

/// A proving system for the eligibility predicate.
///
/// `verify` returns `Ok(false)` for a proof that is well-formed enough to
/// check but does not verify. Errors mean the check could not be carried
/// out, and callers must never treat them as a pass.
pub trait EligibilityBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-time setup. Idempotent; repeated calls reuse existing artifacts.
    fn prepare(&self) -> ZkResult<()>;

    fn prove(&self, inputs: &CircuitInputs) -> ZkResult<ProofBundle>;

    fn verify(&self, bundle: &ProofBundle) -> ZkResult<bool>;
}

// ---------------------------------------------------------------------------
// Verification keys
// ---------------------------------------------------------------------------

pub trait VerificationKeySource: Send + Sync {
    fn load_verification_key(&self) -> ZkResult<Vec<u8>>;
}

/// Verification key read from disk on every call, so a regenerated key is
/// picked up without a restart.
#[derive(Debug, Clone)]
pub struct FileVerificationKey {
    path: PathBuf,
}

impl FileVerificationKey {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VerificationKeySource for FileVerificationKey {
    fn load_verification_key(&self) -> ZkResult<Vec<u8>> {
        std::fs::read(&self.path).map_err(|e| {
            ZkError::VerificationKey(format!("{}: {}", self.path.display(), e))
        })
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
