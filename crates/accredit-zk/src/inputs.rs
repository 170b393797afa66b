//! Circuit-input document for the eligibility predicate.
//!
//! Every value is emitted as a decimal string so the document can be handed
//! to the witness generator unchanged. Field names match the circuit's
//! signal names exactly.

use accredit_core::{commitment, AttributeSet, FieldElement, IssuerId};
use accredit_tree::AccreditationTree;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ZkError, ZkResult};

/// ISO 3166-1 numeric codes for the nationalities the circuit knows about.
pub const NATIONALITY_CODES: &[(&str, u16)] = &[
    ("UK", 826),
    ("USA", 840),
    ("FR", 250),
    ("DE", 276),
    ("ES", 724),
    ("IT", 380),
];

/// Resolve a nationality given either as a short name or a numeric code.
pub fn nationality_code(value: &str) -> Option<u16> {
    let value = value.trim();
    if let Ok(code) = value.parse::<u16>() {
        return NATIONALITY_CODES
            .iter()
            .any(|(_, c)| *c == code)
            .then_some(code);
    }
    NATIONALITY_CODES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(value))
        .map(|(_, code)| *code)
}

// ---------------------------------------------------------------------------
// EligibilityAttributes
// ---------------------------------------------------------------------------

/// The private attributes the eligibility predicate reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityAttributes {
    pub birth_date: NaiveDate,
    pub expiry_year: i32,
    pub expiry_month: u32,
    pub nationality: u16,
    pub valid_signature: bool,
}

impl EligibilityAttributes {
    pub const BIRTH_YEAR: &'static str = "birth_year";
    pub const BIRTH_MONTH: &'static str = "birth_month";
    pub const BIRTH_DAY: &'static str = "birth_day";
    pub const EXPIRY_YEAR: &'static str = "expiry_year";
    pub const EXPIRY_MONTH: &'static str = "expiry_month";
    pub const NATIONALITY: &'static str = "nationality";

    /// Read the predicate attributes out of a credential's attribute set.
    pub fn from_attributes(attributes: &AttributeSet, valid_signature: bool) -> ZkResult<Self> {
        let birth_year: i32 = parse_attr(attributes, Self::BIRTH_YEAR)?;
        let birth_month: u32 = parse_attr(attributes, Self::BIRTH_MONTH)?;
        let birth_day: u32 = parse_attr(attributes, Self::BIRTH_DAY)?;
        let birth_date = NaiveDate::from_ymd_opt(birth_year, birth_month, birth_day)
            .ok_or_else(|| {
                ZkError::InvalidInput(format!(
                    "invalid birth date {birth_year}-{birth_month}-{birth_day}"
                ))
            })?;

        let expiry_year: i32 = parse_attr(attributes, Self::EXPIRY_YEAR)?;
        let expiry_month: u32 = parse_attr(attributes, Self::EXPIRY_MONTH)?;
        if !(1..=12).contains(&expiry_month) {
            return Err(ZkError::InvalidInput(format!(
                "invalid expiry month {expiry_month}"
            )));
        }

        let raw = require_attr(attributes, Self::NATIONALITY)?;
        let nationality = nationality_code(raw)
            .ok_or_else(|| ZkError::InvalidInput(format!("unsupported nationality '{raw}'")))?;

        Ok(Self {
            birth_date,
            expiry_year,
            expiry_month,
            nationality,
            valid_signature,
        })
    }
}

fn require_attr<'a>(attributes: &'a AttributeSet, name: &str) -> ZkResult<&'a str> {
    attributes
        .get(name)
        .ok_or_else(|| ZkError::InvalidInput(format!("missing attribute '{name}'")))
}

fn parse_attr<T: std::str::FromStr>(attributes: &AttributeSet, name: &str) -> ZkResult<T> {
    let raw = require_attr(attributes, name)?;
    raw.trim()
        .parse()
        .map_err(|_| ZkError::InvalidInput(format!("attribute '{name}' is not a number")))
}

// ---------------------------------------------------------------------------
// MerkleWitness
// ---------------------------------------------------------------------------

/// Private data from which the commitment and its membership path are
/// recomputed.
#[derive(Clone)]
pub struct MerkleWitness {
    pub serial: FieldElement,
    pub issuer_id: IssuerId,
    pub leaves: Vec<FieldElement>,
    pub leaf_index: usize,
    pub depth: usize,
}

impl MerkleWitness {
    pub fn from_tree(
        serial: FieldElement,
        issuer_id: IssuerId,
        tree: &AccreditationTree,
        leaf_index: usize,
    ) -> Self {
        Self {
            serial,
            issuer_id,
            leaves: tree.leaves().to_vec(),
            leaf_index,
            depth: tree.depth(),
        }
    }
}

impl fmt::Debug for MerkleWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerkleWitness")
            .field("serial", &"[REDACTED]")
            .field("issuer_id", &self.issuer_id)
            .field("leaves", &self.leaves.len())
            .field("leaf_index", &self.leaf_index)
            .field("depth", &self.depth)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// CircuitInputs
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitInputs {
    pub birth_year: String,
    pub birth_month: String,
    pub birth_day: String,
    pub current_year: String,
    pub current_month: String,
    pub current_day: String,
    pub nationality: String,
    pub expiry_year: String,
    pub expiry_month: String,
    pub valid_signature: String,
    pub revealed_commitment: String,
    pub merkle_root: String,
    #[serde(rename = "pathElements")]
    pub path_elements: Vec<String>,
    #[serde(rename = "pathIndices")]
    pub path_indices: Vec<String>,
    pub credential_serial_lo: String,
    pub issuer_id: String,
}

impl CircuitInputs {
    pub fn field(value: &str) -> ZkResult<FieldElement> {
        FieldElement::from_decimal(value)
            .map_err(|e| ZkError::InvalidInput(format!("bad field value: {e}")))
    }

    pub fn number(value: &str) -> ZkResult<i64> {
        value
            .parse()
            .map_err(|_| ZkError::InvalidInput(format!("'{value}' is not an integer")))
    }

    pub fn to_json(&self) -> ZkResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Debug for CircuitInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitInputs")
            .field("revealed_commitment", &self.revealed_commitment)
            .field("merkle_root", &self.merkle_root)
            .field("depth", &self.path_elements.len())
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// Build the circuit-input document.
///
/// The tree is rebuilt from `witness.leaves`, and the leaf at
/// `witness.leaf_index` must equal `H(serial, issuer_id)`; a mismatch is
/// rejected here, before any backend runs.
pub fn build_circuit_inputs(
    attributes: &EligibilityAttributes,
    today: NaiveDate,
    witness: &MerkleWitness,
) -> ZkResult<CircuitInputs> {
    let revealed_commitment = commitment(&witness.serial, witness.issuer_id)?;
    let tree = AccreditationTree::build(&witness.leaves, witness.depth)?;

    let leaf = tree.leaf(witness.leaf_index)?;
    if leaf != revealed_commitment {
        return Err(ZkError::WitnessMismatch(format!(
            "leaf {} does not hold the credential commitment",
            witness.leaf_index
        )));
    }
    let path = tree.proof(witness.leaf_index)?;

    let birth = attributes.birth_date;
    Ok(CircuitInputs {
        birth_year: birth.year().to_string(),
        birth_month: birth.month().to_string(),
        birth_day: birth.day().to_string(),
        current_year: today.year().to_string(),
        current_month: today.month().to_string(),
        current_day: today.day().to_string(),
        nationality: attributes.nationality.to_string(),
        expiry_year: attributes.expiry_year.to_string(),
        expiry_month: attributes.expiry_month.to_string(),
        valid_signature: u8::from(attributes.valid_signature).to_string(),
        revealed_commitment: revealed_commitment.to_decimal(),
        merkle_root: tree.root().to_decimal(),
        path_elements: path.siblings.iter().map(FieldElement::to_decimal).collect(),
        path_indices: path.directions.iter().map(u8::to_string).collect(),
        credential_serial_lo: witness.serial.to_decimal(),
        issuer_id: witness.issuer_id.0.to_string(),
    })
}
