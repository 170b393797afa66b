use accredit_core::{
    AttributeOrdering, AttributeSet, BindingKeypair, CredentialSignature, FieldElement, IssuerId,
    IssuerPublicKey, ProofPublicKey, BINDING_KEY_FIELD, COMMITMENT_FIELD,
};
use accredit_tree::{AccreditationTree, MembershipPath};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::messages::message_count;

// ---------------------------------------------------------------------------
// IssuedCredential: everything the holder keeps after issuance
// ---------------------------------------------------------------------------

pub struct IssuedCredential {
    pub signature: CredentialSignature,
    pub binding_keypair: BindingKeypair,
    /// Attribute values with the persisted ordering used for signing.
    pub attributes: AttributeSet,
    pub serial: FieldElement,
    pub issuer_id: IssuerId,
    pub commitment: FieldElement,
    pub leaf_index: usize,
    /// Tree state right after the commitment was inserted.
    pub tree: AccreditationTree,
    pub issuer_public_key: IssuerPublicKey,
    /// Name of the signature suite that produced `signature`.
    pub suite: &'static str,
}

impl IssuedCredential {
    pub fn ordering(&self) -> &AttributeOrdering {
        self.attributes.ordering()
    }

    pub fn message_count(&self) -> usize {
        message_count(self.ordering())
    }
}

impl fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("issuer_id", &self.issuer_id)
            .field("commitment", &self.commitment)
            .field("leaf_index", &self.leaf_index)
            .field("ordering", self.ordering())
            .field("binding_key", &self.binding_keypair.public_key())
            .field("serial", &"[REDACTED]")
            .field("suite", &self.suite)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RevealSet: which signed messages a disclosure opens
// ---------------------------------------------------------------------------

/// Attribute names to reveal, optionally including `pk_bind` and `commitment`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealSet {
    names: BTreeSet<String>,
}

impl RevealSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Reveal set carrying the two protocol fields a verifier requires.
    pub fn with_protocol_fields<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(attributes).binding_key().commitment()
    }

    pub fn binding_key(mut self) -> Self {
        self.names.insert(BINDING_KEY_FIELD.to_string());
        self
    }

    pub fn commitment(mut self) -> Self {
        self.names.insert(COMMITMENT_FIELD.to_string());
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Revealed fields and their wire encoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldEncoding {
    #[default]
    Utf8,
    Base64,
}

/// One revealed message in the verification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub encoding: FieldEncoding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealedMessage {
    /// Position in the signed message list.
    pub index: usize,
    pub name: String,
    pub bytes: Vec<u8>,
}

impl RevealedMessage {
    /// Protocol fields are binary and travel as base64; attribute values as UTF-8.
    pub fn to_field(&self) -> RevealedField {
        let binary = self.name == BINDING_KEY_FIELD || self.name == COMMITMENT_FIELD;
        match (binary, std::str::from_utf8(&self.bytes)) {
            (false, Ok(text)) => RevealedField {
                name: self.name.clone(),
                value: text.to_string(),
                encoding: FieldEncoding::Utf8,
            },
            _ => RevealedField {
                name: self.name.clone(),
                value: STANDARD.encode(&self.bytes),
                encoding: FieldEncoding::Base64,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// DisclosureBundle: prover output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DisclosureBundle {
    pub proof: Vec<u8>,
    pub proof_public_key: ProofPublicKey,
    pub nonce: [u8; 32],
    pub message_count: usize,
    /// Revealed messages in signing order.
    pub revealed: Vec<RevealedMessage>,
    pub membership_path: MembershipPath,
    pub leaf_index: usize,
    /// Root of the tree the membership path was taken from.
    pub root: FieldElement,
}

/// The disclosure half of the verification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureParts {
    pub bbs_public_key: String,
    pub bbs_proof: String,
    pub bbs_nonce: String,
    pub message_count: usize,
    pub revealed: Vec<RevealedField>,
}

impl DisclosureBundle {
    /// Revealed messages keyed by signing position, as proof verification takes them.
    pub fn revealed_positions(&self) -> Vec<(usize, Vec<u8>)> {
        self.revealed
            .iter()
            .map(|m| (m.index, m.bytes.clone()))
            .collect()
    }

    pub fn revealed_value(&self, name: &str) -> Option<&[u8]> {
        self.revealed
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.bytes.as_slice())
    }

    /// Render into payload form: key, proof and nonce as base64.
    pub fn to_request_parts(&self) -> DisclosureParts {
        DisclosureParts {
            bbs_public_key: STANDARD.encode(&self.proof_public_key.0),
            bbs_proof: STANDARD.encode(&self.proof),
            bbs_nonce: STANDARD.encode(self.nonce),
            message_count: self.message_count,
            revealed: self.revealed.iter().map(RevealedMessage::to_field).collect(),
        }
    }
}
