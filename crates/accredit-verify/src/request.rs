//! Verification payload and its decoding.
//!
//! Decoding does all schema and encoding checks up front, so later stages
//! only ever see well-formed values. Anything rejected here is
//! `malformed_input`.

use accredit_core::{
    BindingPublicKey, ChallengeId, Epoch, FieldElement, ProofPublicKey, BINDING_KEY_FIELD,
    COMMITMENT_FIELD,
};
use accredit_cred::{DisclosureParts, FieldEncoding, RevealedField};
use accredit_tree::PublishedRoot;
use accredit_zk::ProofBundle;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{VerifyError, VerifyResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub bbs_public_key: String,
    pub bbs_proof: String,
    pub bbs_nonce: String,
    pub message_count: usize,
    pub revealed: Vec<RevealedField>,
    /// Opaque eligibility proof bytes, base64.
    pub eligibility_proof: String,
    /// Public signals as decimal strings.
    pub eligibility_public_signals: Vec<String>,
    pub merkle_root_hex: String,
    pub epoch: u64,
    pub challenge_id: String,
    /// Ed25519 signature over the challenge bytes, base64.
    pub challenge_signature: String,
}

impl VerificationRequest {
    /// Assemble a payload on the holder side.
    pub fn from_parts(
        disclosure: DisclosureParts,
        eligibility: &ProofBundle,
        root: PublishedRoot,
        challenge_id: &ChallengeId,
        challenge_signature: &[u8],
    ) -> Self {
        Self {
            bbs_public_key: disclosure.bbs_public_key,
            bbs_proof: disclosure.bbs_proof,
            bbs_nonce: disclosure.bbs_nonce,
            message_count: disclosure.message_count,
            revealed: disclosure.revealed,
            eligibility_proof: STANDARD.encode(&eligibility.proof),
            eligibility_public_signals: eligibility.public_signals.clone(),
            merkle_root_hex: root.root.to_hex(),
            epoch: root.epoch.0,
            challenge_id: challenge_id.as_str().to_string(),
            challenge_signature: STANDARD.encode(challenge_signature),
        }
    }

    pub fn from_json(body: &[u8]) -> VerifyResult<Self> {
        serde_json::from_slice(body).map_err(|e| VerifyError::MalformedInput(e.to_string()))
    }

    pub fn decode(&self) -> VerifyResult<DecodedRequest> {
        let proof_public_key = ProofPublicKey(decode_b64("bbs_public_key", &self.bbs_public_key)?);
        let proof = decode_b64("bbs_proof", &self.bbs_proof)?;
        let nonce = decode_b64("bbs_nonce", &self.bbs_nonce)?;
        if proof.is_empty() || nonce.is_empty() {
            return Err(VerifyError::MalformedInput(
                "disclosure proof and nonce must be non-empty".into(),
            ));
        }

        if self.message_count == 0 || self.revealed.len() > self.message_count {
            return Err(VerifyError::MalformedInput(format!(
                "message_count {} cannot hold {} revealed messages",
                self.message_count,
                self.revealed.len()
            )));
        }

        let mut seen = HashSet::new();
        let mut revealed = Vec::with_capacity(self.revealed.len());
        for field in &self.revealed {
            if !seen.insert(field.name.as_str()) {
                return Err(VerifyError::MalformedInput(format!(
                    "revealed field '{}' appears twice",
                    field.name
                )));
            }
            let bytes = match field.encoding {
                FieldEncoding::Utf8 => field.value.as_bytes().to_vec(),
                FieldEncoding::Base64 => STANDARD.decode(&field.value).map_err(|_| {
                    VerifyError::MalformedInput(format!("revealed field '{}' is not base64", field.name))
                })?,
            };
            revealed.push((field.name.clone(), bytes));
        }

        let lookup = |name: &str| {
            revealed
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, b)| b.as_slice())
                .ok_or_else(|| VerifyError::MalformedInput(format!("revealed set lacks '{name}'")))
        };
        let binding_key = BindingPublicKey::from_slice(lookup(BINDING_KEY_FIELD)?)
            .map_err(|_| VerifyError::MalformedInput("binding key must be 32 bytes".into()))?;
        let commitment = FieldElement::from_canonical_bytes(lookup(COMMITMENT_FIELD)?)
            .map_err(|_| VerifyError::MalformedInput("commitment is not a field element".into()))?;

        let claimed_root = FieldElement::from_hex(&self.merkle_root_hex)
            .map_err(|_| VerifyError::MalformedInput("merkle_root_hex is not a field element".into()))?;

        if self.challenge_id.trim().is_empty() {
            return Err(VerifyError::MalformedInput("challenge_id is empty".into()));
        }
        let challenge_signature = decode_b64("challenge_signature", &self.challenge_signature)?;

        let eligibility = ProofBundle {
            proof: decode_b64("eligibility_proof", &self.eligibility_proof)?,
            public_signals: self.eligibility_public_signals.clone(),
        };

        Ok(DecodedRequest {
            proof_public_key,
            proof,
            nonce,
            message_count: self.message_count,
            revealed,
            binding_key,
            commitment,
            eligibility,
            claimed: PublishedRoot {
                root: claimed_root,
                epoch: Epoch(self.epoch),
            },
            challenge_id: ChallengeId::new(self.challenge_id.trim()),
            challenge_signature,
        })
    }
}

fn decode_b64(field: &str, value: &str) -> VerifyResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|_| VerifyError::MalformedInput(format!("{field} is not base64")))
}

/// A request after schema and encoding checks.
#[derive(Debug, Clone)]
pub struct DecodedRequest {
    pub proof_public_key: ProofPublicKey,
    pub proof: Vec<u8>,
    pub nonce: Vec<u8>,
    pub message_count: usize,
    /// Revealed `(name, bytes)` pairs in declared order.
    pub revealed: Vec<(String, Vec<u8>)>,
    pub binding_key: BindingPublicKey,
    pub commitment: FieldElement,
    pub eligibility: ProofBundle,
    pub claimed: PublishedRoot,
    pub challenge_id: ChallengeId,
    pub challenge_signature: Vec<u8>,
}
