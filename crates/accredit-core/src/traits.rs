use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::keys::{CredentialSignature, IssuerKeyPair, IssuerPublicKey, ProofPublicKey};

// ---------------------------------------------------------------------------
// ProofMessage: a signed message classified for selective disclosure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofMessage {
    Revealed(Vec<u8>),
    Hidden(Vec<u8>),
}

impl ProofMessage {
    pub fn bytes(&self) -> &[u8] {
        match self {
            ProofMessage::Revealed(b) | ProofMessage::Hidden(b) => b,
        }
    }

    pub fn is_revealed(&self) -> bool {
        matches!(self, ProofMessage::Revealed(_))
    }
}

// ---------------------------------------------------------------------------
// SignatureSuite: multi-message signatures with selective-disclosure proofs
//
// Injected into the issuer, the prover and the verifier. Implementations
// must treat the message slice order as significant.
// ---------------------------------------------------------------------------

pub trait SignatureSuite: Send + Sync {
    /// Short identifier recorded alongside credentials.
    fn name(&self) -> &'static str;

    fn generate_issuer_keys(&self) -> CoreResult<IssuerKeyPair>;

    fn sign(&self, keys: &IssuerKeyPair, messages: &[Vec<u8>])
        -> CoreResult<CredentialSignature>;

    fn verify(
        &self,
        public_key: &IssuerPublicKey,
        messages: &[Vec<u8>],
        signature: &CredentialSignature,
    ) -> bool;

    /// Derive the public key used by proof verification for `message_count` messages.
    fn proof_public_key(
        &self,
        public_key: &IssuerPublicKey,
        message_count: usize,
    ) -> CoreResult<ProofPublicKey>;

    fn create_proof(
        &self,
        signature: &CredentialSignature,
        proof_key: &ProofPublicKey,
        messages: &[ProofMessage],
        nonce: &[u8],
    ) -> CoreResult<Vec<u8>>;

    /// `revealed` pairs each revealed message with its signing position,
    /// positions ascending. A proof that opens a different set of positions
    /// does not verify.
    fn verify_proof(
        &self,
        proof: &[u8],
        proof_key: &ProofPublicKey,
        revealed: &[(usize, Vec<u8>)],
        nonce: &[u8],
        message_count: usize,
    ) -> bool;
}
