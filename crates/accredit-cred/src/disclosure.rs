//! Selective disclosure prover.
//!
//! The prover re-derives the issuance message list from the holder's state,
//! marks each message revealed or hidden, draws a fresh 32-byte nonce and asks
//! the signature suite for a proof. It also locates the commitment in the
//! supplied tree and attaches that leaf's membership path.
//!
//! Ordering and leaf position are taken from the caller as-is. If they do not
//! match issuance-time state the proof is produced anyway and fails at the
//! verifier.

use accredit_core::{
    commitment, is_reserved_name, AttributeSet, BindingKeypair, CredentialSignature,
    FieldElement, IssuerId, IssuerPublicKey, ProofMessage, SignatureSuite,
};
use accredit_tree::AccreditationTree;
use rand::RngCore;
use std::sync::Arc;

use crate::error::{CredError, CredResult};
use crate::messages::{credential_messages, message_names};
use crate::types::{DisclosureBundle, IssuedCredential, RevealSet, RevealedMessage};

/// Holder state needed for one disclosure.
pub struct DisclosureInput<'a> {
    pub signature: &'a CredentialSignature,
    pub binding_keypair: &'a BindingKeypair,
    pub attributes: &'a AttributeSet,
    pub reveal: &'a RevealSet,
    pub tree: &'a AccreditationTree,
    pub serial: &'a FieldElement,
    pub issuer_id: IssuerId,
    pub issuer_public_key: &'a IssuerPublicKey,
}

pub struct DisclosureProver {
    suite: Arc<dyn SignatureSuite>,
}

impl DisclosureProver {
    pub fn new(suite: Arc<dyn SignatureSuite>) -> Self {
        Self { suite }
    }

    /// Disclose from an issued credential against `tree` (normally the
    /// current accreditation tree, which may have grown since issuance).
    pub fn disclose_credential(
        &self,
        credential: &IssuedCredential,
        tree: &AccreditationTree,
        reveal: &RevealSet,
    ) -> CredResult<DisclosureBundle> {
        self.disclose(DisclosureInput {
            signature: &credential.signature,
            binding_keypair: &credential.binding_keypair,
            attributes: &credential.attributes,
            reveal,
            tree,
            serial: &credential.serial,
            issuer_id: credential.issuer_id,
            issuer_public_key: &credential.issuer_public_key,
        })
    }

    pub fn disclose(&self, input: DisclosureInput<'_>) -> CredResult<DisclosureBundle> {
        let ordering = input.attributes.ordering();
        for name in input.reveal.iter() {
            if !is_reserved_name(name) && !ordering.contains(name) {
                return Err(CredError::UnknownAttribute(name.to_string()));
            }
        }

        let commitment = commitment(input.serial, input.issuer_id)?;
        let messages = credential_messages(
            input.attributes,
            &input.binding_keypair.public_key(),
            &commitment,
        );
        let names = message_names(ordering);

        let mut classified = Vec::with_capacity(messages.len());
        let mut revealed = Vec::new();
        for (index, (name, bytes)) in names.iter().zip(messages).enumerate() {
            if input.reveal.contains(name) {
                revealed.push(RevealedMessage {
                    index,
                    name: name.to_string(),
                    bytes: bytes.clone(),
                });
                classified.push(ProofMessage::Revealed(bytes));
            } else {
                classified.push(ProofMessage::Hidden(bytes));
            }
        }

        let mut nonce = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let message_count = classified.len();
        let proof_public_key = self
            .suite
            .proof_public_key(input.issuer_public_key, message_count)?;
        let proof = self
            .suite
            .create_proof(input.signature, &proof_public_key, &classified, &nonce)
            .map_err(|e| {
                tracing::warn!(error = %e, "disclosure proof construction failed");
                CredError::ProofCreationFailed
            })?;

        let leaf_index = input
            .tree
            .position(&commitment)
            .ok_or(CredError::CommitmentNotInTree)?;
        let membership_path = input.tree.proof(leaf_index)?;

        tracing::debug!(
            revealed = revealed.len(),
            hidden = message_count - revealed.len(),
            leaf_index,
            "disclosure proof created"
        );

        Ok(DisclosureBundle {
            proof,
            proof_public_key,
            nonce,
            message_count,
            revealed,
            membership_path,
            leaf_index,
            root: input.tree.root(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuance::{IssuanceConfig, Issuer};
    use crate::suite::DigestSuite;
    use accredit_core::{BINDING_KEY_FIELD, COMMITMENT_FIELD};

    struct Fixture {
        suite: Arc<dyn SignatureSuite>,
        credential: IssuedCredential,
        tree: AccreditationTree,
    }

    fn fixture() -> Fixture {
        let suite: Arc<dyn SignatureSuite> = Arc::new(DigestSuite::new());
        let issuer = Issuer::generate(suite.clone(), IssuerId(42), IssuanceConfig::default())
            .unwrap();
        let mut tree = AccreditationTree::new(3).unwrap();
        let attrs = AttributeSet::new()
            .with("A", "alpha")
            .unwrap()
            .with("B", "bravo")
            .unwrap()
            .with("C", "charlie")
            .unwrap();
        let credential = issuer.issue(&attrs, &mut tree).unwrap();
        Fixture {
            suite,
            credential,
            tree,
        }
    }

    #[test]
    fn test_disclose_reveals_only_selected() {
        let f = fixture();
        let prover = DisclosureProver::new(f.suite.clone());
        let bundle = prover
            .disclose_credential(&f.credential, &f.tree, &RevealSet::with_protocol_fields(["A"]))
            .unwrap();

        let names: Vec<&str> = bundle.revealed.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["A", BINDING_KEY_FIELD, COMMITMENT_FIELD]);
        let indices: Vec<usize> = bundle.revealed.iter().map(|m| m.index).collect();
        assert_eq!(indices, vec![0, 3, 4]);
        assert_eq!(bundle.message_count, 5);
        assert_eq!(bundle.leaf_index, f.credential.leaf_index);
        assert!(bundle
            .membership_path
            .verify(&f.credential.commitment, &f.tree.root()));
        assert!(f.suite.verify_proof(
            &bundle.proof,
            &bundle.proof_public_key,
            &bundle.revealed_positions(),
            &bundle.nonce,
            bundle.message_count
        ));
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let f = fixture();
        let prover = DisclosureProver::new(f.suite.clone());
        let reveal = RevealSet::new(["A"]);
        let a = prover.disclose_credential(&f.credential, &f.tree, &reveal).unwrap();
        let b = prover.disclose_credential(&f.credential, &f.tree, &reveal).unwrap();
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn test_tampered_revealed_value_fails_verification() {
        let f = fixture();
        let prover = DisclosureProver::new(f.suite.clone());
        let bundle = prover
            .disclose_credential(&f.credential, &f.tree, &RevealSet::new(["A"]))
            .unwrap();
        let mut revealed = bundle.revealed_positions();
        revealed[0].1[0] ^= 0x01;
        assert!(!f.suite.verify_proof(
            &bundle.proof,
            &bundle.proof_public_key,
            &revealed,
            &bundle.nonce,
            bundle.message_count
        ));
    }

    #[test]
    fn test_tampered_hidden_attribute_fails_verification() {
        let mut f = fixture();
        f.credential.attributes.set("B", "bogus").unwrap();
        let prover = DisclosureProver::new(f.suite.clone());
        let bundle = prover
            .disclose_credential(&f.credential, &f.tree, &RevealSet::new(["A"]))
            .unwrap();
        assert!(!f.suite.verify_proof(
            &bundle.proof,
            &bundle.proof_public_key,
            &bundle.revealed_positions(),
            &bundle.nonce,
            bundle.message_count
        ));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let f = fixture();
        let prover = DisclosureProver::new(f.suite.clone());
        let err = prover
            .disclose_credential(&f.credential, &f.tree, &RevealSet::new(["Z"]))
            .unwrap_err();
        assert!(matches!(err, CredError::UnknownAttribute(name) if name == "Z"));
    }

    #[test]
    fn test_commitment_missing_from_tree() {
        let f = fixture();
        let prover = DisclosureProver::new(f.suite.clone());
        let other_tree = AccreditationTree::new(3).unwrap();
        assert!(matches!(
            prover.disclose_credential(&f.credential, &other_tree, &RevealSet::new(["A"])),
            Err(CredError::CommitmentNotInTree)
        ));
    }

    #[test]
    fn test_path_tracks_grown_tree() {
        let mut f = fixture();
        f.tree.insert(FieldElement::from_u64(777)).unwrap();
        let prover = DisclosureProver::new(f.suite.clone());
        let bundle = prover
            .disclose_credential(&f.credential, &f.tree, &RevealSet::new(["A"]))
            .unwrap();
        assert_eq!(bundle.root, f.tree.root());
        assert_ne!(bundle.root, f.credential.tree.root());
        assert!(bundle
            .membership_path
            .verify(&f.credential.commitment, &bundle.root));
    }

    #[test]
    fn test_request_parts_shape() {
        let f = fixture();
        let prover = DisclosureProver::new(f.suite.clone());
        let bundle = prover
            .disclose_credential(&f.credential, &f.tree, &RevealSet::with_protocol_fields(["A"]))
            .unwrap();
        let parts = bundle.to_request_parts();
        assert_eq!(parts.message_count, 5);
        assert_eq!(parts.revealed.len(), 3);
        assert_eq!(parts.revealed[0].value, "alpha");
        let json = serde_json::to_value(&parts).unwrap();
        assert!(json.get("bbs_public_key").is_some());
        assert!(json.get("bbs_nonce").is_some());
    }
}
