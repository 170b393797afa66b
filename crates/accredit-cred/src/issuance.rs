//! Credential issuance.
//!
//! Flow: sample a nonzero serial, commit to `(serial, issuer_id)`, generate a
//! fresh binding keypair, sign the ordered message list, then place the
//! commitment in the first EMPTY leaf of the caller's tree. Signing happens
//! before the tree is touched, so a failed issuance leaves the tree unchanged.

use accredit_core::{
    commitment, AttributeOrdering, AttributeSet, BindingKeypair, FieldElement, IssuerId, IssuerKeyPair,
    IssuerPublicKey, SignatureSuite,
};
use accredit_tree::AccreditationTree;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{CredError, CredResult};
use crate::messages::credential_messages;
use crate::types::IssuedCredential;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceConfig {
    /// Attempts at drawing a nonzero serial before giving up.
    #[serde(default = "default_max_serial_attempts")]
    pub max_serial_attempts: u32,

    /// Published attribute ordering. When set, every issued credential must
    /// use exactly this ordering, so verifiers can map positions to names.
    #[serde(default)]
    pub ordering: Option<AttributeOrdering>,
}

fn default_max_serial_attempts() -> u32 {
    3
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            max_serial_attempts: default_max_serial_attempts(),
            ordering: None,
        }
    }
}

/// Draw a uniformly random nonzero field element, retrying up to `attempts` times.
pub fn sample_serial<R: RngCore + ?Sized>(rng: &mut R, attempts: u32) -> CredResult<FieldElement> {
    for attempt in 1..=attempts {
        let serial = FieldElement::random(rng);
        if !serial.is_zero() {
            return Ok(serial);
        }
        tracing::warn!(attempt, "sampled zero serial, retrying");
    }
    Err(CredError::SerialExhausted { attempts })
}

pub struct Issuer {
    suite: Arc<dyn SignatureSuite>,
    keys: IssuerKeyPair,
    issuer_id: IssuerId,
    config: IssuanceConfig,
}

impl Issuer {
    pub fn new(
        suite: Arc<dyn SignatureSuite>,
        keys: IssuerKeyPair,
        issuer_id: IssuerId,
        config: IssuanceConfig,
    ) -> CredResult<Self> {
        if config.max_serial_attempts == 0 {
            return Err(CredError::InvalidConfig(
                "max_serial_attempts must be > 0".into(),
            ));
        }
        Ok(Self {
            suite,
            keys,
            issuer_id,
            config,
        })
    }

    /// Create an issuer with freshly generated keys.
    pub fn generate(
        suite: Arc<dyn SignatureSuite>,
        issuer_id: IssuerId,
        config: IssuanceConfig,
    ) -> CredResult<Self> {
        let keys = suite.generate_issuer_keys()?;
        Self::new(suite, keys, issuer_id, config)
    }

    pub fn public_key(&self) -> &IssuerPublicKey {
        self.keys.public_key()
    }

    pub fn issuer_id(&self) -> IssuerId {
        self.issuer_id
    }

    pub fn suite(&self) -> &Arc<dyn SignatureSuite> {
        &self.suite
    }

    pub fn ordering(&self) -> Option<&AttributeOrdering> {
        self.config.ordering.as_ref()
    }

    pub fn issue(
        &self,
        attributes: &AttributeSet,
        tree: &mut AccreditationTree,
    ) -> CredResult<IssuedCredential> {
        self.issue_with_rng(attributes, tree, &mut rand::rngs::OsRng)
    }

    pub fn issue_with_rng<R: RngCore + ?Sized>(
        &self,
        attributes: &AttributeSet,
        tree: &mut AccreditationTree,
        rng: &mut R,
    ) -> CredResult<IssuedCredential> {
        if let Some(expected) = &self.config.ordering {
            if attributes.ordering() != expected {
                return Err(CredError::OrderingMismatch);
            }
        }
        let serial = sample_serial(rng, self.config.max_serial_attempts)?;
        let commitment = commitment(&serial, self.issuer_id)?;
        let binding_keypair = BindingKeypair::generate();

        let messages = credential_messages(attributes, &binding_keypair.public_key(), &commitment);
        let signature = self.suite.sign(&self.keys, &messages).map_err(|e| {
            tracing::error!(error = %e, "credential signing failed");
            CredError::SigningFailed
        })?;

        let leaf_index = tree.insert(commitment)?;
        tracing::info!(
            issuer_id = %self.issuer_id,
            leaf_index,
            messages = messages.len(),
            suite = self.suite.name(),
            "credential issued"
        );

        Ok(IssuedCredential {
            signature,
            binding_keypair,
            attributes: attributes.clone(),
            serial,
            issuer_id: self.issuer_id,
            commitment,
            leaf_index,
            tree: tree.clone(),
            issuer_public_key: self.keys.public_key().clone(),
            suite: self.suite.name(),
        })
    }
}

/// Holder-side check that a credential's signature covers its attributes,
/// binding key and commitment, and that the commitment matches the serial.
pub fn verify_credential(
    suite: &dyn SignatureSuite,
    issuer_public_key: &IssuerPublicKey,
    credential: &IssuedCredential,
) -> bool {
    match commitment(&credential.serial, credential.issuer_id) {
        Ok(recomputed) if recomputed == credential.commitment => {}
        _ => return false,
    }
    let messages = credential_messages(
        &credential.attributes,
        &credential.binding_keypair.public_key(),
        &credential.commitment,
    );
    suite.verify(issuer_public_key, &messages, &credential.signature)
}
