//! Protocol hashes: the two-to-one Poseidon hash behind commitments and tree
//! nodes, and the digests that derive pseudonyms and account keys.

use ark_bn254::Fr;
use blake2::digest::consts::U32;
use blake2::Blake2b;
use light_poseidon::{Poseidon, PoseidonHasher};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};
use crate::field::FieldElement;
use crate::keys::BindingPublicKey;
use crate::types::{AccountKey, IssuerId, Pseudonym};

type Blake2b256 = Blake2b<U32>;

/// Reusable circom-compatible Poseidon instance with two inputs.
///
/// Building the round constants is not free, so bulk work (tree builds,
/// path folding) should hold one of these rather than call [`hash_two`].
pub struct PairHasher {
    poseidon: Poseidon<Fr>,
}

impl PairHasher {
    pub fn new() -> CoreResult<Self> {
        let poseidon =
            Poseidon::<Fr>::new_circom(2).map_err(|e| CoreError::Hash(e.to_string()))?;
        Ok(Self { poseidon })
    }

    /// `H(left, right)`. Argument order matters.
    pub fn hash(&mut self, left: &FieldElement, right: &FieldElement) -> CoreResult<FieldElement> {
        self.poseidon
            .hash(&[left.as_fr(), right.as_fr()])
            .map(FieldElement::from_fr)
            .map_err(|e| CoreError::Hash(e.to_string()))
    }
}

pub fn hash_two(left: &FieldElement, right: &FieldElement) -> CoreResult<FieldElement> {
    PairHasher::new()?.hash(left, right)
}

/// `C = H(serial, issuer_id)`.
pub fn commitment(serial: &FieldElement, issuer_id: IssuerId) -> CoreResult<FieldElement> {
    hash_two(serial, &issuer_id.to_field())
}

/// BLAKE2b-256 of `domain_tag || binding_key`, hex encoded.
pub fn derive_pseudonym(domain_tag: &str, binding_key: &BindingPublicKey) -> Pseudonym {
    let mut hasher = Blake2b256::new();
    hasher.update(domain_tag.as_bytes());
    hasher.update(binding_key.as_bytes());
    Pseudonym(hex::encode(hasher.finalize()))
}

/// SHA-256 of the binding key, hex encoded.
pub fn derive_account_key(binding_key: &BindingPublicKey) -> AccountKey {
    AccountKey(hex::encode(Sha256::digest(binding_key.as_bytes())))
}
