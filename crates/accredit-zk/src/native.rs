//! In-process eligibility backend.
//!
//! Evaluates the same relation as the circuit directly and authenticates the
//! resulting public signals with HMAC-SHA256 under a key shared by prover and
//! verifier. It is not zero-knowledge toward the key holder and suits
//! deployments where the verifier runs the prover, and tests.
//!
//! Hard constraints (commitment opening, tree membership) abort proving.
//! The predicate itself is reported in the `eligible` signal.
//!
//! Public signals: `[eligible, revealed_commitment, merkle_root,
//! current_year, current_month, current_day]`.

use accredit_core::{commitment, FieldElement, IssuerId};
use accredit_tree::MembershipPath;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::backend::{EligibilityBackend, ProofBundle};
use crate::error::{ZkError, ZkResult};
use crate::inputs::CircuitInputs;

type HmacSha256 = Hmac<Sha256>;

const TAG_DOMAIN: &[u8] = b"accredit-native-eligibility/v1";

pub const DEFAULT_MIN_AGE: u32 = 18;

pub struct NativeEligibilityBackend {
    key: Zeroizing<[u8; 32]>,
    min_age: u32,
}

impl NativeEligibilityBackend {
    pub fn new(key: [u8; 32], min_age: u32) -> Self {
        Self {
            key: Zeroizing::new(key),
            min_age,
        }
    }

    pub fn generate(min_age: u32) -> Self {
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self::new(key, min_age)
    }

    pub fn min_age(&self) -> u32 {
        self.min_age
    }

    fn mac(&self, signals: &[String]) -> ZkResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.key.as_slice())
            .map_err(|e| ZkError::WorkerFailed(format!("hmac key: {e}")))?;
        mac.update(TAG_DOMAIN);
        mac.update(&(signals.len() as u32).to_be_bytes());
        for signal in signals {
            mac.update(&(signal.len() as u32).to_be_bytes());
            mac.update(signal.as_bytes());
        }
        Ok(mac)
    }

    fn predicate(&self, inputs: &CircuitInputs) -> ZkResult<bool> {
        let n = CircuitInputs::number;
        let (by, bm, bd) = (n(&inputs.birth_year)?, n(&inputs.birth_month)?, n(&inputs.birth_day)?);
        let (cy, cm, cd) = (
            n(&inputs.current_year)?,
            n(&inputs.current_month)?,
            n(&inputs.current_day)?,
        );
        let (ey, em) = (n(&inputs.expiry_year)?, n(&inputs.expiry_month)?);

        let had_birthday = (cm, cd) >= (bm, bd);
        let age = cy - by - if had_birthday { 0 } else { 1 };
        let adult = age >= i64::from(self.min_age);
        let unexpired = (ey, em) >= (cy, cm);
        let signed = n(&inputs.valid_signature)? == 1;
        Ok(adult && unexpired && signed)
    }
}

impl EligibilityBackend for NativeEligibilityBackend {
    fn name(&self) -> &'static str {
        "native-hmac"
    }

    fn prepare(&self) -> ZkResult<()> {
        Ok(())
    }

    fn prove(&self, inputs: &CircuitInputs) -> ZkResult<ProofBundle> {
        let revealed = CircuitInputs::field(&inputs.revealed_commitment)?;
        let root = CircuitInputs::field(&inputs.merkle_root)?;
        let serial = CircuitInputs::field(&inputs.credential_serial_lo)?;
        let issuer_id = inputs
            .issuer_id
            .parse::<u64>()
            .map(IssuerId)
            .map_err(|_| ZkError::InvalidInput("issuer_id is not an integer".into()))?;

        if commitment(&serial, issuer_id)? != revealed {
            return Err(ZkError::ConstraintViolation(
                "commitment does not open to serial and issuer".into(),
            ));
        }

        let siblings = inputs
            .path_elements
            .iter()
            .map(|s| CircuitInputs::field(s))
            .collect::<ZkResult<Vec<FieldElement>>>()?;
        let directions = inputs
            .path_indices
            .iter()
            .map(|s| {
                s.parse::<u8>()
                    .map_err(|_| ZkError::InvalidInput(format!("path index '{s}'")))
            })
            .collect::<ZkResult<Vec<u8>>>()?;
        let path = MembershipPath {
            siblings,
            directions,
        };
        if !path.verify(&revealed, &root) {
            return Err(ZkError::ConstraintViolation(
                "commitment is not a member of the tree".into(),
            ));
        }

        let eligible = self.predicate(inputs)?;
        let public_signals = vec![
            u8::from(eligible).to_string(),
            revealed.to_decimal(),
            root.to_decimal(),
            inputs.current_year.clone(),
            inputs.current_month.clone(),
            inputs.current_day.clone(),
        ];
        let proof = self.mac(&public_signals)?.finalize().into_bytes().to_vec();
        tracing::debug!(eligible, "native eligibility proof generated");
        Ok(ProofBundle {
            proof,
            public_signals,
        })
    }

    fn verify(&self, bundle: &ProofBundle) -> ZkResult<bool> {
        Ok(self
            .mac(&bundle.public_signals)?
            .verify_slice(&bundle.proof)
            .is_ok())
    }
}
