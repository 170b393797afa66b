//! Accreditation service.
//!
//! Wires the accreditation tree, the issuer, the challenge authenticator, the
//! eligibility backend and the verifier into one process state, and exposes
//! that state over HTTP. Issuance and root publication are administrative
//! operations on [`RootState`]; the verification path only reads the
//! published root.

pub mod config;
pub mod error;
pub mod http;
pub mod persist;

pub use config::{EligibilityBackendKind, RootConfig};
pub use error::{RootError, RootResult};
pub use http::build_router;

use accredit_auth::{Challenge, ChallengeAuthenticator, InMemoryChallengeStore};
use accredit_core::{AttributeSet, IssuerId, SignatureSuite, Timestamp};
use accredit_cred::{verify_credential, DigestSuite, DisclosureProver, IssuedCredential, Issuer, RevealSet};
use accredit_tree::{AccreditationTree, FileRootSource, PublishedRoot, RootSource};
use accredit_verify::{InMemoryAccountStore, VerificationRequest, Verifier};
use accredit_zk::{
    build_circuit_inputs, EligibilityAttributes, EligibilityBackend, MerkleWitness,
    NativeEligibilityBackend, ProofBundle, ProofWorkerPool, SnarkjsBackend,
};
use chrono::NaiveDate;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// Process state shared by the CLI commands and the HTTP handlers.
pub struct RootState {
    pub config: RootConfig,
    pub suite: Arc<dyn SignatureSuite>,
    pub issuer: Issuer,
    pub roots: Arc<FileRootSource>,
    pub challenges: Arc<ChallengeAuthenticator>,
    pub accounts: Arc<InMemoryAccountStore>,
    pub eligibility: ProofWorkerPool,
    pub verifier: Verifier,
    tree: Mutex<AccreditationTree>,
}

/// Build the process state from configuration, creating the data directory
/// and any missing key material.
pub fn initialize_root(config: RootConfig) -> RootResult<RootState> {
    config.validate()?;
    std::fs::create_dir_all(&config.data_dir)?;

    let suite: Arc<dyn SignatureSuite> = Arc::new(DigestSuite::new());
    let keys = persist::load_or_create_issuer_keys(&config.data_dir, suite.as_ref())?;
    let issuer = Issuer::new(
        suite.clone(),
        keys,
        IssuerId(config.issuance.issuer_id),
        config.issuance_config()?,
    )?;

    let tree = persist::load_tree(&config.data_dir, config.tree.depth)?;
    let roots = Arc::new(FileRootSource::in_dir(&config.data_dir));
    let challenges = Arc::new(ChallengeAuthenticator::new(
        Arc::new(InMemoryChallengeStore::with_limits(config.challenge.limits)),
        config.challenge.ttl_seconds,
    ));
    let accounts = Arc::new(InMemoryAccountStore::new());

    let backend = build_backend(&config)?;
    let eligibility = ProofWorkerPool::new(backend, config.eligibility.pool.clone());

    let verifier = Verifier::new(
        suite.clone(),
        issuer.public_key().clone(),
        roots.clone(),
        challenges.clone(),
        eligibility.clone(),
        accounts.clone(),
        config.verifier_config()?,
    );

    info!(
        data_dir = %config.data_dir.display(),
        depth = tree.depth(),
        occupied = tree.occupied(),
        suite = suite.name(),
        eligibility = eligibility.backend().name(),
        "accredit state initialized"
    );

    Ok(RootState {
        config,
        suite,
        issuer,
        roots,
        challenges,
        accounts,
        eligibility,
        verifier,
        tree: Mutex::new(tree),
    })
}

fn build_backend(config: &RootConfig) -> RootResult<Arc<dyn EligibilityBackend>> {
    let backend: Arc<dyn EligibilityBackend> = match config.eligibility.backend {
        EligibilityBackendKind::Native => {
            let key = persist::load_or_create_eligibility_key(&config.data_dir)?;
            Arc::new(NativeEligibilityBackend::new(key, config.eligibility.min_age))
        }
        EligibilityBackendKind::Snarkjs => {
            let mut snarkjs = config.eligibility.snarkjs();
            if snarkjs.circuit_dir.is_relative() {
                snarkjs.circuit_dir = config.data_dir.join(&snarkjs.circuit_dir);
            }
            Arc::new(SnarkjsBackend::system(snarkjs))
        }
    };
    Ok(backend)
}

impl RootState {
    fn lock_tree(&self) -> RootResult<MutexGuard<'_, AccreditationTree>> {
        self.tree
            .lock()
            .map_err(|e| RootError::Internal(format!("tree lock poisoned: {e}")))
    }

    /// Snapshot of the current accreditation tree.
    pub fn tree(&self) -> RootResult<AccreditationTree> {
        Ok(self.lock_tree()?.clone())
    }

    /// Issue a credential and persist the grown tree. The new root is not
    /// published until [`RootState::publish_root`] runs.
    pub fn issue(&self, attributes: &AttributeSet) -> RootResult<IssuedCredential> {
        let mut tree = self.lock_tree()?;
        let credential = self.issuer.issue(attributes, &mut tree)?;
        persist::save_tree(&self.config.data_dir, &tree)?;
        Ok(credential)
    }

    pub fn publish_root(&self) -> RootResult<PublishedRoot> {
        let tree = self.lock_tree()?;
        persist::publish_tree_root(&self.roots, &tree)
    }

    pub fn current_root(&self) -> RootResult<Option<PublishedRoot>> {
        Ok(self.roots.current_root()?)
    }

    /// Drop expired challenge records. Returns how many were removed.
    pub fn purge_expired_challenges(&self) -> RootResult<usize> {
        Ok(self.challenges.purge_expired(Timestamp::now())?)
    }

    /// Holder side: prove the eligibility predicate for `credential` against
    /// the current tree, as of `today`.
    pub async fn prove_eligibility(
        &self,
        credential: &IssuedCredential,
        today: NaiveDate,
    ) -> RootResult<ProofBundle> {
        let valid = verify_credential(
            self.suite.as_ref(),
            &credential.issuer_public_key,
            credential,
        );
        let attributes = EligibilityAttributes::from_attributes(&credential.attributes, valid)?;
        let tree = self.tree()?;
        let witness = MerkleWitness::from_tree(
            credential.serial,
            credential.issuer_id,
            &tree,
            credential.leaf_index,
        );
        let inputs = build_circuit_inputs(&attributes, today, &witness)?;
        Ok(self.eligibility.prove(inputs).await?)
    }

    /// Holder side: assemble a full verification payload answering `challenge`.
    pub async fn present(
        &self,
        credential: &IssuedCredential,
        reveal: &RevealSet,
        challenge: &Challenge,
        today: NaiveDate,
    ) -> RootResult<VerificationRequest> {
        let published = self
            .current_root()?
            .ok_or_else(|| RootError::Config("no accreditation root published".into()))?;
        let tree = self.tree()?;
        let disclosure =
            DisclosureProver::new(self.suite.clone()).disclose_credential(credential, &tree, reveal)?;
        let eligibility = self.prove_eligibility(credential, today).await?;
        let signature = credential.binding_keypair.sign(&challenge.random_bytes);
        Ok(VerificationRequest::from_parts(
            disclosure.to_request_parts(),
            &eligibility,
            published,
            &challenge.id,
            &signature,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn test_config() -> RootConfig {
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir: PathBuf =
            std::env::temp_dir().join(format!("accredit-root-{}-{}", std::process::id(), id));
        let mut config = RootConfig::default();
        config.data_dir = dir;
        config.tree.depth = 3;
        config
    }

    fn attributes() -> AttributeSet {
        AttributeSet::new()
            .with("name", "Ada")
            .unwrap()
            .with("birth_year", "1990")
            .unwrap()
            .with("birth_month", "1")
            .unwrap()
            .with("birth_day", "2")
            .unwrap()
            .with("expiry_year", "2031")
            .unwrap()
            .with("expiry_month", "1")
            .unwrap()
            .with("nationality", "DE")
            .unwrap()
    }

    #[test]
    fn test_initialize_creates_key_material() {
        let config = test_config();
        let dir = config.data_dir.clone();
        let state = initialize_root(config).unwrap();
        assert!(dir.join(persist::ISSUER_KEY_FILE).exists());
        assert!(dir.join(persist::ELIGIBILITY_KEY_FILE).exists());
        assert_eq!(state.eligibility.backend().name(), "native-hmac");
        assert!(state.current_root().unwrap().is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_reinitialize_keeps_issuer_and_tree() {
        let config = test_config();
        let dir = config.data_dir.clone();

        let state = initialize_root(config.clone()).unwrap();
        state.issue(&attributes()).unwrap();
        let root = state.tree().unwrap().root();
        let issuer_key = state.issuer.public_key().clone();
        drop(state);

        let state = initialize_root(config).unwrap();
        assert_eq!(state.tree().unwrap().root(), root);
        assert_eq!(state.issuer.public_key(), &issuer_key);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_issue_does_not_publish() {
        let config = test_config();
        let dir = config.data_dir.clone();
        let state = initialize_root(config).unwrap();

        let first = state.publish_root().unwrap();
        state.issue(&attributes()).unwrap();
        assert_eq!(state.current_root().unwrap(), Some(first));

        let second = state.publish_root().unwrap();
        assert_eq!(second.epoch, first.epoch.next());
        assert_eq!(second.root, state.tree().unwrap().root());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_issue_enforces_published_ordering() {
        let config = test_config();
        let dir = config.data_dir.clone();
        let state = initialize_root(config).unwrap();
        let extra = attributes().with("height", "180").unwrap();
        assert!(matches!(
            state.issue(&extra),
            Err(RootError::Credential(accredit_cred::CredError::OrderingMismatch))
        ));
        assert_eq!(state.tree().unwrap().occupied(), 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = test_config();
        config.tree.depth = 0;
        assert!(matches!(initialize_root(config), Err(RootError::Config(_))));
    }

    #[tokio::test]
    async fn test_present_without_root_fails() {
        let config = test_config();
        let dir = config.data_dir.clone();
        let state = initialize_root(config).unwrap();
        let credential = state.issue(&attributes()).unwrap();
        let key = credential.binding_keypair.public_key();
        let challenge = state.challenges.issue(&key).unwrap();
        let result = state
            .present(
                &credential,
                &RevealSet::with_protocol_fields(["name"]),
                &challenge,
                NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
            )
            .await;
        assert!(result.is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
