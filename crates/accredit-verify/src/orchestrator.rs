use accredit_auth::ChallengeAuthenticator;
use accredit_core::{
    derive_account_key, derive_pseudonym, AttributeOrdering, FieldElement, IssuerPublicKey,
    Pseudonym, SignatureSuite, Timestamp, BINDING_KEY_FIELD, COMMITMENT_FIELD,
};
use accredit_cred::message_names;
use accredit_tree::RootSource;
use accredit_zk::{ProofBundle, ProofWorkerPool, PublicSignalLayout};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::account::{AccountRecord, AccountStore};
use crate::error::{ProofKind, VerifyError, VerifyResult};
use crate::request::{DecodedRequest, VerificationRequest};

pub const DEFAULT_DOMAIN_TAG: &str = "accredit-verifier";
pub const DEFAULT_DATE_TOLERANCE_DAYS: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// The issuer's published attribute ordering. Revealed names are checked
    /// against the positions it assigns.
    pub ordering: AttributeOrdering,
    #[serde(default = "default_domain_tag")]
    pub domain_tag: String,
    #[serde(default)]
    pub signal_layout: PublicSignalLayout,
    /// Allowed distance in days between the proving date in the eligibility
    /// signals and the verifier's UTC date.
    #[serde(default = "default_date_tolerance_days")]
    pub date_tolerance_days: u32,
}

fn default_domain_tag() -> String {
    DEFAULT_DOMAIN_TAG.to_string()
}

fn default_date_tolerance_days() -> u32 {
    DEFAULT_DATE_TOLERANCE_DAYS
}

impl VerifierConfig {
    pub fn new(ordering: AttributeOrdering) -> Self {
        Self {
            ordering,
            domain_tag: default_domain_tag(),
            signal_layout: PublicSignalLayout::default(),
            date_tolerance_days: default_date_tolerance_days(),
        }
    }
}

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub pseudonym: Pseudonym,
    /// Revealed attributes, protocol fields excluded. Values that are not
    /// UTF-8 are given as base64.
    pub revealed_attributes: BTreeMap<String, String>,
}

pub struct Verifier {
    suite: Arc<dyn SignatureSuite>,
    issuer_public_key: IssuerPublicKey,
    roots: Arc<dyn RootSource>,
    challenges: Arc<ChallengeAuthenticator>,
    eligibility: ProofWorkerPool,
    accounts: Arc<dyn AccountStore>,
    config: VerifierConfig,
    clock: Clock,
}

impl Verifier {
    pub fn new(
        suite: Arc<dyn SignatureSuite>,
        issuer_public_key: IssuerPublicKey,
        roots: Arc<dyn RootSource>,
        challenges: Arc<ChallengeAuthenticator>,
        eligibility: ProofWorkerPool,
        accounts: Arc<dyn AccountStore>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            suite,
            issuer_public_key,
            roots,
            challenges,
            eligibility,
            accounts,
            config,
            clock: Arc::new(|| Utc::now().date_naive()),
        }
    }

    /// Replace the UTC clock used for the proving-date check.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub async fn verify(&self, request: &VerificationRequest) -> VerifyResult<VerificationOutcome> {
        let result = self.run_checks(request).await;
        match &result {
            Ok(outcome) => tracing::info!(pseudonym = %outcome.pseudonym.short(), "verification succeeded"),
            Err(e) => tracing::warn!(reason = e.reason_code(), error = %e, "verification rejected"),
        }
        result
    }

    async fn run_checks(&self, request: &VerificationRequest) -> VerifyResult<VerificationOutcome> {
        let decoded = request.decode()?;

        self.check_freshness(&decoded)?;
        tracing::debug!(epoch = %decoded.claimed.epoch, "freshness ok");

        self.check_challenge(&decoded)?;
        tracing::debug!(challenge_id = %decoded.challenge_id.short(), "challenge ok");

        self.check_disclosure(&decoded)?;
        tracing::debug!(revealed = decoded.revealed.len(), "disclosure proof ok");

        self.check_eligibility(&decoded).await?;
        tracing::debug!("eligibility proof ok");

        let pseudonym = derive_pseudonym(&self.config.domain_tag, &decoded.binding_key);
        let now = Timestamp::now();
        self.accounts.upsert(AccountRecord {
            account_key: derive_account_key(&decoded.binding_key),
            pseudonym: pseudonym.clone(),
            issuer_proof_key: decoded.proof_public_key.clone(),
            accreditation_root_hex: decoded.claimed.root.to_hex(),
            created_at: now,
            last_seen: now,
        })?;

        Ok(VerificationOutcome {
            pseudonym,
            revealed_attributes: revealed_attributes(&decoded),
        })
    }

    fn check_freshness(&self, decoded: &DecodedRequest) -> VerifyResult<()> {
        let published = self
            .roots
            .current_root()
            .map_err(|e| VerifyError::Infrastructure(format!("root source: {e}")))?
            .ok_or_else(|| VerifyError::Infrastructure("no accreditation root published".into()))?;
        if published != decoded.claimed {
            tracing::debug!(
                claimed_epoch = %decoded.claimed.epoch,
                current_epoch = %published.epoch,
                "stale root claim"
            );
            return Err(VerifyError::StaleRoot);
        }
        Ok(())
    }

    fn check_challenge(&self, decoded: &DecodedRequest) -> VerifyResult<()> {
        self.challenges
            .respond_detailed(
                &decoded.challenge_id,
                &decoded.challenge_signature,
                &decoded.binding_key,
            )
            .map_err(|e| {
                if e.is_storage() {
                    VerifyError::Infrastructure(e.to_string())
                } else {
                    VerifyError::AuthenticationFailed
                }
            })
    }

    fn check_disclosure(&self, decoded: &DecodedRequest) -> VerifyResult<()> {
        let invalid = VerifyError::ProofInvalid(ProofKind::Disclosure);
        let revealed = revealed_positions(&self.config.ordering, decoded)?;
        // The payload key must be the trusted issuer's key for this message count.
        let expected = self
            .suite
            .proof_public_key(&self.issuer_public_key, decoded.message_count)
            .map_err(|_| invalid.clone())?;
        if expected != decoded.proof_public_key {
            return Err(invalid);
        }
        let valid = self.suite.verify_proof(
            &decoded.proof,
            &decoded.proof_public_key,
            &revealed,
            &decoded.nonce,
            decoded.message_count,
        );
        if valid {
            Ok(())
        } else {
            Err(invalid)
        }
    }

    async fn check_eligibility(&self, decoded: &DecodedRequest) -> VerifyResult<()> {
        check_signal_binding(
            &decoded.eligibility,
            &self.config.signal_layout,
            &decoded.commitment,
            &decoded.claimed.root,
        )?;
        check_proving_date(
            &decoded.eligibility,
            &self.config.signal_layout,
            (self.clock)(),
            self.config.date_tolerance_days,
        )?;

        match self.eligibility.verify(decoded.eligibility.clone()).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(VerifyError::ProofInvalid(ProofKind::Eligibility)),
            Err(e) if e.is_infrastructure() => Err(VerifyError::Infrastructure(e.to_string())),
            Err(_) => Err(VerifyError::ProofInvalid(ProofKind::Eligibility)),
        }
    }
}

/// The public signals must attest to this credential's commitment, the
/// claimed root and, when exposed, a satisfied predicate.
fn check_signal_binding(
    bundle: &ProofBundle,
    layout: &PublicSignalLayout,
    commitment: &FieldElement,
    root: &FieldElement,
) -> VerifyResult<()> {
    let invalid = || VerifyError::ProofInvalid(ProofKind::Eligibility);
    let signal = |index: usize| bundle.signal(index).map_err(|_| invalid());

    if let Some(index) = layout.eligible {
        if signal(index)? != FieldElement::from_u64(1) {
            return Err(invalid());
        }
    }
    if signal(layout.commitment)? != *commitment || signal(layout.merkle_root)? != *root {
        return Err(invalid());
    }
    Ok(())
}

/// The eligibility predicate must have been evaluated on (about) today.
fn check_proving_date(
    bundle: &ProofBundle,
    layout: &PublicSignalLayout,
    today: NaiveDate,
    tolerance_days: u32,
) -> VerifyResult<()> {
    let Some(positions) = layout.current_date else {
        return Ok(());
    };
    let invalid = || VerifyError::ProofInvalid(ProofKind::Eligibility);
    let number = |index: usize| -> VerifyResult<u32> {
        bundle
            .public_signals
            .get(index)
            .and_then(|raw| raw.parse::<u32>().ok())
            .ok_or_else(invalid)
    };
    let year = i32::try_from(number(positions.year)?).map_err(|_| invalid())?;
    let claimed = NaiveDate::from_ymd_opt(year, number(positions.month)?, number(positions.day)?)
        .ok_or_else(invalid)?;

    let drift = (claimed - today).num_days().unsigned_abs();
    if drift > u64::from(tolerance_days) {
        tracing::debug!(%claimed, %today, "eligibility proving date out of range");
        return Err(invalid());
    }
    Ok(())
}

/// Map each declared name to its signing position under `ordering`. Names
/// the ordering does not assign, or a message count that disagrees with it,
/// cannot come from an honest disclosure.
fn revealed_positions(
    ordering: &AttributeOrdering,
    decoded: &DecodedRequest,
) -> VerifyResult<Vec<(usize, Vec<u8>)>> {
    let invalid = || VerifyError::ProofInvalid(ProofKind::Disclosure);
    let names = message_names(ordering);
    if decoded.message_count != names.len() {
        return Err(invalid());
    }
    let mut positioned = decoded
        .revealed
        .iter()
        .map(|(name, bytes)| {
            names
                .iter()
                .position(|n| n == name)
                .map(|index| (index, bytes.clone()))
                .ok_or_else(invalid)
        })
        .collect::<VerifyResult<Vec<_>>>()?;
    positioned.sort_by_key(|(index, _)| *index);
    Ok(positioned)
}

fn revealed_attributes(decoded: &DecodedRequest) -> BTreeMap<String, String> {
    decoded
        .revealed
        .iter()
        .filter(|(name, _)| name != BINDING_KEY_FIELD && name != COMMITMENT_FIELD)
        .map(|(name, bytes)| {
            let value = match std::str::from_utf8(bytes) {
                Ok(text) => text.to_string(),
                Err(_) => STANDARD.encode(bytes),
            };
            (name.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(signals: &[&str]) -> ProofBundle {
        ProofBundle {
            proof: vec![1],
            public_signals: signals.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_signal_binding_accepts_matching() {
        let layout = PublicSignalLayout::default();
        let ok = bundle(&["1", "5", "9"]);
        assert!(check_signal_binding(
            &ok,
            &layout,
            &FieldElement::from_u64(5),
            &FieldElement::from_u64(9)
        )
        .is_ok());
    }

    #[test]
    fn test_signal_binding_rejects_mismatch() {
        let layout = PublicSignalLayout::default();
        let c = FieldElement::from_u64(5);
        let r = FieldElement::from_u64(9);
        for signals in [
            vec!["0", "5", "9"],
            vec!["1", "6", "9"],
            vec!["1", "5", "8"],
            vec!["1", "5"],
            vec!["1", "x", "9"],
        ] {
            assert_eq!(
                check_signal_binding(&bundle(&signals), &layout, &c, &r),
                Err(VerifyError::ProofInvalid(ProofKind::Eligibility)),
                "signals {signals:?}"
            );
        }
    }

    #[test]
    fn test_layout_without_eligible_output() {
        let layout = PublicSignalLayout {
            eligible: None,
            commitment: 0,
            merkle_root: 1,
            current_date: None,
        };
        assert!(check_signal_binding(
            &bundle(&["5", "9"]),
            &layout,
            &FieldElement::from_u64(5),
            &FieldElement::from_u64(9)
        )
        .is_ok());
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_proving_date_within_tolerance() {
        let layout = PublicSignalLayout::default();
        let signals = bundle(&["1", "5", "9", "2026", "10", "18"]);
        for today in [date(2026, 10, 17), date(2026, 10, 18), date(2026, 10, 19)] {
            assert!(check_proving_date(&signals, &layout, today, 1).is_ok(), "{today}");
        }
        // Month and year boundaries count in days.
        let new_year = bundle(&["1", "5", "9", "2026", "12", "31"]);
        assert!(check_proving_date(&new_year, &layout, date(2027, 1, 1), 1).is_ok());
    }

    #[test]
    fn test_proving_date_out_of_range() {
        let layout = PublicSignalLayout::default();
        let today = date(2026, 10, 18);
        for signals in [
            vec!["1", "5", "9", "2030", "6", "1"],
            vec!["1", "5", "9", "2026", "10", "20"],
            vec!["1", "5", "9", "2026", "10", "16"],
            vec!["1", "5", "9", "2026", "2", "30"],
            vec!["1", "5", "9", "-2026", "10", "18"],
            vec!["1", "5", "9", "2026", "10"],
        ] {
            assert_eq!(
                check_proving_date(&bundle(&signals), &layout, today, 1),
                Err(VerifyError::ProofInvalid(ProofKind::Eligibility)),
                "signals {signals:?}"
            );
        }
    }

    #[test]
    fn test_layout_without_date_skips_check() {
        let layout = PublicSignalLayout {
            current_date: None,
            ..PublicSignalLayout::default()
        };
        let signals = bundle(&["1", "5", "9"]);
        assert!(check_proving_date(&signals, &layout, date(2026, 10, 18), 1).is_ok());
    }

    fn decoded_with(revealed: Vec<(String, Vec<u8>)>, message_count: usize) -> DecodedRequest {
        DecodedRequest {
            proof_public_key: accredit_core::ProofPublicKey(vec![]),
            proof: vec![1],
            nonce: vec![1],
            message_count,
            revealed,
            binding_key: accredit_core::BindingPublicKey::from_bytes([1; 32]),
            commitment: FieldElement::from_u64(1),
            eligibility: bundle(&[]),
            claimed: accredit_tree::PublishedRoot {
                root: FieldElement::from_u64(1),
                epoch: accredit_core::Epoch(1),
            },
            challenge_id: accredit_core::ChallengeId::new("c"),
            challenge_signature: vec![],
        }
    }

    #[test]
    fn test_revealed_positions_follow_ordering() {
        let ordering = AttributeOrdering::new(["A", "B", "C"]).unwrap();
        let decoded = decoded_with(
            vec![
                (COMMITMENT_FIELD.to_string(), vec![2]),
                ("C".to_string(), b"charlie".to_vec()),
                (BINDING_KEY_FIELD.to_string(), vec![1]),
            ],
            5,
        );
        let positions = revealed_positions(&ordering, &decoded).unwrap();
        let indices: Vec<usize> = positions.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![2, 3, 4]);
        assert_eq!(positions[0].1, b"charlie".to_vec());
    }

    #[test]
    fn test_revealed_positions_reject_unknown_name_and_count() {
        let ordering = AttributeOrdering::new(["A", "B", "C"]).unwrap();
        let unknown = decoded_with(vec![("nationality".to_string(), b"alpha".to_vec())], 5);
        assert_eq!(
            revealed_positions(&ordering, &unknown),
            Err(VerifyError::ProofInvalid(ProofKind::Disclosure))
        );
        let short = decoded_with(vec![("A".to_string(), b"alpha".to_vec())], 4);
        assert_eq!(
            revealed_positions(&ordering, &short),
            Err(VerifyError::ProofInvalid(ProofKind::Disclosure))
        );
    }

    #[test]
    fn test_revealed_attributes_exclude_protocol_fields() {
        let decoded_revealed = vec![
            ("A".to_string(), b"alpha".to_vec()),
            ("bin".to_string(), vec![0xff, 0xfe]),
            (BINDING_KEY_FIELD.to_string(), vec![1; 32]),
            (COMMITMENT_FIELD.to_string(), vec![2; 32]),
        ];
        let decoded = DecodedRequest {
            proof_public_key: accredit_core::ProofPublicKey(vec![]),
            proof: vec![1],
            nonce: vec![1],
            message_count: 4,
            revealed: decoded_revealed,
            binding_key: accredit_core::BindingPublicKey::from_bytes([1; 32]),
            commitment: FieldElement::from_u64(1),
            eligibility: bundle(&[]),
            claimed: accredit_tree::PublishedRoot {
                root: FieldElement::from_u64(1),
                epoch: accredit_core::Epoch(1),
            },
            challenge_id: accredit_core::ChallengeId::new("c"),
            challenge_signature: vec![],
        };
        let attrs = revealed_attributes(&decoded);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["A"], "alpha");
        assert_eq!(attrs["bin"], STANDARD.encode([0xff, 0xfe]));
    }
}
