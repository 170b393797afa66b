use accredit_core::{BindingPublicKey, ChallengeId, Timestamp};
use rand::RngCore;
use std::sync::Arc;

use crate::error::{AuthError, AuthResult};
use crate::store::ChallengeStore;
use crate::types::{Challenge, ChallengeStatus};

pub const DEFAULT_CHALLENGE_TTL_SECS: u64 = 600;

pub struct ChallengeAuthenticator {
    store: Arc<dyn ChallengeStore>,
    ttl_seconds: u64,
}

impl ChallengeAuthenticator {
    pub fn new(store: Arc<dyn ChallengeStore>, ttl_seconds: u64) -> Self {
        Self { store, ttl_seconds }
    }

    pub fn with_default_ttl(store: Arc<dyn ChallengeStore>) -> Self {
        Self::new(store, DEFAULT_CHALLENGE_TTL_SECS)
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn issue(&self, bound_key: &BindingPublicKey) -> AuthResult<Challenge> {
        self.issue_at(bound_key, Timestamp::now())
    }

    pub fn issue_at(&self, bound_key: &BindingPublicKey, now: Timestamp) -> AuthResult<Challenge> {
        let mut random_bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut random_bytes);

        let challenge = Challenge {
            id: ChallengeId::new(uuid::Uuid::new_v4().to_string()),
            random_bytes,
            bound_key: *bound_key,
            issued_at: now,
            expires_at: now.plus_seconds(self.ttl_seconds),
            status: ChallengeStatus::Issued,
        };
        self.store.put_challenge(challenge.clone())?;
        tracing::info!(
            challenge_id = %challenge.id.short(),
            expires_at = %challenge.expires_at.to_rfc3339(),
            "challenge issued"
        );
        Ok(challenge)
    }

    /// `true` only if the challenge was open, bound to `bound_key`, and
    /// `signature` verifies over its bytes. Every failure maps to `false`.
    pub fn respond(
        &self,
        id: &ChallengeId,
        signature: &[u8],
        bound_key: &BindingPublicKey,
    ) -> bool {
        self.respond_detailed(id, signature, bound_key).is_ok()
    }

    pub fn respond_detailed(
        &self,
        id: &ChallengeId,
        signature: &[u8],
        bound_key: &BindingPublicKey,
    ) -> AuthResult<()> {
        self.respond_at(id, signature, bound_key, Timestamp::now())
    }

    pub fn respond_at(
        &self,
        id: &ChallengeId,
        signature: &[u8],
        bound_key: &BindingPublicKey,
        now: Timestamp,
    ) -> AuthResult<()> {
        let result = self.check_and_consume(id, signature, bound_key, now);
        match &result {
            Ok(()) => tracing::info!(challenge_id = %id.short(), "challenge consumed"),
            Err(e) => tracing::warn!(challenge_id = %id.short(), reason = %e, "challenge response rejected"),
        }
        result
    }

    fn check_and_consume(
        &self,
        id: &ChallengeId,
        signature: &[u8],
        bound_key: &BindingPublicKey,
        now: Timestamp,
    ) -> AuthResult<()> {
        let challenge = self
            .store
            .get_challenge(id)?
            .filter(|c| &c.bound_key == bound_key)
            .ok_or(AuthError::ChallengeNotFound)?;

        match challenge.status {
            ChallengeStatus::Consumed => return Err(AuthError::ChallengeConsumed),
            ChallengeStatus::Expired => return Err(AuthError::ChallengeExpired),
            ChallengeStatus::Issued => {}
        }
        if challenge.is_expired_at(now) {
            return Err(AuthError::ChallengeExpired);
        }
        if !bound_key.verify(&challenge.random_bytes, signature) {
            return Err(AuthError::InvalidSignature);
        }
        if !self.store.consume(id)? {
            return Err(AuthError::ChallengeConsumed);
        }
        Ok(())
    }

    pub fn purge_expired(&self, now: Timestamp) -> AuthResult<usize> {
        let purged = self.store.purge_expired(now)?;
        if purged > 0 {
            tracing::debug!(purged, "expired challenges purged");
        }
        Ok(purged)
    }
}
