use accredit_core::{ChallengeId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{AuthError, AuthResult};
use crate::types::{Challenge, ChallengeStatus};

/// Persistence for challenge records.
pub trait ChallengeStore: Send + Sync {
    fn put_challenge(&self, challenge: Challenge) -> AuthResult<()>;

    fn get_challenge(&self, id: &ChallengeId) -> AuthResult<Option<Challenge>>;

    /// Atomically move `id` from `Issued` to `Consumed`. Returns `false` if
    /// the record is missing or no longer `Issued`.
    fn consume(&self, id: &ChallengeId) -> AuthResult<bool>;

    /// Drop records past expiry at `now`, consumed or not. A replay of a
    /// purged challenge fails as not found. Returns how many were dropped.
    fn purge_expired(&self, now: Timestamp) -> AuthResult<usize>;
}

/// Bounds on what unauthenticated callers can make the store hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeLimits {
    /// Open (issued, unexpired) challenges allowed per binding key.
    #[serde(default = "default_max_open_per_key")]
    pub max_open_per_key: usize,
    /// Records held at once, consumed ones included until purged.
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

fn default_max_open_per_key() -> usize {
    5
}

fn default_max_records() -> usize {
    100_000
}

impl Default for ChallengeLimits {
    fn default() -> Self {
        Self {
            max_open_per_key: default_max_open_per_key(),
            max_records: default_max_records(),
        }
    }
}

#[derive(Default)]
pub struct InMemoryChallengeStore {
    records: Mutex<HashMap<String, Challenge>>,
    limits: ChallengeLimits,
}

fn lock_records(
    mutex: &Mutex<HashMap<String, Challenge>>,
) -> AuthResult<MutexGuard<'_, HashMap<String, Challenge>>> {
    mutex.lock().map_err(|e| {
        tracing::error!(error = %e, "challenge store lock poisoned");
        AuthError::StorageUnavailable
    })
}

impl InMemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: ChallengeLimits) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            limits,
        }
    }

    pub fn len(&self) -> AuthResult<usize> {
        Ok(lock_records(&self.records)?.len())
    }

    pub fn is_empty(&self) -> AuthResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl ChallengeStore for InMemoryChallengeStore {
    fn put_challenge(&self, challenge: Challenge) -> AuthResult<()> {
        let mut records = lock_records(&self.records)?;
        if records.contains_key(challenge.id.as_str()) {
            return Err(AuthError::DuplicateChallenge);
        }

        let now = challenge.issued_at;
        let open_for_key = records
            .values()
            .filter(|c| c.bound_key == challenge.bound_key && c.is_open_at(now))
            .count();
        if open_for_key >= self.limits.max_open_per_key {
            return Err(AuthError::TooManyOpenChallenges);
        }
        if records.len() >= self.limits.max_records {
            records.retain(|_, c| !c.is_expired_at(now));
            if records.len() >= self.limits.max_records {
                tracing::warn!(records = records.len(), "challenge store at capacity");
                return Err(AuthError::StoreFull);
            }
        }

        records.insert(challenge.id.as_str().to_string(), challenge);
        Ok(())
    }

    fn get_challenge(&self, id: &ChallengeId) -> AuthResult<Option<Challenge>> {
        Ok(lock_records(&self.records)?.get(id.as_str()).cloned())
    }

    fn consume(&self, id: &ChallengeId) -> AuthResult<bool> {
        let mut records = lock_records(&self.records)?;
        match records.get_mut(id.as_str()) {
            Some(record) if record.status == ChallengeStatus::Issued => {
                record.status = ChallengeStatus::Consumed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn purge_expired(&self, now: Timestamp) -> AuthResult<usize> {
        let mut records = lock_records(&self.records)?;
        let before = records.len();
        records.retain(|_, c| !c.is_expired_at(now));
        Ok(before - records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accredit_core::BindingKeypair;

    fn challenge(id: &str, expires: u64) -> Challenge {
        Challenge {
            id: ChallengeId::new(id),
            random_bytes: [1u8; 32],
            bound_key: BindingKeypair::generate().public_key(),
            issued_at: Timestamp::from_seconds(0),
            expires_at: Timestamp::from_seconds(expires),
            status: ChallengeStatus::Issued,
        }
    }

    #[test]
    fn test_put_get() {
        let store = InMemoryChallengeStore::new();
        store.put_challenge(challenge("a", 100)).unwrap();
        let loaded = store.get_challenge(&ChallengeId::new("a")).unwrap().unwrap();
        assert_eq!(loaded.status, ChallengeStatus::Issued);
        assert!(store.get_challenge(&ChallengeId::new("b")).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let store = InMemoryChallengeStore::new();
        store.put_challenge(challenge("a", 100)).unwrap();
        assert_eq!(
            store.put_challenge(challenge("a", 100)),
            Err(AuthError::DuplicateChallenge)
        );
    }

    #[test]
    fn test_consume_is_single_shot() {
        let store = InMemoryChallengeStore::new();
        let id = ChallengeId::new("a");
        store.put_challenge(challenge("a", 100)).unwrap();
        assert!(store.consume(&id).unwrap());
        assert!(!store.consume(&id).unwrap());
        assert!(!store.consume(&ChallengeId::new("missing")).unwrap());
    }

    fn challenge_for(id: &str, key: accredit_core::BindingPublicKey, issued: u64) -> Challenge {
        Challenge {
            bound_key: key,
            issued_at: Timestamp::from_seconds(issued),
            expires_at: Timestamp::from_seconds(issued + 100),
            ..challenge(id, 0)
        }
    }

    #[test]
    fn test_open_challenges_per_key_bounded() {
        let store = InMemoryChallengeStore::with_limits(ChallengeLimits {
            max_open_per_key: 2,
            max_records: 100,
        });
        let key = BindingKeypair::generate().public_key();
        store.put_challenge(challenge_for("a", key, 0)).unwrap();
        store.put_challenge(challenge_for("b", key, 0)).unwrap();
        assert_eq!(
            store.put_challenge(challenge_for("c", key, 0)),
            Err(AuthError::TooManyOpenChallenges)
        );

        // Other keys are unaffected; consuming or expiry frees a slot.
        let other = BindingKeypair::generate().public_key();
        store.put_challenge(challenge_for("d", other, 0)).unwrap();
        store.consume(&ChallengeId::new("a")).unwrap();
        store.put_challenge(challenge_for("e", key, 0)).unwrap();
        store.put_challenge(challenge_for("f", key, 500)).unwrap();
    }

    #[test]
    fn test_capacity_reclaims_expired_then_rejects() {
        let store = InMemoryChallengeStore::with_limits(ChallengeLimits {
            max_open_per_key: 10,
            max_records: 2,
        });
        let key = BindingKeypair::generate().public_key();
        store.put_challenge(challenge_for("a", key, 0)).unwrap();
        store.put_challenge(challenge_for("b", key, 0)).unwrap();
        assert_eq!(
            store.put_challenge(challenge_for("c", key, 50)),
            Err(AuthError::StoreFull)
        );

        store.put_challenge(challenge_for("d", key, 1_000)).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_purge_drops_only_expired() {
        let store = InMemoryChallengeStore::new();
        store.put_challenge(challenge("old", 10)).unwrap();
        store.put_challenge(challenge("used", 10)).unwrap();
        store.put_challenge(challenge("live", 1_000)).unwrap();
        store.consume(&ChallengeId::new("used")).unwrap();

        assert_eq!(store.purge_expired(Timestamp::from_seconds(500)).unwrap(), 2);
        assert_eq!(store.len().unwrap(), 1);
        assert!(store.get_challenge(&ChallengeId::new("live")).unwrap().is_some());
    }
}
