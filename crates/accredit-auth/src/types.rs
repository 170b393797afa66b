use accredit_core::{BindingPublicKey, ChallengeId, Timestamp};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeStatus {
    Issued,
    Consumed,
    Expired,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Challenge {
    pub id: ChallengeId,
    pub random_bytes: [u8; 32],
    pub bound_key: BindingPublicKey,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub status: ChallengeStatus,
}

impl Challenge {
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at.is_expired_at(now)
    }

    /// Open for a response at `now`.
    pub fn is_open_at(&self, now: Timestamp) -> bool {
        self.status == ChallengeStatus::Issued && !self.is_expired_at(now)
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Challenge")
            .field("id", &self.id)
            .field("bound_key", &self.bound_key)
            .field("expires_at", &self.expires_at)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
