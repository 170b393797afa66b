use thiserror::Error;

/// Challenge errors. Messages are deliberately generic: a caller learns that
/// authentication failed, not which stored detail did not match.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("challenge not found")]
    ChallengeNotFound,

    #[error("challenge expired")]
    ChallengeExpired,

    #[error("challenge already consumed")]
    ChallengeConsumed,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("duplicate challenge")]
    DuplicateChallenge,

    #[error("challenge storage unavailable")]
    StorageUnavailable,

    #[error("too many open challenges")]
    TooManyOpenChallenges,

    #[error("challenge store full")]
    StoreFull,
}

impl AuthError {
    /// Storage faults are infrastructure problems, not authentication failures.
    pub fn is_storage(&self) -> bool {
        matches!(self, AuthError::StorageUnavailable)
    }

    /// Issuance refused by store limits. The caller may retry later.
    pub fn is_limit(&self) -> bool {
        matches!(self, AuthError::TooManyOpenChallenges | AuthError::StoreFull)
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
