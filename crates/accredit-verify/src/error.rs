use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofKind {
    Disclosure,
    Eligibility,
}

impl fmt::Display for ProofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofKind::Disclosure => write!(f, "disclosure"),
            ProofKind::Eligibility => write!(f, "eligibility"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    ClientError,
    AuthError,
    ServerError,
}

/// Verification failures. The displayed message never includes proof,
/// key or challenge material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("stale accreditation root")]
    StaleRoot,

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("{0} proof invalid")]
    ProofInvalid(ProofKind),

    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

impl VerifyError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            VerifyError::MalformedInput(_) => "malformed_input",
            VerifyError::StaleRoot => "stale_root",
            VerifyError::AuthenticationFailed => "authentication_failed",
            VerifyError::ProofInvalid(_) => "proof_invalid",
            VerifyError::Infrastructure(_) => "infrastructure_failure",
        }
    }

    pub fn proof_kind(&self) -> Option<ProofKind> {
        match self {
            VerifyError::ProofInvalid(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn status_class(&self) -> StatusClass {
        match self {
            VerifyError::MalformedInput(_) | VerifyError::StaleRoot => StatusClass::ClientError,
            VerifyError::AuthenticationFailed | VerifyError::ProofInvalid(_) => {
                StatusClass::AuthError
            }
            VerifyError::Infrastructure(_) => StatusClass::ServerError,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            VerifyError::MalformedInput(_) => 400,
            VerifyError::StaleRoot => 409,
            VerifyError::AuthenticationFailed | VerifyError::ProofInvalid(_) => 401,
            VerifyError::Infrastructure(_) => 503,
        }
    }

    /// Safe to retry the whole verification unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VerifyError::Infrastructure(_))
    }
}

pub type VerifyResult<T> = Result<T, VerifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> Vec<VerifyError> {
        vec![
            VerifyError::MalformedInput("x".into()),
            VerifyError::StaleRoot,
            VerifyError::AuthenticationFailed,
            VerifyError::ProofInvalid(ProofKind::Disclosure),
            VerifyError::Infrastructure("x".into()),
        ]
    }

    #[test]
    fn test_reason_codes_distinct() {
        let codes: std::collections::HashSet<_> = all().iter().map(|e| e.reason_code()).collect();
        assert_eq!(codes.len(), 5);
    }

    #[test]
    fn test_status_mapping() {
        let statuses: Vec<u16> = all().iter().map(|e| e.http_status()).collect();
        assert_eq!(statuses, vec![400, 409, 401, 401, 503]);
        assert_eq!(VerifyError::StaleRoot.status_class(), StatusClass::ClientError);
        assert_eq!(
            VerifyError::ProofInvalid(ProofKind::Eligibility).status_class(),
            StatusClass::AuthError
        );
    }

    #[test]
    fn test_only_infrastructure_retryable() {
        for err in all() {
            assert_eq!(err.is_retryable(), err.reason_code() == "infrastructure_failure");
        }
    }

    #[test]
    fn test_proof_kind_display() {
        assert_eq!(
            VerifyError::ProofInvalid(ProofKind::Eligibility).to_string(),
            "eligibility proof invalid"
        );
        assert_eq!(
            VerifyError::ProofInvalid(ProofKind::Disclosure).proof_kind(),
            Some(ProofKind::Disclosure)
        );
    }
}
