use accredit_core::CoreError;
use accredit_tree::TreeError;
use thiserror::Error;

/// Errors from issuance and disclosure. Cryptographic failures carry no
/// detail about which message or key was at fault.
#[derive(Debug, Error)]
pub enum CredError {
    #[error("serial sampling exhausted after {attempts} attempts")]
    SerialExhausted { attempts: u32 },

    #[error("signing failed")]
    SigningFailed,

    #[error("proof creation failed")]
    ProofCreationFailed,

    #[error("attribute ordering differs from the published ordering")]
    OrderingMismatch,

    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("commitment not in accreditation tree")]
    CommitmentNotInTree,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("tree error: {0}")]
    Tree(#[from] TreeError),
}

pub type CredResult<T> = Result<T, CredError>;
