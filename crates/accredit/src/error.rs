use thiserror::Error;

/// Error type for the accredit service binary, aggregating the errors of
/// every workspace crate it wires together.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("core error: {0}")]
    Core(#[from] accredit_core::CoreError),

    #[error("tree error: {0}")]
    Tree(#[from] accredit_tree::TreeError),

    #[error("credential error: {0}")]
    Credential(#[from] accredit_cred::CredError),

    #[error("eligibility error: {0}")]
    Eligibility(#[from] accredit_zk::ZkError),

    #[error("challenge error: {0}")]
    Challenge(#[from] accredit_auth::AuthError),

    #[error("verification error: {0}")]
    Verify(#[from] accredit_verify::VerifyError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("key file error: {0}")]
    KeyFile(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
