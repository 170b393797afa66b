use accredit_core::CoreError;
use accredit_tree::TreeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZkError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("merkle witness rejected: {0}")]
    WitnessMismatch(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("malformed proof bundle: {0}")]
    MalformedBundle(String),

    #[error("toolchain unavailable: {0}")]
    ToolchainUnavailable(String),

    #[error("toolchain step '{step}' failed with status {status}")]
    ToolchainFailed {
        step: String,
        status: i32,
        stderr: String,
    },

    #[error("{op} timed out after {millis} ms")]
    Timeout { op: &'static str, millis: u64 },

    #[error("worker failed: {0}")]
    WorkerFailed(String),

    #[error("verification key unavailable: {0}")]
    VerificationKey(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("tree error: {0}")]
    Tree(#[from] TreeError),
}

impl ZkError {
    /// Failures of the proving machinery rather than of the proof or its
    /// inputs. Only these are retried, and they never count as a pass.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            ZkError::ToolchainUnavailable(_)
                | ZkError::ToolchainFailed { .. }
                | ZkError::Timeout { .. }
                | ZkError::WorkerFailed(_)
                | ZkError::VerificationKey(_)
                | ZkError::Io(_)
                | ZkError::Serialization(_)
        )
    }
}

impl From<serde_json::Error> for ZkError {
    fn from(e: serde_json::Error) -> Self {
        ZkError::Serialization(e.to_string())
    }
}

pub type ZkResult<T> = Result<T, ZkError>;
