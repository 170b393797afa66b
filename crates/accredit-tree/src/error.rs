use accredit_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("invalid depth {depth}: must be between 1 and {max}")]
    InvalidDepth { depth: usize, max: usize },

    #[error("capacity exceeded: {leaves} leaves for capacity {capacity}")]
    CapacityExceeded { leaves: usize, capacity: usize },

    #[error("tree full")]
    TreeFull,

    #[error("leaf index {index} out of range (capacity {capacity})")]
    IndexOutOfRange { index: usize, capacity: usize },

    #[error("malformed membership path: {0}")]
    MalformedPath(String),

    #[error("hash error: {0}")]
    Hash(#[from] CoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<serde_json::Error> for TreeError {
    fn from(e: serde_json::Error) -> Self {
        TreeError::Serialization(e.to_string())
    }
}

pub type TreeResult<T> = Result<T, TreeError>;
