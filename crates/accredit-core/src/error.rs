use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid field element: {0}")]
    InvalidFieldElement(String),

    #[error("hash error: {0}")]
    Hash(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("duplicate attribute: {0}")]
    DuplicateAttribute(String),

    #[error("reserved attribute name: {0}")]
    ReservedAttribute(String),

    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("attribute ordering mismatch: {0}")]
    OrderingMismatch(String),

    #[error("signature suite error: {0}")]
    Suite(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
