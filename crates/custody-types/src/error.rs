use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("package id must not be empty")]
    EmptyPackageId,

    #[error("package id must not have leading or trailing whitespace: {0:?}")]
    UntrimmedPackageId(String),
}
