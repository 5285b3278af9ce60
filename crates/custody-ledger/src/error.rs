use custody_types::{Identity, PackageId};

/// Errors produced by ledger operations.
///
/// `Unauthorized`, `Validation`, `AlreadyExists` and `NotFound` are final:
/// retrying the same request always fails the same way.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("caller {caller} is not the authorized writer")]
    Unauthorized { caller: Identity },

    #[error("{field} must not be empty")]
    Validation { field: &'static str },

    #[error("package already exists: {0}")]
    AlreadyExists(PackageId),

    #[error("package not found: {0}")]
    NotFound(PackageId),

    #[error("corrupt ledger data for package {id}: {reason}")]
    Corrupt { id: PackageId, reason: String },

    #[error("unsupported snapshot version {found}, expected {expected}")]
    UnsupportedSnapshot { found: u32, expected: u32 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Stable machine-readable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "Unauthorized",
            Self::Validation { .. } => "ValidationError",
            Self::AlreadyExists(_) => "AlreadyExists",
            Self::NotFound(_) => "NotFound",
            Self::Corrupt { .. } => "Corrupt",
            Self::UnsupportedSnapshot { .. } => "UnsupportedSnapshot",
            Self::Serialization(_) => "Serialization",
            Self::Io(_) => "Io",
            Self::Internal(_) => "Internal",
        }
    }
}
