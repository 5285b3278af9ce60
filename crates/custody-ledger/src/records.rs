use std::fmt;

use custody_types::{PackageId, Timestamp};
use serde::{Deserialize, Serialize};

/// Status label of the first history event of every package.
pub const CREATED_STATUS: &str = "CREATED";

/// Canonical record of a tracked package. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub origin: String,
    pub destination: String,
}

/// One immutable, ledger-timestamped entry in a package's history.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub status: String,
    pub location: String,
    pub timestamp: Timestamp,
}

impl HistoryEvent {
    /// The creation event every history starts with.
    pub fn created(package: &Package, timestamp: Timestamp) -> Self {
        Self {
            status: CREATED_STATUS.to_string(),
            location: package.origin.clone(),
            timestamp,
        }
    }

    pub fn is_creation(&self) -> bool {
        self.status == CREATED_STATUS
    }
}

/// Notification published after a mutation has been applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    PackageCreated {
        id: PackageId,
        origin: String,
        destination: String,
        timestamp: Timestamp,
    },
    PackageUpdated {
        id: PackageId,
        status: String,
        location: String,
        timestamp: Timestamp,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerEventKind {
    PackageCreated,
    PackageUpdated,
}

impl fmt::Display for LedgerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PackageCreated => f.write_str("PackageCreated"),
            Self::PackageUpdated => f.write_str("PackageUpdated"),
        }
    }
}

impl LedgerEvent {
    pub fn kind(&self) -> LedgerEventKind {
        match self {
            Self::PackageCreated { .. } => LedgerEventKind::PackageCreated,
            Self::PackageUpdated { .. } => LedgerEventKind::PackageUpdated,
        }
    }

    pub fn package_id(&self) -> &PackageId {
        match self {
            Self::PackageCreated { id, .. } | Self::PackageUpdated { id, .. } => id,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::PackageCreated { timestamp, .. } | Self::PackageUpdated { timestamp, .. } => {
                *timestamp
            }
        }
    }
}
