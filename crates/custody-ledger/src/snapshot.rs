use std::fs;
use std::io::Write;
use std::path::Path;

use custody_types::{Identity, PackageId};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::records::{HistoryEvent, Package};

/// Current on-disk snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Portable copy of the whole ledger, used to hand state to and from an
/// external storage layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub owner: Identity,
    pub packages: Vec<PackageEntry>,
}

/// One package and its full history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub package: Package,
    pub history: Vec<HistoryEvent>,
}

impl LedgerSnapshot {
    pub fn to_json(&self) -> Result<String, LedgerError> {
        serde_json::to_string_pretty(self).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, LedgerError> {
        serde_json::from_str(json).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    pub fn read_from(path: &Path) -> Result<Self, LedgerError> {
        let json = fs::read_to_string(path)
            .map_err(|e| LedgerError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Write to `path` through a sibling temporary file and a rename, so a
    /// crash never leaves a half-written snapshot behind.
    pub fn write_to(&self, path: &Path) -> Result<(), LedgerError> {
        let json = self.to_json()?;
        let tmp = path.with_extension("tmp");
        let io_err = |e: std::io::Error| LedgerError::Io(format!("{}: {e}", path.display()));

        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    pub fn find(&self, id: &PackageId) -> Option<&PackageEntry> {
        self.packages.iter().find(|entry| &entry.package.id == id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use custody_types::Timestamp;

    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::PackageLedger;
    use crate::traits::{LedgerReader, LedgerWriter};

    fn populated() -> PackageLedger {
        let owner = Identity::from_raw([9; 20]);
        let ledger = PackageLedger::new(owner)
            .with_clock(Arc::new(ManualClock::new(Timestamp::from_secs(1_717_000_000))));
        let pkg = PackageId::new("pkg1").unwrap();
        ledger.create(&owner, &pkg, "Madrid", "Barcelona").unwrap();
        ledger
            .update_status(&owner, &pkg, "IN_TRANSIT", "Zaragoza")
            .unwrap();
        ledger
    }

    #[test]
    fn file_roundtrip_restores_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let ledger = populated();
        ledger.snapshot().unwrap().write_to(&path).unwrap();
        assert!(!path.with_extension("tmp").exists());

        let restored = PackageLedger::restore(LedgerSnapshot::read_from(&path).unwrap()).unwrap();
        let pkg = PackageId::new("pkg1").unwrap();
        assert_eq!(restored.history(&pkg).unwrap().len(), 2);
        assert_eq!(restored.owner(), ledger.owner());
    }

    #[test]
    fn json_layout_is_stable() {
        let json: serde_json::Value =
            serde_json::from_str(&populated().snapshot().unwrap().to_json().unwrap()).unwrap();
        assert_eq!(json["version"], SNAPSHOT_VERSION);
        assert_eq!(json["owner"], format!("0x{}", "09".repeat(20)));
        assert_eq!(json["packages"][0]["package"]["id"], "pkg1");
        assert_eq!(json["packages"][0]["history"][1]["status"], "IN_TRANSIT");
        assert_eq!(json["packages"][0]["history"][0]["timestamp"], 1_717_000_000u64);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let error = LedgerSnapshot::read_from(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(error, LedgerError::Io(_)));
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        let error = LedgerSnapshot::from_json("{not json").unwrap_err();
        assert!(matches!(error, LedgerError::Serialization(_)));
    }

    #[test]
    fn find_locates_entry() {
        let snapshot = populated().snapshot().unwrap();
        assert!(snapshot.find(&PackageId::new("pkg1").unwrap()).is_some());
        assert!(snapshot.find(&PackageId::new("pkg2").unwrap()).is_none());
    }
}
