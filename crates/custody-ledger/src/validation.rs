use std::collections::HashSet;

use custody_types::PackageId;

use crate::error::LedgerError;
use crate::records::{HistoryEvent, Package};
use crate::snapshot::LedgerSnapshot;
use crate::traits::LedgerReader;

/// Result of validating one package history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub package: PackageId,
    pub event_count: u64,
    pub starts_with_creation: bool,
    pub timestamps_monotonic: bool,
    pub fields_present: bool,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific invariant violation found during validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// Zero-based history position, `None` for record-level problems.
    pub index: Option<usize>,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    EmptyHistory,
    MissingCreation,
    CreationLocationMismatch,
    EmptyRecordField,
    EmptyEventField,
    TimestampRegression,
    DuplicatePackage,
}

/// Package history validator.
pub struct HistoryValidator;

impl HistoryValidator {
    /// Check a record and its history against the ledger invariants.
    pub fn validate_history(package: &Package, history: &[HistoryEvent]) -> ValidationReport {
        let mut violations = Vec::new();
        let mut starts_with_creation = true;
        let mut timestamps_monotonic = true;
        let mut fields_present = true;

        for (field, value) in [
            ("origin", &package.origin),
            ("destination", &package.destination),
        ] {
            if value.trim().is_empty() {
                fields_present = false;
                violations.push(Violation {
                    index: None,
                    kind: ViolationKind::EmptyRecordField,
                    description: format!("record {field} is empty"),
                });
            }
        }

        match history.first() {
            None => {
                starts_with_creation = false;
                violations.push(Violation {
                    index: None,
                    kind: ViolationKind::EmptyHistory,
                    description: "history has no events".into(),
                });
            }
            Some(first) if !first.is_creation() => {
                starts_with_creation = false;
                violations.push(Violation {
                    index: Some(0),
                    kind: ViolationKind::MissingCreation,
                    description: format!("first event is {:?}, expected CREATED", first.status),
                });
            }
            Some(first) if first.location != package.origin => {
                starts_with_creation = false;
                violations.push(Violation {
                    index: Some(0),
                    kind: ViolationKind::CreationLocationMismatch,
                    description: format!(
                        "creation event at {:?} but origin is {:?}",
                        first.location, package.origin
                    ),
                });
            }
            Some(_) => {}
        }

        for (index, event) in history.iter().enumerate() {
            if event.status.trim().is_empty() || event.location.trim().is_empty() {
                fields_present = false;
                violations.push(Violation {
                    index: Some(index),
                    kind: ViolationKind::EmptyEventField,
                    description: format!("event {index} has an empty status or location"),
                });
            }
            if index > 0 && event.timestamp < history[index - 1].timestamp {
                timestamps_monotonic = false;
                violations.push(Violation {
                    index: Some(index),
                    kind: ViolationKind::TimestampRegression,
                    description: format!(
                        "event {index} at {} precedes event {} at {}",
                        event.timestamp,
                        index - 1,
                        history[index - 1].timestamp
                    ),
                });
            }
        }

        ValidationReport {
            package: package.id.clone(),
            event_count: history.len() as u64,
            starts_with_creation,
            timestamps_monotonic,
            fields_present,
            violations,
        }
    }

    /// Validate one package held by a ledger.
    pub fn validate_package<R: LedgerReader>(
        reader: &R,
        id: &PackageId,
    ) -> Result<ValidationReport, LedgerError> {
        let history = reader.history(id)?;
        let package = reader.get(id)?;
        Ok(Self::validate_history(&package, &history))
    }

    /// Validate every package held by a ledger.
    pub fn validate_all<R: LedgerReader>(reader: &R) -> Result<Vec<ValidationReport>, LedgerError> {
        let ids = reader.package_ids()?;
        let mut reports = Vec::with_capacity(ids.len());
        for id in &ids {
            reports.push(Self::validate_package(reader, id)?);
        }
        Ok(reports)
    }

    /// Validate every entry of a snapshot, flagging repeated identifiers.
    pub fn validate_snapshot(snapshot: &LedgerSnapshot) -> Vec<ValidationReport> {
        let mut seen = HashSet::new();
        snapshot
            .packages
            .iter()
            .map(|entry| {
                let mut report = Self::validate_history(&entry.package, &entry.history);
                if !seen.insert(entry.package.id.clone()) {
                    report.violations.insert(
                        0,
                        Violation {
                            index: None,
                            kind: ViolationKind::DuplicatePackage,
                            description: format!("package {} appears more than once", entry.package.id),
                        },
                    );
                }
                report
            })
            .collect()
    }
}
